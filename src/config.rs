use std::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Only agents with goals, no boxes.
    AgentRace,
    BoxDelivery,
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Strategy::AgentRace => write!(f, "agent-race"),
            Strategy::BoxDelivery => write!(f, "box-delivery"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Resident memory above which a search gives up.
    pub memory_ceiling_mb: u64,
    /// How many expansions between memory checks.
    pub memory_check_interval: u64,
    /// Expansions a single search may take.
    pub search_limit: u64,
    /// Cells farther than this from everything relevant are walled off during a search.
    pub narrowing_radius: u32,
    /// Steps an agent waits for a moving agent before planning around it.
    pub patience: u32,
    pub max_cycles: u32,
    /// Cost of idling on a goal cell meant for someone else.
    pub idle_penalty: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            memory_ceiling_mb: 2048,
            memory_check_interval: 1000,
            search_limit: 200_000,
            narrowing_radius: 4,
            patience: 3,
            max_cycles: 10_000,
            idle_penalty: 5,
        }
    }
}
