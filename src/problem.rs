use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::actor::{Actor, Agent, BoxActor};
use crate::config::Strategy;
use crate::formatter::ProblemFormatter;
use crate::goal::Goal;
use crate::level::Level;
use crate::parser::{self, ParserErr};
use crate::planner::problem_state;
use crate::planner::state::State;

/// A loaded level - everything the planner starts from.
#[derive(Debug, Clone)]
pub struct Problem {
    name: String,
    level: Level,
    agents: Vec<Agent>,
    boxes: Vec<BoxActor>,
    goals: Vec<Goal>,
    strategy: Strategy,
}

impl Problem {
    pub(crate) fn new(
        name: String,
        level: Level,
        agents: Vec<Agent>,
        boxes: Vec<BoxActor>,
        goals: Vec<Goal>,
    ) -> Self {
        let strategy = if boxes.is_empty() {
            Strategy::AgentRace
        } else {
            Strategy::BoxDelivery
        };
        Problem {
            name,
            level,
            agents,
            boxes,
            goals,
            strategy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn boxes(&self) -> &[BoxActor] {
        &self.boxes
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn initial_state(&self) -> State {
        problem_state(&self.agents, &self.boxes)
    }

    /// Every goal is covered by an actor with the same id.
    pub fn is_solved(&self, state: &State) -> bool {
        self.goals.iter().all(|goal| {
            if goal.is_agent_goal() {
                state
                    .agents()
                    .iter()
                    .any(|a| a.location == goal.location() && self.agents[a.index].id() == goal.id())
            } else {
                state
                    .boxes()
                    .iter()
                    .any(|b| b.location == goal.location() && self.boxes[b.index].id() == goal.id())
            }
        })
    }

    pub fn formatter<'a>(&'a self, state: Option<&'a State>) -> ProblemFormatter<'a> {
        ProblemFormatter::new(self, state)
    }
}

impl FromStr for Problem {
    type Err = ParserErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::parse(s)
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatter(None))
    }
}
