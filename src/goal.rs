use std::fmt::{self, Display, Formatter};

use crate::data::{Color, Location};

/// Agent goals are digits, box goals are letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Goal {
    id: char,
    location: Location,
    color: Color,
}

impl Goal {
    pub fn new(id: char, location: Location, color: Color) -> Self {
        Goal { id, location, color }
    }

    pub fn id(&self) -> char {
        self.id
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_agent_goal(&self) -> bool {
        self.id.is_ascii_digit()
    }

    pub fn is_box_goal(&self) -> bool {
        self.id.is_ascii_uppercase()
    }
}

impl Display for Goal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Goal{} ({}) at {}", self.id, self.color, self.location)
    }
}
