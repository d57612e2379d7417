use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};

use crate::action::Action;
use crate::data::{Color, Location};
use crate::desire::Desire;
use crate::goal::Goal;
use crate::planner::route::Route;

/// What agents and boxes have in common.
pub trait Actor {
    fn id(&self) -> char;
    fn location(&self) -> Location;
    fn color(&self) -> Color;
    /// Doesn't check the location is free, that's the caller's job.
    fn move_to(&mut self, location: Location);
}

/// Index of an actor in the planner's agent or box list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActorRef {
    Agent(usize),
    Box(usize),
}

/// An entry in an agent's goal queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Bring the box to its destination.
    Deliver(usize),
    /// Stand on the agent goal.
    Reach(usize),
    /// Get out of the way.
    Relocate(Location),
}

impl Task {
    pub fn location(self, boxes: &[BoxActor], goals: &[Goal]) -> Location {
        match self {
            Task::Deliver(b) => boxes[b].location(),
            Task::Reach(g) => goals[g].location(),
            Task::Relocate(loc) => loc,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    id: char,
    location: Location,
    color: Color,
    pub(crate) queue: VecDeque<Task>,
    pub(crate) desire: Desire,
    pub(crate) actions: Vec<Action>,
    pub(crate) route: Option<Route>,
    /// Actions computed by the bounded search, executed one per step.
    pub(crate) committed: VecDeque<Action>,
    /// Consecutive steps spent waiting for someone else.
    pub(crate) waited: u32,
}

impl Agent {
    pub fn new(id: char, location: Location, color: Color) -> Self {
        Agent {
            id,
            location,
            color,
            queue: VecDeque::new(),
            desire: Desire::Sleep,
            actions: Vec::new(),
            route: None,
            committed: VecDeque::new(),
            waited: 0,
        }
    }

    pub fn desire(&self) -> Desire {
        self.desire
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn queue(&self) -> impl Iterator<Item = &Task> {
        self.queue.iter()
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Nothing to do now and nothing already planned.
    pub fn is_idle(&self) -> bool {
        self.desire.is_sleep() && self.committed.is_empty()
    }

    /// Drops the current desire and puts its element back at the front of the queue.
    pub(crate) fn reschedule(&mut self) {
        if let Some(task) = self.desire.task() {
            self.queue.retain(|&t| t != task);
            self.queue.push_front(task);
        }
        self.desire = Desire::Sleep;
        self.committed.clear();
        self.route = None;
        self.waited = 0;
    }

    /// Moves (or inserts) the task to the front of the queue.
    pub(crate) fn prioritize(&mut self, task: Task) {
        self.queue.retain(|&t| t != task);
        self.queue.push_front(task);
    }

    pub(crate) fn owns(&self, task: Task) -> bool {
        self.desire.task() == Some(task) || self.queue.contains(&task)
    }

    /// Sum of distances to the current target and everything queued.
    pub fn workload(&self, boxes: &[BoxActor], goals: &[Goal]) -> u32 {
        let current = self
            .desire
            .location()
            .map_or(0, |loc| self.location.dist(loc));
        let queued: u32 = self
            .queue
            .iter()
            .map(|task| self.location.dist(task.location(boxes, goals)))
            .sum();
        current + queued
    }
}

impl Actor for Agent {
    fn id(&self) -> char {
        self.id
    }

    fn location(&self) -> Location {
        self.location
    }

    fn color(&self) -> Color {
        self.color
    }

    fn move_to(&mut self, location: Location) {
        self.location = location;
    }
}

impl Display for Agent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Agent{} ({}) @{}", self.id, self.color, self.location)
    }
}

#[derive(Debug, Clone)]
pub struct BoxActor {
    id: char,
    location: Location,
    color: Color,
    destination: Option<Location>,
    pub(crate) route: Option<Route>,
}

impl BoxActor {
    pub fn new(id: char, location: Location, color: Color) -> Self {
        BoxActor {
            id,
            location,
            color,
            destination: None,
            route: None,
        }
    }

    pub fn destination(&self) -> Option<Location> {
        self.destination
    }

    /// A destination is only ever assigned once, later attempts are ignored.
    pub(crate) fn assign_destination(&mut self, destination: Location) -> bool {
        if self.destination.is_some() {
            return false;
        }
        self.destination = Some(destination);
        true
    }

    pub fn is_delivered(&self) -> bool {
        self.destination == Some(self.location)
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }
}

impl Actor for BoxActor {
    fn id(&self) -> char {
        self.id
    }

    fn location(&self) -> Location {
        self.location
    }

    fn color(&self) -> Color {
        self.color
    }

    fn move_to(&mut self, location: Location) {
        self.location = location;
    }
}

impl Display for BoxActor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Box{} ({}) @{}", self.id, self.color, self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::desire::Target;

    #[test]
    fn destination_is_assigned_once() {
        let mut b = BoxActor::new('A', Location::new(1, 1), Color::Red);
        assert!(!b.is_delivered());
        assert!(b.assign_destination(Location::new(1, 3)));
        assert!(!b.assign_destination(Location::new(2, 2)));
        assert_eq!(b.destination(), Some(Location::new(1, 3)));
        b.move_to(Location::new(1, 3));
        assert!(b.is_delivered());
    }

    #[test]
    fn rescheduling_requeues_current_element() {
        let mut agent = Agent::new('0', Location::new(1, 1), Color::Blue);
        agent.queue.push_back(Task::Deliver(1));
        agent.desire = Desire::MoveToLocation {
            target: Target::Box(0),
            location: Location::new(1, 4),
        };
        agent.committed.push_back(Action::NoOp);

        agent.reschedule();
        assert!(agent.is_idle());
        assert_eq!(
            agent.queue().cloned().collect::<Vec<_>>(),
            vec![Task::Deliver(0), Task::Deliver(1)]
        );

        // sleeping agents have nothing to requeue
        agent.reschedule();
        assert_eq!(agent.queue().count(), 2);
    }

    #[test]
    fn prioritizing_moves_to_front() {
        let mut agent = Agent::new('0', Location::new(1, 1), Color::Blue);
        agent.queue.push_back(Task::Deliver(0));
        agent.queue.push_back(Task::Deliver(1));
        agent.prioritize(Task::Deliver(1));
        assert_eq!(
            agent.queue().cloned().collect::<Vec<_>>(),
            vec![Task::Deliver(1), Task::Deliver(0)]
        );
        assert!(agent.owns(Task::Deliver(0)));
        assert!(!agent.owns(Task::Reach(0)));
    }
}
