use std::fmt::{self, Display, Formatter};

use log::trace;

use crate::actor::{Actor, Agent, BoxActor, Task};
use crate::data::Location;
use crate::goal::Goal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DesireKind {
    Sleep,
    MoveToLocation,
    MoveBoxToGoal,
}

/// What a `MoveToLocation` desire is heading for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Approach the box - the agent stops next to it.
    Box(usize),
    Goal(usize),
    /// A staging cell, used to get out of someone's way.
    Cell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Desire {
    Sleep,
    MoveToLocation { target: Target, location: Location },
    MoveBoxToGoal { box_index: usize, location: Location },
}

impl Desire {
    pub fn kind(self) -> DesireKind {
        match self {
            Desire::Sleep => DesireKind::Sleep,
            Desire::MoveToLocation { .. } => DesireKind::MoveToLocation,
            Desire::MoveBoxToGoal { .. } => DesireKind::MoveBoxToGoal,
        }
    }

    pub fn is_sleep(self) -> bool {
        self == Desire::Sleep
    }

    pub fn location(self) -> Option<Location> {
        match self {
            Desire::Sleep => None,
            Desire::MoveToLocation { location, .. } | Desire::MoveBoxToGoal { location, .. } => {
                Some(location)
            }
        }
    }

    pub fn target(self) -> Option<Target> {
        match self {
            Desire::Sleep => None,
            Desire::MoveToLocation { target, .. } => Some(target),
            Desire::MoveBoxToGoal { box_index, .. } => Some(Target::Box(box_index)),
        }
    }

    /// The box this desire is about, if any.
    pub fn box_index(self) -> Option<usize> {
        match self.target() {
            Some(Target::Box(b)) => Some(b),
            _ => None,
        }
    }

    /// The queue element this desire came from.
    pub fn task(self) -> Option<Task> {
        match self {
            Desire::Sleep => None,
            Desire::MoveToLocation { target, location } => Some(match target {
                Target::Box(b) => Task::Deliver(b),
                Target::Goal(g) => Task::Reach(g),
                Target::Cell => Task::Relocate(location),
            }),
            Desire::MoveBoxToGoal { box_index, .. } => Some(Task::Deliver(box_index)),
        }
    }

    fn from_task(task: Task, boxes: &[BoxActor], goals: &[Goal]) -> Self {
        match task {
            Task::Deliver(b) => Desire::MoveToLocation {
                target: Target::Box(b),
                location: boxes[b].location(),
            },
            Task::Reach(g) => Desire::MoveToLocation {
                target: Target::Goal(g),
                location: goals[g].location(),
            },
            Task::Relocate(location) => Desire::MoveToLocation {
                target: Target::Cell,
                location,
            },
        }
    }
}

impl Display for Desire {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Desire::Sleep => write!(f, "Sleep"),
            Desire::MoveToLocation { target, location } => {
                write!(f, "MoveToLocation {:?} {}", target, location)
            }
            Desire::MoveBoxToGoal {
                box_index,
                location,
            } => write!(f, "MoveBoxToGoal Box({}) {}", box_index, location),
        }
    }
}

/// Runs the desire state machine until it settles. Calling it again without
/// anything moving changes nothing.
///
/// Returns whether the desire changed.
pub(crate) fn update(agent: &mut Agent, boxes: &[BoxActor], goals: &[Goal]) -> bool {
    let before = agent.desire;
    // every iteration either settles or consumes a queued task
    for _ in 0..=agent.queue.len() * 3 + 3 {
        let next = match agent.desire {
            Desire::Sleep => match agent.queue.pop_front() {
                Some(task) => Desire::from_task(task, boxes, goals),
                None => break,
            },
            Desire::MoveToLocation {
                target: Target::Box(b),
                ..
            } => {
                let the_box = &boxes[b];
                match the_box.destination() {
                    // nothing to deliver
                    None => Desire::Sleep,
                    Some(_) if the_box.is_delivered() => Desire::Sleep,
                    Some(destination) if agent.location().is_adjacent(the_box.location()) => {
                        Desire::MoveBoxToGoal {
                            box_index: b,
                            location: destination,
                        }
                    }
                    // the box might have been moved by someone else
                    Some(_) => Desire::MoveToLocation {
                        target: Target::Box(b),
                        location: the_box.location(),
                    },
                }
            }
            Desire::MoveToLocation { location, .. } => {
                if agent.location() == location {
                    Desire::Sleep
                } else {
                    agent.desire
                }
            }
            Desire::MoveBoxToGoal { box_index, .. } => {
                let the_box = &boxes[box_index];
                if the_box.is_delivered() {
                    Desire::Sleep
                } else if !agent.location().is_adjacent(the_box.location()) && agent.committed.is_empty() {
                    // lost contact with the box, walk back to it
                    Desire::MoveToLocation {
                        target: Target::Box(box_index),
                        location: the_box.location(),
                    }
                } else {
                    agent.desire
                }
            }
        };
        if next == agent.desire {
            break;
        }
        trace!("Agent{}: {} -> {}", agent.id(), agent.desire, next);
        if next.kind() != agent.desire.kind() || next.task() != agent.desire.task() {
            agent.committed.clear();
            agent.route = None;
        }
        agent.desire = next;
    }
    agent.desire != before
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::data::Color;

    fn fixture() -> (Agent, Vec<BoxActor>, Vec<Goal>) {
        let agent = Agent::new('0', Location::new(1, 1), Color::Blue);
        let mut b = BoxActor::new('A', Location::new(1, 3), Color::Blue);
        b.assign_destination(Location::new(1, 5));
        let goals = vec![
            Goal::new('A', Location::new(1, 5), Color::Blue),
            Goal::new('0', Location::new(2, 1), Color::Blue),
        ];
        (agent, vec![b], goals)
    }

    #[test]
    fn sleeping_without_tasks() {
        let (mut agent, boxes, goals) = fixture();
        assert!(!update(&mut agent, &boxes, &goals));
        assert_eq!(agent.desire(), Desire::Sleep);
    }

    #[test]
    fn approach_then_escort_then_next_task() {
        let (mut agent, mut boxes, goals) = fixture();
        agent.queue.push_back(Task::Deliver(0));
        agent.queue.push_back(Task::Reach(1));

        assert!(update(&mut agent, &boxes, &goals));
        assert_eq!(
            agent.desire(),
            Desire::MoveToLocation {
                target: Target::Box(0),
                location: Location::new(1, 3)
            }
        );
        // idempotent
        assert!(!update(&mut agent, &boxes, &goals));

        agent.move_to(Location::new(1, 2));
        assert!(update(&mut agent, &boxes, &goals));
        assert_eq!(
            agent.desire(),
            Desire::MoveBoxToGoal {
                box_index: 0,
                location: Location::new(1, 5)
            }
        );
        assert!(!update(&mut agent, &boxes, &goals));

        agent.move_to(Location::new(1, 4));
        boxes[0].move_to(Location::new(1, 5));
        assert!(update(&mut agent, &boxes, &goals));
        assert_eq!(
            agent.desire(),
            Desire::MoveToLocation {
                target: Target::Goal(1),
                location: Location::new(2, 1)
            }
        );

        agent.move_to(Location::new(2, 1));
        assert!(update(&mut agent, &boxes, &goals));
        assert_eq!(agent.desire(), Desire::Sleep);
        assert!(agent.is_idle());
    }

    #[test]
    fn already_delivered_boxes_are_skipped() {
        let (mut agent, mut boxes, goals) = fixture();
        boxes[0].move_to(Location::new(1, 5));
        agent.queue.push_back(Task::Deliver(0));
        agent.queue.push_back(Task::Relocate(Location::new(2, 2)));
        update(&mut agent, &boxes, &goals);
        assert_eq!(
            agent.desire(),
            Desire::MoveToLocation {
                target: Target::Cell,
                location: Location::new(2, 2)
            }
        );
        assert_eq!(agent.desire().task(), Some(Task::Relocate(Location::new(2, 2))));
    }

    #[test]
    fn desire_accessors() {
        let desire = Desire::MoveBoxToGoal {
            box_index: 3,
            location: Location::new(4, 4),
        };
        assert_eq!(desire.kind(), DesireKind::MoveBoxToGoal);
        assert_eq!(desire.box_index(), Some(3));
        assert_eq!(desire.task(), Some(Task::Deliver(3)));
        assert_eq!(Desire::Sleep.location(), None);
        assert_eq!(Desire::Sleep.task(), None);
    }
}
