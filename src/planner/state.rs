use std::hash::{Hash, Hasher};

use fnv::FnvHashSet;

use crate::action::Action;
use crate::data::{Color, Location};
use crate::level::Level;

/// Index of a state in the search arena.
pub(crate) type StateId = usize;

/// What an agent is trying to achieve within one search episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchTarget {
    /// Stand on the cell.
    Reach(Location),
    /// Stand next to the cell.
    Adjacent(Location),
    /// Get the box (index into the state's boxes) to its destination.
    Escort(usize),
    /// Anywhere is fine.
    Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSnapshot {
    /// Index in the planner's agent list.
    pub index: usize,
    pub location: Location,
    pub color: Color,
    pub target: SearchTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxSnapshot {
    /// Index in the planner's box list.
    pub index: usize,
    pub location: Location,
    pub color: Color,
    /// `None` for boxes that may end up anywhere.
    pub destination: Option<Location>,
}

impl BoxSnapshot {
    pub fn is_delivered(&self) -> bool {
        self.destination.map_or(true, |dest| dest == self.location)
    }
}

/// The outcome of one agent's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Effect {
    pub(crate) action: Action,
    pub(crate) agent_to: Location,
    /// Box index and where it ends up.
    pub(crate) moved_box: Option<(usize, Location)>,
}

/// Cells entered and boxes moved within one step.
///
/// Two actors entering the same cell or one box being moved twice makes the joint action illegal.
#[derive(Debug, Default)]
pub(crate) struct Reservations {
    cells: FnvHashSet<Location>,
    boxes: FnvHashSet<usize>,
}

impl Reservations {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_reserved(&self, cell: Location) -> bool {
        self.cells.contains(&cell)
    }

    /// Reserves everything the effect touches or nothing at all.
    pub(crate) fn try_reserve(&mut self, from: Location, effect: &Effect) -> bool {
        let mut entered = Vec::with_capacity(2);
        if effect.agent_to != from {
            entered.push(effect.agent_to);
        }
        if let Some((b, to)) = effect.moved_box {
            if self.boxes.contains(&b) {
                return false;
            }
            entered.push(to);
        }
        if entered.iter().any(|cell| self.cells.contains(cell)) {
            return false;
        }

        self.cells.extend(entered);
        if let Some((b, _)) = effect.moved_box {
            self.boxes.insert(b);
        }
        true
    }
}

/// Positions only - used to detect already explored states regardless of depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct StateKey {
    agents: Vec<Location>,
    boxes: Vec<Location>,
}

/// A node of the bounded search.
///
/// The level and goals are owned by the search episode, a state only holds what moves.
#[derive(Debug, Clone)]
pub struct State {
    pub(crate) agents: Vec<AgentSnapshot>,
    pub(crate) boxes: Vec<BoxSnapshot>,
    /// The joint action that led here, empty for the initial state.
    pub(crate) joint_action: Vec<Action>,
    pub(crate) parent: Option<StateId>,
    pub(crate) g: u32,
}

impl State {
    pub fn new(agents: Vec<AgentSnapshot>, boxes: Vec<BoxSnapshot>) -> Self {
        State {
            agents,
            boxes,
            joint_action: Vec::new(),
            parent: None,
            g: 0,
        }
    }

    pub fn agents(&self) -> &[AgentSnapshot] {
        &self.agents
    }

    pub fn boxes(&self) -> &[BoxSnapshot] {
        &self.boxes
    }

    pub fn g(&self) -> u32 {
        self.g
    }

    pub(crate) fn key(&self) -> StateKey {
        StateKey {
            agents: self.agents.iter().map(|a| a.location).collect(),
            boxes: self.boxes.iter().map(|b| b.location).collect(),
        }
    }

    fn box_at(&self, cell: Location) -> Option<usize> {
        self.boxes.iter().position(|b| b.location == cell)
    }

    pub(crate) fn is_free(&self, level: &Level, cell: Location) -> bool {
        !level.is_wall(cell)
            && self.agents.iter().all(|a| a.location != cell)
            && self.box_at(cell).is_none()
    }

    /// Checks the action against this state (the state at the start of the step).
    ///
    /// Doesn't know about other agents' actions in the same step, see `Reservations` for that.
    pub(crate) fn applicable(&self, level: &Level, agent: usize, action: Action) -> Option<Effect> {
        let me = &self.agents[agent];
        let before = level.location_from_action(me.location, action, false).ok()?;
        let after = level.location_from_action(me.location, action, true).ok()?;

        match action {
            Action::NoOp => Some(Effect {
                action,
                agent_to: me.location,
                moved_box: None,
            }),
            Action::Move(_) => {
                if !self.is_free(level, after.agent) {
                    return None;
                }
                Some(Effect {
                    action,
                    agent_to: after.agent,
                    moved_box: None,
                })
            }
            Action::Push(..) => {
                let box_from = before.box_cell?;
                let box_to = after.box_cell?;
                let b = self.box_at(box_from)?;
                if self.boxes[b].color != me.color || !self.is_free(level, box_to) {
                    return None;
                }
                Some(Effect {
                    action,
                    agent_to: after.agent,
                    moved_box: Some((b, box_to)),
                })
            }
            Action::Pull(..) => {
                let box_from = before.box_cell?;
                let b = self.box_at(box_from)?;
                if self.boxes[b].color != me.color || !self.is_free(level, after.agent) {
                    return None;
                }
                Some(Effect {
                    action,
                    agent_to: after.agent,
                    moved_box: Some((b, me.location)),
                })
            }
        }
    }

    /// Applies a legal set of effects, one per agent.
    pub(crate) fn apply(&self, effects: &[Effect], parent: Option<StateId>) -> State {
        let mut next = State {
            agents: self.agents.clone(),
            boxes: self.boxes.clone(),
            joint_action: effects.iter().map(|e| e.action).collect(),
            parent,
            g: self.g + 1,
        };
        for (agent, effect) in next.agents.iter_mut().zip(effects) {
            agent.location = effect.agent_to;
        }
        for effect in effects {
            if let Some((b, to)) = effect.moved_box {
                next.boxes[b].location = to;
            }
        }
        next
    }

    /// Executes one joint action, `None` if any part of it is illegal.
    pub(crate) fn step(&self, level: &Level, joint_action: &[Action]) -> Option<State> {
        if joint_action.len() != self.agents.len() {
            return None;
        }
        let mut reservations = Reservations::new();
        let mut effects = Vec::with_capacity(joint_action.len());
        for (i, &action) in joint_action.iter().enumerate() {
            let effect = self.applicable(level, i, action)?;
            if !reservations.try_reserve(self.agents[i].location, &effect) {
                return None;
            }
            effects.push(effect);
        }
        Some(self.apply(&effects, None))
    }

    /// All legal successors, skipping the joint action where nobody does anything.
    pub(crate) fn expand(&self, level: &Level, id: StateId) -> Vec<State> {
        let options: Vec<Vec<Effect>> = (0..self.agents.len())
            .map(|agent| {
                Action::vocabulary()
                    .into_iter()
                    .filter_map(|action| self.applicable(level, agent, action))
                    .collect()
            })
            .collect();

        let mut ret = Vec::new();
        let mut chosen = Vec::with_capacity(options.len());
        self.combine(&options, &mut chosen, &mut ret, id);
        ret
    }

    fn combine(
        &self,
        options: &[Vec<Effect>],
        chosen: &mut Vec<Effect>,
        out: &mut Vec<State>,
        id: StateId,
    ) {
        let agent = chosen.len();
        if agent == options.len() {
            if chosen.iter().all(|e| e.action.is_noop()) {
                return;
            }
            let mut reservations = Reservations::new();
            let legal = chosen
                .iter()
                .zip(&self.agents)
                .all(|(effect, a)| reservations.try_reserve(a.location, effect));
            if legal {
                out.push(self.apply(chosen, Some(id)));
            }
            return;
        }
        for &effect in &options[agent] {
            chosen.push(effect);
            self.combine(options, chosen, out, id);
            chosen.pop();
        }
    }

    /// Every box with a destination is on it and every agent is where it wants to be.
    pub(crate) fn is_goal(&self) -> bool {
        self.boxes.iter().all(BoxSnapshot::is_delivered)
            && self.agents.iter().all(|a| match a.target {
                SearchTarget::Reach(loc) => a.location == loc,
                SearchTarget::Adjacent(loc) => a.location.is_adjacent(loc),
                SearchTarget::Escort(b) => self.boxes[b].is_delivered(),
                SearchTarget::Stay => true,
            })
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.g == other.g
            && self.agents.len() == other.agents.len()
            && self.boxes.len() == other.boxes.len()
            && self
                .agents
                .iter()
                .zip(&other.agents)
                .all(|(a, b)| a.location == b.location)
            && self
                .boxes
                .iter()
                .zip(&other.boxes)
                .all(|(a, b)| a.location == b.location)
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for agent in &self.agents {
            agent.location.hash(state);
        }
        for b in &self.boxes {
            b.location.hash(state);
        }
        self.g.hash(state);
    }
}
