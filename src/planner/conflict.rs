use log::{debug, trace};

use crate::action::Action;
use crate::actor::{Actor, ActorRef, Agent, BoxActor, Task};
use crate::data::Location;
use crate::desire::{self, Desire, Target};

use super::route::Route;
use super::search::{bounded_search, Episode};
use super::state::{AgentSnapshot, BoxSnapshot, Reservations, SearchTarget, State};
use super::{nearest_agent, PlannerErr, Planner};

/// Who is in the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Occupant {
    Actor(ActorRef),
    /// Another agent's action this step enters the cell.
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Conflict {
    pub(crate) cell: Location,
    /// Index of the cell in the route, 1 is the next step.
    pub(crate) step: usize,
    pub(crate) occupant: Occupant,
}

/// What resolving conflicts on a route left for the blocked agent to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Blockage {
    Clear,
    /// Something that'll go away eventually.
    Wait,
    /// A moving agent on the next cell.
    WaitFor(usize),
    /// Something that'll stay, the route must go around it.
    Detour { step: usize },
}

/// Every cell of the route (except the start) taken by another actor,
/// plus the next cell if another agent is entering it this step.
pub(crate) fn detect(
    agents: &[Agent],
    boxes: &[BoxActor],
    route: &Route,
    me: usize,
    escorted: Option<usize>,
    reservations: Option<&Reservations>,
) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for (step, &cell) in route.cells().iter().enumerate().skip(1) {
        if step == 1 && reservations.map_or(false, |r| r.is_reserved(cell)) {
            conflicts.push(Conflict {
                cell,
                step,
                occupant: Occupant::Reserved,
            });
        }
        for (i, agent) in agents.iter().enumerate() {
            if i != me && agent.location() == cell {
                conflicts.push(Conflict {
                    cell,
                    step,
                    occupant: Occupant::Actor(ActorRef::Agent(i)),
                });
            }
        }
        for (b, the_box) in boxes.iter().enumerate() {
            if Some(b) != escorted && the_box.location() == cell {
                conflicts.push(Conflict {
                    cell,
                    step,
                    occupant: Occupant::Actor(ActorRef::Box(b)),
                });
            }
        }
    }
    conflicts
}

/// Not doing anything and not about to.
fn is_asleep(agent: &Agent) -> bool {
    agent.is_idle() && agent.queue.is_empty()
}

impl Planner {
    pub(super) fn approach(
        &mut self,
        a: usize,
        target: Target,
        location: Location,
        world: &State,
        reservations: &Reservations,
        chosen: &mut [Option<Action>],
    ) -> Result<Action, PlannerErr> {
        let from = self.agents[a].location();
        let mut route = self.ctx.routes.route(&self.level, from, location)?;
        if let Target::Box(_) = target {
            // stop next to it
            route = route.trimmed();
        }
        let moves = route.to_moves(&self.level)?;
        self.agents[a].route = Some(route.clone());
        let first = match moves.first() {
            Some(&first) => first,
            None => return Ok(Action::NoOp),
        };

        let conflicts = detect(&self.agents, &self.boxes, &route, a, None, Some(reservations));
        let desire_before = self.agents[a].desire();
        let blockage = self.resolve(a, &route, &conflicts)?;
        if self.agents[a].desire() != desire_before {
            // rescheduled itself, start over next step
            return Ok(Action::NoOp);
        }

        match blockage {
            Blockage::Clear => {
                self.agents[a].waited = 0;
                Ok(first)
            }
            Blockage::Wait => {
                self.agents[a].waited += 1;
                Ok(Action::NoOp)
            }
            Blockage::WaitFor(blocker) => {
                self.agents[a].waited += 1;
                if self.agents[a].waited <= self.ctx.config.patience {
                    return Ok(Action::NoOp);
                }
                debug!(
                    "Agent{} ran out of patience with Agent{}",
                    self.agents[a].id(),
                    self.agents[blocker].id()
                );
                self.plan_jointly(a, Some(blocker), &route, 1, world, chosen)
            }
            Blockage::Detour { step } => self.plan_jointly(a, None, &route, step, world, chosen),
        }
    }

    pub(super) fn escort(
        &mut self,
        a: usize,
        b: usize,
        destination: Location,
        chosen: &mut [Option<Action>],
    ) -> Result<Action, PlannerErr> {
        let box_route = self
            .ctx
            .routes
            .route(&self.level, self.boxes[b].location(), destination)?;
        // catches routes through walls before spending time searching
        box_route.to_moves(&self.level)?;
        self.boxes[b].route = Some(box_route.clone());
        self.agents[a].route = Some(box_route.clone());

        let conflicts = detect(&self.agents, &self.boxes, &box_route, a, Some(b), None);
        let desire_before = self.agents[a].desire();
        let mut wait = false;
        for conflict in &conflicts {
            match conflict.occupant {
                Occupant::Actor(ActorRef::Agent(o)) => {
                    if is_asleep(&self.agents[o]) {
                        self.relocate(o, &box_route)?;
                    }
                    wait = true;
                }
                Occupant::Actor(ActorRef::Box(x)) => {
                    // immovable ones get walled in the search
                    wait |= self.clear_box(x, a)?;
                }
                Occupant::Reserved => {}
            }
        }
        if self.agents[a].desire() != desire_before {
            return Ok(Action::NoOp);
        }
        if wait {
            self.agents[a].waited += 1;
            if self.agents[a].waited <= self.ctx.config.patience {
                return Ok(Action::NoOp);
            }
        }

        let agent = &self.agents[a];
        let the_box = &self.boxes[b];
        let mut agents = vec![AgentSnapshot {
            index: a,
            location: agent.location(),
            color: agent.color(),
            target: SearchTarget::Escort(0),
        }];
        // awake agents in the way won't leave while they wait for the box to move
        let bystanders = self.bystanders(a, &box_route);
        agents.extend(bystanders.iter().map(|&o| AgentSnapshot {
            index: o,
            location: self.agents[o].location(),
            color: self.agents[o].color(),
            target: SearchTarget::Stay,
        }));
        let start = State::new(
            agents,
            vec![BoxSnapshot {
                index: b,
                location: the_box.location(),
                color: the_box.color(),
                destination: Some(destination),
            }],
        );
        let participants: Vec<usize> = start.agents().iter().map(|s| s.index).collect();
        let blocked = self.blocked_cells(&participants, &[b]);
        let focus = box_route.cells().to_vec();
        let joint = self.search(start, focus, blocked)?;

        self.commit_joint(&participants, &joint, chosen);
        let agent = &mut self.agents[a];
        debug!("{} escorts box {} in {} steps", agent, b, joint.len());
        Ok(agent.committed.pop_front().unwrap_or(Action::NoOp))
    }

    /// Deals with everything in the way, returns what's left for the blocked agent.
    fn resolve(&mut self, a: usize, route: &Route, conflicts: &[Conflict]) -> Result<Blockage, PlannerErr> {
        let mut blockage = Blockage::Clear;
        for conflict in conflicts {
            trace!(
                "Agent{} blocked at {} by {:?}",
                self.agents[a].id(),
                conflict.cell,
                conflict.occupant
            );
            let next_step = conflict.step == 1;
            match conflict.occupant {
                Occupant::Reserved => {
                    if blockage == Blockage::Clear {
                        blockage = Blockage::Wait;
                    }
                }
                Occupant::Actor(ActorRef::Agent(o)) => {
                    if is_asleep(&self.agents[o]) {
                        self.relocate(o, route)?;
                        if next_step && blockage == Blockage::Clear {
                            blockage = Blockage::Wait;
                        }
                    } else if next_step {
                        if let Blockage::Clear | Blockage::Wait = blockage {
                            blockage = Blockage::WaitFor(o);
                        }
                    }
                }
                Occupant::Actor(ActorRef::Box(b)) => {
                    if self.clear_box(b, a)? {
                        if next_step && blockage == Blockage::Clear {
                            blockage = Blockage::Wait;
                        }
                    } else if let Blockage::Detour { .. } = blockage {
                        // the first immovable obstruction decides
                    } else {
                        blockage = Blockage::Detour { step: conflict.step };
                    }
                }
            }
        }
        Ok(blockage)
    }

    /// Makes sure somebody will move the box out of the way.
    ///
    /// Returns false if nobody can.
    fn clear_box(&mut self, b: usize, blocked: usize) -> Result<bool, PlannerErr> {
        if self.boxes[b].is_delivered() {
            return Ok(false);
        }

        let task = Task::Deliver(b);
        let owner = self
            .agents
            .iter()
            .position(|agent| agent.owns(task))
            .or_else(|| nearest_agent(&self.agents, &self.boxes[b]));
        let owner = match owner {
            Some(owner) => owner,
            None => return Ok(false),
        };

        if self.boxes[b].destination().is_none() {
            let avoid: Vec<Location> = self.agents[blocked]
                .route()
                .map(|r| r.cells().to_vec())
                .unwrap_or_default();
            let cell = self.staging_cell(self.boxes[b].location(), &avoid).ok_or_else(|| {
                PlannerErr::InfeasibleConflict(format!("nowhere to put {}", self.boxes[b]))
            })?;
            self.boxes[b].assign_destination(cell);
            debug!("{} goes out of the way to {}", self.boxes[b], cell);
        }

        if self.agents[owner].desire().task() != Some(task) {
            debug!("{} has to move {} first", self.agents[owner], self.boxes[b]);
            self.agents[owner].reschedule();
            self.agents[owner].prioritize(task);
            desire::update(&mut self.agents[owner], &self.boxes, &self.goals);
        }
        Ok(true)
    }

    /// Sends a sleeping agent to a free cell off the route.
    fn relocate(&mut self, o: usize, route: &Route) -> Result<(), PlannerErr> {
        let from = self.agents[o].location();
        let cell = self.staging_cell(from, route.cells()).ok_or_else(|| {
            PlannerErr::InfeasibleConflict(format!("nowhere to move {}", self.agents[o]))
        })?;

        let id = self.agents[o].id();
        let own_goal = self
            .goals
            .iter()
            .position(|g| g.is_agent_goal() && g.id() == id && g.location() == from);
        let agent = &mut self.agents[o];
        if let Some(g) = own_goal {
            // come back afterwards
            agent.prioritize(Task::Reach(g));
        }
        agent.prioritize(Task::Relocate(cell));
        debug!("{} moves out of the way to {}", agent, cell);
        Ok(())
    }

    /// The nearest free corner in the same component, any free cell if there's no corner.
    fn staging_cell(&self, near: Location, avoid: &[Location]) -> Option<Location> {
        let component = self.level.component(near);
        let usable = |cell: &Location| {
            let cell = *cell;
            self.level.component(cell) == component
                && !avoid.contains(&cell)
                && self.agents.iter().all(|a| a.location() != cell)
                && self.boxes.iter().all(|b| b.location() != cell)
                && self.goals.iter().all(|g| g.location() != cell)
                && !self.is_claimed(cell)
        };
        let nearest = |cells: Vec<Location>| {
            cells
                .into_iter()
                .enumerate()
                .min_by_key(|&(i, cell)| (cell.dist(near), i))
                .map(|(_, cell)| cell)
        };

        let corners: Vec<_> = self.level.corners().iter().cloned().filter(usable).collect();
        nearest(corners).or_else(|| nearest(self.level.floor_cells().filter(usable).collect()))
    }

    fn is_claimed(&self, cell: Location) -> bool {
        let relocate = Task::Relocate(cell);
        self.agents.iter().any(|a| a.owns(relocate))
            || self
                .boxes
                .iter()
                .any(|b| b.destination() == Some(cell) && !b.is_delivered())
    }

    /// Cells of actors not taking part in a search that won't move on their own.
    fn blocked_cells(&self, agents: &[usize], boxes: &[usize]) -> Vec<Location> {
        let mut blocked: Vec<Location> = self
            .boxes
            .iter()
            .enumerate()
            .filter(|(b, _)| !boxes.contains(b))
            .map(|(_, b)| b.location())
            .collect();
        blocked.extend(
            self.agents
                .iter()
                .enumerate()
                .filter(|&(i, agent)| !agents.contains(&i) && is_asleep(agent))
                .map(|(_, agent)| agent.location()),
        );
        blocked
    }

    /// Plans the blocked agent (and the blocker if there is one) past the conflict at `step`.
    fn plan_jointly(
        &mut self,
        a: usize,
        blocker: Option<usize>,
        route: &Route,
        step: usize,
        world: &State,
        chosen: &mut [Option<Action>],
    ) -> Result<Action, PlannerErr> {
        let cells = route.cells();
        let waypoint = cells[(step + 1).min(cells.len() - 1)];
        if blocker.is_none() && waypoint == cells[step] {
            return Err(PlannerErr::InfeasibleConflict(format!(
                "{} is permanently blocked",
                waypoint
            )));
        }

        let mut agents = vec![AgentSnapshot {
            target: SearchTarget::Reach(waypoint),
            ..world.agents[a]
        }];
        let mut boxes = Vec::new();
        let mut focus = cells.to_vec();
        if let Some(o) = blocker {
            agents.push(AgentSnapshot {
                target: SearchTarget::Stay,
                ..world.agents[o]
            });
            if let Desire::MoveBoxToGoal { box_index, .. } = self.agents[o].desire() {
                // it's free to leave its box anywhere for now
                boxes.push(BoxSnapshot {
                    destination: None,
                    ..world.boxes[box_index]
                });
            }
            if let Some(other) = self.agents[o].route() {
                focus.extend(other.cells());
            }
        }

        let participants: Vec<usize> = agents.iter().map(|s| s.index).collect();
        let moved_boxes: Vec<usize> = boxes.iter().map(|s| s.index).collect();
        let blocked = self.blocked_cells(&participants, &moved_boxes);
        let joint = self.search(State::new(agents, boxes), focus, blocked)?;

        self.commit_joint(&participants, &joint, chosen);
        Ok(self.agents[a].committed.pop_front().unwrap_or(Action::NoOp))
    }

    /// Hands every participant its column of the joint plan.
    ///
    /// Participants that already decided this step get their choice replaced with the first action.
    fn commit_joint(
        &mut self,
        participants: &[usize],
        joint: &[Vec<Action>],
        chosen: &mut [Option<Action>],
    ) {
        for (column, &p) in participants.iter().enumerate() {
            let agent = &mut self.agents[p];
            agent.committed = joint.iter().map(|row| row[column]).collect();
            agent.waited = 0;
            if chosen[p].is_some() {
                chosen[p] = Some(agent.committed.pop_front().unwrap_or(Action::NoOp));
            }
        }
    }

    /// Awake agents other than `a` standing on or next to the route.
    fn bystanders(&self, a: usize, route: &Route) -> Vec<usize> {
        self.agents
            .iter()
            .enumerate()
            .filter(|&(i, agent)| i != a && !is_asleep(agent))
            .filter(|(_, agent)| {
                route
                    .cells()
                    .iter()
                    .any(|&cell| agent.location().dist(cell) <= 1)
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn search(
        &mut self,
        start: State,
        focus: Vec<Location>,
        blocked: Vec<Location>,
    ) -> Result<Vec<Vec<Action>>, PlannerErr> {
        let episode = Episode {
            level: &self.level,
            goals: &self.goals,
            focus,
            blocked,
            radius: self.ctx.config.narrowing_radius,
            idle_penalty: self.ctx.config.idle_penalty,
            limit: self.ctx.config.search_limit,
        };
        bounded_search(&episode, start, &mut self.ctx.budget, &mut self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::Config;
    use crate::data::{Color, Dir};
    use crate::planner::state::Effect;
    use crate::problem::Problem;

    fn planner(level: &str) -> Planner {
        let problem: Problem = level.parse().unwrap();
        Planner::new(&problem, Config::default())
    }

    #[test]
    fn detecting_occupied_cells() {
        let agents = vec![
            Agent::new('0', Location::new(1, 1), Color::Blue),
            Agent::new('1', Location::new(1, 3), Color::Red),
        ];
        let boxes = vec![
            BoxActor::new('A', Location::new(1, 4), Color::Red),
            BoxActor::new('B', Location::new(1, 2), Color::Blue),
        ];
        let route = Route::new((1..=5).map(|c| Location::new(1, c)).collect());

        let conflicts = detect(&agents, &boxes, &route, 0, Some(1), None);
        assert_eq!(
            conflicts,
            vec![
                Conflict {
                    cell: Location::new(1, 3),
                    step: 2,
                    occupant: Occupant::Actor(ActorRef::Agent(1)),
                },
                Conflict {
                    cell: Location::new(1, 4),
                    step: 3,
                    occupant: Occupant::Actor(ActorRef::Box(0)),
                },
            ]
        );
    }

    #[test]
    fn detecting_reserved_next_cell() {
        let agents = vec![Agent::new('0', Location::new(1, 1), Color::Blue)];
        let route = Route::new(vec![Location::new(1, 1), Location::new(1, 2), Location::new(1, 3)]);
        let mut reservations = Reservations::new();
        let effect = Effect {
            action: Action::Move(Dir::W),
            agent_to: Location::new(1, 2),
            moved_box: None,
        };
        assert!(reservations.try_reserve(Location::new(1, 3), &effect));

        let conflicts = detect(&agents, &[], &route, 0, None, Some(&reservations));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].occupant, Occupant::Reserved);
        assert_eq!(conflicts[0].step, 1);
    }

    #[test]
    fn sleeping_agents_are_sent_to_corners() {
        let mut planner = planner(
            r"#domain
hospital
#levelname
corners
#colors
red: 0, 1
#initial
+++++++
+0 1  +
+++ +++
+++++++
#goal
+++++++
+    0+
+++ +++
+++++++
#end
",
        );
        let route = planner
            .ctx
            .routes
            .route(&planner.level, Location::new(1, 1), Location::new(1, 5))
            .unwrap();
        planner.relocate(1, &route).unwrap();
        // (1, 1) is taken by agent 0 and (1, 5) is a goal, only the dead end is left
        assert_eq!(
            planner.agents[1].queue().cloned().collect::<Vec<_>>(),
            vec![Task::Relocate(Location::new(2, 3))]
        );
        assert!(planner.is_claimed(Location::new(2, 3)));
    }

    #[test]
    fn unassigned_boxes_get_a_staging_cell() {
        let mut planner = planner(
            r"#domain
hospital
#levelname
staging
#colors
red: 0, B
blue: 1
#initial
++++++++
+1 B  0+
++ +++++
++++++++
#goal
++++++++
+0     +
++ +++++
++++++++
#end
",
        );
        planner.agents[1].route = Some(Route::new(
            (1..=6).rev().map(|c| Location::new(1, c)).collect(),
        ));
        assert!(planner.clear_box(0, 1).unwrap());
        assert_eq!(planner.boxes[0].destination(), Some(Location::new(2, 2)));
        // the red agent drops everything for the box
        assert_eq!(planner.agents[0].desire().task(), Some(Task::Deliver(0)));
    }

    #[test]
    fn delivered_boxes_stay() {
        let mut planner = planner(
            r"#domain
hospital
#levelname
delivered
#colors
red: 0, A
#initial
++++++
+0A  +
++++++
#goal
++++++
+ A  +
++++++
#end
",
        );
        assert!(!planner.clear_box(0, 0).unwrap());
    }
}
