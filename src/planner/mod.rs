pub mod route;
pub mod state;

mod conflict;
mod memory;
mod search;

use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};

use log::{debug, info, trace};
use separator::Separatable;

use crate::action::{Action, Plan};
use crate::actor::{Actor, Agent, BoxActor, Task};
use crate::config::Config;
use crate::data::Location;
use crate::desire::{self, Desire};
use crate::goal::Goal;
use crate::level::{Level, LevelErr};
use crate::problem::Problem;
use crate::Solve;

pub use self::memory::ResourceBudget;
pub use self::search::Stats;

use self::route::RouteCache;
use self::state::{Reservations, State};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerErr {
    UnreachableTarget { from: Location, to: Location },
    InfeasibleConflict(String),
    ResourceExceeded { used_mb: u64, ceiling_mb: u64 },
    InvariantViolation(String),
}

impl Display for PlannerErr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            PlannerErr::UnreachableTarget { from, to } => {
                write!(f, "Unreachable target - no route from {} to {}", from, to)
            }
            PlannerErr::InfeasibleConflict(ref reason) => {
                write!(f, "Infeasible conflict - {}", reason)
            }
            PlannerErr::ResourceExceeded {
                used_mb,
                ceiling_mb,
            } => write!(
                f,
                "Resources exceeded - using {} MB, ceiling is {} MB",
                used_mb, ceiling_mb
            ),
            PlannerErr::InvariantViolation(ref reason) => {
                write!(f, "Invariant violation - {}", reason)
            }
        }
    }
}

impl Error for PlannerErr {}

impl From<LevelErr> for PlannerErr {
    fn from(err: LevelErr) -> Self {
        PlannerErr::InvariantViolation(err.to_string())
    }
}

/// What lives for exactly one planning run.
#[derive(Debug)]
pub struct PlanContext {
    pub routes: RouteCache,
    pub budget: ResourceBudget,
    pub config: Config,
}

impl PlanContext {
    pub fn new(config: Config) -> Self {
        PlanContext {
            routes: RouteCache::new(),
            budget: ResourceBudget::new(config.memory_ceiling_mb, config.memory_check_interval),
            config,
        }
    }
}

pub struct PlannerOk {
    pub plan: Plan,
    pub stats: Stats,
    pub cycles: u32,
    pub route_hits: u64,
    pub route_misses: u64,
}

impl Debug for PlannerOk {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Steps: {}", self.plan.len())?;
        writeln!(f, "Cycles: {}", self.cycles.separated_string())?;
        writeln!(
            f,
            "Route cache hits / misses: {} / {}",
            self.route_hits.separated_string(),
            self.route_misses.separated_string()
        )?;
        write!(f, "{}", self.stats)
    }
}

impl Solve for Problem {
    fn solve(&self, config: Config) -> Result<PlannerOk, PlannerErr> {
        Planner::new(self, config).run()
    }
}

/// Re-executes the plan from the problem's initial state, row by row.
///
/// Returns the final state or the index of the first illegal row.
pub fn replay(problem: &Problem, plan: &Plan) -> Result<State, usize> {
    let mut state = problem.initial_state();
    for (i, row) in plan.into_iter().enumerate() {
        state = state.step(problem.level(), row).ok_or(i)?;
    }
    Ok(state)
}

pub(crate) struct Planner {
    level: Level,
    agents: Vec<Agent>,
    boxes: Vec<BoxActor>,
    goals: Vec<Goal>,
    ctx: PlanContext,
    stats: Stats,
    cycles: u32,
}

impl Planner {
    pub(crate) fn new(problem: &Problem, config: Config) -> Self {
        let mut planner = Planner {
            level: problem.level().clone(),
            agents: problem.agents().to_vec(),
            boxes: problem.boxes().to_vec(),
            goals: problem.goals().to_vec(),
            ctx: PlanContext::new(config),
            stats: Stats::new(),
            cycles: 0,
        };
        planner.assign_destinations();
        planner.assign_tasks();
        planner
    }

    /// Every box gets the nearest unclaimed goal with its letter.
    ///
    /// Boxes already sitting on a matching goal keep it.
    fn assign_destinations(&mut self) {
        let mut claimed = vec![false; self.goals.len()];
        for b in &mut self.boxes {
            let on_goal = self.goals.iter().position(|g| {
                g.is_box_goal() && g.id() == b.id() && g.location() == b.location()
            });
            if let Some(g) = on_goal {
                claimed[g] = true;
                b.assign_destination(b.location());
            }
        }
        for b in &mut self.boxes {
            if b.destination().is_some() {
                continue;
            }
            let nearest = self
                .goals
                .iter()
                .enumerate()
                .filter(|&(i, g)| !claimed[i] && g.is_box_goal() && g.id() == b.id())
                .min_by_key(|&(i, g)| (g.location().dist(b.location()), i));
            if let Some((i, g)) = nearest {
                claimed[i] = true;
                b.assign_destination(g.location());
                debug!("{} -> {}", b, g.location());
            }
        }
    }

    /// Deliveries go to the nearest agent of the box's color, nearest first.
    /// The agent's own goal comes last.
    fn assign_tasks(&mut self) {
        let mut deliveries: Vec<Vec<(u32, usize)>> = vec![Vec::new(); self.agents.len()];
        for (b, the_box) in self.boxes.iter().enumerate() {
            if the_box.destination().is_none() || the_box.is_delivered() {
                continue;
            }
            match nearest_agent(&self.agents, the_box) {
                Some(a) => {
                    let dist = self.agents[a].location().dist(the_box.location());
                    deliveries[a].push((dist, b));
                }
                None => debug!("Nobody can move {}", the_box),
            }
        }

        for (a, agent) in self.agents.iter_mut().enumerate() {
            deliveries[a].sort();
            for &(_, b) in &deliveries[a] {
                agent.queue.push_back(Task::Deliver(b));
            }
            let own_goal = self
                .goals
                .iter()
                .position(|g| g.is_agent_goal() && g.id() == agent.id());
            if let Some(g) = own_goal {
                agent.queue.push_back(Task::Reach(g));
            }
            debug!("{} tasks: {:?}", agent, agent.queue);
        }
    }

    /// Ascending workload, ties by index.
    fn service_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.agents.len()).collect();
        order.sort_by_key(|&a| (self.agents[a].workload(&self.boxes, &self.goals), a));
        order
    }

    pub(crate) fn run(&mut self) -> Result<PlannerOk, PlannerErr> {
        info!(
            "Planning for {} agents and {} boxes",
            self.agents.len(),
            self.boxes.len()
        );
        loop {
            for agent in &mut self.agents {
                desire::update(agent, &self.boxes, &self.goals);
            }
            if self.agents.iter().all(Agent::is_idle) {
                break;
            }

            self.cycles += 1;
            if self.cycles > self.ctx.config.max_cycles {
                return Err(PlannerErr::InfeasibleConflict(format!(
                    "not finished after {} cycles",
                    self.ctx.config.max_cycles
                )));
            }
            self.step()?;
        }

        let logs: Vec<Vec<Action>> = self.agents.iter().map(|a| a.actions.clone()).collect();
        let mut plan = Plan::assemble(&logs);
        plan.trim();
        info!(
            "Planned {} steps in {} cycles",
            plan.len(),
            self.cycles.separated_string()
        );
        Ok(PlannerOk {
            plan,
            stats: self.stats.clone(),
            cycles: self.cycles,
            route_hits: self.ctx.routes.hits(),
            route_misses: self.ctx.routes.misses(),
        })
    }

    /// Everything as it is at the start of the current step.
    fn world(&self) -> State {
        problem_state(&self.agents, &self.boxes)
    }

    /// One joint action.
    fn step(&mut self) -> Result<(), PlannerErr> {
        let order = self.service_order();
        let world = self.world();
        trace!("Cycle {}, order {:?}", self.cycles, order);

        // tentative, so agents deciding later know which cells are taken
        let mut reservations = Reservations::new();
        let mut chosen: Vec<Option<Action>> = vec![None; self.agents.len()];
        for &a in &order {
            desire::update(&mut self.agents[a], &self.boxes, &self.goals);
            if chosen[a].is_some() {
                // decided by someone else's joint plan
                continue;
            }
            let action = self.decide(a, &world, &reservations, &mut chosen)?;
            chosen[a] = Some(action);
            if let Some(effect) = world.applicable(&self.level, a, action) {
                reservations.try_reserve(world.agents[a].location, &effect);
            }
        }

        // final legality check, whoever fails waits
        let mut commit = Reservations::new();
        let mut effects = Vec::with_capacity(self.agents.len());
        for a in 0..self.agents.len() {
            effects.push(world.applicable(&self.level, a, Action::NoOp));
        }
        for &a in &order {
            let action = chosen[a].unwrap_or(Action::NoOp);
            let from = world.agents[a].location;
            match world.applicable(&self.level, a, action) {
                Some(effect) if commit.try_reserve(from, &effect) => effects[a] = Some(effect),
                _ => {
                    debug!("Agent{} can't {} at {}, waiting", self.agents[a].id(), action, from);
                    self.agents[a].committed.clear();
                }
            }
        }

        for (a, effect) in effects.into_iter().enumerate() {
            let effect = effect.ok_or_else(|| {
                PlannerErr::InvariantViolation(format!("Agent{} can't even wait", a))
            })?;
            let agent = &mut self.agents[a];
            agent.actions.push(effect.action);
            agent.move_to(effect.agent_to);
            if let Some((b, to)) = effect.moved_box {
                self.boxes[b].move_to(to);
            }
        }
        Ok(())
    }

    fn decide(
        &mut self,
        a: usize,
        world: &State,
        reservations: &Reservations,
        chosen: &mut [Option<Action>],
    ) -> Result<Action, PlannerErr> {
        if let Some(action) = self.agents[a].committed.pop_front() {
            return Ok(action);
        }
        match self.agents[a].desire() {
            Desire::Sleep => Ok(Action::NoOp),
            Desire::MoveToLocation { target, location } => {
                self.approach(a, target, location, world, reservations, chosen)
            }
            Desire::MoveBoxToGoal {
                box_index,
                location,
            } => self.escort(a, box_index, location, chosen),
        }
    }
}

/// Nearest agent of the same color, ties by index.
fn nearest_agent(agents: &[Agent], the_box: &BoxActor) -> Option<usize> {
    agents
        .iter()
        .enumerate()
        .filter(|(_, agent)| agent.color() == the_box.color())
        .min_by_key(|&(i, agent)| (agent.location().dist(the_box.location()), i))
        .map(|(i, _)| i)
}

/// All actors with no particular targets.
pub(crate) fn problem_state(agents: &[Agent], boxes: &[BoxActor]) -> State {
    use self::state::{AgentSnapshot, BoxSnapshot, SearchTarget};

    State::new(
        agents
            .iter()
            .enumerate()
            .map(|(index, agent)| AgentSnapshot {
                index,
                location: agent.location(),
                color: agent.color(),
                target: SearchTarget::Stay,
            })
            .collect(),
        boxes
            .iter()
            .enumerate()
            .map(|(index, b)| BoxSnapshot {
                index,
                location: b.location(),
                color: b.color(),
                destination: b.destination(),
            })
            .collect(),
    )
}
