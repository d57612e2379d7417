use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt::{self, Debug, Display, Formatter};

use fnv::FnvHashSet;
use log::{debug, trace};
use separator::Separatable;

use crate::action::Action;
use crate::data::Location;
use crate::goal::Goal;
use crate::level::Level;

use super::memory::ResourceBudget;
use super::state::{SearchTarget, State, StateId};
use super::PlannerErr;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Stats {
    created_states: Vec<i32>,
    visited_states: Vec<i32>,
    duplicate_states: Vec<i32>,
    searches: i32,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn searches(&self) -> i32 {
        self.searches
    }

    pub fn total_created(&self) -> i32 {
        self.created_states.iter().sum::<i32>()
    }

    pub fn total_unique_visited(&self) -> i32 {
        self.visited_states.iter().sum::<i32>()
    }

    pub fn total_reached_duplicates(&self) -> i32 {
        self.duplicate_states.iter().sum::<i32>()
    }

    pub(crate) fn add_created(&mut self, state: &State) -> bool {
        Self::add(&mut self.created_states, state)
    }

    pub(crate) fn add_unique_visited(&mut self, state: &State) -> bool {
        Self::add(&mut self.visited_states, state)
    }

    pub(crate) fn add_reached_duplicate(&mut self, state: &State) -> bool {
        Self::add(&mut self.duplicate_states, state)
    }

    fn add(counts: &mut Vec<i32>, state: &State) -> bool {
        let mut ret = false;

        // while because some depths might be skipped - duplicates
        while state.g() as usize >= counts.len() {
            counts.push(0);
            ret = true;
        }
        counts[state.g() as usize] += 1;
        ret
    }

    /// Adds the counts of another run depth by depth.
    pub fn merge(&mut self, other: &Stats) {
        fn merge_counts(into: &mut Vec<i32>, from: &[i32]) {
            if into.len() < from.len() {
                into.resize(from.len(), 0);
            }
            for (i, &cnt) in from.iter().enumerate() {
                into[i] += cnt;
            }
        }

        merge_counts(&mut self.created_states, &other.created_states);
        merge_counts(&mut self.visited_states, &other.visited_states);
        merge_counts(&mut self.duplicate_states, &other.duplicate_states);
        self.searches += other.searches;
    }
}

impl Debug for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stats")
            .field("searches", &self.searches)
            .field("created", &self.created_states)
            .field("visited", &self.visited_states)
            .field("duplicates", &self.duplicate_states)
            .finish()
    }
}

/// Totals over every search of the run, then the same per depth.
///
/// Depth is counted from the start of each search so deep levels only come from long searches.
impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Searches: {}, states created: {}, visited: {}, duplicates: {}",
            self.searches.separated_string(),
            self.total_created().separated_string(),
            self.total_unique_visited().separated_string(),
            self.total_reached_duplicates().separated_string()
        )?;
        if self.created_states.is_empty() {
            return Ok(());
        }
        writeln!(f, "{:<7}{:>12}{:>12}{:>12}", "Depth", "Created", "Visited", "Duplicates")?;
        let count = |counts: &[i32], i: usize| counts.get(i).cloned().unwrap_or(0).separated_string();
        // created_states is always the longest
        for i in 0..self.created_states.len() {
            writeln!(
                f,
                "{:<7}{:>12}{:>12}{:>12}",
                i,
                count(&self.created_states, i),
                count(&self.visited_states, i),
                count(&self.duplicate_states, i)
            )?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct SearchNode {
    id: StateId,
    h: u32,
    created: u32,
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // older nodes first on ties so results don't depend on heap internals
        (self.h, self.created).cmp(&(other.h, other.created))
    }
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

/// Everything a search needs besides the start state.
#[derive(Debug)]
pub(crate) struct Episode<'a> {
    pub(crate) level: &'a Level,
    pub(crate) goals: &'a [Goal],
    /// Cells the search has to keep, everything farther than the radius from them is walled.
    pub(crate) focus: Vec<Location>,
    /// Cells walled regardless of the radius - non-participating actors.
    pub(crate) blocked: Vec<Location>,
    pub(crate) radius: u32,
    pub(crate) idle_penalty: u32,
    pub(crate) limit: u64,
}

/// Runs the search on a narrowed copy of the level, widening it once if that fails.
///
/// Returns one joint action per step, in the order of the start state's agents.
pub(crate) fn bounded_search(
    episode: &Episode<'_>,
    start: State,
    budget: &mut ResourceBudget,
    stats: &mut Stats,
) -> Result<Vec<Vec<Action>>, PlannerErr> {
    for &radius in &[episode.radius, episode.radius * 2] {
        let level = narrow(episode, &start, radius);
        debug!(
            "Searching with {} agents and {} boxes, radius {}",
            start.agents().len(),
            start.boxes().len(),
            radius
        );
        let mut episode_stats = Stats::new();
        let result = search(episode, &level, start.clone(), budget, &mut episode_stats);
        stats.merge(&episode_stats);
        if let Some(joint_actions) = result? {
            debug!(
                "Found {} steps after visiting {} states",
                joint_actions.len(),
                episode_stats.total_unique_visited().separated_string()
            );
            return Ok(joint_actions);
        }
        debug!("Radius {} exhausted", radius);
    }
    Err(PlannerErr::InfeasibleConflict(format!(
        "no joint plan for agents {:?}",
        start.agents().iter().map(|a| a.index).collect::<Vec<_>>()
    )))
}

/// Walls everything outside `radius` around the focus and the participants.
fn narrow(episode: &Episode<'_>, start: &State, radius: u32) -> Level {
    let mut centers = episode.focus.clone();
    centers.extend(start.agents().iter().map(|a| a.location));
    centers.extend(start.boxes().iter().map(|b| b.location));
    centers.extend(start.boxes().iter().filter_map(|b| b.destination));
    for agent in start.agents() {
        match agent.target {
            SearchTarget::Reach(loc) | SearchTarget::Adjacent(loc) => centers.push(loc),
            SearchTarget::Escort(_) | SearchTarget::Stay => {}
        }
    }

    let mut level =
        episode
            .level
            .narrowed(|loc| centers.iter().any(|&center| loc.dist(center) <= radius));
    let blocked: Vec<_> = episode
        .blocked
        .iter()
        .cloned()
        .filter(|&cell| {
            start.agents().iter().all(|a| a.location != cell)
                && start.boxes().iter().all(|b| b.location != cell)
        })
        .collect();
    level.wall_off(&blocked);
    level
}

fn heuristic(episode: &Episode<'_>, state: &State) -> u32 {
    // less is better
    let mut h = state.g();
    for agent in state.agents() {
        h += match agent.target {
            SearchTarget::Reach(loc) => agent.location.dist(loc),
            SearchTarget::Adjacent(loc) => agent.location.dist(loc).saturating_sub(1),
            SearchTarget::Escort(b) => {
                let the_box = &state.boxes()[b];
                let desire = the_box.destination.unwrap_or(the_box.location);
                agent.location.dist(desire)
            }
            SearchTarget::Stay => 0,
        };
    }
    let mut all_delivered = true;
    for b in state.boxes() {
        if let Some(dest) = b.destination {
            h += b.location.dist(dest);
            all_delivered &= b.location == dest;
        }
    }
    if all_delivered {
        for agent in state.agents() {
            let squatting = episode
                .goals
                .iter()
                .any(|g| g.location() == agent.location && g.color() != agent.color);
            if squatting {
                h += episode.idle_penalty;
            }
        }
    }
    h
}

/// Best-first search over joint actions.
///
/// `Ok(None)` means the narrowed level has no solution.
fn search(
    episode: &Episode<'_>,
    level: &Level,
    start: State,
    budget: &mut ResourceBudget,
    stats: &mut Stats,
) -> Result<Option<Vec<Vec<Action>>>, PlannerErr> {
    stats.searches += 1;

    let mut arena: Vec<State> = Vec::new();
    let mut to_visit = BinaryHeap::new();
    // positions only - the same positions at a greater depth are never better
    let mut explored = FnvHashSet::default();
    let mut created = 0;
    let mut expansions = 0;

    let start_h = heuristic(episode, &start);
    stats.add_created(&start);
    arena.push(start);
    to_visit.push(Reverse(SearchNode {
        id: 0,
        h: start_h,
        created,
    }));

    while let Some(Reverse(cur_node)) = to_visit.pop() {
        let cur = &arena[cur_node.id];
        if !explored.insert(cur.key()) {
            stats.add_reached_duplicate(cur);
            continue;
        }
        if stats.add_unique_visited(cur) {
            trace!("Visited new depth: {}", cur.g());
        }

        if cur.is_goal() {
            return Ok(Some(backtrack_actions(&arena, cur_node.id)));
        }

        budget.tick()?;
        expansions += 1;
        if expansions > episode.limit {
            return Err(PlannerErr::InfeasibleConflict(format!(
                "search gave up after {} expansions",
                expansions - 1
            )));
        }

        for next in cur.expand(level, cur_node.id) {
            // insert and then ignore duplicates
            created += 1;
            let h = heuristic(episode, &next);
            stats.add_created(&next);
            to_visit.push(Reverse(SearchNode {
                id: arena.len(),
                h,
                created,
            }));
            arena.push(next);
        }
    }

    Ok(None)
}

fn backtrack_actions(arena: &[State], goal: StateId) -> Vec<Vec<Action>> {
    let mut ret = Vec::new();
    let mut id = goal;
    while let Some(parent) = arena[id].parent {
        ret.push(arena[id].joint_action.clone());
        id = parent;
    }
    ret.reverse();
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::data::Color;
    use crate::data::Dir::*;
    use crate::planner::state::{AgentSnapshot, BoxSnapshot};

    fn episode(level: &Level) -> Episode<'_> {
        Episode {
            level,
            goals: &[],
            focus: Vec::new(),
            blocked: Vec::new(),
            radius: 10,
            idle_penalty: 5,
            limit: 100_000,
        }
    }

    fn budget() -> ResourceBudget {
        ResourceBudget::new(u64::max_value(), 1000)
    }

    #[test]
    fn pushing_a_box() {
        let level: Level = r"
+++++++
+     +
+++++++
"
        .parse()
        .unwrap();
        let start = State::new(
            vec![AgentSnapshot {
                index: 0,
                location: Location::new(1, 2),
                color: Color::Blue,
                target: SearchTarget::Escort(0),
            }],
            vec![BoxSnapshot {
                index: 0,
                location: Location::new(1, 3),
                color: Color::Blue,
                destination: Some(Location::new(1, 4)),
            }],
        );
        let mut stats = Stats::new();
        let actions = bounded_search(&episode(&level), start, &mut budget(), &mut stats).unwrap();
        assert_eq!(actions, vec![vec![Action::Push(E, E)]]);
        assert_eq!(stats.searches(), 1);
        assert!(stats.total_created() > stats.total_unique_visited());

        let table = stats.to_string();
        assert!(table.starts_with("Searches: 1, states created: "));
        let header: Vec<_> = table.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(header, vec!["Depth", "Created", "Visited", "Duplicates"]);
        // depth 0 is the start state
        assert!(table.lines().nth(2).unwrap().starts_with("0 "));
    }

    #[test]
    fn pulling_a_box_out_of_a_dead_end() {
        // the agent can never get behind the box, it has to be pulled out
        let level: Level = r"
++++++
+    +
+++ ++
++++++
"
        .parse()
        .unwrap();
        let start = State::new(
            vec![AgentSnapshot {
                index: 0,
                location: Location::new(1, 3),
                color: Color::Red,
                target: SearchTarget::Escort(0),
            }],
            vec![BoxSnapshot {
                index: 0,
                location: Location::new(2, 3),
                color: Color::Red,
                destination: Some(Location::new(1, 2)),
            }],
        );
        let actions =
            bounded_search(&episode(&level), start.clone(), &mut budget(), &mut Stats::new()).unwrap();

        let mut state = start;
        for joint in &actions {
            state = state.step(&level, joint).unwrap();
        }
        assert!(state.is_goal());
        assert_eq!(state.boxes()[0].location, Location::new(1, 2));
        let first_with_box = actions.iter().map(|joint| joint[0]).find(|a| a.moves_box());
        match first_with_box {
            Some(Action::Pull(..)) => {}
            other => panic!("expected a pull first, got {:?}", other),
        }
    }

    #[test]
    fn two_agents_swap_in_a_room() {
        let level: Level = r"
+++++
+   +
+ + +
+   +
+++++
"
        .parse()
        .unwrap();
        let start = State::new(
            vec![
                AgentSnapshot {
                    index: 0,
                    location: Location::new(1, 1),
                    color: Color::Blue,
                    target: SearchTarget::Reach(Location::new(3, 3)),
                },
                AgentSnapshot {
                    index: 1,
                    location: Location::new(3, 3),
                    color: Color::Red,
                    target: SearchTarget::Reach(Location::new(1, 1)),
                },
            ],
            vec![],
        );
        let actions =
            bounded_search(&episode(&level), start.clone(), &mut budget(), &mut Stats::new()).unwrap();
        // each has to walk at least 4 steps
        assert!(actions.len() >= 4);

        let mut state = start;
        for joint in &actions {
            assert_eq!(joint.len(), 2);
            state = state.step(&level, joint).unwrap();
            assert_ne!(state.agents()[0].location, state.agents()[1].location);
        }
        assert!(state.is_goal());
    }

    #[test]
    fn exhausted_search_is_infeasible() {
        let level: Level = r"
++++++
+ ++ +
++++++
"
        .parse()
        .unwrap();
        let start = State::new(
            vec![AgentSnapshot {
                index: 3,
                location: Location::new(1, 1),
                color: Color::Blue,
                target: SearchTarget::Reach(Location::new(1, 4)),
            }],
            vec![],
        );
        let mut stats = Stats::new();
        match bounded_search(&episode(&level), start, &mut budget(), &mut stats) {
            Err(PlannerErr::InfeasibleConflict(_)) => {}
            other => panic!("expected infeasible conflict, got {:?}", other),
        }
        // retried once with the radius doubled
        assert_eq!(stats.searches(), 2);
    }

    #[test]
    fn narrowing_walls_far_cells() {
        let level: Level = r"
+++++++++
+       +
+++++++++
"
        .parse()
        .unwrap();
        let mut ep = episode(&level);
        ep.radius = 1;
        ep.blocked = vec![Location::new(1, 1)];
        let start = State::new(
            vec![AgentSnapshot {
                index: 0,
                location: Location::new(1, 2),
                color: Color::Blue,
                target: SearchTarget::Reach(Location::new(1, 3)),
            }],
            vec![],
        );
        let narrowed = narrow(&ep, &start, ep.radius);
        assert!(narrowed.is_wall(Location::new(1, 1)));
        assert!(!narrowed.is_wall(Location::new(1, 2)));
        assert!(!narrowed.is_wall(Location::new(1, 4)));
        assert!(narrowed.is_wall(Location::new(1, 5)));
    }

    #[test]
    fn merging_stats() {
        let state = State::new(Vec::new(), Vec::new());
        let mut a = Stats::new();
        a.add_created(&state);
        let mut b = Stats::new();
        b.add_created(&state);
        b.add_unique_visited(&state);
        a.merge(&b);
        assert_eq!(a.total_created(), 2);
        assert_eq!(a.total_unique_visited(), 1);
    }
}
