use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::{self, Debug, Formatter};

use fnv::{FnvHashMap, FnvHashSet};
use log::trace;

use crate::action::Action;
use crate::data::Location;
use crate::level::Level;

use super::PlannerErr;

/// Adjacent non-wall cells from start to end, both included, no timing.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Route {
    cells: Vec<Location>,
}

impl Route {
    pub(crate) fn new(cells: Vec<Location>) -> Self {
        assert!(!cells.is_empty());
        Route { cells }
    }

    pub fn cells(&self) -> &[Location] {
        &self.cells
    }

    pub fn start(&self) -> Location {
        self.cells[0]
    }

    pub fn end(&self) -> Location {
        self.cells[self.cells.len() - 1]
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.cells.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn next(&self) -> Option<Location> {
        self.cells.get(1).cloned()
    }

    pub fn contains(&self, loc: Location) -> bool {
        self.cells.contains(&loc)
    }

    pub fn reversed(&self) -> Route {
        let mut cells = self.cells.clone();
        cells.reverse();
        Route { cells }
    }

    /// Without the last cell - for stopping next to a box instead of on it.
    pub fn trimmed(&self) -> Route {
        let mut cells = self.cells.clone();
        if cells.len() > 1 {
            cells.pop();
        }
        Route { cells }
    }

    /// Translates the route into moves, refusing anything that isn't a single orthogonal step.
    pub fn to_moves(&self, level: &Level) -> Result<Vec<Action>, PlannerErr> {
        self.cells
            .windows(2)
            .map(|pair| {
                let (from, to) = (pair[0], pair[1]);
                if level.is_wall(to) {
                    return Err(PlannerErr::InvariantViolation(format!(
                        "route enters wall at {}",
                        to
                    )));
                }
                match from.dir_to(to) {
                    Some(dir) => Ok(Action::Move(dir)),
                    None => Err(PlannerErr::InvariantViolation(format!(
                        "route jumps from {} to {}",
                        from, to
                    ))),
                }
            })
            .collect()
    }
}

impl Debug for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.cells)
    }
}

/// Greedy best-first search ordered by distance to `end`.
///
/// Ignores actors - it only knows the walls.
pub fn find_route(level: &Level, start: Location, end: Location) -> Result<Route, PlannerErr> {
    if start == end {
        return Ok(Route::new(vec![start]));
    }
    if level.neighbors(start).contains(&end) {
        return Ok(Route::new(vec![start, end]));
    }

    let mut to_visit = BinaryHeap::new();
    let mut prevs = FnvHashMap::default();
    let mut explored = FnvHashSet::default();
    // insertion order breaks ties so results don't depend on heap internals
    let mut created = 0u32;

    prevs.insert(start, start);
    to_visit.push(Reverse((start.dist(end), created, start)));

    while let Some(Reverse((_, _, cur))) = to_visit.pop() {
        if cur == end {
            return Ok(backtrack_route(&prevs, end));
        }
        if !explored.insert(cur) {
            continue;
        }

        for &next in level.neighbors(cur) {
            if prevs.contains_key(&next) {
                continue;
            }
            prevs.insert(next, cur);
            created += 1;
            to_visit.push(Reverse((next.dist(end), created, next)));
        }
    }

    Err(PlannerErr::UnreachableTarget {
        from: start,
        to: end,
    })
}

fn backtrack_route(prevs: &FnvHashMap<Location, Location>, end: Location) -> Route {
    let mut cells = vec![end];
    let mut cur = end;
    loop {
        let prev = prevs[&cur];
        if prev == cur {
            cells.reverse();
            return Route::new(cells);
        }
        cells.push(prev);
        cur = prev;
    }
}

/// Routes keyed by the unordered pair of endpoints.
///
/// Only topology goes in, so entries stay valid no matter who stands where.
#[derive(Debug, Default)]
pub struct RouteCache {
    routes: FnvHashMap<(Location, Location), Route>,
    hits: u64,
    misses: u64,
}

impl RouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self, level: &Level, start: Location, end: Location) -> Result<Route, PlannerErr> {
        let key = if start <= end { (start, end) } else { (end, start) };

        if let Some(route) = self.routes.get(&key) {
            self.hits += 1;
            return Ok(if route.start() == start {
                route.clone()
            } else {
                route.reversed()
            });
        }

        self.misses += 1;
        let route = find_route(level, start, end)?;
        trace!("Route {} -> {}: {} steps", start, end, route.len());
        let stored = if route.start() == key.0 {
            route.clone()
        } else {
            route.reversed()
        };
        self.routes.insert(key, stored);
        Ok(route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::data::Dir::*;

    fn maze() -> Level {
        r"
+++++++++
+   +   +
+ + + + +
+ +   + +
+ +++++ +
+       +
+++++++++
"
        .parse()
        .unwrap()
    }

    fn assert_valid(level: &Level, route: &Route, start: Location, end: Location) {
        assert_eq!(route.start(), start);
        assert_eq!(route.end(), end);
        for pair in route.cells().windows(2) {
            assert!(
                level.neighbors(pair[0]).contains(&pair[1]),
                "{} -> {} in {:?}",
                pair[0],
                pair[1],
                route
            );
        }
        let mut cells = route.cells().to_vec();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len(), route.cells().len(), "cells repeat in {:?}", route);
    }

    #[test]
    fn all_pairs_are_valid() {
        let level = maze();
        let floor: Vec<_> = level.floor_cells().collect();
        for &start in &floor {
            for &end in &floor {
                let route = find_route(&level, start, end).unwrap();
                assert_valid(&level, &route, start, end);
            }
        }
    }

    #[test]
    fn short_routes() {
        let level = maze();
        let start = Location::new(1, 1);

        let same = find_route(&level, start, start).unwrap();
        assert_eq!(same.len(), 0);
        assert!(same.is_empty());
        assert_eq!(same.next(), None);

        let adjacent = find_route(&level, start, Location::new(1, 2)).unwrap();
        assert_eq!(adjacent.len(), 1);
        assert_eq!(adjacent.cells(), &[start, Location::new(1, 2)]);
    }

    #[test]
    fn winding_route() {
        let level = maze();
        // the wall between them forces a detour through the bottom corridor
        let route = find_route(&level, Location::new(1, 3), Location::new(1, 5)).unwrap();
        assert_valid(&level, &route, Location::new(1, 3), Location::new(1, 5));
        assert!(route.len() > 2);
    }

    #[test]
    fn unreachable_target() {
        let level: Level = r"
+++++++
+  +  +
+++++++
"
        .parse()
        .unwrap();
        let err = find_route(&level, Location::new(1, 1), Location::new(1, 5)).unwrap_err();
        assert_eq!(
            err,
            PlannerErr::UnreachableTarget {
                from: Location::new(1, 1),
                to: Location::new(1, 5),
            }
        );
        // walls are never reachable
        assert!(find_route(&level, Location::new(1, 1), Location::new(1, 3)).is_err());
    }

    #[test]
    fn cache_is_idempotent_and_symmetric() {
        let level = maze();
        let mut cache = RouteCache::new();
        let (a, b) = (Location::new(5, 1), Location::new(1, 7));

        let first = cache.route(&level, a, b).unwrap();
        let second = cache.route(&level, a, b).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);

        let back = cache.route(&level, b, a).unwrap();
        assert_eq!(back, first.reversed());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 2);
    }

    #[test]
    fn translating_to_moves() {
        let level = maze();
        let route = Route::new(vec![
            Location::new(5, 1),
            Location::new(5, 2),
            Location::new(4, 1),
        ]);
        match route.to_moves(&level) {
            Err(PlannerErr::InvariantViolation(_)) => {}
            other => panic!("expected invariant violation, got {:?}", other),
        }

        let through_wall = Route::new(vec![Location::new(5, 1), Location::new(4, 2)]);
        assert!(through_wall.to_moves(&level).is_err());
        let into_wall = Route::new(vec![Location::new(1, 3), Location::new(1, 4)]);
        assert!(into_wall.to_moves(&level).is_err());

        let route = find_route(&level, Location::new(5, 1), Location::new(5, 3)).unwrap();
        assert_eq!(route.to_moves(&level).unwrap(), vec![Action::Move(E), Action::Move(E)]);
        assert_eq!(route.trimmed().to_moves(&level).unwrap(), vec![Action::Move(E)]);
    }
}
