use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use crate::action::Action;
use crate::data::Location;
use crate::vec2d::Vec2d;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelErr {
    OutOfRange(i32, i32),
}

impl Display for LevelErr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            LevelErr::OutOfRange(r, c) => {
                write!(f, "Location in row {} col {} is outside of the level", r, c)
            }
        }
    }
}

impl Error for LevelErr {}

/// The cells an action touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub agent: Location,
    pub box_cell: Option<Location>,
}

/// The static cell graph.
///
/// Locations use level coordinates where row and column 0 are the outer wall,
/// only the interior is addressable through `get_location`.
#[derive(Clone, PartialEq, Eq)]
pub struct Level {
    walls: Vec2d<bool>,
    neighbors: Vec2d<Vec<Location>>,
    components: Vec2d<u32>,
    corners: Vec<Location>,
}

impl Level {
    pub(crate) fn new(walls: Vec2d<bool>) -> Self {
        let mut level = Level {
            neighbors: walls.scratchpad(),
            components: walls.scratchpad(),
            corners: Vec::new(),
            walls,
        };
        level.rebuild();
        level
    }

    fn rebuild(&mut self) {
        for loc in self.walls.positions() {
            let neighbors = if self.walls[loc] {
                Vec::new()
            } else {
                loc.around()
                    .iter()
                    .cloned()
                    .filter(|&n| !self.is_wall(n))
                    .collect()
            };
            self.neighbors[loc] = neighbors;
        }
        self.components = self.label_components();
        self.corners = self.find_corners();
    }

    fn label_components(&self) -> Vec2d<u32> {
        let mut labels: Vec2d<u32> = self.walls.scratchpad();
        let mut next_label = 0;
        for start in self.walls.positions() {
            if self.walls[start] || labels[start] != 0 {
                continue;
            }
            next_label += 1;
            labels[start] = next_label;
            let mut to_visit = vec![start];
            while let Some(cur) = to_visit.pop() {
                for &n in &self.neighbors[cur] {
                    if labels[n] == 0 {
                        labels[n] = next_label;
                        to_visit.push(n);
                    }
                }
            }
        }
        labels
    }

    /// Dead ends and room corners - cells where a parked actor doesn't split the level.
    fn find_corners(&self) -> Vec<Location> {
        let mut corners = Vec::new();
        for loc in self.walls.positions() {
            let neighbors = &self.neighbors[loc];
            if self.walls[loc] || neighbors.is_empty() {
                continue;
            }
            if neighbors.len() == 1 {
                corners.push(loc);
            } else if neighbors.len() == 2 {
                let (a, b) = (neighbors[0], neighbors[1]);
                if a.row != b.row && a.col != b.col {
                    // perpendicular, the cell diagonal to loc keeps a and b connected
                    let diagonal = Location::new(a.row + b.row - loc.row, a.col + b.col - loc.col);
                    if !self.is_wall(diagonal) {
                        corners.push(loc);
                    }
                }
            }
        }
        corners
    }

    /// Total number of rows including the outer walls.
    pub fn rows(&self) -> usize {
        self.walls.rows()
    }

    /// Total number of columns including the outer walls.
    pub fn cols(&self) -> usize {
        self.walls.cols()
    }

    pub fn get_location(&self, (row, col): (i32, i32), translate: bool) -> Result<Location, LevelErr> {
        let (r, c) = if translate { (row - 1, col - 1) } else { (row, col) };
        let interior_rows = self.rows() as i32 - 2;
        let interior_cols = self.cols() as i32 - 2;
        if r < 0 || c < 0 || r >= interior_rows || c >= interior_cols {
            return Err(LevelErr::OutOfRange(row, col));
        }
        Ok(Location::new(r + 1, c + 1))
    }

    /// Where the agent (and the box it manipulates) ends up after applying `action` at `loc`.
    ///
    /// With `execute` the box cell is the one after the action, otherwise the one before it.
    /// For a pull that's the cell the box has to be in for the pull to make sense.
    pub fn location_from_action(
        &self,
        loc: Location,
        action: Action,
        execute: bool,
    ) -> Result<Footprint, LevelErr> {
        let translate = |l: Location| self.get_location((l.row, l.col), true);
        let footprint = match action {
            Action::NoOp => Footprint {
                agent: loc,
                box_cell: None,
            },
            Action::Move(dir) => Footprint {
                agent: translate(loc + dir)?,
                box_cell: None,
            },
            Action::Push(agent_dir, box_dir) => {
                let agent = translate(loc + agent_dir)?;
                let box_cell = if execute { agent + box_dir } else { agent };
                Footprint {
                    agent,
                    box_cell: Some(translate(box_cell)?),
                }
            }
            Action::Pull(agent_dir, box_dir) => {
                let agent = translate(loc + agent_dir)?;
                let box_cell = if execute { loc } else { loc + box_dir };
                Footprint {
                    agent,
                    box_cell: Some(translate(box_cell)?),
                }
            }
        };
        Ok(footprint)
    }

    pub fn is_wall(&self, loc: Location) -> bool {
        self.walls.get(loc).cloned().unwrap_or(true)
    }

    pub fn neighbors(&self, loc: Location) -> &[Location] {
        match self.neighbors.get(loc) {
            Some(neighbors) => neighbors,
            None => &[],
        }
    }

    pub fn distance(&self, a: Location, b: Location) -> u32 {
        a.dist(b)
    }

    pub fn corners(&self) -> &[Location] {
        &self.corners
    }

    /// Connected component label, walls have none.
    pub fn component(&self, loc: Location) -> Option<u32> {
        match self.components.get(loc) {
            Some(&label) if label != 0 => Some(label),
            _ => None,
        }
    }

    pub fn floor_cells<'a>(&'a self) -> impl Iterator<Item = Location> + 'a {
        self.walls.positions().filter(move |&loc| !self.walls[loc])
    }

    pub fn wall_off(&mut self, cells: &[Location]) {
        for &cell in cells {
            if self.walls.contains(cell) {
                self.walls[cell] = true;
            }
        }
        self.rebuild();
    }

    /// Copy of the level with every cell not kept turned into wall.
    pub fn narrowed<F: Fn(Location) -> bool>(&self, keep: F) -> Level {
        let mut walls = self.walls.clone();
        for loc in walls.positions() {
            if !keep(loc) {
                walls[loc] = true;
            }
        }
        Level::new(walls)
    }
}

impl FromStr for Level {
    type Err = LevelErr;

    /// Walls only: `+` is a wall, anything else is floor.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let grid: Vec<Vec<bool>> = s
            .trim_matches('\n')
            .lines()
            .map(|line| line.chars().map(|c| c == '+').collect())
            .collect();
        if grid.len() < 3 || grid.iter().all(|row| row.len() < 3) {
            return Err(LevelErr::OutOfRange(grid.len() as i32, 0));
        }
        Ok(Level::new(Vec2d::from_rows(&grid, true)))
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for r in 0..self.rows() {
            for c in 0..self.cols() {
                let wall = self.walls[Location::new(r as i32, c as i32)];
                write!(f, "{}", if wall { '+' } else { ' ' })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Debug for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
