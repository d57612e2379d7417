use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Index, IndexMut};

use crate::data::Location;

#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Vec2d<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T> Vec2d<T> {
    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn cols(&self) -> usize {
        self.cols
    }

    pub(crate) fn contains(&self, loc: Location) -> bool {
        loc.row >= 0 && loc.col >= 0 && (loc.row as usize) < self.rows && (loc.col as usize) < self.cols
    }

    pub(crate) fn get(&self, loc: Location) -> Option<&T> {
        if self.contains(loc) {
            Some(&self[loc])
        } else {
            None
        }
    }

    pub(crate) fn positions(&self) -> impl Iterator<Item = Location> {
        let cols = self.cols;
        (0..self.rows * cols).map(move |i| Location::new((i / cols) as i32, (i % cols) as i32))
    }

    pub(crate) fn scratchpad<U: Default + Clone>(&self) -> Vec2d<U> {
        self.scratchpad_with_default(U::default())
    }

    pub(crate) fn scratchpad_with_default<U: Clone>(&self, default: U) -> Vec2d<U> {
        Vec2d {
            data: vec![default; self.data.len()],
            rows: self.rows,
            cols: self.cols,
        }
    }

    fn index_of(&self, loc: Location) -> usize {
        assert!(self.contains(loc), "{} is outside of {}x{}", loc, self.rows, self.cols);
        loc.row as usize * self.cols + loc.col as usize
    }
}

impl<T: Clone> Vec2d<T> {
    pub(crate) fn new(rows: usize, cols: usize, default: T) -> Self {
        Vec2d {
            data: vec![default; rows * cols],
            rows,
            cols,
        }
    }

    /// Pads all rows to the longest one using `fill`.
    pub(crate) fn from_rows(grid: &[Vec<T>], fill: T) -> Self {
        let cols = grid.iter().map(|row| row.len()).max().unwrap_or(0);
        let mut data = Vec::with_capacity(grid.len() * cols);
        for row in grid {
            data.extend_from_slice(row);
            for _ in row.len()..cols {
                data.push(fill.clone());
            }
        }
        Vec2d {
            data,
            rows: grid.len(),
            cols,
        }
    }
}

impl Display for Vec2d<bool> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for row in self.data.chunks(self.cols.max(1)) {
            for &cell in row {
                write!(f, "{}", if cell { 1 } else { 0 })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Debug for Vec2d<bool> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl<T> Index<Location> for Vec2d<T> {
    type Output = T;

    fn index(&self, index: Location) -> &Self::Output {
        let index = self.index_of(index);
        &self.data[index]
    }
}

impl<T> IndexMut<Location> for Vec2d<T> {
    fn index_mut(&mut self, index: Location) -> &mut Self::Output {
        let index = self.index_of(index);
        &mut self.data[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_and_formatting() {
        let grid = vec![vec![true, true, true], vec![true, false], vec![true]];
        let grid = Vec2d::from_rows(&grid, true);
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.to_string(), "111\n101\n111\n");
        assert!(!grid[Location::new(1, 1)]);
        assert!(grid[Location::new(1, 2)]);
    }

    #[test]
    fn bounds() {
        let grid = Vec2d::new(2, 3, 0u8);
        assert!(grid.contains(Location::new(1, 2)));
        assert!(!grid.contains(Location::new(2, 0)));
        assert!(!grid.contains(Location::new(0, -1)));
        assert_eq!(grid.get(Location::new(-1, 0)), None);
        assert_eq!(grid.positions().count(), 6);
        assert_eq!(grid.positions().last(), Some(Location::new(1, 2)));
    }
}
