use std::fmt::{self, Debug, Display, Formatter};
use std::ops::Add;
use std::str::FromStr;

/// Directions in the order actions are enumerated.
pub const DIRECTIONS: [Dir; 4] = [Dir::N, Dir::S, Dir::E, Dir::W];

/// A cell in level coordinates (including the outer wall), row first.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub row: i32,
    pub col: i32,
}

impl Location {
    pub fn new(row: i32, col: i32) -> Self {
        Location { row, col }
    }

    pub fn dist(self, other: Location) -> u32 {
        ((self.row - other.row).abs() + (self.col - other.col).abs()) as u32
    }

    pub fn is_adjacent(self, other: Location) -> bool {
        self.dist(other) == 1
    }

    /// All four orthogonal cells, walls included.
    pub fn around(self) -> [Location; 4] {
        [self + Dir::N, self + Dir::S, self + Dir::E, self + Dir::W]
    }

    pub fn dir_to(self, other: Location) -> Option<Dir> {
        match (other.row - self.row, other.col - self.col) {
            (-1, 0) => Some(Dir::N),
            (1, 0) => Some(Dir::S),
            (0, 1) => Some(Dir::E),
            (0, -1) => Some(Dir::W),
            _ => None,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.col)
    }
}

impl Debug for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dir {
    N,
    S,
    E,
    W,
}

impl Dir {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::N => (-1, 0),
            Dir::S => (1, 0),
            Dir::E => (0, 1),
            Dir::W => (0, -1),
        }
    }

    pub fn inverse(self) -> Dir {
        match self {
            Dir::N => Dir::S,
            Dir::S => Dir::N,
            Dir::E => Dir::W,
            Dir::W => Dir::E,
        }
    }
}

impl Display for Dir {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let c = match *self {
            Dir::N => 'N',
            Dir::S => 'S',
            Dir::E => 'E',
            Dir::W => 'W',
        };
        write!(f, "{}", c)
    }
}

impl FromStr for Dir {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "N" => Ok(Dir::N),
            "S" => Ok(Dir::S),
            "E" => Ok(Dir::E),
            "W" => Ok(Dir::W),
            _ => Err(()),
        }
    }
}

impl Add<Dir> for Location {
    type Output = Location;

    fn add(self, dir: Dir) -> Location {
        let (dr, dc) = dir.delta();
        Location::new(self.row + dr, self.col + dc)
    }
}

impl Add<(i32, i32)> for Location {
    type Output = Location;

    fn add(self, (dr, dc): (i32, i32)) -> Location {
        Location::new(self.row + dr, self.col + dc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Color {
    Blue,
    Red,
    Cyan,
    Purple,
    Green,
    Orange,
    Pink,
    Grey,
    Lightblue,
    Brown,
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Color::Blue => "blue",
            Color::Red => "red",
            Color::Cyan => "cyan",
            Color::Purple => "purple",
            Color::Green => "green",
            Color::Orange => "orange",
            Color::Pink => "pink",
            Color::Grey => "grey",
            Color::Lightblue => "lightblue",
            Color::Brown => "brown",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Color {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blue" => Ok(Color::Blue),
            "red" => Ok(Color::Red),
            "cyan" => Ok(Color::Cyan),
            "purple" => Ok(Color::Purple),
            "green" => Ok(Color::Green),
            "orange" => Ok(Color::Orange),
            "pink" => Ok(Color::Pink),
            "grey" | "gray" => Ok(Color::Grey),
            "lightblue" => Ok(Color::Lightblue),
            "brown" => Ok(Color::Brown),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_are_symmetric_manhattan() {
        let cells = [
            Location::new(1, 1),
            Location::new(1, 7),
            Location::new(4, 2),
            Location::new(9, 9),
        ];
        for &a in &cells {
            for &b in &cells {
                assert_eq!(a.dist(b), b.dist(a));
                let manhattan = (a.row - b.row).abs() + (a.col - b.col).abs();
                assert_eq!(a.dist(b), manhattan as u32);
            }
        }
    }

    #[test]
    fn directions() {
        let center = Location::new(5, 5);
        for &dir in &DIRECTIONS {
            let next = center + dir;
            assert_eq!(center.dir_to(next), Some(dir));
            assert_eq!(next + dir.inverse(), center);
        }
        assert_eq!(center.dir_to(Location::new(6, 6)), None);
        assert_eq!(center.dir_to(Location::new(7, 5)), None);
    }

    #[test]
    fn parsing_colors() {
        assert_eq!("Lightblue".parse(), Ok(Color::Lightblue));
        assert_eq!(" red ".parse(), Ok(Color::Red));
        assert_eq!("magenta".parse::<Color>(), Err(()));
        assert_eq!(Color::Grey.to_string(), "grey");
    }
}
