use std::fmt::{self, Debug, Display, Formatter};

use crate::actor::Actor;
use crate::data::Location;
use crate::planner::state::State;
use crate::problem::Problem;
use crate::vec2d::Vec2d;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Walls, agents and boxes - the `#initial` section.
    Actors,
    /// Walls and goals - the `#goal` section.
    Goals,
}

pub struct ProblemFormatter<'a> {
    problem: &'a Problem,
    state: Option<&'a State>,
    layer: Layer,
}

impl<'a> ProblemFormatter<'a> {
    pub(crate) fn new(problem: &'a Problem, state: Option<&'a State>) -> Self {
        Self {
            problem,
            state,
            layer: Layer::Actors,
        }
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    fn write_to_formatter(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let level = self.problem.level();
        let mut grid: Vec2d<Option<char>> = Vec2d::new(level.rows(), level.cols(), None);
        match self.layer {
            Layer::Actors => {
                let state = match self.state {
                    Some(state) => state.clone(),
                    None => self.problem.initial_state(),
                };
                for b in state.boxes() {
                    grid[b.location] = Some(self.problem.boxes()[b.index].id());
                }
                for a in state.agents() {
                    grid[a.location] = Some(self.problem.agents()[a.index].id());
                }
            }
            Layer::Goals => {
                for goal in self.problem.goals() {
                    grid[goal.location()] = Some(goal.id());
                }
            }
        }

        for r in 0..level.rows() {
            // don't print trailing empty cells to match the input level strings
            let mut last_non_empty = 0;
            for c in 0..level.cols() {
                let loc = Location::new(r as i32, c as i32);
                if level.is_wall(loc) || grid[loc].is_some() {
                    last_non_empty = c;
                }
            }

            for c in 0..=last_non_empty {
                let loc = Location::new(r as i32, c as i32);
                let cell = match grid[loc] {
                    Some(id) => id,
                    None if level.is_wall(loc) => '+',
                    None => ' ',
                };
                write!(f, "{}", cell)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<'a> Display for ProblemFormatter<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_to_formatter(f)
    }
}

impl<'a> Debug for ProblemFormatter<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::action::Action;
    use crate::data::Dir;

    const LEVEL: &str = r"#domain
hospital
#levelname
formatting
#colors
red: 0, A
blue: 1
#initial
+++++++
+0A  1+
++ ++++
 +++
#goal
+++++++
+  A  +
++0++++
 +++
#end
";

    #[test]
    fn formatting_layers() {
        let problem: Problem = LEVEL.parse().unwrap();
        assert_eq!(
            problem.formatter(None).to_string(),
            "+++++++\n+0A  1+\n++ ++++\n+++++++\n"
        );
        assert_eq!(
            problem.formatter(None).layer(Layer::Goals).to_string(),
            "+++++++\n+  A  +\n++0++++\n+++++++\n"
        );
    }

    #[test]
    fn formatting_a_later_state() {
        let problem: Problem = LEVEL.parse().unwrap();
        let state = problem
            .initial_state()
            .step(problem.level(), &[Action::Push(Dir::E, Dir::E), Action::Move(Dir::W)])
            .unwrap();
        assert_eq!(
            format!("{:?}", problem.formatter(Some(&state))),
            "+++++++\n+ 0A1 +\n++ ++++\n+++++++\n"
        );
    }
}
