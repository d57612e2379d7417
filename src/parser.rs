use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::str::Lines;

use fnv::FnvHashMap;

use crate::actor::{Actor, Agent, BoxActor};
use crate::data::{Color, Location};
use crate::goal::Goal;
use crate::level::Level;
use crate::problem::Problem;
use crate::vec2d::Vec2d;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserErr {
    /// Expected a section header, got something else (or nothing).
    Section(&'static str),
    UnknownColor(String),
    /// An agent or box nobody assigned a color to.
    NoColor(char),
    Pos(usize, usize),
    /// An actor on the outer ring, the level must be enclosed by walls.
    IncompleteBorder(usize, usize),
    MultipleAgents(char),
    NoAgent,
}

impl Display for ParserErr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            ParserErr::Section(name) => write!(f, "Expected section {}", name),
            ParserErr::UnknownColor(ref color) => write!(f, "Unknown color: {}", color),
            ParserErr::NoColor(id) => write!(f, "No color for {}", id),
            ParserErr::Pos(r, c) => write!(f, "Invalid cell at pos: [{}, {}]", r, c),
            ParserErr::IncompleteBorder(r, c) => {
                write!(f, "Level not enclosed by walls at pos: [{}, {}]", r, c)
            }
            ParserErr::MultipleAgents(id) => write!(f, "More than one agent {}", id),
            ParserErr::NoAgent => write!(f, "No agent"),
        }
    }
}

impl Error for ParserErr {}

pub(crate) fn parse(level: &str) -> Result<Problem, ParserErr> {
    let mut lines = level.lines();

    expect(&mut lines, "#domain")?;
    lines.next();
    expect(&mut lines, "#levelname")?;
    let name = lines.next().unwrap_or("").trim().to_string();
    expect(&mut lines, "#colors")?;
    let colors = parse_colors(&section(&mut lines))?;
    // section() consumed #initial
    let initial = section(&mut lines);
    let goal_rows = section(&mut lines);

    let (walls, agents, boxes) = parse_initial(&initial, &colors)?;
    let level = Level::new(walls);
    let goals = parse_goals(&goal_rows, &level, &colors)?;
    Ok(Problem::new(name, level, agents, boxes, goals))
}

fn expect(lines: &mut Lines<'_>, header: &'static str) -> Result<(), ParserErr> {
    match lines.next() {
        Some(line) if line.trim() == header => Ok(()),
        _ => Err(ParserErr::Section(header)),
    }
}

/// Lines up to (and consuming) the next header.
fn section<'a>(lines: &mut Lines<'a>) -> Vec<&'a str> {
    lines
        .by_ref()
        .map(|line| line.trim_end_matches('\r'))
        .take_while(|line| !line.starts_with('#'))
        .collect()
}

fn parse_colors(lines: &[&str]) -> Result<FnvHashMap<char, Color>, ParserErr> {
    let mut colors = FnvHashMap::default();
    for line in lines.iter().filter(|line| !line.trim().is_empty()) {
        let mut parts = line.splitn(2, ':');
        let color_name = parts.next().unwrap_or("").trim();
        let color: Color = color_name
            .parse()
            .map_err(|_| ParserErr::UnknownColor(color_name.to_string()))?;
        for entity in parts.next().unwrap_or("").split(',') {
            if let Some(id) = entity.trim().chars().next() {
                colors.insert(id, color);
            }
        }
    }
    Ok(colors)
}

fn color_of(colors: &FnvHashMap<char, Color>, id: char) -> Result<Color, ParserErr> {
    colors.get(&id).cloned().ok_or(ParserErr::NoColor(id))
}

fn parse_initial(
    lines: &[&str],
    colors: &FnvHashMap<char, Color>,
) -> Result<(Vec2d<bool>, Vec<Agent>, Vec<BoxActor>), ParserErr> {
    let rows = lines.len();
    let cols = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);

    let mut grid = Vec::with_capacity(rows);
    let mut agents: Vec<Agent> = Vec::new();
    let mut boxes = Vec::new();
    for (r, line) in lines.iter().enumerate() {
        let mut row = Vec::with_capacity(cols);
        for (c, cell) in line.chars().enumerate() {
            let on_border = r == 0 || c == 0 || r == rows - 1 || c == cols - 1;
            let loc = Location::new(r as i32, c as i32);
            match cell {
                '+' => row.push(true),
                // the outer ring is walled regardless
                ' ' => row.push(on_border),
                '0'..='9' | 'A'..='Z' if on_border => {
                    return Err(ParserErr::IncompleteBorder(r, c));
                }
                '0'..='9' => {
                    if agents.iter().any(|a| a.id() == cell) {
                        return Err(ParserErr::MultipleAgents(cell));
                    }
                    agents.push(Agent::new(cell, loc, color_of(colors, cell)?));
                    row.push(false);
                }
                'A'..='Z' => {
                    boxes.push(BoxActor::new(cell, loc, color_of(colors, cell)?));
                    row.push(false);
                }
                _ => return Err(ParserErr::Pos(r, c)),
            }
        }
        grid.push(row);
    }
    if agents.is_empty() {
        return Err(ParserErr::NoAgent);
    }
    // agent order is by digit, not by position
    agents.sort_by_key(|a| a.id());
    Ok((Vec2d::from_rows(&grid, true), agents, boxes))
}

fn parse_goals(
    lines: &[&str],
    level: &Level,
    colors: &FnvHashMap<char, Color>,
) -> Result<Vec<Goal>, ParserErr> {
    let mut goals = Vec::new();
    for (r, line) in lines.iter().enumerate() {
        for (c, cell) in line.chars().enumerate() {
            match cell {
                '0'..='9' | 'A'..='Z' => {
                    let loc = Location::new(r as i32, c as i32);
                    if level.is_wall(loc) {
                        return Err(ParserErr::Pos(r, c));
                    }
                    goals.push(Goal::new(cell, loc, color_of(colors, cell)?));
                }
                '+' | ' ' => {}
                _ => return Err(ParserErr::Pos(r, c)),
            }
        }
    }
    Ok(goals)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::Strategy;

    const TWO_COLORS: &str = r"#domain
hospital
#levelname
two colors
#colors
red: 0, A
blue: 1, B
#initial
+++++++
+1 A  +
+  B 0+
+++++++
#goal
+++++++
+ A  0+
+   B +
+++++++
#end
";

    #[test]
    fn parsing_actors_and_goals() {
        let problem = parse(TWO_COLORS).unwrap();
        assert_eq!(problem.name(), "two colors");
        assert_eq!(problem.strategy(), Strategy::BoxDelivery);

        let agents = problem.agents();
        assert_eq!(agents.len(), 2);
        // sorted by digit
        assert_eq!(agents[0].id(), '0');
        assert_eq!(agents[0].location(), Location::new(2, 5));
        assert_eq!(agents[0].color(), Color::Red);
        assert_eq!(agents[1].location(), Location::new(1, 1));
        assert_eq!(agents[1].color(), Color::Blue);

        let boxes = problem.boxes();
        assert_eq!(boxes[0].id(), 'A');
        assert_eq!(boxes[0].location(), Location::new(1, 3));
        assert_eq!(boxes[1].color(), Color::Blue);

        let goals: Vec<_> = problem.goals().iter().map(|g| (g.id(), g.location())).collect();
        assert_eq!(
            goals,
            vec![
                ('A', Location::new(1, 2)),
                ('0', Location::new(1, 5)),
                ('B', Location::new(2, 4)),
            ]
        );
    }

    #[test]
    fn open_border_cells_become_walls() {
        let problem = parse(
            r"#domain
hospital
#levelname
open
#colors
red: 0
#initial
++ ++
+0  +
+++++
#goal
++ ++
+  0+
+++++
#end
",
        )
        .unwrap();
        assert!(problem.level().is_wall(Location::new(0, 2)));
        assert_eq!(problem.strategy(), Strategy::AgentRace);
    }

    #[test]
    fn errors() {
        let on_border = TWO_COLORS.replace("+1 A  +", "1  A  +");
        assert_eq!(parse(&on_border).unwrap_err(), ParserErr::IncompleteBorder(1, 0));

        let colorless = TWO_COLORS.replace("blue: 1, B", "blue: 1");
        assert_eq!(parse(&colorless).unwrap_err(), ParserErr::NoColor('B'));

        let magenta = TWO_COLORS.replace("blue:", "magenta:");
        assert_eq!(
            parse(&magenta).unwrap_err(),
            ParserErr::UnknownColor("magenta".to_string())
        );

        let twice = TWO_COLORS.replace("+  B 0+", "+1 B 0+");
        assert_eq!(parse(&twice).unwrap_err(), ParserErr::MultipleAgents('1'));

        let junk = TWO_COLORS.replace("+  B 0+", "+ ?B 0+");
        assert_eq!(parse(&junk).unwrap_err(), ParserErr::Pos(2, 2));

        assert_eq!(parse("#levelname\n").unwrap_err(), ParserErr::Section("#domain"));
    }
}
