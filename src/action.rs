use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use crate::data::{Dir, DIRECTIONS};

// Terminology:
// move = agent changes position, no box involved
// push = agent walks into the box's cell, the box moves ahead of it
// pull = agent walks away from the box, the box follows into the agent's old cell
//
// Pull's second direction is where the box currently is relative to the agent,
// so the box itself moves in the opposite direction.

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    NoOp,
    Move(Dir),
    Push(Dir, Dir),
    Pull(Dir, Dir),
}

impl Action {
    /// Every action an agent can possibly take, in enumeration order.
    pub fn vocabulary() -> Vec<Action> {
        let mut ret = vec![Action::NoOp];
        for &dir in &DIRECTIONS {
            ret.push(Action::Move(dir));
        }
        for &agent_dir in &DIRECTIONS {
            for &box_dir in &DIRECTIONS {
                // can't push the box back into the agent
                if box_dir != agent_dir.inverse() {
                    ret.push(Action::Push(agent_dir, box_dir));
                }
            }
        }
        for &agent_dir in &DIRECTIONS {
            for &box_dir in &DIRECTIONS {
                // the box can't be where the agent is going
                if box_dir != agent_dir {
                    ret.push(Action::Pull(agent_dir, box_dir));
                }
            }
        }
        ret
    }

    pub fn agent_delta(self) -> (i32, i32) {
        match self {
            Action::NoOp => (0, 0),
            Action::Move(dir) | Action::Push(dir, _) | Action::Pull(dir, _) => dir.delta(),
        }
    }

    /// How the manipulated box moves.
    pub fn box_delta(self) -> (i32, i32) {
        match self {
            Action::NoOp | Action::Move(_) => (0, 0),
            Action::Push(_, box_dir) => box_dir.delta(),
            Action::Pull(_, box_dir) => box_dir.inverse().delta(),
        }
    }

    pub fn is_noop(self) -> bool {
        self == Action::NoOp
    }

    pub fn moves_box(self) -> bool {
        match self {
            Action::Push(..) | Action::Pull(..) => true,
            _ => false,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Action::NoOp => write!(f, "NoOp"),
            Action::Move(dir) => write!(f, "Move({})", dir),
            Action::Push(agent_dir, box_dir) => write!(f, "Push({},{})", agent_dir, box_dir),
            Action::Pull(agent_dir, box_dir) => write!(f, "Pull({},{})", agent_dir, box_dir),
        }
    }
}

impl Debug for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionParseErr(pub String);

impl Display for ActionParseErr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown action: {}", self.0)
    }
}

impl std::error::Error for ActionParseErr {}

impl FromStr for Action {
    type Err = ActionParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ActionParseErr(s.to_string());
        if s == "NoOp" {
            return Ok(Action::NoOp);
        }

        let open = s.find('(').ok_or_else(err)?;
        if !s.ends_with(')') {
            return Err(err());
        }
        let name = &s[..open];
        let dirs = s[open + 1..s.len() - 1]
            .split(',')
            .map(|d| d.parse::<Dir>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| err())?;

        let action = match (name, dirs.as_slice()) {
            ("Move", &[dir]) => Action::Move(dir),
            ("Push", &[agent_dir, box_dir]) => Action::Push(agent_dir, box_dir),
            ("Pull", &[agent_dir, box_dir]) => Action::Pull(agent_dir, box_dir),
            _ => return Err(err()),
        };
        if Action::vocabulary().contains(&action) {
            Ok(action)
        } else {
            Err(err())
        }
    }
}

/// Timestep-major joint actions: one row per step, one column per agent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Plan(Vec<Vec<Action>>);

impl Plan {
    pub fn new(rows: Vec<Vec<Action>>) -> Self {
        Plan(rows)
    }

    /// Pads per-agent action logs with `NoOp` to equal length and transposes them into rows.
    pub fn assemble(logs: &[Vec<Action>]) -> Self {
        let len = logs.iter().map(Vec::len).max().unwrap_or(0);
        let mut rows = Vec::with_capacity(len);
        for step in 0..len {
            rows.push(
                logs.iter()
                    .map(|log| log.get(step).cloned().unwrap_or(Action::NoOp))
                    .collect(),
            );
        }
        Plan(rows)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn agent_cnt(&self) -> usize {
        self.0.first().map(Vec::len).unwrap_or(0)
    }

    pub fn rows(&self) -> &[Vec<Action>] {
        &self.0
    }

    /// Actions of one agent over the whole plan.
    pub fn column(&self, agent: usize) -> Vec<Action> {
        self.0.iter().map(|row| row[agent]).collect()
    }

    /// Drops trailing rows where nobody does anything.
    pub(crate) fn trim(&mut self) {
        while self
            .0
            .last()
            .map_or(false, |row| row.iter().all(|a| a.is_noop()))
        {
            self.0.pop();
        }
    }

    pub fn row_to_string(row: &[Action]) -> String {
        row.iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Vec<Action>;
    type IntoIter = ::std::slice::Iter<'a, Vec<Action>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for row in self {
            writeln!(f, "{}", Plan::row_to_string(row))?;
        }
        Ok(())
    }
}

impl Debug for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for Plan {
    type Err = ActionParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rows = Vec::new();
        for line in s.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let row = line
                .split(';')
                .map(str::parse)
                .collect::<Result<Vec<Action>, _>>()?;
            rows.push(row);
        }
        Ok(Plan(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::data::Dir::*;

    #[test]
    fn vocabulary_size() {
        let all = Action::vocabulary();
        // NoOp + 4 moves + 12 pushes + 12 pulls
        assert_eq!(all.len(), 29);
        assert!(!all.contains(&Action::Push(N, S)));
        assert!(!all.contains(&Action::Pull(N, N)));
        assert!(all.contains(&Action::Pull(N, S)));
    }

    #[test]
    fn deltas() {
        assert_eq!(Action::NoOp.agent_delta(), (0, 0));
        assert_eq!(Action::Move(W).agent_delta(), (0, -1));
        assert_eq!(Action::Push(E, S).agent_delta(), (0, 1));
        assert_eq!(Action::Push(E, S).box_delta(), (1, 0));
        // box is south of the agent and follows it north
        assert_eq!(Action::Pull(N, S).box_delta(), (-1, 0));
        assert_eq!(Action::Pull(N, E).box_delta(), (0, -1));
    }

    #[test]
    fn formatting_and_parsing() {
        for &action in &Action::vocabulary() {
            let text = action.to_string();
            assert_eq!(text.parse::<Action>(), Ok(action));
        }
        assert_eq!(Action::Push(E, E).to_string(), "Push(E,E)");
        assert_eq!(Action::Move(N).to_string(), "Move(N)");
        assert!("Push(N,S)".parse::<Action>().is_err());
        assert!("Jump(N)".parse::<Action>().is_err());
        assert!("Move(N".parse::<Action>().is_err());
    }

    #[test]
    fn assembling_pads_with_noops() {
        let logs = vec![
            vec![Action::Move(E), Action::Move(E), Action::Move(S)],
            vec![Action::Move(W)],
            vec![],
        ];
        let plan = Plan::assemble(&logs);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.agent_cnt(), 3);
        for row in &plan {
            assert_eq!(row.len(), 3);
        }
        assert_eq!(plan.column(1), vec![Action::Move(W), Action::NoOp, Action::NoOp]);
        assert_eq!(
            plan.to_string(),
            "Move(E);Move(W);NoOp\nMove(E);NoOp;NoOp\nMove(S);NoOp;NoOp\n"
        );
        assert_eq!(plan.to_string().parse(), Ok(plan));
    }

    #[test]
    fn trimming_idle_rows() {
        let mut plan = Plan::new(vec![
            vec![Action::NoOp, Action::Move(E)],
            vec![Action::NoOp, Action::NoOp],
            vec![Action::NoOp, Action::NoOp],
        ]);
        plan.trim();
        assert_eq!(plan.len(), 1);
    }
}
