// Opt in to warnings about new 2018 idioms
#![warn(rust_2018_idioms)]
// Additional warnings that are allow by default (`rustc -W help`)
#![warn(missing_debug_implementations)]
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]
#![warn(unused)]
// Clippy
#![allow(unknown_lints)] // necessary because rustc doesn't know about clippy
#![warn(clippy::all)]

pub mod action;
pub mod actor;
pub mod config;
pub mod data;
pub mod desire;
pub mod formatter;
pub mod fs;
pub mod goal;
pub mod level;
pub mod planner;
pub mod problem;

mod parser;
mod vec2d;

use std::error::Error;

use crate::config::Config;
use crate::planner::{PlannerErr, PlannerOk};
use crate::problem::Problem;

pub use crate::parser::ParserErr;

pub trait LoadLevel {
    fn load_level(&self) -> Result<Problem, Box<dyn Error>>;
}

impl LoadLevel for str {
    fn load_level(&self) -> Result<Problem, Box<dyn Error>> {
        let text = fs::read_file(self)?;
        Ok(text.parse::<Problem>()?)
    }
}

pub trait Solve {
    fn solve(&self, config: Config) -> Result<PlannerOk, PlannerErr>;
}
