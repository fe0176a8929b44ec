#![warn(clippy::pedantic)]
#![allow(clippy::similar_names, clippy::too_many_lines)]

pub mod collector;
pub mod config;
pub mod coord;
pub mod cubie;
pub mod moves;
pub mod pruning;
pub(crate) mod search;
pub mod solver;
pub mod sym;
pub mod tables;

pub use collector::{Solution, SolveStatus};
pub use config::{ConfigError, SolverConfig, TableCache};
pub use cubie::{CubieCube, InvalidCubeError};
pub use moves::{Face, LengthMetric, Metric, MoveSet};
pub use solver::{SolveError, SolveReport, Solver, SolverError};

#[macro_export]
macro_rules! start {
    ($msg:expr) => {
        concat!("⏳ ", $msg)
    };
}

#[macro_export]
macro_rules! working {
    ($msg:expr) => {
        concat!("🛠  ", $msg)
    };
}

#[macro_export]
macro_rules! success {
    ($msg:expr) => {
        concat!("✅ ", $msg)
    };
}
