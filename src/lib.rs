//! Breakout Sweep
//!
//! Single-asset breakout / trailing-stop strategy simulation with an
//! exhaustive, parallel parameter sweep over the strategy's five knobs.

pub mod backtest;
pub mod chart;
pub mod config;
pub mod data;
pub mod error;
pub mod grid;
pub mod indicators;
pub mod optimizer;
pub mod report;
pub mod segments;
pub mod types;

pub use backtest::{SimulationOptions, Simulator};
pub use config::SweepConfig;
pub use error::SweepError;
pub use types::*;
