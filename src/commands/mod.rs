//! Subcommand implementations

pub mod run;
pub mod segments;
pub mod sweep;
