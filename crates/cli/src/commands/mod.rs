//! Subcommand implementations

pub mod convert;
pub mod energy;
pub mod predict;
