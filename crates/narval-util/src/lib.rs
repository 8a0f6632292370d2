//! Shared utilities for narval
//!
//! This crate provides:
//! - Time utilities (monotonic deadlines, wall-clock formatting)
//! - Default paths for the config file and the local game directory

mod paths;
mod time;

pub use paths::*;
pub use time::*;
