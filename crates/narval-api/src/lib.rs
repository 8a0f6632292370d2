//! Shared types for narval
//!
//! This crate defines the data that flows between a game adapter and the
//! launcher:
//! - Parsed subprocess output lines and their event kinds
//! - Player identities
//! - Per-run server settings (distribution version and lifecycle timers)

mod events;
mod types;

pub use events::*;
pub use types::*;
