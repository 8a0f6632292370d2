//! narvald - the narval launcher
//!
//! Wires a game adapter to the outside world:
//! - Launch orchestration (prepare, start, relay events)
//! - Notification sinks (chat webhook or the log)
//! - Public address resolution for the "ready" announcement

mod address;
mod launch;
mod notify;

pub use address::*;
pub use launch::*;
pub use notify::*;
