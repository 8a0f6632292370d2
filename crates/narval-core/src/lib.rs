//! Launcher core for narval
//!
//! This crate contains the game-independent pieces of a server run:
//! - Parallel job runner (fan-out/fan-in for artifact preparation)
//! - Streaming `.tar.xz` extraction onto a local directory tree
//! - Session clock (player roster, idle shutdown, max session cap)
//!
//! All lifecycle enforcement uses monotonic time.

mod extract;
mod jobs;
mod lifecycle;

pub use extract::*;
pub use jobs::*;
pub use lifecycle::*;
