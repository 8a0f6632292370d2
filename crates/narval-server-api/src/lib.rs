//! Game server capability interface for narval
//!
//! This crate defines the capability set between the launcher and a
//! game-specific adapter. New games are supported by implementing
//! [`Server`]; the launcher never changes. It contains no game code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
