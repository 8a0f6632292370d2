//! Factorio adapter for narval
//!
//! Provides:
//! - Artifact preparation (game distribution and persistent state)
//! - Log parsing for the headless server's console output
//! - Process supervision with idle shutdown and a hard-kill fallback
//!
//! The adapter implements [`narval_server_api::Server`]; the launcher never
//! sees anything Factorio-specific.

mod layout;
mod parser;
mod prepare;
mod process;
mod server;

pub use layout::*;
pub use parser::*;
pub use prepare::*;
pub use process::*;
pub use server::*;
