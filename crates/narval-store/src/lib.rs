//! Artifact store for narval
//!
//! Provides:
//! - A prefix-scoped object namespace (list / get / put)
//! - S3-backed storage for real deployments
//! - Directory-backed storage for local runs and tests
//!
//! A read of a missing key is a normal `None`, never an error: most state
//! files are legitimately absent on a first run.

mod dir;
mod s3;
mod traits;

pub use dir::*;
pub use s3::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
