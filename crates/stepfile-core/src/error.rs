//! Error types for stepfile core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid environment entry {0:?}: expected KEY=VALUE")]
    InvalidEnvEntry(String),
}

pub type Result<T> = std::result::Result<T, Error>;
