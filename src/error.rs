//! Error types for oplog-sync.
//!
//! Validation defects are not errors and never appear here; they travel on
//! the stage's defect channel.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Configuration that would make the stage unable to run.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stages spawn their run loop onto the ambient tokio runtime.
    #[error("Validator stage must be started from within a tokio runtime")]
    NoRuntime,

    /// Configuration text could not be parsed.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// The stage task was aborted before producing a summary.
    #[error("Stage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
