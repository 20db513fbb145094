use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds that degrade a cycle instead of aborting the process.
///
/// Anything outside this set travels as a plain `anyhow::Error` and is
/// treated as fatal by `main`.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Network error, timeout, non-2xx response or unreadable source file.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// The expected server heading or member table is missing.
    #[error("page layout not recognised: {0}")]
    Parse(String),
    #[error("state file {path} is corrupt: {reason}")]
    StateCorrupt { path: PathBuf, reason: String },
    /// The webhook rejected the payload or could not be reached.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl TrackerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Parse(_) => "parse",
            Self::StateCorrupt { .. } => "state-corrupt",
            Self::Delivery(_) => "delivery",
        }
    }
}
