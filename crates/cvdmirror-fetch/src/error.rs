//! Error types for cvdmirror-fetch.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mirror returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("no reachable mirror among {count} candidates")]
    NoMirror { count: usize },
}

impl FetchError {
    /// Short machine-friendly kind for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Status { .. } => "status",
            FetchError::NoMirror { .. } => "no_mirror",
        }
    }
}
