// src/error.rs
//
// Error taxonomy for a gmail-headline run.
// Stages return these; only main decides the exit status.

use std::fmt;
use std::path::PathBuf;

/// The pipeline stage a remote failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieve,
    MarkRead,
    Delete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Retrieve => "retrieve",
            Stage::MarkRead => "mark-read",
            Stage::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Failure talking to the remote mail store.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("transport failure calling {url}: {message}")]
    Transport { url: String, message: String },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// True for failures worth retrying on an idempotent request.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Transport { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("output sink {} unavailable: {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage failed: {source}")]
    Remote {
        stage: Stage,
        #[source]
        source: RemoteError,
    },
}

impl Error {
    pub fn remote(stage: Stage, source: RemoteError) -> Self {
        Error::Remote { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
