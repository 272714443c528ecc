//! error types for voom

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoomError {
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("invalid vCenter URL {url}: {msg}")]
    InvalidUrl { url: String, msg: String },

    #[error("request to {path} failed with HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode inventory: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("retrieval task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to read inventory: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VoomError>;
