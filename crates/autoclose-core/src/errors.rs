use std::path::PathBuf;

/// Core error type for AutoClose.
///
/// Adapter crates map their specific errors into this type so the core can
/// log failures consistently without knowing about the transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "corrupt state file {path}: {reason} (delete the file to start with an empty state)"
    )]
    CorruptState { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
