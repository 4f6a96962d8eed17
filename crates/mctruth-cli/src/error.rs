use mctruth::core::io::store::StoreError;
use mctruth::core::io::trackrefs::TrackRefsFileError;
use mctruth::engine::config::ConfigError;
use mctruth::workflows::event_handler::EventError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to write file '{path}': {source}", path = path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: TrackRefsFileError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}
