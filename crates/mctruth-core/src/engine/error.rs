use super::config::ConfigError;
use thiserror::Error;

/// The number of groups emitted by a realignment pass does not match the
/// number of tracks in the kinematics tree.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error(
    "Number of track reference groups ({actual}) differs from the number of tracks in the kinematics tree ({expected})"
)]
pub struct DataIntegrityError {
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Integrity(#[from] DataIntegrityError),

    #[error("Invalid realignment configuration: {0}")]
    Config(#[from] ConfigError),
}
