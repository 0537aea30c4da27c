//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced directly to the operator.
///
/// Most internal failures travel as `anyhow::Error` with context; these
/// variants exist where the command layer itself detects the problem and
/// the wording matters for the terminal user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("configuration is invalid: {}", path.display())]
    ConfigInvalid { path: PathBuf },

    #[error("replay log not found: {}", path.display())]
    ReplayNotFound { path: PathBuf },
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_invalid(path: impl Into<PathBuf>) -> Self {
        Self::ConfigInvalid { path: path.into() }
    }

    pub fn replay_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ReplayNotFound { path: path.into() }
    }
}
