use thiserror::Error;
use crate::config::ConfigError;
use crate::report::ReportError;
use crate::storage::StorageError;
use crate::ward::lifecycle::ValidationError;

#[derive(Debug, Error)]
pub enum WardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Patient {0} is not active")]
    NotActive(String),
    #[error("No patient with MRN {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WardError {
    /// Validation failures are reported verbatim; everything else collapses
    /// into the operation's generic failure notice.
    pub fn is_validation(&self) -> bool {
        matches!(self, WardError::Validation(_))
    }
}
