//! Error taxonomy of a migration run.

use thiserror::Error;

use super::models::{MigrationState, StateTransition};
use super::ports::errors::{DowntimeError, FleetError, SpecStoreError};

/// Errors that end an orchestration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A precondition is unmet. Nothing has been committed.
    #[error("Validation failed: {0}")]
    FatalValidation(String),

    /// The approval workflow rejected the change or reported an inconsistent version.
    #[error("Change rejected: {0}")]
    ChangeRejected(String),

    /// A bounded polling stage ran out of rounds.
    #[error("Convergence timeout during {stage}: unresolved hosts [{}]", .unresolved.join(", "))]
    ConvergenceTimeout { stage: String, unresolved: Vec<String> },

    /// The compensating rollback itself failed; the stack may be in neither
    /// the original nor the target state.
    #[error("Rollback after {trigger} failed: {source}")]
    RollbackFailed {
        trigger: String,
        source: Box<MigrationError>,
    },

    #[error("Spec store error: {0}")]
    SpecStore(#[from] SpecStoreError),

    #[error("Fleet resolution error: {0}")]
    Fleet(#[from] FleetError),

    #[error("Downtime scheduling error: {0}")]
    Downtime(#[from] DowntimeError),
}

pub type MigrationResult<T> = Result<T, MigrationError>;

impl MigrationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::FatalValidation(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::ChangeRejected(message.into())
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FatalValidation(_) => 1,
            Self::ChangeRejected(_) => 3,
            Self::ConvergenceTimeout { .. } => 4,
            Self::RollbackFailed { .. } => 5,
            Self::SpecStore(_) | Self::Fleet(_) | Self::Downtime(_) => 6,
        }
    }

    /// Short category name for banners and structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::FatalValidation(_) => "fatal_validation",
            Self::ChangeRejected(_) => "change_rejected",
            Self::ConvergenceTimeout { .. } => "convergence_timeout",
            Self::RollbackFailed { .. } => "rollback_failed",
            Self::SpecStore(_) => "spec_store",
            Self::Fleet(_) => "fleet",
            Self::Downtime(_) => "downtime",
        }
    }
}

/// A failed run together with the transitions it went through.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct MigrationAbort {
    #[source]
    pub error: MigrationError,
    /// State the run was in when it failed.
    pub failed_in: MigrationState,
    pub trail: Vec<StateTransition>,
    /// Downtime was added by this run and is still in place.
    pub downtime_active: bool,
}

impl MigrationAbort {
    pub fn exit_code(&self) -> i32 {
        self.error.exit_code()
    }

    /// Whether anything had been committed to the spec store before the failure.
    pub fn committed(&self) -> bool {
        self.trail
            .iter()
            .any(|t| t.to.is_post_commit() && t.to != MigrationState::Aborted)
    }
}
