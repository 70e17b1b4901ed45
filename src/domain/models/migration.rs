//! Migration state machine, request, and reported outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use super::environment::Environment;
use super::outcome::OutcomeSet;

/// Label that selects every active search-head role.
pub const ALL_TARGETS: &str = "all";

/// States of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Validating,
    AlreadyMigrated,
    Mutating,
    AwaitingApproval,
    Triggering,
    Polling,
    Converged,
    PartiallyFailed,
    RollingBack,
    AwaitingRollbackApproval,
    ConfirmingRollback,
    ClearingWindow,
    AwaitingFinalApproval,
    Done,
    RolledBack,
    Aborted,
}

impl MigrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::AlreadyMigrated => "already_migrated",
            Self::Mutating => "mutating",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Triggering => "triggering",
            Self::Polling => "polling",
            Self::Converged => "converged",
            Self::PartiallyFailed => "partially_failed",
            Self::RollingBack => "rolling_back",
            Self::AwaitingRollbackApproval => "awaiting_rollback_approval",
            Self::ConfirmingRollback => "confirming_rollback",
            Self::ClearingWindow => "clearing_window",
            Self::AwaitingFinalApproval => "awaiting_final_approval",
            Self::Done => "done",
            Self::RolledBack => "rolled_back",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AlreadyMigrated | Self::Done | Self::RolledBack | Self::Aborted
        )
    }

    /// Whether a change has been committed to the spec store in this state.
    pub fn is_post_commit(&self) -> bool {
        !matches!(
            self,
            Self::Validating | Self::AlreadyMigrated | Self::Mutating | Self::AwaitingApproval
        )
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        use MigrationState::{
            AlreadyMigrated, Aborted, AwaitingApproval, AwaitingFinalApproval,
            AwaitingRollbackApproval, ClearingWindow, ConfirmingRollback, Converged, Done,
            Mutating, PartiallyFailed, Polling, RolledBack, RollingBack, Triggering, Validating,
        };
        if next == Aborted {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Validating, AlreadyMigrated | Mutating)
                | (Mutating, AwaitingApproval)
                | (AwaitingApproval, Triggering)
                | (Triggering, Polling)
                | (Polling, Converged | PartiallyFailed)
                | (Converged, ClearingWindow | RollingBack)
                | (PartiallyFailed, RollingBack)
                | (RollingBack, AwaitingRollbackApproval)
                | (AwaitingRollbackApproval, ConfirmingRollback)
                | (ConfirmingRollback, ClearingWindow)
                | (ClearingWindow, AwaitingFinalApproval)
                | (AwaitingFinalApproval, Done | RolledBack)
        )
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded hop of the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: MigrationState,
    pub to: MigrationState,
    pub at: DateTime<Utc>,
}

/// Which roles a run addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSelection {
    All,
    Named(BTreeSet<String>),
}

impl TargetSelection {
    /// `all` anywhere in the list, or an empty list, selects everything.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        if names.is_empty() || names.contains(ALL_TARGETS) {
            Self::All
        } else {
            Self::Named(names)
        }
    }

    pub fn includes(&self, role: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.contains(role),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Input of one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRequest {
    pub stack: String,
    pub ticket: String,
    pub environment: Environment,
    pub targets: TargetSelection,
    pub skip_downtime: bool,
}

/// Terminal result of a run that did not abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Nothing to do; no mutation was submitted.
    AlreadyMigrated,
    Converged,
    /// At least one host failed; spec and fleet were returned to the original state.
    RolledBack { failed_hosts: Vec<String> },
}

impl MigrationOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AlreadyMigrated | Self::Converged => 0,
            Self::RolledBack { .. } => 2,
        }
    }
}

/// What a finished run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub run_id: uuid::Uuid,
    pub stack: String,
    pub outcome: MigrationOutcome,
    pub trail: Vec<StateTransition>,
    /// Per-host results of the completion polling stage, when it ran.
    pub host_outcomes: Option<OutcomeSet>,
    pub changed_roles: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}
