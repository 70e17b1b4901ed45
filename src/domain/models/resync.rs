//! Exit-code taxonomy of the configuration-management re-run primitive.

use serde::{Deserialize, Serialize};

/// Decoded exit code of one resync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncOutcome {
    /// 0: already in the desired state.
    NoChanges,
    /// 1: failed to run, or another run is in progress.
    NotRun,
    /// 2: succeeded and changed resources.
    Changed,
    /// 4: succeeded but some resources failed.
    ResourceFailures,
    /// 6: changed resources and some failed.
    ChangedWithFailures,
    /// 255: host unreachable, most likely mid-migration.
    Unreachable,
    Unknown(i32),
}

/// What the poller does with a host after a resync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncDisposition {
    CheckCondition,
    Retry,
    /// Stop resyncing this host; it stays in the outcome accounting.
    Exclude,
}

impl ResyncOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => Self::NoChanges,
            1 => Self::NotRun,
            2 => Self::Changed,
            4 => Self::ResourceFailures,
            6 => Self::ChangedWithFailures,
            255 => Self::Unreachable,
            other => Self::Unknown(other),
        }
    }

    pub fn disposition(&self) -> ResyncDisposition {
        match self {
            Self::NoChanges | Self::Changed => ResyncDisposition::CheckCondition,
            Self::Unreachable => ResyncDisposition::Exclude,
            Self::NotRun | Self::ResourceFailures | Self::ChangedWithFailures | Self::Unknown(_) => {
                ResyncDisposition::Retry
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoChanges => 0,
            Self::NotRun => 1,
            Self::Changed => 2,
            Self::ResourceFailures => 4,
            Self::ChangedWithFailures => 6,
            Self::Unreachable => 255,
            Self::Unknown(code) => *code,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::NoChanges => "succeeded with no changes",
            Self::NotRun => "failed or another run is in progress",
            Self::Changed => "succeeded with changes",
            Self::ResourceFailures => "succeeded with some resource failures",
            Self::ChangedWithFailures => "succeeded with changes and failures",
            Self::Unreachable => "host unreachable",
            Self::Unknown(_) => "unknown exit code",
        }
    }
}
