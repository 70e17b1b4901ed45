//! Change proposals and the approval history observed from the spec store.

use serde::{Deserialize, Serialize};

use super::spec_document::SpecDocument;

/// Suffix appended to every proposal reason so reviewers can spot automation.
pub const REASON_SUFFIX: &str = "(GENERATED BY KV-MIGRATION AUTOMATION)";

/// A document snapshot submitted for approval. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeProposal {
    document: SpecDocument,
    reason: String,
    submitted_by: String,
}

impl ChangeProposal {
    /// Build a proposal whose reason reads `"{ticket} {message} (GENERATED ...)"`.
    pub fn new(
        document: SpecDocument,
        ticket: &str,
        message: &str,
        submitted_by: impl Into<String>,
    ) -> Self {
        Self {
            document,
            reason: format!("{ticket} {message} {REASON_SUFFIX}"),
            submitted_by: submitted_by.into(),
        }
    }

    pub fn document(&self) -> &SpecDocument {
        &self.document
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn submitted_by(&self) -> &str {
        &self.submitted_by
    }

    /// The version the store assigns once this proposal is accepted.
    pub fn expected_version(&self) -> u64 {
        self.document.version + 1
    }
}

/// Immediate answer of the store to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalReceipt {
    Accepted,
    Rejected(String),
}

/// Approval state of a history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApprovalState {
    Approved,
    /// Empty state string, reported by stores without an approval gate.
    Unset,
    Rejected,
    Other(String),
}

impl ApprovalState {
    /// `Approved` and the empty state both count as accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Approved | Self::Unset)
    }
}

impl From<String> for ApprovalState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Approved" => Self::Approved,
            "" => Self::Unset,
            "Rejected" => Self::Rejected,
            _ => Self::Other(value),
        }
    }
}

impl From<ApprovalState> for String {
    fn from(value: ApprovalState) -> Self {
        match value {
            ApprovalState::Approved => "Approved".to_string(),
            ApprovalState::Unset => String::new(),
            ApprovalState::Rejected => "Rejected".to_string(),
            ApprovalState::Other(other) => other,
        }
    }
}

/// One entry of a stack's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub version: u64,
    #[serde(rename = "state", default = "unset_state")]
    pub approval_state: ApprovalState,
}

fn unset_state() -> ApprovalState {
    ApprovalState::Unset
}

impl HistoryEntry {
    pub fn new(version: u64, approval_state: ApprovalState) -> Self {
        Self {
            version,
            approval_state,
        }
    }
}
