//! Submits proposals to the spec store and waits on the approval workflow.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::{MigrationError, MigrationResult};
use crate::domain::models::{
    ApprovalState, ChangeProposal, HistoryEntry, ProposalReceipt, SpecDocument,
};
use crate::domain::ports::{SpecStore, SpecStoreError};

/// What the latest history entry says about a submitted proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalCheck {
    Accepted,
    Waiting,
    Rejected(String),
}

/// Classify the latest history entry against the version a proposal was built from.
pub fn check_approval(latest: &HistoryEntry, base_version: u64) -> ApprovalCheck {
    let expected = base_version + 1;
    if latest.version == expected {
        return match &latest.approval_state {
            state if state.is_accepted() => ApprovalCheck::Accepted,
            ApprovalState::Rejected => {
                ApprovalCheck::Rejected(format!("version {expected} was rejected"))
            }
            _ => ApprovalCheck::Waiting,
        };
    }
    if latest.version == base_version {
        return ApprovalCheck::Rejected(format!(
            "history still ends at version {base_version}; the change was likely rejected"
        ));
    }
    ApprovalCheck::Rejected(format!(
        "unexpected version {} in history, expected {expected}",
        latest.version
    ))
}

pub struct ChangeController {
    store: Arc<dyn SpecStore>,
    approval_interval: Duration,
}

impl ChangeController {
    pub fn new(store: Arc<dyn SpecStore>, approval_interval: Duration) -> Self {
        Self {
            store,
            approval_interval,
        }
    }

    async fn latest_entry(&self, stack: &str) -> MigrationResult<HistoryEntry> {
        let history = self.store.history(stack).await?;
        history
            .into_iter()
            .last()
            .ok_or_else(|| SpecStoreError::EmptyHistory(stack.to_string()).into())
    }

    /// Fail when the stack already has a change awaiting review.
    pub async fn ensure_no_pending(&self, stack: &str) -> MigrationResult<()> {
        let latest = self.latest_entry(stack).await?;
        if latest.approval_state.is_accepted() {
            Ok(())
        } else {
            Err(MigrationError::validation(format!(
                "version {} is in state '{}'; the pending change must be reviewed first",
                latest.version,
                String::from(latest.approval_state)
            )))
        }
    }

    /// Submit `proposal`, block until it is approved, then return the freshly
    /// fetched document.
    pub async fn submit_and_await(
        &self,
        stack: &str,
        proposal: &ChangeProposal,
    ) -> MigrationResult<SpecDocument> {
        let base_version = proposal.document().version;
        tracing::info!(stack, base_version, reason = proposal.reason(), "submitting change");

        if let ProposalReceipt::Rejected(output) = self.store.propose(stack, proposal).await? {
            return Err(MigrationError::rejected(format!(
                "spec store refused the update: {output}"
            )));
        }

        let mut checks: u32 = 0;
        loop {
            let latest = self.latest_entry(stack).await?;
            checks += 1;
            match check_approval(&latest, base_version) {
                ApprovalCheck::Accepted => {
                    tracing::info!(stack, version = latest.version, checks, "change approved");
                    break;
                }
                ApprovalCheck::Rejected(reason) => {
                    tracing::warn!(stack, %reason, "change rejected");
                    return Err(MigrationError::rejected(reason));
                }
                ApprovalCheck::Waiting => {
                    tracing::info!(
                        stack,
                        version = latest.version,
                        state = ?latest.approval_state,
                        "waiting for change approval"
                    );
                    tokio::time::sleep(self.approval_interval).await;
                }
            }
        }

        Ok(self.store.fetch(stack).await?)
    }
}
