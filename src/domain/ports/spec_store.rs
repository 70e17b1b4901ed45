use async_trait::async_trait;

use crate::domain::models::{ChangeProposal, HistoryEntry, ProposalReceipt, SpecDocument};
use crate::domain::ports::errors::SpecStoreError;

/// Port for the external, versioned stack specification store
#[async_trait]
pub trait SpecStore: Send + Sync {
    /// Fetch the current document for a stack
    async fn fetch(&self, stack: &str) -> Result<SpecDocument, SpecStoreError>;

    /// Submit a proposal for approval
    async fn propose(
        &self,
        stack: &str,
        proposal: &ChangeProposal,
    ) -> Result<ProposalReceipt, SpecStoreError>;

    /// Version history, oldest first
    async fn history(&self, stack: &str) -> Result<Vec<HistoryEntry>, SpecStoreError>;
}
