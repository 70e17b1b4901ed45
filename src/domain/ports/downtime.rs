use async_trait::async_trait;

use crate::domain::ports::errors::DowntimeError;

/// Port muting monitoring for a stack while it is being migrated
#[async_trait]
pub trait DowntimeScheduler: Send + Sync {
    async fn add(&self, stack: &str, ticket: &str) -> Result<(), DowntimeError>;

    async fn remove(&self, stack: &str, ticket: &str) -> Result<(), DowntimeError>;
}

/// Scheduler used when downtime handling is skipped
pub struct NoopDowntime;

#[async_trait]
impl DowntimeScheduler for NoopDowntime {
    async fn add(&self, stack: &str, _ticket: &str) -> Result<(), DowntimeError> {
        tracing::debug!(stack, "downtime skipped");
        Ok(())
    }

    async fn remove(&self, stack: &str, _ticket: &str) -> Result<(), DowntimeError> {
        tracing::debug!(stack, "downtime skipped");
        Ok(())
    }
}
