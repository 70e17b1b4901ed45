use thiserror::Error;

/// Spec store operation errors
#[derive(Debug, Error)]
pub enum SpecStoreError {
    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Spec history is empty for stack {0}")]
    EmptyHistory(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpecStoreError {
    /// Whether retrying the same read may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CommandFailed(_) | Self::Io(_))
    }
}

/// Fleet resolution errors
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Inventory command failed: {0}")]
    CommandFailed(String),

    #[error("Invalid inventory response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote execution errors. All of them count as a non-success outcome.
#[derive(Debug, Error)]
pub enum RemoteProbeError {
    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Failed to spawn remote command: {0}")]
    Spawn(String),

    #[error("Remote command terminated without exit code")]
    Terminated,
}

/// Downtime scheduling errors
#[derive(Debug, Error)]
pub enum DowntimeError {
    #[error("Downtime command failed: {0}")]
    CommandFailed(String),

    #[error("Downtime command timed out after {0}s")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
