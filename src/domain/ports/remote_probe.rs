use async_trait::async_trait;
use std::time::Duration;

use crate::domain::models::HostHandle;
use crate::domain::ports::errors::RemoteProbeError;

/// How a remote command is run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Wait for the exit code, discard output.
    ExitCode,
    /// Wait for the exit code and capture stdout/stderr.
    Capture,
    /// Detach stdio and wait (with the long trigger timeout) for the exit code.
    Background,
}

/// Result of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn code(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Port for executing commands on fleet hosts
#[async_trait]
pub trait RemoteProbe: Send + Sync {
    async fn exec(
        &self,
        host: &HostHandle,
        command: &str,
        mode: ExecMode,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteProbeError>;
}
