use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::domain::models::{HostHandle, RemoteConfig};
use crate::domain::ports::{ExecMode, ExecOutput, RemoteProbe, RemoteProbeError};
use crate::infrastructure::command::program_command;

/// `RemoteProbe` that runs `{program} ssh HOST --team TEAM --command CMD`.
///
/// The transport's own exit code is reported unchanged, so a connection
/// failure surfaces as 255. Timed-out commands are killed.
pub struct SftRemoteProbe {
    config: RemoteConfig,
}

impl SftRemoteProbe {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    fn build(&self, host: &HostHandle, command: &str) -> Result<Command, RemoteProbeError> {
        let mut cmd = program_command(&self.config.program)
            .map_err(|e| RemoteProbeError::Spawn(e.to_string()))?;
        cmd.arg("ssh")
            .arg(&host.address)
            .arg("--team")
            .arg(self.config.team_for(host.environment))
            .arg("--command")
            .arg(command)
            .kill_on_drop(true);
        Ok(cmd)
    }
}

#[async_trait]
impl RemoteProbe for SftRemoteProbe {
    async fn exec(
        &self,
        host: &HostHandle,
        command: &str,
        mode: ExecMode,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteProbeError> {
        let mut cmd = self.build(host, command)?;
        cmd.stdin(Stdio::null());
        match mode {
            ExecMode::Background => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
            ExecMode::ExitCode | ExecMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }

        let child = cmd
            .spawn()
            .map_err(|e| RemoteProbeError::Spawn(format!("{}: {e}", self.config.program)))?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::debug!(host = %host.label, ?timeout, "remote command timed out");
                RemoteProbeError::Timeout(timeout.as_secs())
            })?
            .map_err(|e| RemoteProbeError::Spawn(e.to_string()))?;

        let exit_code = output.status.code().ok_or(RemoteProbeError::Terminated)?;
        let (stdout, stderr) = if mode == ExecMode::Capture {
            (
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            )
        } else {
            (String::new(), String::new())
        };

        tracing::trace!(host = %host.label, code = exit_code, ?mode, "remote command finished");
        Ok(ExecOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}
