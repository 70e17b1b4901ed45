use async_trait::async_trait;

use crate::domain::models::DowntimeConfig;
use crate::domain::ports::{DowntimeError, DowntimeScheduler};
use crate::infrastructure::command::{combined_output, run_captured};

/// `DowntimeScheduler` that runs configured argument vectors.
///
/// A zero exit status is success. So is output containing the not-enrolled
/// marker, since there is nothing to mute for such a stack.
pub struct CommandDowntime {
    config: DowntimeConfig,
    user: String,
}

impl CommandDowntime {
    pub fn new(config: DowntimeConfig, user: impl Into<String>) -> Self {
        Self {
            config,
            user: user.into(),
        }
    }

    fn expand(&self, template: &[String], stack: &str, ticket: &str) -> Vec<String> {
        template
            .iter()
            .map(|arg| {
                arg.replace("{stack}", stack)
                    .replace("{ticket}", ticket)
                    .replace("{user}", &self.user)
            })
            .collect()
    }

    async fn run(
        &self,
        action: &str,
        template: &[String],
        stack: &str,
        ticket: &str,
    ) -> Result<(), DowntimeError> {
        let argv = self.expand(template, stack, ticket);
        let Some((program, args)) = argv.split_first() else {
            tracing::debug!(stack, action, "no downtime command configured");
            return Ok(());
        };

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args);
        let timeout = self.config.timeout();
        let output = tokio::time::timeout(timeout, run_captured(cmd, None))
            .await
            .map_err(|_| {
                tracing::warn!(stack, action, ?timeout, "downtime command timed out");
                DowntimeError::Timeout(timeout.as_secs())
            })??;
        let text = combined_output(&output);

        if output.status.success() {
            tracing::info!(stack, action, "downtime updated");
            Ok(())
        } else if !self.config.not_enrolled_marker.is_empty()
            && text.contains(&self.config.not_enrolled_marker)
        {
            tracing::info!(stack, action, "stack is not enrolled in monitoring, skipping downtime");
            Ok(())
        } else {
            Err(DowntimeError::CommandFailed(format!(
                "{action} for {stack} exited with {}: {}",
                output.status,
                text.trim()
            )))
        }
    }
}

#[async_trait]
impl DowntimeScheduler for CommandDowntime {
    async fn add(&self, stack: &str, ticket: &str) -> Result<(), DowntimeError> {
        self.run("add", &self.config.add_command, stack, ticket).await
    }

    async fn remove(&self, stack: &str, ticket: &str) -> Result<(), DowntimeError> {
        self.run("remove", &self.config.remove_command, stack, ticket)
            .await
    }
}
