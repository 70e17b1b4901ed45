use async_trait::async_trait;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::process::Output;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::domain::models::{
    ChangeProposal, CloudctlConfig, Environment, HistoryEntry, ProposalReceipt, SpecDocument,
};
use crate::domain::ports::{SpecStore, SpecStoreError};
use crate::infrastructure::command::{combined_output, program_command, run_captured};

/// Text `stacks update` prints when a proposal entered the approval workflow.
const ACCEPTED_MARKER: &str = "Update has been requested for";

/// `SpecStore` backed by `cloudctl stacks {get,update,history}`.
///
/// The CLI context is switched to the run's environment once, before the
/// first call. Reads retry transient failures with exponential backoff;
/// updates are never retried.
pub struct CloudctlSpecStore {
    program: String,
    environment: Environment,
    read_retry: Duration,
    context: OnceCell<()>,
}

impl CloudctlSpecStore {
    pub fn new(config: &CloudctlConfig, environment: Environment) -> Self {
        Self {
            program: config.program.clone(),
            environment,
            read_retry: Duration::from_secs(config.read_retry_secs),
            context: OnceCell::new(),
        }
    }

    async fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<Output, SpecStoreError> {
        let mut cmd = program_command(&self.program)?;
        cmd.args(args);
        tracing::debug!(program = %self.program, ?args, "running spec store command");
        Ok(run_captured(cmd, stdin).await?)
    }

    async fn ensure_context(&self) -> Result<(), SpecStoreError> {
        self.context
            .get_or_try_init(|| async {
                let context = self.environment.store_context();
                let output = self.run(&["config", "use", context], None).await?;
                if !output.status.success() {
                    return Err(SpecStoreError::CommandFailed(format!(
                        "cannot switch to context {context}: {}",
                        combined_output(&output).trim()
                    )));
                }
                tracing::debug!(context, "spec store context selected");
                Ok(())
            })
            .await
            .map(|_| ())
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &str,
        stack: &str,
        mut op: F,
    ) -> Result<T, SpecStoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SpecStoreError>>,
    {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.read_retry),
            ..ExponentialBackoff::default()
        };
        backoff::future::retry_notify(
            policy,
            || {
                let attempt = op();
                async move {
                    attempt.await.map_err(|e| {
                        if e.is_transient() {
                            backoff::Error::transient(e)
                        } else {
                            backoff::Error::permanent(e)
                        }
                    })
                }
            },
            |err: SpecStoreError, wait: Duration| {
                tracing::warn!(
                    operation,
                    stack,
                    error = %err,
                    ?wait,
                    "spec store read failed, retrying"
                );
            },
        )
        .await
    }

    async fn fetch_once(&self, stack: &str) -> Result<SpecDocument, SpecStoreError> {
        let output = self.run(&["stacks", "get", stack, "-o", "json"], None).await?;
        if !output.status.success() {
            let text = combined_output(&output);
            if text.to_lowercase().contains("not found") {
                return Err(SpecStoreError::StackNotFound(stack.to_string()));
            }
            return Err(SpecStoreError::CommandFailed(text.trim().to_string()));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    async fn history_once(&self, stack: &str) -> Result<Vec<HistoryEntry>, SpecStoreError> {
        let output = self
            .run(&["stacks", "history", stack, "-o", "json"], None)
            .await?;
        if !output.status.success() {
            return Err(SpecStoreError::CommandFailed(
                combined_output(&output).trim().to_string(),
            ));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| SpecStoreError::InvalidResponse(format!("history for {stack}: {e}")))
    }
}

#[async_trait]
impl SpecStore for CloudctlSpecStore {
    async fn fetch(&self, stack: &str) -> Result<SpecDocument, SpecStoreError> {
        self.ensure_context().await?;
        self.with_retry("fetch", stack, || self.fetch_once(stack)).await
    }

    async fn propose(
        &self,
        stack: &str,
        proposal: &ChangeProposal,
    ) -> Result<ProposalReceipt, SpecStoreError> {
        self.ensure_context().await?;
        let body = serde_json::to_vec(proposal.document())?;
        let output = self
            .run(
                &["stacks", "update", stack, "--reason", proposal.reason(), "-f", "-"],
                Some(&body),
            )
            .await?;

        let text = combined_output(&output);
        if text.contains(ACCEPTED_MARKER) {
            tracing::info!(stack, submitted_by = proposal.submitted_by(), "update requested");
            Ok(ProposalReceipt::Accepted)
        } else {
            Ok(ProposalReceipt::Rejected(text.trim().to_string()))
        }
    }

    async fn history(&self, stack: &str) -> Result<Vec<HistoryEntry>, SpecStoreError> {
        self.ensure_context().await?;
        self.with_retry("history", stack, || self.history_once(stack)).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::models::ApprovalState;
    use std::path::Path;
    use tempfile::TempDir;

    /// A fake `cloudctl` that logs its arguments and stdin into `dir`.
    fn fake_cloudctl(dir: &TempDir, body: &str) -> CloudctlConfig {
        let script = dir.path().join("cloudctl.sh");
        std::fs::write(
            &script,
            format!(
                "log={dir}/calls\necho \"$@\" >> $log\n{body}\n",
                dir = dir.path().display()
            ),
        )
        .unwrap();
        CloudctlConfig {
            program: format!("sh {}", script.display()),
            read_retry_secs: 5,
        }
    }

    fn calls(dir: &TempDir) -> Vec<String> {
        std::fs::read_to_string(dir.path().join("calls"))
            .unwrap_or_default()
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    fn read(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_selects_context_once() {
        let dir = TempDir::new().unwrap();
        let config = fake_cloudctl(
            &dir,
            r#"case "$1 $2" in
  "stacks get") echo '{"version": 3, "spec": {"searchHeads": [{"name": "sh1"}]}}' ;;
esac"#,
        );
        let store = CloudctlSpecStore::new(&config, Environment::Prod);

        let doc = store.fetch("acme").await.unwrap();
        assert_eq!(doc.version, 3);
        store.fetch("acme").await.unwrap();

        assert_eq!(
            calls(&dir),
            vec![
                "config use lve",
                "stacks get acme -o json",
                "stacks get acme -o json"
            ]
        );
    }

    #[tokio::test]
    async fn test_propose_sends_document_on_stdin() {
        let dir = TempDir::new().unwrap();
        let config = fake_cloudctl(
            &dir,
            &format!(
                r#"case "$1 $2" in
  "stacks update") cat > {}/body; echo "Update has been requested for $3" ;;
esac"#,
                dir.path().display()
            ),
        );
        let store = CloudctlSpecStore::new(&config, Environment::Dev);
        let doc: SpecDocument =
            serde_json::from_str(r#"{"version": 4, "spec": {"cloud": "aws"}}"#).unwrap();
        let proposal = ChangeProposal::new(doc, "CO2-9", "Removing MW", "alice");

        let receipt = store.propose("acme", &proposal).await.unwrap();
        assert_eq!(receipt, ProposalReceipt::Accepted);

        let sent: serde_json::Value = serde_json::from_str(&read(dir.path(), "body")).unwrap();
        assert_eq!(sent["version"], 4);
        assert!(calls(&dir)[1].starts_with("stacks update acme --reason CO2-9 Removing MW"));
    }

    #[tokio::test]
    async fn test_propose_refusal_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let config = fake_cloudctl(&dir, r#"[ "$1" = stacks ] && echo "schema violation" >&2; exit 0"#);
        let store = CloudctlSpecStore::new(&config, Environment::Stg);
        let doc: SpecDocument = serde_json::from_str(r#"{"version": 4, "spec": {}}"#).unwrap();
        let proposal = ChangeProposal::new(doc, "CO2-9", "Preparing", "alice");

        let receipt = store.propose("acme", &proposal).await.unwrap();
        assert_eq!(receipt, ProposalReceipt::Rejected("schema violation".to_string()));
    }

    #[tokio::test]
    async fn test_history_retries_transient_failures() {
        let dir = TempDir::new().unwrap();
        let config = fake_cloudctl(
            &dir,
            &format!(
                r#"case "$1 $2" in
  "stacks history")
    if [ ! -f {d}/failed ]; then touch {d}/failed; echo "connection reset" >&2; exit 1; fi
    echo '[{{"version": 1, "state": "Approved"}}, {{"version": 2, "state": "Pending"}}]' ;;
esac"#,
                d = dir.path().display()
            ),
        );
        let store = CloudctlSpecStore::new(&config, Environment::Prod);

        let history = store.history("acme").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].approval_state, ApprovalState::Other("Pending".to_string()));
        assert_eq!(
            calls(&dir)
                .iter()
                .filter(|c| c.starts_with("stacks history"))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_missing_stack_is_permanent() {
        let dir = TempDir::new().unwrap();
        let config = fake_cloudctl(
            &dir,
            r#"[ "$1" = stacks ] && { echo "stack ghost not found" >&2; exit 1; }; exit 0"#,
        );
        let store = CloudctlSpecStore::new(&config, Environment::Prod);

        let err = store.fetch("ghost").await.unwrap_err();
        assert!(matches!(err, SpecStoreError::StackNotFound(ref s) if s == "ghost"));
        assert_eq!(calls(&dir).len(), 2, "no retry after a permanent error");
    }
}
