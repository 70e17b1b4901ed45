//! Unbounded watch for per-host pass/fail markers in the host event log.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::{HostHandle, HostOutcome, OutcomeSet, ProbeConfig};
use crate::domain::ports::{ExecMode, RemoteProbe};
use crate::services::worker_pool::WorkerPool;

/// Markers the host-side procedure writes when it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMarkers {
    pub pass: String,
    pub fail: String,
}

impl StatusMarkers {
    pub fn from_config(probes: &ProbeConfig) -> Self {
        Self {
            pass: probes.pass_marker.clone(),
            fail: probes.fail_marker.clone(),
        }
    }

    /// A failure marker wins over a success marker in the same output.
    pub fn classify(&self, output: &str) -> HostOutcome {
        if output.contains(&self.fail) {
            HostOutcome::Failed
        } else if output.contains(&self.pass) {
            HostOutcome::Converged
        } else {
            HostOutcome::Pending
        }
    }
}

pub struct CompletionMonitor {
    probe: Arc<dyn RemoteProbe>,
    pool: WorkerPool,
    markers: Arc<StatusMarkers>,
    timeout: Duration,
    interval: Duration,
}

impl CompletionMonitor {
    pub fn new(
        probe: Arc<dyn RemoteProbe>,
        pool: WorkerPool,
        markers: StatusMarkers,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            probe,
            pool,
            markers: Arc::new(markers),
            timeout,
            interval,
        }
    }

    /// Query every pending host until each shows a pass or fail marker.
    ///
    /// There is no round limit; completion is driven by the hosts.
    pub async fn watch(&self, hosts: &[HostHandle], query: &str) -> OutcomeSet {
        let mut outcomes = OutcomeSet::pending(hosts.iter().map(|h| h.label.clone()));
        let query: Arc<str> = Arc::from(query);

        while outcomes.has_pending() {
            if outcomes.rounds() > 0 {
                tracing::info!(
                    pending = outcomes.unresolved().len(),
                    "waiting on migration to complete, checking again in {:?}",
                    self.interval
                );
                tokio::time::sleep(self.interval).await;
            }

            let work: Vec<HostHandle> = hosts
                .iter()
                .filter(|h| outcomes.get(&h.label) == Some(HostOutcome::Pending))
                .cloned()
                .collect();

            let probe = self.probe.clone();
            let markers = self.markers.clone();
            let timeout = self.timeout;
            let query = query.clone();
            let results = self
                .pool
                .map(work, move |host| {
                    let probe = probe.clone();
                    let markers = markers.clone();
                    let query = query.clone();
                    async move {
                        let outcome = match probe
                            .exec(&host, &query, ExecMode::Capture, timeout)
                            .await
                        {
                            Ok(output) if output.success() => markers.classify(&output.stdout),
                            Ok(output) => {
                                tracing::warn!(
                                    host = %host.label,
                                    code = output.exit_code,
                                    stderr = %output.stderr.trim(),
                                    "status query failed"
                                );
                                HostOutcome::Pending
                            }
                            Err(e) => {
                                tracing::warn!(host = %host.label, error = %e, "status query failed");
                                HostOutcome::Pending
                            }
                        };
                        (host.label, outcome)
                    }
                })
                .await;

            for (label, outcome) in results {
                if outcomes.resolve(&label, outcome) {
                    match outcome {
                        HostOutcome::Converged => {
                            tracing::info!(host = %label, "migration success detected");
                        }
                        HostOutcome::Failed => {
                            tracing::warn!(host = %label, "migration failure detected");
                        }
                        HostOutcome::Pending => {}
                    }
                }
            }
            outcomes.record_round();
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Environment;
    use crate::domain::ports::{ExecOutput, RemoteProbeError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replies from a per-host script; the last reply repeats.
    struct ScriptProbe {
        replies: Mutex<HashMap<String, Vec<Result<ExecOutput, ()>>>>,
    }

    impl ScriptProbe {
        fn new(script: &[(&str, Vec<Result<ExecOutput, ()>>)]) -> Self {
            Self {
                replies: Mutex::new(
                    script
                        .iter()
                        .map(|(host, replies)| ((*host).to_string(), replies.clone()))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl RemoteProbe for ScriptProbe {
        async fn exec(
            &self,
            host: &HostHandle,
            _command: &str,
            mode: ExecMode,
            _timeout: Duration,
        ) -> Result<ExecOutput, RemoteProbeError> {
            assert_eq!(mode, ExecMode::Capture);
            let mut replies = self.replies.lock().unwrap();
            let queue = replies.get_mut(&host.label).unwrap();
            let reply = if queue.len() > 1 { queue.remove(0) } else { queue[0].clone() };
            reply.map_err(|()| RemoteProbeError::Timeout(120))
        }
    }

    fn stdout(text: &str) -> Result<ExecOutput, ()> {
        Ok(ExecOutput {
            exit_code: 0,
            stdout: text.to_string(),
            stderr: String::new(),
        })
    }

    fn monitor(probe: ScriptProbe) -> CompletionMonitor {
        CompletionMonitor::new(
            Arc::new(probe),
            WorkerPool::new(2),
            StatusMarkers::from_config(&ProbeConfig::default()),
            Duration::from_millis(10),
            Duration::from_millis(1),
        )
    }

    fn hosts(labels: &[&str]) -> Vec<HostHandle> {
        labels
            .iter()
            .map(|l| HostHandle::new(*l, *l, Environment::Prod))
            .collect()
    }

    #[test]
    fn test_fail_marker_wins() {
        let markers = StatusMarkers::from_config(&ProbeConfig::default());
        assert_eq!(markers.classify("x main=>PASS"), HostOutcome::Converged);
        assert_eq!(markers.classify("main=>PASS\nmain=>FAIL"), HostOutcome::Failed);
        assert_eq!(markers.classify("migration_backup__ started"), HostOutcome::Pending);
    }

    #[tokio::test]
    async fn test_watch_until_every_host_reports() {
        let probe = ScriptProbe::new(&[
            ("sh1", vec![stdout("starting"), stdout("step main=>PASS")]),
            (
                "sh2",
                vec![
                    Err(()),
                    Ok(ExecOutput::code(1)),
                    stdout("starting"),
                    stdout("main=>FAIL rollback"),
                ],
            ),
            ("sh3", vec![stdout("main=>PASS")]),
        ]);
        let outcomes = monitor(probe).watch(&hosts(&["sh1", "sh2", "sh3"]), "query").await;

        assert_eq!(outcomes.converged(), vec!["sh1", "sh3"]);
        assert_eq!(outcomes.failed(), vec!["sh2"]);
        assert!(!outcomes.has_pending());
        assert_eq!(outcomes.rounds(), 4);
    }

    #[tokio::test]
    async fn test_empty_host_set_returns_immediately() {
        let outcomes = monitor(ScriptProbe::new(&[])).watch(&[], "query").await;
        assert!(outcomes.is_empty());
        assert_eq!(outcomes.rounds(), 0);
    }
}
