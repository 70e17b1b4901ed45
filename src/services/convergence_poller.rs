//! Resync-and-check retry engine over a shrinking set of hosts.
//!
//! Each round runs the resync primitive on every pending host through the
//! shared [`WorkerPool`], checks the host condition where the resync allows
//! it, and merges the round's results into an [`OutcomeSet`] once every
//! worker has returned.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::{
    HostHandle, HostOutcome, OutcomeSet, RemoteConfig, ResyncDisposition, ResyncOutcome,
    RetryBudget,
};
use crate::domain::ports::{ExecMode, RemoteProbe};
use crate::services::worker_pool::WorkerPool;

/// Independent timeouts per execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    pub check: Duration,
    pub capture: Duration,
    pub trigger: Duration,
}

impl ProbeTimeouts {
    pub fn from_config(remote: &RemoteConfig) -> Self {
        Self {
            check: Duration::from_secs(remote.check_timeout_secs),
            capture: Duration::from_secs(remote.capture_timeout_secs),
            trigger: Duration::from_secs(remote.trigger_timeout_secs),
        }
    }
}

/// What one host did in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundStep {
    /// The condition check passed.
    Converged,
    /// Resync or check did not succeed; try again next round.
    NotReady,
    /// Resync reported the host unreachable.
    Unreachable,
}

/// Settling result for hosts outside the migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NudgeReport {
    pub settled: Vec<String>,
    pub unreachable: Vec<String>,
    pub unsettled: Vec<String>,
}

pub struct ConvergencePoller {
    probe: Arc<dyn RemoteProbe>,
    pool: WorkerPool,
    timeouts: ProbeTimeouts,
}

impl ConvergencePoller {
    pub fn new(probe: Arc<dyn RemoteProbe>, pool: WorkerPool, timeouts: ProbeTimeouts) -> Self {
        Self {
            probe,
            pool,
            timeouts,
        }
    }

    /// Drive `resync` then `condition` on every host until all converge or
    /// the budget runs out. Hosts still pending afterwards are unresolved.
    ///
    /// A host whose resync returns 255 is never resynced again but still gets
    /// the condition check each round, and only converges when it passes.
    pub async fn poll(
        &self,
        hosts: &[HostHandle],
        resync: &str,
        condition: &str,
        budget: RetryBudget,
    ) -> OutcomeSet {
        let mut outcomes = OutcomeSet::pending(hosts.iter().map(|h| h.label.clone()));
        let resync: Arc<str> = Arc::from(resync);
        let condition: Arc<str> = Arc::from(condition);

        while outcomes.has_pending() && !budget.is_exhausted(outcomes.rounds()) {
            if outcomes.rounds() > 0 {
                tokio::time::sleep(budget.delay).await;
            }
            let round = outcomes.rounds() + 1;

            let work: Vec<(HostHandle, bool)> = hosts
                .iter()
                .filter(|h| outcomes.get(&h.label) == Some(HostOutcome::Pending))
                .map(|h| (h.clone(), outcomes.is_unreachable(&h.label)))
                .collect();

            let probe = self.probe.clone();
            let timeouts = self.timeouts;
            let (resync, condition) = (resync.clone(), condition.clone());
            let results = self
                .pool
                .map(work, move |(host, check_only)| {
                    let probe = probe.clone();
                    let resync = resync.clone();
                    let condition = condition.clone();
                    async move {
                        let step = resync_then_check(
                            probe.as_ref(),
                            &host,
                            &resync,
                            &condition,
                            timeouts,
                            check_only,
                            round,
                        )
                        .await;
                        (host.label, step)
                    }
                })
                .await;

            for (label, step) in results {
                match step {
                    RoundStep::Converged => {
                        outcomes.resolve(&label, HostOutcome::Converged);
                    }
                    RoundStep::Unreachable => {
                        if outcomes.mark_unreachable(&label) {
                            tracing::info!(
                                host = %label,
                                "host unreachable, likely migrating; excluded from further resync"
                            );
                        }
                    }
                    RoundStep::NotReady => {}
                }
            }
            outcomes.record_round();

            tracing::info!(
                round,
                max_rounds = budget.max_rounds,
                pending = outcomes.unresolved().len(),
                "poll round complete"
            );
        }

        if outcomes.has_pending() {
            tracing::warn!(
                rounds = outcomes.rounds(),
                unresolved = ?outcomes.unresolved(),
                "retry budget exhausted"
            );
        }
        outcomes
    }

    /// Re-run the resync primitive on hosts that do not take part in the
    /// migration until each reports no changes, reports changes
    /// `max_changed_runs` times, or turns out unreachable.
    pub async fn nudge(
        &self,
        hosts: &[HostHandle],
        resync: &str,
        max_changed_runs: u32,
        budget: RetryBudget,
    ) -> NudgeReport {
        let mut pending: Vec<HostHandle> = hosts.to_vec();
        let mut changed_runs: BTreeMap<String, u32> = BTreeMap::new();
        let mut report = NudgeReport::default();
        let resync: Arc<str> = Arc::from(resync);
        let mut rounds = 0;

        while !pending.is_empty() && !budget.is_exhausted(rounds) {
            if rounds > 0 {
                tokio::time::sleep(budget.delay).await;
            }
            rounds += 1;

            let probe = self.probe.clone();
            let timeout = self.timeouts.trigger;
            let command = resync.clone();
            let results = self
                .pool
                .map(pending.clone(), move |host| {
                    let probe = probe.clone();
                    let command = command.clone();
                    async move {
                        let outcome = match probe
                            .exec(&host, &command, ExecMode::Background, timeout)
                            .await
                        {
                            Ok(output) => ResyncOutcome::from_exit_code(output.exit_code),
                            Err(e) => {
                                tracing::debug!(host = %host.label, error = %e, "resync did not complete");
                                ResyncOutcome::NotRun
                            }
                        };
                        (host, outcome)
                    }
                })
                .await;

            let mut still_pending = Vec::new();
            for (host, outcome) in results {
                match outcome {
                    ResyncOutcome::NoChanges => report.settled.push(host.label),
                    ResyncOutcome::Changed => {
                        let runs = changed_runs.entry(host.label.clone()).or_insert(0);
                        *runs += 1;
                        if *runs >= max_changed_runs {
                            report.settled.push(host.label);
                        } else {
                            still_pending.push(host);
                        }
                    }
                    ResyncOutcome::Unreachable => report.unreachable.push(host.label),
                    other => {
                        tracing::debug!(
                            host = %host.label,
                            code = other.exit_code(),
                            "{}; rerunning",
                            other.describe()
                        );
                        still_pending.push(host);
                    }
                }
            }
            pending = still_pending;
        }

        report.unsettled = pending.into_iter().map(|h| h.label).collect();
        report
    }

    /// Run `command` once on every host in background mode and return the
    /// hosts that did not exit 0, with a reason.
    pub async fn unreachable_hosts(
        &self,
        hosts: &[HostHandle],
        command: &str,
    ) -> Vec<(String, String)> {
        let probe = self.probe.clone();
        let timeout = self.timeouts.trigger;
        let command: Arc<str> = Arc::from(command);
        let results = self
            .pool
            .map(hosts.to_vec(), move |host| {
                let probe = probe.clone();
                let command = command.clone();
                async move {
                    let failure = match probe
                        .exec(&host, &command, ExecMode::Background, timeout)
                        .await
                    {
                        Ok(output) if output.success() => None,
                        Ok(output) => Some(format!("exit code {}", output.exit_code)),
                        Err(e) => Some(e.to_string()),
                    };
                    (host.label, failure)
                }
            })
            .await;

        let mut failures: Vec<(String, String)> = results
            .into_iter()
            .filter_map(|(label, failure)| failure.map(|reason| (label, reason)))
            .collect();
        failures.sort();
        failures
    }
}

async fn resync_then_check(
    probe: &dyn RemoteProbe,
    host: &HostHandle,
    resync: &str,
    condition: &str,
    timeouts: ProbeTimeouts,
    check_only: bool,
    round: u32,
) -> RoundStep {
    if !check_only {
        let outcome = match probe
            .exec(host, resync, ExecMode::Background, timeouts.trigger)
            .await
        {
            Ok(output) => ResyncOutcome::from_exit_code(output.exit_code),
            Err(e) => {
                tracing::warn!(host = %host.label, round, error = %e, "resync failed");
                return RoundStep::NotReady;
            }
        };
        match outcome.disposition() {
            ResyncDisposition::CheckCondition => {}
            ResyncDisposition::Exclude => return RoundStep::Unreachable,
            ResyncDisposition::Retry => {
                tracing::warn!(
                    host = %host.label,
                    round,
                    code = outcome.exit_code(),
                    "resync {}; retrying next round",
                    outcome.describe()
                );
                return RoundStep::NotReady;
            }
        }
    }

    match probe
        .exec(host, condition, ExecMode::ExitCode, timeouts.check)
        .await
    {
        Ok(output) if output.success() => {
            tracing::info!(host = %host.label, round, "condition observed");
            RoundStep::Converged
        }
        Ok(output) => {
            tracing::debug!(host = %host.label, round, code = output.exit_code, "condition not met yet");
            RoundStep::NotReady
        }
        Err(e) => {
            tracing::warn!(host = %host.label, round, error = %e, "condition check failed");
            RoundStep::NotReady
        }
    }
}
