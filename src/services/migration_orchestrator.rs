//! Top-level driver of one migration run.
//!
//! The run is a single sequential state machine. Every hop is recorded in a
//! trail that is returned with the report, or with the abort when a stage
//! fails. Stages before the first approved change never compensate; stages
//! after it go through the rollback path where the state machine allows one.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::errors::{MigrationAbort, MigrationError, MigrationResult};
use crate::domain::models::{
    ChangeProposal, Config, Environment, HostHandle, MigrationOutcome, MigrationPlan,
    MigrationReport, MigrationRequest, MigrationState, OutcomeSet, RetryBudget, SpecDocument,
    StateTransition, TargetSelection,
};
use crate::domain::ports::{DowntimeScheduler, FleetResolver, RemoteProbe, SpecStore};
use crate::services::change_controller::ChangeController;
use crate::services::completion_monitor::{CompletionMonitor, StatusMarkers};
use crate::services::convergence_poller::{ConvergencePoller, ProbeTimeouts};
use crate::services::eligibility::{self, AddonMembership};
use crate::services::spec_mutation::{self, AppliedMigration};
use crate::services::worker_pool::WorkerPool;

const SINCE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of the read-only `check` command.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckReport {
    pub stack: String,
    pub version: u64,
    pub platform_version: Option<String>,
    pub targeted_roles: Vec<String>,
    pub addons: AddonMembership,
    pub already_migrated: bool,
    /// First precondition that would stop a run, if any.
    pub blocker: Option<String>,
}

/// Recorded path through the state machine.
struct Trail {
    state: MigrationState,
    transitions: Vec<StateTransition>,
    /// Stage that failed when the run compensated before giving up.
    failed_stage: Option<MigrationState>,
    downtime_active: bool,
}

impl Trail {
    fn new() -> Self {
        Self {
            state: MigrationState::Validating,
            transitions: Vec::new(),
            failed_stage: None,
            downtime_active: false,
        }
    }

    fn advance(&mut self, next: MigrationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        tracing::info!(from = %self.state, to = %next, "state transition");
        self.transitions.push(StateTransition {
            from: self.state,
            to: next,
            at: Utc::now(),
        });
        self.state = next;
    }

    fn abort(mut self, error: MigrationError) -> MigrationAbort {
        let failed_in = self.failed_stage.unwrap_or(self.state);
        tracing::error!(state = %failed_in, category = error.category(), error = %error, "migration aborted");
        if !self.state.is_terminal() {
            self.advance(MigrationState::Aborted);
        }
        MigrationAbort {
            error,
            failed_in,
            trail: self.transitions,
            downtime_active: self.downtime_active,
        }
    }
}

/// Everything the post-commit stages need.
struct Committed<'a> {
    request: &'a MigrationRequest,
    plan: MigrationPlan,
    applied: AppliedMigration,
    hosts: Vec<HostHandle>,
    since: String,
}

struct Finished {
    outcome: MigrationOutcome,
    host_outcomes: Option<OutcomeSet>,
    changed_roles: Vec<String>,
}

pub struct MigrationOrchestrator {
    config: Config,
    store: Arc<dyn SpecStore>,
    fleet: Arc<dyn FleetResolver>,
    downtime: Arc<dyn DowntimeScheduler>,
    changes: ChangeController,
    poller: ConvergencePoller,
    monitor: CompletionMonitor,
    submitted_by: String,
}

impl MigrationOrchestrator {
    pub fn new(
        config: Config,
        store: Arc<dyn SpecStore>,
        fleet: Arc<dyn FleetResolver>,
        probe: Arc<dyn RemoteProbe>,
        downtime: Arc<dyn DowntimeScheduler>,
        submitted_by: impl Into<String>,
    ) -> Self {
        let pool = WorkerPool::sized_for_host(config.polling.worker_threads);
        let timeouts = ProbeTimeouts::from_config(&config.remote);
        let changes = ChangeController::new(store.clone(), config.polling.approval_interval());
        let monitor = CompletionMonitor::new(
            probe.clone(),
            pool.clone(),
            StatusMarkers::from_config(&config.probes),
            timeouts.capture,
            config.polling.interval(),
        );
        let poller = ConvergencePoller::new(probe, pool, timeouts);
        Self {
            config,
            store,
            fleet,
            downtime,
            changes,
            poller,
            monitor,
            submitted_by: submitted_by.into(),
        }
    }

    fn budget(&self) -> RetryBudget {
        RetryBudget::new(self.config.polling.resync_budget, self.config.polling.interval())
    }

    fn proposal(&self, document: SpecDocument, ticket: &str, stage: &str) -> ChangeProposal {
        let message = format!(
            "{stage}. Executing kv-migrator version={}",
            env!("CARGO_PKG_VERSION")
        );
        ChangeProposal::new(document, ticket, &message, self.submitted_by.clone())
    }

    /// Read-only eligibility report; never writes to the spec store.
    pub async fn check(
        &self,
        stack: &str,
        environment: Environment,
        targets: &TargetSelection,
    ) -> MigrationResult<CheckReport> {
        let doc = self.store.fetch(stack).await?;
        let plan = MigrationPlan::resolve(&self.config.targets, stack, environment);

        let blocker = match self.changes.ensure_no_pending(stack).await {
            Err(MigrationError::FatalValidation(message)) => Some(message),
            Err(other) => return Err(other),
            Ok(()) => eligibility::validate(&doc, targets, &self.config.migration)
                .err()
                .map(|e| e.to_string()),
        };

        Ok(CheckReport {
            stack: stack.to_string(),
            version: doc.version,
            platform_version: doc.platform_version().map(str::to_string),
            targeted_roles: eligibility::targeted_active_roles(&doc, targets)
                .iter()
                .map(|role| role.name().to_string())
                .collect(),
            addons: AddonMembership::of(&doc, &self.config.migration.incompatible_addons),
            already_migrated: eligibility::is_already_migrated(&doc, &plan, targets),
            blocker,
        })
    }

    /// Run the migration to a terminal state.
    pub async fn run(&self, request: &MigrationRequest) -> Result<MigrationReport, MigrationAbort> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let span = tracing::info_span!("migration", %run_id, stack = %request.stack);
        tracing::info!(
            parent: &span,
            environment = %request.environment,
            targets = ?request.targets,
            skip_downtime = request.skip_downtime,
            "starting migration"
        );

        let mut trail = Trail::new();
        let result = self
            .drive(request, &mut trail, started_at)
            .instrument(span)
            .await;
        match result {
            Ok(finished) => {
                let elapsed = clock.elapsed();
                tracing::info!(outcome = ?finished.outcome, ?elapsed, "migration finished");
                Ok(MigrationReport {
                    run_id,
                    stack: request.stack.clone(),
                    outcome: finished.outcome,
                    trail: trail.transitions,
                    host_outcomes: finished.host_outcomes,
                    changed_roles: finished.changed_roles,
                    started_at,
                    elapsed,
                })
            }
            Err(error) => Err(trail.abort(error)),
        }
    }

    async fn drive(
        &self,
        request: &MigrationRequest,
        trail: &mut Trail,
        started_at: DateTime<Utc>,
    ) -> MigrationResult<Finished> {
        let stack = request.stack.as_str();

        // Validating
        self.changes.ensure_no_pending(stack).await?;
        let fetched = self.store.fetch(stack).await?;
        let plan = MigrationPlan::resolve(&self.config.targets, stack, request.environment);
        let validated = eligibility::validate(&fetched, &request.targets, &self.config.migration)?;
        tracing::info!(
            region = %validated.region,
            account = %validated.account,
            addons = %validated.addons.describe(),
            "stack passed validation"
        );

        if eligibility::is_already_migrated(&fetched, &plan, &request.targets) {
            tracing::info!("stack is already configured; nothing to do");
            trail.advance(MigrationState::AlreadyMigrated);
            return Ok(Finished {
                outcome: MigrationOutcome::AlreadyMigrated,
                host_outcomes: None,
                changed_roles: Vec::new(),
            });
        }

        let fleet = self
            .fleet
            .resolve(stack, &validated.region, &validated.account)
            .await?;

        trail.advance(MigrationState::Mutating);
        let applied = spec_mutation::apply_migration(
            &fetched,
            &plan,
            &request.targets,
            validated.overlay_applies,
        )?;
        let missing: Vec<&str> = applied
            .changed_roles
            .iter()
            .map(String::as_str)
            .filter(|role| fleet.hosts_for_roles([*role]).is_empty())
            .collect();
        if !missing.is_empty() {
            return Err(MigrationError::validation(format!(
                "no running hosts found for roles [{}]",
                missing.join(", ")
            )));
        }
        let hosts = fleet.hosts_for_roles(applied.changed_roles.iter().map(String::as_str));
        tracing::info!(
            roles = ?applied.changed_roles,
            hosts = hosts.len(),
            "mutation planned"
        );

        let unreachable = self
            .poller
            .unreachable_hosts(&hosts, &self.config.probes.connectivity_command)
            .await;
        if !unreachable.is_empty() {
            let detail: Vec<String> = unreachable
                .iter()
                .map(|(host, reason)| format!("{host}: {reason}"))
                .collect();
            return Err(MigrationError::validation(format!(
                "connectivity check failed ({})",
                detail.join("; ")
            )));
        }

        if !request.skip_downtime {
            self.downtime.add(stack, &request.ticket).await?;
            trail.downtime_active = true;
            tracing::info!("downtime added");
        }

        trail.advance(MigrationState::AwaitingApproval);
        let proposal = self.proposal(
            applied.document.clone(),
            &request.ticket,
            "Preparing for KV service migration",
        );
        let latest = self.changes.submit_and_await(stack, &proposal).await?;

        let committed = Committed {
            request,
            plan,
            applied,
            hosts,
            since: started_at.format(SINCE_FORMAT).to_string(),
        };
        self.after_commit(&committed, &fleet.non_participating, latest, trail)
            .await
    }

    async fn after_commit(
        &self,
        ctx: &Committed<'_>,
        non_participating: &[HostHandle],
        latest: SpecDocument,
        trail: &mut Trail,
    ) -> MigrationResult<Finished> {
        let probes = &self.config.probes;
        let budget = self.budget();

        trail.advance(MigrationState::Triggering);
        if !non_participating.is_empty() {
            let report = self
                .poller
                .nudge(
                    non_participating,
                    &probes.resync_command,
                    self.config.polling.max_changed_runs,
                    budget,
                )
                .await;
            tracing::info!(
                settled = report.settled.len(),
                unreachable = ?report.unreachable,
                unsettled = ?report.unsettled,
                "resynced hosts outside the migration"
            );
        }
        let trigger_check = probes.trigger_check.replace("{since}", &ctx.since);
        let started = self
            .poller
            .poll(&ctx.hosts, &probes.resync_command, &trigger_check, budget)
            .await;
        if started.has_pending() {
            return Err(MigrationError::ConvergenceTimeout {
                stage: "migration start detection".to_string(),
                unresolved: started.unresolved(),
            });
        }
        tracing::info!("migration has started on every target host");

        trail.advance(MigrationState::Polling);
        let status_query = probes.status_query.replace("{since}", &ctx.since);
        let completion = self.monitor.watch(&ctx.hosts, &status_query).await;

        if completion.any_failed() {
            let failed = completion.failed();
            trail.advance(MigrationState::PartiallyFailed);
            tracing::warn!(failed = ?failed, "failure detected, rolling back");
            let trigger = format!("failure on [{}]", failed.join(", "));
            let reverted = self
                .roll_back(ctx, latest, trail)
                .await
                .map_err(|source| MigrationError::RollbackFailed {
                    trigger,
                    source: Box::new(source),
                })?;
            self.clear_window(ctx, reverted, trail).await?;
            trail.advance(MigrationState::RolledBack);
            return Ok(Finished {
                outcome: MigrationOutcome::RolledBack {
                    failed_hosts: failed,
                },
                host_outcomes: Some(completion),
                changed_roles: ctx.applied.changed_roles.clone(),
            });
        }

        trail.advance(MigrationState::Converged);
        let confirmed = self
            .poller
            .poll(
                &ctx.hosts,
                &probes.resync_command,
                &probes.store_external_check,
                budget,
            )
            .await;
        if confirmed.has_pending() {
            let timeout = MigrationError::ConvergenceTimeout {
                stage: "external store confirmation".to_string(),
                unresolved: confirmed.unresolved(),
            };
            tracing::warn!(error = %timeout, "rolling back");
            let failed_stage = trail.state;
            let reverted = self.roll_back(ctx, latest, trail).await.map_err(|source| {
                MigrationError::RollbackFailed {
                    trigger: timeout.to_string(),
                    source: Box::new(source),
                }
            })?;
            self.clear_window(ctx, reverted, trail).await?;
            trail.failed_stage = Some(failed_stage);
            return Err(timeout);
        }
        tracing::info!("external store detected on every target host");

        self.clear_window(ctx, latest, trail).await?;
        trail.advance(MigrationState::Done);
        Ok(Finished {
            outcome: MigrationOutcome::Converged,
            host_outcomes: Some(completion),
            changed_roles: ctx.applied.changed_roles.clone(),
        })
    }

    /// Revert the spec, wait for approval, then confirm the local store on
    /// every host. Returns the document fetched after the revert was approved.
    async fn roll_back(
        &self,
        ctx: &Committed<'_>,
        latest: SpecDocument,
        trail: &mut Trail,
    ) -> MigrationResult<SpecDocument> {
        let stack = ctx.request.stack.as_str();

        trail.advance(MigrationState::RollingBack);
        let reverted = spec_mutation::revert_for_rollback(
            &latest,
            ctx.applied.original_root_flags.as_ref(),
            &ctx.applied.changed_roles,
            &ctx.plan,
            self.config.migration.rollback_mode,
        );

        trail.advance(MigrationState::AwaitingRollbackApproval);
        let proposal = self.proposal(reverted, &ctx.request.ticket, "Backing out KV service migration");
        let latest = self.changes.submit_and_await(stack, &proposal).await?;

        let settle = self.config.polling.rollback_settle();
        tracing::info!(?settle, "waiting for the reverted spec to reach hosts");
        tokio::time::sleep(settle).await;

        trail.advance(MigrationState::ConfirmingRollback);
        let probes = &self.config.probes;
        let local = self
            .poller
            .poll(
                &ctx.hosts,
                &probes.resync_command,
                &probes.store_local_check,
                self.budget(),
            )
            .await;
        if local.has_pending() {
            return Err(MigrationError::ConvergenceTimeout {
                stage: "rollback confirmation".to_string(),
                unresolved: local.unresolved(),
            });
        }
        tracing::info!("local store restored on every target host");
        Ok(latest)
    }

    /// Clear the maintenance window, wait for approval, then drop downtime.
    async fn clear_window(
        &self,
        ctx: &Committed<'_>,
        latest: SpecDocument,
        trail: &mut Trail,
    ) -> MigrationResult<()> {
        let stack = ctx.request.stack.as_str();

        trail.advance(MigrationState::ClearingWindow);
        let cleared = spec_mutation::clear_window(&latest);

        trail.advance(MigrationState::AwaitingFinalApproval);
        let proposal = self.proposal(cleared, &ctx.request.ticket, "Removing MW");
        self.changes.submit_and_await(stack, &proposal).await?;

        if !ctx.request.skip_downtime {
            if let Err(e) = self.downtime.remove(stack, &ctx.request.ticket).await {
                tracing::warn!(error = %e, "failed to remove downtime; remove it manually");
            } else {
                trail.downtime_active = false;
                tracing::info!("downtime removed");
            }
        }
        Ok(())
    }
}
