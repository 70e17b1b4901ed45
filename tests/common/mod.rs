//! Common test utilities for integration tests
//!
//! In-memory fakes for every port plus fixtures shared across test files.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kv_migrator::domain::models::{
    ApprovalState, ChangeProposal, Config, Environment, FleetView, HistoryEntry, HostHandle,
    ProbeConfig, ProposalReceipt, SpecDocument,
};
use kv_migrator::domain::ports::{
    DowntimeError, DowntimeScheduler, ExecMode, ExecOutput, FleetError, FleetResolver,
    RemoteProbe, RemoteProbeError, SpecStore, SpecStoreError,
};
use kv_migrator::MigrationOrchestrator;

pub const STACK: &str = "acme";

/// Probe commands used by `test_config`, short enough to match exactly.
pub const CONNECT: &str = "connect";
pub const RESYNC: &str = "resync";
pub const TRIGGER_CHECK: &str = "trigger-check";
pub const STATUS: &str = "status";
pub const STORE_LOCAL: &str = "store-local";
pub const STORE_EXTERNAL: &str = "store-external";

/// Default config with zero delays and literal probe commands.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.polling.interval_secs = 0;
    config.polling.approval_interval_secs = 0;
    config.polling.rollback_settle_secs = 0;
    config.polling.resync_budget = 3;
    config.polling.worker_threads = Some(4);
    config.probes = ProbeConfig {
        connectivity_command: CONNECT.to_string(),
        resync_command: RESYNC.to_string(),
        trigger_check: format!("{TRIGGER_CHECK} {{since}}"),
        status_query: format!("{STATUS} {{since}}"),
        store_local_check: STORE_LOCAL.to_string(),
        store_external_check: STORE_EXTERNAL.to_string(),
        ..ProbeConfig::default()
    };
    config
}

/// Labels `sh1..=shN`.
pub fn labels(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("sh{i}")).collect()
}

/// An eligible, unmigrated stack document with `n` active standalone search heads.
pub fn stack_document(n: usize) -> SpecDocument {
    let heads: Vec<_> = labels(n)
        .into_iter()
        .map(|name| json!({ "name": name, "count": 1 }))
        .collect();
    serde_json::from_value(json!({
        "version": 7,
        "spec": {
            "cloud": "aws",
            "region": "us-east-1",
            "featureFlags": { "legacy_flag": true },
            "releaseInfo": { "splunkVersion": "9.0.2303" },
            "premiumApps": { "itsi": {} },
            "searchHeads": heads
        },
        "status": { "provisionerOutput": { "account_id": "123456789012" } }
    }))
    .expect("fixture parses")
}

/// A fleet with one standalone host per label and one indexer.
pub fn fleet_for(labels: &[String]) -> FleetView {
    let mut fleet = FleetView::default();
    for label in labels {
        fleet.standalone.insert(
            label.clone(),
            HostHandle::new(label, format!("{label}-host"), Environment::Prod),
        );
    }
    fleet
        .non_participating
        .push(HostHandle::new("idx1", "idx1-host", Environment::Prod));
    fleet
}

// ---------------------------------------------------------------------------
// SpecStore
// ---------------------------------------------------------------------------

struct StoreState {
    document: SpecDocument,
    history: Vec<HistoryEntry>,
    proposals: Vec<ChangeProposal>,
}

/// Spec store whose approval workflow approves instantly, unless told to
/// reject the proposal at a given (zero-based) index.
pub struct InMemorySpecStore {
    state: Mutex<StoreState>,
    reject_at: Option<usize>,
}

impl InMemorySpecStore {
    pub fn new(document: SpecDocument) -> Self {
        let history = vec![HistoryEntry::new(document.version, ApprovalState::Approved)];
        Self {
            state: Mutex::new(StoreState {
                document,
                history,
                proposals: Vec::new(),
            }),
            reject_at: None,
        }
    }

    pub fn rejecting(mut self, index: usize) -> Self {
        self.reject_at = Some(index);
        self
    }

    /// Append a history entry that is still under review.
    pub fn with_pending_review(self) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let version = state.document.version;
            state
                .history
                .push(HistoryEntry::new(version, ApprovalState::Other("Pending".into())));
        }
        self
    }

    pub fn document(&self) -> SpecDocument {
        self.state.lock().unwrap().document.clone()
    }

    pub fn proposals(&self) -> Vec<ChangeProposal> {
        self.state.lock().unwrap().proposals.clone()
    }
}

#[async_trait]
impl SpecStore for InMemorySpecStore {
    async fn fetch(&self, _stack: &str) -> Result<SpecDocument, SpecStoreError> {
        Ok(self.document())
    }

    async fn propose(
        &self,
        _stack: &str,
        proposal: &ChangeProposal,
    ) -> Result<ProposalReceipt, SpecStoreError> {
        let mut state = self.state.lock().unwrap();
        let index = state.proposals.len();
        state.proposals.push(proposal.clone());

        let version = proposal.expected_version();
        if self.reject_at == Some(index) {
            state
                .history
                .push(HistoryEntry::new(version, ApprovalState::Rejected));
        } else {
            let mut accepted = proposal.document().clone();
            accepted.version = version;
            state.document = accepted;
            state
                .history
                .push(HistoryEntry::new(version, ApprovalState::Approved));
        }
        Ok(ProposalReceipt::Accepted)
    }

    async fn history(&self, _stack: &str) -> Result<Vec<HistoryEntry>, SpecStoreError> {
        Ok(self.state.lock().unwrap().history.clone())
    }
}

// ---------------------------------------------------------------------------
// FleetResolver
// ---------------------------------------------------------------------------

pub struct StaticFleet {
    fleet: FleetView,
    calls: Mutex<u32>,
}

impl StaticFleet {
    pub fn new(fleet: FleetView) -> Self {
        Self {
            fleet,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FleetResolver for StaticFleet {
    async fn resolve(
        &self,
        _stack: &str,
        _region: &str,
        _account: &str,
    ) -> Result<FleetView, FleetError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.fleet.clone())
    }
}

// ---------------------------------------------------------------------------
// RemoteProbe
// ---------------------------------------------------------------------------

/// One recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCall {
    pub host: String,
    pub command: String,
    pub mode: ExecMode,
}

struct Rule {
    host: Option<String>,
    prefix: String,
    output: ExecOutput,
}

/// Healthy hosts by default: every command exits 0 and the status query
/// prints the pass marker. Rules added later take precedence.
pub struct ScriptedProbe {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<ProbeCall>>,
}

impl ScriptedProbe {
    pub fn healthy() -> Self {
        let probe = Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        };
        probe.push(None, STATUS, stdout("kvstore-external-migrate-script main=>PASS"));
        probe
    }

    fn push(&self, host: Option<&str>, prefix: &str, output: ExecOutput) {
        self.rules.lock().unwrap().push(Rule {
            host: host.map(ToString::to_string),
            prefix: prefix.to_string(),
            output,
        });
    }

    /// `command` exits with `code` on `host`.
    pub fn exit(self, host: &str, command: &str, code: i32) -> Self {
        self.push(Some(host), command, ExecOutput::code(code));
        self
    }

    /// `command` exits with `code` on every host.
    pub fn exit_everywhere(self, command: &str, code: i32) -> Self {
        self.push(None, command, ExecOutput::code(code));
        self
    }

    /// The status query reports a failure marker on `host`.
    pub fn fails_migration(self, host: &str) -> Self {
        self.push(
            Some(host),
            STATUS,
            stdout("kvstore-external-migrate-script main=>FAIL"),
        );
        self
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn hosts_called_with(&self, prefix: &str) -> HashSet<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.command.starts_with(prefix))
            .map(|c| c.host)
            .collect()
    }
}

fn stdout(text: &str) -> ExecOutput {
    ExecOutput {
        exit_code: 0,
        stdout: text.to_string(),
        stderr: String::new(),
    }
}

#[async_trait]
impl RemoteProbe for ScriptedProbe {
    async fn exec(
        &self,
        host: &HostHandle,
        command: &str,
        mode: ExecMode,
        _timeout: Duration,
    ) -> Result<ExecOutput, RemoteProbeError> {
        self.calls.lock().unwrap().push(ProbeCall {
            host: host.label.clone(),
            command: command.to_string(),
            mode,
        });

        let rules = self.rules.lock().unwrap();
        let output = rules
            .iter()
            .rev()
            .find(|rule| {
                command.starts_with(&rule.prefix)
                    && rule.host.as_deref().map_or(true, |h| h == host.label)
            })
            .map_or_else(|| ExecOutput::code(0), |rule| rule.output.clone());
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// DowntimeScheduler
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingDowntime {
    events: Mutex<Vec<String>>,
    fail_add: bool,
    fail_remove: bool,
}

impl RecordingDowntime {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_add: true,
            fail_remove: false,
        }
    }

    /// Adds succeed, removals fail.
    pub fn sticky() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_add: false,
            fail_remove: true,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl DowntimeScheduler for RecordingDowntime {
    async fn add(&self, stack: &str, ticket: &str) -> Result<(), DowntimeError> {
        if self.fail_add {
            return Err(DowntimeError::CommandFailed("monitoring unreachable".into()));
        }
        self.events.lock().unwrap().push(format!("add {stack} {ticket}"));
        Ok(())
    }

    async fn remove(&self, stack: &str, ticket: &str) -> Result<(), DowntimeError> {
        if self.fail_remove {
            return Err(DowntimeError::CommandFailed("monitoring unreachable".into()));
        }
        self.events
            .lock()
            .unwrap()
            .push(format!("remove {stack} {ticket}"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<InMemorySpecStore>,
    pub fleet: Arc<StaticFleet>,
    pub probe: Arc<ScriptedProbe>,
    pub downtime: Arc<RecordingDowntime>,
    pub orchestrator: MigrationOrchestrator,
}

impl Harness {
    pub fn new(
        config: Config,
        store: InMemorySpecStore,
        fleet: FleetView,
        probe: ScriptedProbe,
        downtime: RecordingDowntime,
    ) -> Self {
        let store = Arc::new(store);
        let fleet = Arc::new(StaticFleet::new(fleet));
        let probe = Arc::new(probe);
        let downtime = Arc::new(downtime);
        let orchestrator = MigrationOrchestrator::new(
            config,
            store.clone(),
            fleet.clone(),
            probe.clone(),
            downtime.clone(),
            "tester",
        );
        Self {
            store,
            fleet,
            probe,
            downtime,
            orchestrator,
        }
    }

    /// `n` healthy standalone search heads, default collaborators.
    pub fn standalone(n: usize, probe: ScriptedProbe) -> Self {
        Self::new(
            test_config(),
            InMemorySpecStore::new(stack_document(n)),
            fleet_for(&labels(n)),
            probe,
            RecordingDowntime::default(),
        )
    }
}
