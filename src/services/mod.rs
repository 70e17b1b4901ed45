//! Application services
//!
//! Eligibility and spec mutation are pure functions over a fetched document.
//! The remaining services drive the ports: approval waits, bounded polling
//! rounds, completion watching, and the orchestrator that sequences them.

pub mod change_controller;
pub mod completion_monitor;
pub mod convergence_poller;
pub mod eligibility;
pub mod migration_orchestrator;
pub mod spec_mutation;
pub mod worker_pool;

pub use change_controller::ChangeController;
pub use completion_monitor::{CompletionMonitor, StatusMarkers};
pub use convergence_poller::{ConvergencePoller, NudgeReport, ProbeTimeouts};
pub use eligibility::{AddonMembership, ValidatedStack};
pub use migration_orchestrator::{CheckReport, MigrationOrchestrator};
pub use spec_mutation::AppliedMigration;
pub use worker_pool::WorkerPool;
