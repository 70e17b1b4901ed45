pub mod change;
pub mod config;
pub mod environment;
pub mod fleet;
pub mod migration;
pub mod outcome;
pub mod plan;
pub mod platform_version;
pub mod resync;
pub mod spec_document;

pub use change::{ApprovalState, ChangeProposal, HistoryEntry, ProposalReceipt};
pub use config::{
    CloudctlConfig, Config, DowntimeConfig, InventoryConfig, LoggingConfig, MigrationConfig,
    PollingConfig, ProbeConfig, RemoteConfig, RollbackMode, TargetConfig,
};
pub use environment::Environment;
pub use fleet::{FleetView, HostHandle};
pub use migration::{
    MigrationOutcome, MigrationReport, MigrationRequest, MigrationState, StateTransition,
    TargetSelection, ALL_TARGETS,
};
pub use outcome::{HostOutcome, OutcomeSet, RetryBudget};
pub use plan::MigrationPlan;
pub use platform_version::PlatformVersion;
pub use resync::{ResyncDisposition, ResyncOutcome};
pub use spec_document::{
    FeatureFlags, MaintenanceWindow, PlatformSettings, RoleRef, SearchHeadClusterRole,
    SearchHeadRole, SpecDocument, StackSpec,
};
