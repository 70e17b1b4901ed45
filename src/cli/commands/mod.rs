//! CLI command implementations.

pub mod check;
pub mod run;

use std::sync::Arc;

use crate::domain::models::{Config, Environment};
use crate::domain::ports::{DowntimeScheduler, NoopDowntime};
use crate::infrastructure::cloudctl::CloudctlSpecStore;
use crate::infrastructure::downtime::CommandDowntime;
use crate::infrastructure::inventory::AwsCliFleetResolver;
use crate::infrastructure::remote::SftRemoteProbe;
use crate::services::MigrationOrchestrator;

/// Identity recorded on proposals and downtime entries.
pub fn submitting_user() -> String {
    std::env::var("USER")
        .ok()
        .filter(|user| !user.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Wire the CLI-backed adapters into an orchestrator for one environment.
pub fn build_orchestrator(config: &Config, environment: Environment) -> MigrationOrchestrator {
    let user = submitting_user();
    let downtime: Arc<dyn DowntimeScheduler> = if config.downtime.is_configured() {
        Arc::new(CommandDowntime::new(config.downtime.clone(), user.clone()))
    } else {
        Arc::new(NoopDowntime)
    };

    MigrationOrchestrator::new(
        config.clone(),
        Arc::new(CloudctlSpecStore::new(&config.cloudctl, environment)),
        Arc::new(AwsCliFleetResolver::new(&config.inventory, environment)),
        Arc::new(SftRemoteProbe::new(config.remote.clone())),
        downtime,
        user,
    )
}
