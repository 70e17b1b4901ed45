//! KV Migrator - staged fleet-wide KV store migration
//!
//! Moves a stack's search heads from the node-local KV store to the external
//! service by submitting spec changes through an approval workflow, waiting
//! for hosts to converge, and compensating with a rollback when any host
//! reports a failure.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, the run state machine, port traits
//! - **Service Layer** (`services`): Eligibility, mutation, polling and orchestration
//! - **Infrastructure Layer** (`infrastructure`): CLI-backed adapters, config, logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use kv_migrator::cli::commands::build_orchestrator;
//! use kv_migrator::{ConfigLoader, Environment, MigrationRequest, TargetSelection};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let orchestrator = build_orchestrator(&config, Environment::Prod);
//!     let report = orchestrator
//!         .run(&MigrationRequest {
//!             stack: "acme".into(),
//!             ticket: "CO2-1234".into(),
//!             environment: Environment::Prod,
//!             targets: TargetSelection::All,
//!             skip_downtime: false,
//!         })
//!         .await?;
//!     println!("{:?}", report.outcome);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{MigrationAbort, MigrationError, MigrationResult};
pub use domain::models::{
    Config, Environment, FleetView, HostHandle, HostOutcome, MigrationOutcome, MigrationReport,
    MigrationRequest, MigrationState, OutcomeSet, SpecDocument, TargetSelection,
};
pub use domain::ports::{DowntimeScheduler, FleetResolver, RemoteProbe, SpecStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::MigrationOrchestrator;
