//! Port trait definitions (Hexagonal Architecture)
//!
//! Async interfaces for every external collaborator of the migration:
//! - SpecStore: versioned stack specification with an approval gate
//! - FleetResolver: stack roles to reachable hosts
//! - RemoteProbe: command execution on a host
//! - DowntimeScheduler: monitoring mute toggling

pub mod downtime;
pub mod errors;
pub mod fleet_resolver;
pub mod remote_probe;
pub mod spec_store;

pub use downtime::{DowntimeScheduler, NoopDowntime};
pub use errors::{DowntimeError, FleetError, RemoteProbeError, SpecStoreError};
pub use fleet_resolver::FleetResolver;
pub use remote_probe::{ExecMode, ExecOutput, RemoteProbe};
pub use spec_store::SpecStore;
