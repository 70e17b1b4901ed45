//! Domain layer for the migrator
//!
//! Pure data and state-machine rules, plus the port traits that
//! infrastructure adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{MigrationAbort, MigrationError, MigrationResult};
