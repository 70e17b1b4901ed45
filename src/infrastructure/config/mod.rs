//! Migrator configuration loading
//!
//! Defaults, then `.kv-migrator/config.yaml` and `local.yaml`, then
//! `KVMIGRATOR_*` environment overrides, merged with figment and validated
//! before any collaborator is built.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
