//! Infrastructure layer module
//!
//! Adapters for the external systems the migrator drives, plus
//! configuration and logging:
//! - cloudctl spec store
//! - sft remote execution
//! - aws CLI fleet inventory
//! - downtime hooks
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod cloudctl;
pub mod command;
pub mod config;
pub mod downtime;
pub mod inventory;
pub mod logging;
pub mod remote;
