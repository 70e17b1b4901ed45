//! Monitoring downtime adapters

pub mod command;

pub use command::CommandDowntime;
