//! Spec store adapter over the `cloudctl` CLI

pub mod store;

pub use store::CloudctlSpecStore;
