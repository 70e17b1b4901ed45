//! Remote execution adapter over the `sft ssh` CLI

pub mod sft;

pub use sft::SftRemoteProbe;
