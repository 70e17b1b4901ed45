//! Command-line interface: argument parsing, command handlers and output.

pub mod banner;
pub mod commands;
pub mod output;
pub mod types;

pub use banner::handle_error;
pub use types::{Cli, Commands};
