//! Terminal rendering of aborted runs and setup errors.

use console::style;
use serde_json::json;

use crate::cli::output::format_trail;
use crate::domain::errors::{MigrationAbort, MigrationError};
use crate::domain::models::MigrationRequest;

pub fn abort_banner(abort: &MigrationAbort, request: &MigrationRequest) -> String {
    let mut lines = vec![
        format!(
            "{} migration of {} aborted in {} ({})",
            style("✗").red().bold(),
            style(&request.stack).bold(),
            abort.failed_in,
            abort.error.category()
        ),
        format!("  {}", abort.error),
    ];

    if matches!(abort.error, MigrationError::RollbackFailed { .. }) {
        lines.push(
            style(
                "  Rollback did not complete. \
                 The stack may be in neither the original nor the migrated state.",
            )
            .red()
            .to_string(),
        );
    } else if abort.committed() {
        lines.push(
            style("  Changes were committed to the spec store. Review the stack before re-running.")
                .yellow()
                .to_string(),
        );
    }

    if abort.downtime_active {
        lines.push(
            style(format!(
                "  Downtime for {} is still active. Remove it manually once the stack is healthy.",
                request.stack
            ))
            .yellow()
            .bold()
            .to_string(),
        );
    } else {
        lines.push(format!(
            "  Check the monitoring downtime state for {} before re-running.",
            request.stack
        ));
    }

    if !abort.trail.is_empty() {
        lines.push("transitions:".to_string());
        lines.push(format_trail(&abort.trail));
    }
    lines.join("\n")
}

pub fn abort_json(abort: &MigrationAbort, request: &MigrationRequest) -> serde_json::Value {
    json!({
        "stack": request.stack,
        "error": abort.error.to_string(),
        "category": abort.error.category(),
        "failed_in": abort.failed_in,
        "exit_code": abort.exit_code(),
        "committed": abort.committed(),
        "downtime_active": abort.downtime_active,
        "trail": abort.trail,
    })
}

/// Print an error that happened outside a run and return the exit status.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> i32 {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "error": format!("{err:#}") }))
                .unwrap_or_default()
        );
    } else {
        eprintln!("{} {err:#}", style("Error:").red().bold());
    }
    1
}
