//! `run`: drive one migration to a terminal state.

use anyhow::Result;

use crate::cli::banner::{abort_banner, abort_json};
use crate::cli::commands::build_orchestrator;
use crate::cli::output::output;
use crate::cli::types::RunArgs;
use crate::domain::models::Config;

/// Returns the process exit status for the run.
pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<i32> {
    let request = args.to_request();
    let orchestrator = build_orchestrator(config, request.environment);

    match orchestrator.run(&request).await {
        Ok(report) => {
            output(&report, json_mode);
            Ok(report.outcome.exit_code())
        }
        Err(abort) => {
            tracing::error!(
                stack = %request.stack,
                failed_in = %abort.failed_in,
                category = abort.error.category(),
                error = %abort.error,
                "migration aborted"
            );
            if json_mode {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&abort_json(&abort, &request))
                        .unwrap_or_default()
                );
            } else {
                eprintln!("{}", abort_banner(&abort, &request));
            }
            Ok(abort.exit_code())
        }
    }
}
