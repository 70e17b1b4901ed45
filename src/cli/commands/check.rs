//! `check`: read-only eligibility report.

use anyhow::{Context, Result};

use crate::cli::commands::build_orchestrator;
use crate::cli::output::output;
use crate::cli::types::StackArgs;
use crate::domain::models::Config;

pub async fn execute(args: StackArgs, config: &Config, json_mode: bool) -> Result<i32> {
    let stack = args.stack_name();
    let orchestrator = build_orchestrator(config, args.env);
    let report = orchestrator
        .check(&stack, args.env, &args.selection())
        .await
        .with_context(|| format!("Failed to check stack {stack}"))?;

    output(&report, json_mode);
    Ok(if report.blocker.is_some() { 1 } else { 0 })
}
