//! Output formatting for the CLI.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::style;
use serde::Serialize;
use std::time::Duration;

use crate::domain::models::{HostOutcome, MigrationOutcome, MigrationReport, StateTransition};
use crate::services::CheckReport;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// `1h 02m 03s` style rendering of a wall-clock duration.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// One line per recorded transition.
pub fn format_trail(trail: &[StateTransition]) -> String {
    trail
        .iter()
        .map(|t| {
            format!(
                "  {} {} -> {}",
                style(t.at.format("%H:%M:%S")).dim(),
                t.from,
                t.to
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn outcome_color(outcome: HostOutcome) -> Color {
    match outcome {
        HostOutcome::Converged => Color::Green,
        HostOutcome::Failed => Color::Red,
        HostOutcome::Pending => Color::Yellow,
    }
}

impl CommandOutput for MigrationReport {
    fn to_human(&self) -> String {
        let verdict = match &self.outcome {
            MigrationOutcome::AlreadyMigrated => style("already migrated").green().bold(),
            MigrationOutcome::Converged => style("migrated").green().bold(),
            MigrationOutcome::RolledBack { .. } => style("rolled back").red().bold(),
        };
        let mut lines = vec![format!(
            "{} {} in {} (run {})",
            style(&self.stack).bold(),
            verdict,
            format_elapsed(self.elapsed),
            self.run_id
        )];
        lines.push(format!(
            "started {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        if !self.changed_roles.is_empty() {
            lines.push(format!("roles: {}", self.changed_roles.join(", ")));
        }
        if let MigrationOutcome::RolledBack { failed_hosts } = &self.outcome {
            lines.push(format!("failed hosts: {}", failed_hosts.join(", ")));
        }

        if let Some(outcomes) = self.host_outcomes.as_ref().filter(|o| !o.is_empty()) {
            let mut table = Table::new();
            table
                .load_preset(presets::UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    Cell::new("Host").add_attribute(Attribute::Bold),
                    Cell::new("Outcome").add_attribute(Attribute::Bold),
                ]);
            for (host, outcome) in outcomes.iter() {
                table.add_row(vec![
                    Cell::new(host),
                    Cell::new(outcome.as_str()).fg(outcome_color(outcome)),
                ]);
            }
            lines.push(table.to_string());
        }

        lines.push("transitions:".to_string());
        lines.push(format_trail(&self.trail));
        lines.join("\n")
    }
}

impl CommandOutput for CheckReport {
    fn to_human(&self) -> String {
        let verdict = match (&self.blocker, self.already_migrated) {
            (Some(reason), _) => format!("{} {reason}", style("not eligible:").red().bold()),
            (None, true) => style("already migrated").green().bold().to_string(),
            (None, false) => style("eligible").green().bold().to_string(),
        };
        let mut lines = vec![
            format!("{} (version {})", style(&self.stack).bold(), self.version),
            format!(
                "platform: {}",
                self.platform_version.as_deref().unwrap_or("unknown")
            ),
            format!("premium add-ons: {}", self.addons.describe()),
        ];
        if !self.targeted_roles.is_empty() {
            lines.push(format!("targeted roles: {}", self.targeted_roles.join(", ")));
        }
        lines.push(verdict);
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(7)), "7s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_elapsed(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
