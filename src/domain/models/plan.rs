//! Concrete flag and setting values for one stack in one environment.

use serde_json::Value;

use super::config::TargetConfig;
use super::environment::Environment;
use super::spec_document::{FeatureFlags, PlatformSettings};

/// Resolved target values of a migration run.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    /// Root flags that must be present after migration.
    pub root_flags: FeatureFlags,
    /// Per-role override flags.
    pub role_flags: FeatureFlags,
    /// Platform settings; eligibility checks key presence only.
    pub platform_settings: PlatformSettings,
    pub overlay_flags: FeatureFlags,
    pub overlay_settings: PlatformSettings,
    pub primary_flag: String,
    pub disabled_flags: FeatureFlags,
}

impl MigrationPlan {
    pub fn resolve(targets: &TargetConfig, stack: &str, environment: Environment) -> Self {
        let domain = targets
            .scs_domains
            .get(&environment)
            .map_or("", String::as_str);
        let expand = |settings: &PlatformSettings| -> PlatformSettings {
            settings
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(template) => Value::String(
                            template
                                .replace("{stack}", stack)
                                .replace("{scs_domain}", domain),
                        ),
                        other => other.clone(),
                    };
                    (key.clone(), value)
                })
                .collect()
        };

        Self {
            root_flags: targets.root_flags.clone(),
            role_flags: targets.role_flags.clone(),
            platform_settings: expand(&targets.platform_settings),
            overlay_flags: targets.overlay_flags.clone(),
            overlay_settings: expand(&targets.overlay_settings),
            primary_flag: targets.primary_flag.clone(),
            disabled_flags: targets.disabled_flags.clone(),
        }
    }

    /// Role override flags with every value negated, used to stop the
    /// host-side procedure on rollback.
    pub fn role_flags_cleared(&self) -> FeatureFlags {
        self.role_flags
            .iter()
            .map(|(key, value)| (key.clone(), !value))
            .collect()
    }
}
