//! Precondition checks and the "already migrated" predicate.

use std::collections::BTreeSet;

use crate::domain::errors::{MigrationError, MigrationResult};
use crate::domain::models::{
    FeatureFlags, MigrationConfig, MigrationPlan, PlatformVersion, RoleRef, SpecDocument,
    TargetSelection,
};

/// Which of the configured premium add-ons are installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AddonMembership {
    pub present: BTreeSet<String>,
    pub absent: BTreeSet<String>,
}

impl AddonMembership {
    /// Check every add-on; never stops at the first hit.
    pub fn of(doc: &SpecDocument, addons: &[String]) -> Self {
        let (present, absent) = addons
            .iter()
            .cloned()
            .partition(|addon| doc.premium_app_installed(addon));
        Self { present, absent }
    }

    pub fn any_present(&self) -> bool {
        !self.present.is_empty()
    }

    pub fn describe(&self) -> String {
        let join = |set: &BTreeSet<String>| {
            if set.is_empty() {
                "none".to_string()
            } else {
                set.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        };
        format!("present: {}; absent: {}", join(&self.present), join(&self.absent))
    }
}

/// Facts established by a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedStack {
    pub region: String,
    pub account: String,
    pub addons: AddonMembership,
    /// The overlay add-on is installed, so its flags and settings apply too.
    pub overlay_applies: bool,
}

fn is_subset(wanted: &FeatureFlags, actual: &FeatureFlags) -> bool {
    wanted.iter().all(|(key, value)| actual.get(key) == Some(value))
}

/// Active roles selected by `targets`, cluster last.
pub fn targeted_active_roles<'a>(
    doc: &'a SpecDocument,
    targets: &TargetSelection,
) -> Vec<RoleRef<'a>> {
    doc.roles()
        .into_iter()
        .filter(|role| role.is_active() && targets.includes(role.name()))
        .collect()
}

/// True only when the document is already fully migrated for `targets`.
///
/// Requires the root flags, the effective flags of every targeted active
/// role (uniformly), and the platform setting keys. A document with no
/// targeted active role is never considered migrated.
pub fn is_already_migrated(
    doc: &SpecDocument,
    plan: &MigrationPlan,
    targets: &TargetSelection,
) -> bool {
    let Some(root) = doc.spec.feature_flags.as_ref() else {
        return false;
    };
    if !is_subset(&plan.root_flags, root) {
        return false;
    }

    let roles = targeted_active_roles(doc, targets);
    if roles.is_empty() {
        return false;
    }
    let uniform = roles
        .iter()
        .all(|role| is_subset(&plan.role_flags, &doc.effective_flags(*role)));
    if !uniform {
        return false;
    }

    doc.spec.platform_settings.as_ref().is_some_and(|settings| {
        plan.platform_settings
            .keys()
            .all(|key| settings.contains_key(key))
    })
}

/// Check every precondition of the Validating stage.
pub fn validate(
    doc: &SpecDocument,
    targets: &TargetSelection,
    config: &MigrationConfig,
) -> MigrationResult<ValidatedStack> {
    validate_targets(doc, targets, config)?;
    validate_platform_version(doc, &config.min_platform_version)?;

    let addons = AddonMembership::of(doc, &config.incompatible_addons);
    if addons.any_present() {
        return Err(MigrationError::validation(format!(
            "incompatible premium add-ons installed ({})",
            addons.describe()
        )));
    }

    if !doc.cloud().eq_ignore_ascii_case("aws") {
        return Err(MigrationError::validation(format!(
            "only AWS stacks are supported, stack is hosted in {}",
            doc.cloud()
        )));
    }
    let region = doc
        .spec
        .region
        .clone()
        .ok_or_else(|| MigrationError::validation("stack spec has no region"))?;
    let account = doc
        .account_id()
        .map(str::to_string)
        .ok_or_else(|| MigrationError::validation("stack status has no provisioner account id"))?;

    Ok(ValidatedStack {
        region,
        account,
        overlay_applies: doc.premium_app_installed(&config.overlay_addon),
        addons,
    })
}

fn validate_targets(
    doc: &SpecDocument,
    targets: &TargetSelection,
    config: &MigrationConfig,
) -> MigrationResult<()> {
    match targets {
        TargetSelection::All => {
            let active_cluster = doc
                .spec
                .search_head_cluster
                .as_ref()
                .filter(|cluster| cluster.is_active());
            if let Some(cluster) = active_cluster {
                if !config.cluster_support {
                    return Err(MigrationError::validation(format!(
                        "search head cluster '{}' detected; clusters are not supported by this configuration",
                        cluster.name
                    )));
                }
            }
            Ok(())
        }
        TargetSelection::Named(names) => {
            let unknown: Vec<&str> = names
                .iter()
                .map(String::as_str)
                .filter(|name| doc.role(name).is_none())
                .collect();
            if !unknown.is_empty() {
                return Err(MigrationError::validation(format!(
                    "unknown target roles [{}]; confirm the stack and target list",
                    unknown.join(", ")
                )));
            }
            for name in names {
                let Some(role) = doc.role(name) else { continue };
                if role.is_cluster() && !config.cluster_support {
                    return Err(MigrationError::validation(format!(
                        "'{name}' is a search head cluster; clusters are not supported by this configuration"
                    )));
                }
                if !role.is_active() {
                    return Err(MigrationError::validation(format!(
                        "target role '{name}' has zero active size"
                    )));
                }
            }
            Ok(())
        }
    }
}

fn validate_platform_version(doc: &SpecDocument, floor: &str) -> MigrationResult<()> {
    let floor: PlatformVersion = floor
        .parse()
        .map_err(|e: String| MigrationError::validation(format!("minimum version: {e}")))?;
    let raw = doc
        .platform_version()
        .ok_or_else(|| MigrationError::validation("stack spec has no platform version"))?;
    let current: PlatformVersion = raw
        .parse()
        .map_err(MigrationError::validation)?;
    if current < floor {
        return Err(MigrationError::validation(format!(
            "platform version {current} is below {floor} and cannot be migrated"
        )));
    }
    Ok(())
}
