//! In-memory edits of a fetched spec document.
//!
//! Every function here takes the latest fetched document and returns a new
//! one; nothing is written to the spec store from this module.

use std::collections::BTreeMap;

use crate::domain::errors::{MigrationError, MigrationResult};
use crate::domain::models::{
    FeatureFlags, MaintenanceWindow, MigrationPlan, RollbackMode, SpecDocument, TargetSelection,
};

/// A mutated document and the roles whose overrides were touched.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMigration {
    pub document: SpecDocument,
    pub changed_roles: Vec<String>,
    /// Root flags as fetched, captured before any edit.
    pub original_root_flags: Option<FeatureFlags>,
}

fn overlay<V: Clone>(target: &mut BTreeMap<String, V>, values: &BTreeMap<String, V>) {
    target.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
}

/// Apply the target flags and settings and open the maintenance window.
///
/// Root defaults are written first, then the role override on each targeted
/// active role. Inactive roles are skipped even when named. Fails when no role
/// ends up changed.
pub fn apply_migration(
    fetched: &SpecDocument,
    plan: &MigrationPlan,
    targets: &TargetSelection,
    with_overlay: bool,
) -> MigrationResult<AppliedMigration> {
    let mut doc = fetched.clone();
    let spec = &mut doc.spec;

    let root = spec.feature_flags.get_or_insert_with(FeatureFlags::new);
    overlay(root, &plan.root_flags);
    let settings = spec.platform_settings.get_or_insert_with(Default::default);
    overlay(settings, &plan.platform_settings);
    if with_overlay {
        overlay(root, &plan.overlay_flags);
        overlay(settings, &plan.overlay_settings);
    }

    let mut changed_roles = Vec::new();
    for role in &mut spec.search_heads {
        if role.is_active() && targets.includes(&role.name) {
            overlay(
                role.feature_flags.get_or_insert_with(FeatureFlags::new),
                &plan.role_flags,
            );
            changed_roles.push(role.name.clone());
        }
    }
    if let Some(cluster) = spec.search_head_cluster.as_mut() {
        if cluster.is_active() && targets.includes(&cluster.name) {
            overlay(
                cluster.feature_flags.get_or_insert_with(FeatureFlags::new),
                &plan.role_flags,
            );
            changed_roles.push(cluster.name.clone());
        }
    }

    if changed_roles.is_empty() {
        return Err(MigrationError::validation(
            "no active search head matches the requested targets; nothing would change",
        ));
    }

    spec.maintenance_window = Some(MaintenanceWindow::all_week());

    Ok(AppliedMigration {
        document: doc,
        changed_roles,
        original_root_flags: fetched.spec.feature_flags.clone(),
    })
}

/// Build the compensating document from the latest fetched one.
pub fn revert_for_rollback(
    latest: &SpecDocument,
    original_root_flags: Option<&FeatureFlags>,
    changed_roles: &[String],
    plan: &MigrationPlan,
    mode: RollbackMode,
) -> SpecDocument {
    let mut doc = latest.clone();

    match mode {
        RollbackMode::Restore => {
            doc.spec.feature_flags = original_root_flags.cloned();
        }
        RollbackMode::Disable => {
            let root = doc.spec.feature_flags.get_or_insert_with(FeatureFlags::new);
            match original_root_flags {
                Some(original) if original.contains_key(&plan.primary_flag) => {
                    overlay(root, original);
                }
                _ => overlay(root, &plan.disabled_flags),
            }
        }
    }

    let cleared = plan.role_flags_cleared();
    for role in &mut doc.spec.search_heads {
        if changed_roles.contains(&role.name) {
            overlay(role.feature_flags.get_or_insert_with(FeatureFlags::new), &cleared);
        }
    }
    if let Some(cluster) = doc.spec.search_head_cluster.as_mut() {
        if changed_roles.contains(&cluster.name) && cluster.is_active() {
            overlay(
                cluster.feature_flags.get_or_insert_with(FeatureFlags::new),
                &cleared,
            );
        }
    }
    doc
}

/// Empty the maintenance window region.
pub fn clear_window(latest: &SpecDocument) -> SpecDocument {
    let mut doc = latest.clone();
    doc.spec.maintenance_window = Some(MaintenanceWindow::default());
    doc
}
