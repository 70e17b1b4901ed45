mod common;

use common::*;
use kv_migrator::domain::models::{
    Environment, HostHandle, MigrationPlan, RetryBudget, TargetConfig, TargetSelection,
};
use kv_migrator::domain::ports::ExecMode;
use kv_migrator::services::{eligibility, spec_mutation, ConvergencePoller, ProbeTimeouts, WorkerPool};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn plan() -> MigrationPlan {
    MigrationPlan::resolve(&TargetConfig::default(), STACK, Environment::Prod)
}

/// A document with one role per entry of `counts`, fully migrated when
/// `migrated[i]` is set for every active role.
fn document(counts: &[u32], migrated: &[bool]) -> kv_migrator::SpecDocument {
    let plan = plan();
    let mut doc = stack_document(counts.len());
    doc.spec.feature_flags = Some(plan.root_flags.clone());
    doc.spec.platform_settings = Some(plan.platform_settings.clone());
    for ((role, count), done) in doc.spec.search_heads.iter_mut().zip(counts).zip(migrated) {
        role.count = Some(*count);
        if *done {
            role.feature_flags = Some(plan.role_flags.clone());
        }
    }
    doc
}

fn timeouts() -> ProbeTimeouts {
    let tick = Duration::from_millis(50);
    ProbeTimeouts {
        check: tick,
        capture: tick,
        trigger: tick,
    }
}

proptest! {
    /// Divergent override state across targeted active roles is never eligible.
    #[test]
    fn prop_divergent_roles_never_already_migrated(
        counts in prop::collection::vec(0u32..3, 2..8),
        migrated in prop::collection::vec(any::<bool>(), 8),
    ) {
        let doc = document(&counts, &migrated);
        let active: Vec<bool> = counts
            .iter()
            .zip(&migrated)
            .filter(|(count, _)| **count > 0)
            .map(|(_, done)| *done)
            .collect();

        let verdict = eligibility::is_already_migrated(&doc, &plan(), &TargetSelection::All);
        let expected = !active.is_empty() && active.iter().all(|done| *done);
        prop_assert_eq!(verdict, expected);
    }

    /// Roles with zero size are never mutated, whatever the target list says.
    #[test]
    fn prop_inactive_roles_never_mutated(
        counts in prop::collection::vec(0u32..3, 1..8),
        picks in prop::collection::vec(any::<bool>(), 8),
        select_all in any::<bool>(),
    ) {
        let doc = document(&counts, &vec![false; counts.len()]);
        let targets = if select_all {
            TargetSelection::All
        } else {
            TargetSelection::from_labels(
                labels(counts.len())
                    .into_iter()
                    .zip(&picks)
                    .filter(|(_, pick)| **pick)
                    .map(|(label, _)| label),
            )
        };
        let inactive: BTreeSet<String> = labels(counts.len())
            .into_iter()
            .zip(&counts)
            .filter(|(_, count)| **count == 0)
            .map(|(label, _)| label)
            .collect();

        match spec_mutation::apply_migration(&doc, &plan(), &targets, false) {
            Ok(applied) => {
                for role in &applied.changed_roles {
                    prop_assert!(!inactive.contains(role), "{} was mutated", role);
                }
                for role in &applied.document.spec.search_heads {
                    if inactive.contains(&role.name) {
                        prop_assert!(role.feature_flags.is_none());
                    }
                }
            }
            Err(_) => {
                let any_active_target = labels(counts.len())
                    .iter()
                    .any(|label| !inactive.contains(label) && targets.includes(label));
                prop_assert!(!any_active_target);
            }
        }
    }

    /// A condition that never holds ends after exactly the budgeted rounds.
    #[test]
    fn prop_poll_terminates_on_budget(rounds in 1u32..6, hosts in 1usize..5) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let probe = Arc::new(ScriptedProbe::healthy().exit_everywhere(STORE_EXTERNAL, 1));
        let poller = ConvergencePoller::new(probe.clone(), WorkerPool::new(2), timeouts());
        let handles: Vec<HostHandle> = labels(hosts)
            .iter()
            .map(|l| HostHandle::new(l, l, Environment::Prod))
            .collect();

        let outcomes = runtime.block_on(poller.poll(
            &handles,
            RESYNC,
            STORE_EXTERNAL,
            RetryBudget::new(rounds, Duration::ZERO),
        ));

        prop_assert_eq!(outcomes.rounds(), rounds);
        prop_assert_eq!(outcomes.unresolved().len(), hosts);
        let checks = probe
            .calls()
            .iter()
            .filter(|c| c.command == STORE_EXTERNAL && c.mode == ExecMode::ExitCode)
            .count();
        prop_assert_eq!(checks, hosts * rounds as usize);
    }
}
