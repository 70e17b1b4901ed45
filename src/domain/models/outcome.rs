//! Per-host results of a polling stage and the budget that bounds it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Result of one host within a polling stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostOutcome {
    Converged,
    Failed,
    /// Still pending. Once a poll returns, this means unresolved.
    Pending,
}

impl HostOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::Failed => "failed",
            Self::Pending => "pending",
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Host label to outcome. Resolved outcomes are final.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSet {
    outcomes: BTreeMap<String, HostOutcome>,
    /// Hosts excluded from further resync attempts after reporting unreachable.
    unreachable: BTreeSet<String>,
    rounds: u32,
}

impl OutcomeSet {
    /// Start with every label pending.
    pub fn pending<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcomes: labels
                .into_iter()
                .map(|label| (label.into(), HostOutcome::Pending))
                .collect(),
            unreachable: BTreeSet::new(),
            rounds: 0,
        }
    }

    /// Record a resolution. A host already resolved keeps its first outcome;
    /// returns whether the record changed.
    pub fn resolve(&mut self, label: &str, outcome: HostOutcome) -> bool {
        match self.outcomes.get_mut(label) {
            Some(current) if !current.is_resolved() && outcome.is_resolved() => {
                *current = outcome;
                true
            }
            _ => false,
        }
    }

    pub fn mark_unreachable(&mut self, label: &str) -> bool {
        self.outcomes.contains_key(label) && self.unreachable.insert(label.to_string())
    }

    pub fn is_unreachable(&self, label: &str) -> bool {
        self.unreachable.contains(label)
    }

    pub(crate) fn record_round(&mut self) {
        self.rounds += 1;
    }

    /// Number of rounds the producing poll ran.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn get(&self, label: &str) -> Option<HostOutcome> {
        self.outcomes.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, HostOutcome)> {
        self.outcomes.iter().map(|(label, outcome)| (label.as_str(), *outcome))
    }

    fn labels_with(&self, wanted: HostOutcome) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| **outcome == wanted)
            .map(|(label, _)| label.clone())
            .collect()
    }

    pub fn converged(&self) -> Vec<String> {
        self.labels_with(HostOutcome::Converged)
    }

    pub fn failed(&self) -> Vec<String> {
        self.labels_with(HostOutcome::Failed)
    }

    pub fn unresolved(&self) -> Vec<String> {
        self.labels_with(HostOutcome::Pending)
    }

    pub fn unreachable(&self) -> Vec<String> {
        self.unreachable.iter().cloned().collect()
    }

    pub fn has_pending(&self) -> bool {
        self.outcomes.values().any(|o| !o.is_resolved())
    }

    pub fn any_failed(&self) -> bool {
        self.outcomes.values().any(|o| *o == HostOutcome::Failed)
    }

    /// Every host converged with success.
    pub fn all_converged(&self) -> bool {
        self.outcomes.values().all(|o| *o == HostOutcome::Converged)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Ceiling on resync rounds plus the fixed delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryBudget {
    pub max_rounds: u32,
    pub delay: Duration,
}

impl RetryBudget {
    pub const fn new(max_rounds: u32, delay: Duration) -> Self {
        Self { max_rounds, delay }
    }

    pub fn is_exhausted(&self, rounds: u32) -> bool {
        rounds >= self.max_rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_is_final() {
        let mut set = OutcomeSet::pending(["a", "b"]);
        assert!(set.resolve("a", HostOutcome::Failed));
        assert!(!set.resolve("a", HostOutcome::Converged));
        assert!(!set.resolve("missing", HostOutcome::Converged));
        assert!(!set.resolve("b", HostOutcome::Pending));
        assert_eq!(set.get("a"), Some(HostOutcome::Failed));
        assert_eq!(set.unresolved(), vec!["b"]);
        assert!(set.any_failed());
        assert!(!set.all_converged());
    }

    #[test]
    fn test_unreachable_tracking() {
        let mut set = OutcomeSet::pending(["a"]);
        assert!(set.mark_unreachable("a"));
        assert!(!set.mark_unreachable("a"));
        assert!(!set.mark_unreachable("zzz"));
        assert!(set.is_unreachable("a"));
        assert_eq!(set.get("a"), Some(HostOutcome::Pending));
    }

    #[test]
    fn test_budget_exhaustion() {
        let budget = RetryBudget::new(3, Duration::from_secs(30));
        assert!(!budget.is_exhausted(2));
        assert!(budget.is_exhausted(3));
        assert!(RetryBudget::new(0, Duration::ZERO).is_exhausted(0));
    }
}
