//! Point-in-time view of a stack's reachable hosts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::environment::Environment;

/// One reachable unit of compute. Created fresh per resolution, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostHandle {
    /// Role name for standalone nodes, `{cluster}-{index}` for cluster members.
    pub label: String,
    /// Address handed to the remote execution transport.
    pub address: String,
    pub environment: Environment,
    /// Owning cluster label, for cluster members only.
    pub cluster: Option<String>,
}

impl HostHandle {
    pub fn new(label: impl Into<String>, address: impl Into<String>, environment: Environment) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
            environment,
            cluster: None,
        }
    }

    pub fn in_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }
}

/// Hosts partitioned into disjoint categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetView {
    /// Standalone search heads keyed by role label.
    pub standalone: BTreeMap<String, HostHandle>,
    /// Cluster members keyed by cluster label, in member index order.
    pub clusters: BTreeMap<String, Vec<HostHandle>>,
    /// Hosts that take no part in the migration (indexers, managers, ...).
    pub non_participating: Vec<HostHandle>,
}

impl FleetView {
    /// Add a cluster member, synthesizing its `{cluster}-{index}` label.
    pub fn push_cluster_member(
        &mut self,
        cluster: &str,
        address: impl Into<String>,
        environment: Environment,
    ) {
        let members = self.clusters.entry(cluster.to_string()).or_default();
        let label = format!("{cluster}-{}", members.len());
        members.push(HostHandle::new(label, address, environment).in_cluster(cluster));
    }

    /// Every participating host whose role is in `roles`, sorted by label.
    pub fn hosts_for_roles<'a, I>(&self, roles: I) -> Vec<HostHandle>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hosts = Vec::new();
        for role in roles {
            if let Some(host) = self.standalone.get(role) {
                hosts.push(host.clone());
            }
            if let Some(members) = self.clusters.get(role) {
                hosts.extend(members.iter().cloned());
            }
        }
        hosts.sort();
        hosts.dedup();
        hosts
    }
}

#[cfg(test)]
impl FleetView {
    pub fn lookup(&self, label: &str) -> Option<&HostHandle> {
        self.standalone.get(label).or_else(|| {
            self.clusters
                .values()
                .flat_map(|members| members.iter())
                .find(|host| host.label == label)
        })
    }

    pub fn participating_count(&self) -> usize {
        self.standalone.len() + self.clusters.values().map(Vec::len).sum::<usize>()
    }
}
