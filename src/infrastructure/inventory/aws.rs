use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::domain::models::{Environment, FleetView, HostHandle, InventoryConfig};
use crate::domain::ports::{FleetError, FleetResolver};
use crate::infrastructure::command::{combined_output, program_command, run_captured};

const SEARCH_HEAD_ROLE: &str = "search-head";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstances {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
    #[serde(default)]
    instance_id: String,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

/// The instance tags the resolver cares about.
#[derive(Debug, Default, PartialEq, Eq)]
struct InstanceTags {
    role: Option<String>,
    label: Option<String>,
    fqdn: Option<String>,
    cluster: Option<String>,
}

impl From<&Instance> for InstanceTags {
    fn from(instance: &Instance) -> Self {
        let mut tags = Self::default();
        for tag in &instance.tags {
            let slot = match tag.key.as_str() {
                "Role" => &mut tags.role,
                "Label" => &mut tags.label,
                "FQDN" => &mut tags.fqdn,
                "Cluster" => &mut tags.cluster,
                _ => continue,
            };
            *slot = Some(tag.value.clone());
        }
        tags
    }
}

impl InstanceTags {
    /// The remote transport addresses hosts by the first FQDN segment.
    fn address(&self) -> Option<&str> {
        self.fqdn
            .as_deref()
            .and_then(|fqdn| fqdn.split('.').next())
            .filter(|short| !short.is_empty())
    }
}

/// Partition running instances into standalone search heads, cluster
/// members and everything else.
fn partition(response: DescribeInstances, environment: Environment) -> FleetView {
    let mut fleet = FleetView::default();
    let mut members: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for instance in response.reservations.iter().flat_map(|r| r.instances.iter()) {
        let tags = InstanceTags::from(instance);
        let Some(address) = tags.address() else {
            tracing::warn!(instance = %instance.instance_id, "instance has no FQDN tag, skipping");
            continue;
        };

        match (tags.role.as_deref(), tags.cluster.as_deref(), tags.label.as_deref()) {
            (Some(SEARCH_HEAD_ROLE), Some(cluster), _) => {
                members
                    .entry(cluster.to_string())
                    .or_default()
                    .push(address.to_string());
            }
            (Some(SEARCH_HEAD_ROLE), None, Some(label)) => {
                fleet.standalone.insert(
                    label.to_string(),
                    HostHandle::new(label, address, environment),
                );
            }
            (Some(SEARCH_HEAD_ROLE), None, None) => {
                tracing::warn!(
                    instance = %instance.instance_id,
                    "search head has neither Label nor Cluster tag, skipping"
                );
            }
            (role, _, label) => {
                let label = label.or(role).unwrap_or(address);
                fleet
                    .non_participating
                    .push(HostHandle::new(label, address, environment));
            }
        }
    }

    // Member indices follow address order so repeated resolutions agree.
    for (cluster, mut addresses) in members {
        addresses.sort();
        for address in addresses {
            fleet.push_cluster_member(&cluster, address, environment);
        }
    }
    fleet.non_participating.sort();
    fleet
}

/// `FleetResolver` backed by the `aws` CLI, using the stack's account id as
/// the CLI profile.
pub struct AwsCliFleetResolver {
    program: String,
    environment: Environment,
}

impl AwsCliFleetResolver {
    pub fn new(config: &InventoryConfig, environment: Environment) -> Self {
        Self {
            program: config.program.clone(),
            environment,
        }
    }
}

#[async_trait]
impl FleetResolver for AwsCliFleetResolver {
    async fn resolve(
        &self,
        stack: &str,
        region: &str,
        account: &str,
    ) -> Result<FleetView, FleetError> {
        let mut cmd = program_command(&self.program)?;
        cmd.args([
            "ec2",
            "describe-instances",
            "--profile",
            account,
            "--region",
            region,
            "--filters",
            &format!("Name=tag:Stack,Values={stack}"),
            "Name=instance-state-name,Values=running",
            "--output",
            "json",
        ]);

        let output = run_captured(cmd, None).await?;
        if !output.status.success() {
            return Err(FleetError::CommandFailed(
                combined_output(&output).trim().to_string(),
            ));
        }

        let response: DescribeInstances = serde_json::from_slice(&output.stdout)
            .map_err(|e| FleetError::InvalidResponse(e.to_string()))?;
        let fleet = partition(response, self.environment);
        tracing::info!(
            stack,
            standalone = fleet.standalone.len(),
            clusters = fleet.clusters.len(),
            non_participating = fleet.non_participating.len(),
            "fleet resolved"
        );
        Ok(fleet)
    }
}
