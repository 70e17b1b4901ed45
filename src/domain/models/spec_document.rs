//! Declarative stack specification as stored in the external spec store.
//!
//! Only the regions the migration reads or writes are modeled explicitly;
//! everything else is carried through `extra` maps so that a fetched document
//! can be written back without losing fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Feature flag name to enabled state.
pub type FeatureFlags = BTreeMap<String, bool>;

/// Platform setting name to scalar value.
pub type PlatformSettings = BTreeMap<String, Value>;

/// A versioned stack document: `{ "version": N, "spec": {...}, "status": {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecDocument {
    /// Increases by exactly one per accepted change.
    pub version: u64,

    pub spec: StackSpec,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub status: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The mutable `spec` region of a stack document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSpec {
    /// Process-wide flag defaults. `None` when the region is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_flags: Option<FeatureFlags>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_settings: Option<PlatformSettings>,

    #[serde(default)]
    pub search_heads: Vec<SearchHeadRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_head_cluster: Option<SearchHeadClusterRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium_apps: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_info: Option<ReleaseInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A standalone search-head role entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHeadRole {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_flags: Option<FeatureFlags>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchHeadRole {
    /// A role with `count == 0` is inactive. A missing count means the
    /// platform default of one instance.
    pub fn is_active(&self) -> bool {
        self.count != Some(0)
    }
}

/// The search-head-cluster role entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHeadClusterRole {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_flags: Option<FeatureFlags>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchHeadClusterRole {
    /// Clusters with no declared size are treated as not provisioned.
    pub fn is_active(&self) -> bool {
        self.size.is_some_and(|size| size > 0)
    }
}

/// Window during which automated remediation may act on the stack.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindow {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<WindowRange>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRange {
    pub start_time: String,
    pub duration: String,
}

impl MaintenanceWindow {
    /// Every day, 00:00 for 23h59m.
    pub fn all_week() -> Self {
        Self {
            ranges: vec![WindowRange {
                start_time: "00:00".to_string(),
                duration: "23h59m".to_string(),
            }],
            days: [
                "monday",
                "tuesday",
                "wednesday",
                "thursday",
                "friday",
                "saturday",
                "sunday",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.days.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splunk_version: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A role the migration can address, standalone or clustered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoleRef<'a> {
    SearchHead(&'a SearchHeadRole),
    Cluster(&'a SearchHeadClusterRole),
}

impl<'a> RoleRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Self::SearchHead(role) => &role.name,
            Self::Cluster(role) => &role.name,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Self::SearchHead(role) => role.is_active(),
            Self::Cluster(role) => role.is_active(),
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster(_))
    }

    pub fn overrides(&self) -> Option<&'a FeatureFlags> {
        match self {
            Self::SearchHead(role) => role.feature_flags.as_ref(),
            Self::Cluster(role) => role.feature_flags.as_ref(),
        }
    }
}

impl SpecDocument {
    /// Root flag defaults, empty when the region is absent.
    pub fn root_flags(&self) -> FeatureFlags {
        self.spec.feature_flags.clone().unwrap_or_default()
    }

    /// All role entries in declaration order, cluster last.
    pub fn roles(&self) -> Vec<RoleRef<'_>> {
        let mut roles: Vec<RoleRef<'_>> =
            self.spec.search_heads.iter().map(RoleRef::SearchHead).collect();
        if let Some(cluster) = &self.spec.search_head_cluster {
            roles.push(RoleRef::Cluster(cluster));
        }
        roles
    }

    pub fn role(&self, name: &str) -> Option<RoleRef<'_>> {
        self.roles().into_iter().find(|role| role.name() == name)
    }

    /// Root defaults merged with the role's own overrides.
    pub fn effective_flags(&self, role: RoleRef<'_>) -> FeatureFlags {
        let mut flags = self.root_flags();
        if let Some(overrides) = role.overrides() {
            flags.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        }
        flags
    }

    /// Names of installed premium apps (non-empty entries under `premiumApps`).
    pub fn premium_app_installed(&self, app: &str) -> bool {
        self.spec
            .premium_apps
            .as_ref()
            .and_then(|apps| apps.get(app))
            .is_some_and(|entry| match entry {
                Value::Null => false,
                Value::Object(map) => !map.is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::String(s) => !s.is_empty(),
                _ => true,
            })
    }

    pub fn platform_version(&self) -> Option<&str> {
        self.spec
            .release_info
            .as_ref()
            .and_then(|info| info.splunk_version.as_deref())
    }

    /// Cloud provider, `aws` when unset.
    pub fn cloud(&self) -> &str {
        self.spec.cloud.as_deref().unwrap_or("aws")
    }

    pub fn account_id(&self) -> Option<&str> {
        self.status
            .get("provisionerOutput")
            .and_then(|out| out.get("account_id"))
            .and_then(Value::as_str)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::two_search_heads;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_round_trip() {
        let raw = json!({
            "version": 3,
            "kind": "Stack",
            "spec": {
                "searchHeads": [{ "name": "sh1", "count": 1, "instanceType": "c5.4xlarge" }],
                "indexers": { "count": 6 }
            }
        });
        let doc: SpecDocument = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(doc.extra.get("kind"), Some(&json!("Stack")));
        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);
    }

    #[test]
    fn test_inactive_roles() {
        let mut doc = two_search_heads();
        doc.spec.search_heads[1].count = Some(0);
        doc.spec.search_heads.push(SearchHeadRole {
            name: "sh3".to_string(),
            count: None,
            feature_flags: None,
            extra: Map::new(),
        });
        let active: Vec<_> = doc
            .roles()
            .into_iter()
            .filter(RoleRef::is_active)
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(active, vec!["sh1", "sh3"]);
    }

    #[test]
    fn test_role_lookup_matches_listing() {
        let doc = two_search_heads();
        let listed = doc.roles();
        assert_eq!(doc.role("sh2"), Some(listed[1]));
        assert_ne!(doc.role("sh1"), doc.role("sh2"));
        assert_eq!(doc.role("missing"), None);
    }

    #[test]
    fn test_effective_flags_merge_not_replace() {
        let mut doc = two_search_heads();
        doc.spec.feature_flags =
            Some(FeatureFlags::from([("a".to_string(), true), ("b".to_string(), false)]));
        doc.spec.search_heads[0].feature_flags =
            Some(FeatureFlags::from([("b".to_string(), true)]));

        let role = doc.role("sh1").unwrap();
        let effective = doc.effective_flags(role);
        assert_eq!(effective.get("a"), Some(&true));
        assert_eq!(effective.get("b"), Some(&true));
        assert_eq!(doc.effective_flags(doc.role("sh2").unwrap()).get("b"), Some(&false));
    }

    #[test]
    fn test_premium_app_presence() {
        let mut doc = two_search_heads();
        doc.spec.premium_apps = Some(
            json!({ "itsi": {}, "enterpriseSecurity": { "version": "7.1" } })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(doc.premium_app_installed("enterpriseSecurity"));
        assert!(!doc.premium_app_installed("itsi"));
        assert!(!doc.premium_app_installed("vmware"));
    }

    #[test]
    fn test_account_and_cloud_defaults() {
        let doc = two_search_heads();
        assert_eq!(doc.cloud(), "aws");
        assert_eq!(doc.account_id(), Some("123456789012"));
        assert_eq!(doc.platform_version(), Some("9.0.2303"));
    }

    #[test]
    fn test_all_week_window() {
        let window = MaintenanceWindow::all_week();
        assert_eq!(window.days.len(), 7);
        assert_eq!(window.ranges[0].duration, "23h59m");
        assert!(MaintenanceWindow::default().is_empty());
    }
}
