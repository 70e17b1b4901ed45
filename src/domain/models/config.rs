use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use super::environment::Environment;
use super::spec_document::{FeatureFlags, PlatformSettings};

/// Main configuration structure for the migrator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Preconditions and rollback behavior
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Poll intervals, budgets and worker pool sizing
    #[serde(default)]
    pub polling: PollingConfig,

    /// Remote execution transport
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Remote command templates
    #[serde(default)]
    pub probes: ProbeConfig,

    /// Flag and setting values the migration writes
    #[serde(default)]
    pub targets: TargetConfig,

    /// Spec store CLI
    #[serde(default)]
    pub cloudctl: CloudctlConfig,

    /// Cloud inventory CLI
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Downtime hook commands
    #[serde(default)]
    pub downtime: DowntimeConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// How the root flags are reverted on rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackMode {
    /// Restore the captured pre-migration root flags exactly.
    #[default]
    Restore,
    /// Overlay the original flags if the primary flag existed, else the disabled set.
    Disable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MigrationConfig {
    /// Whether search-head clusters may be targeted
    #[serde(default)]
    pub cluster_support: bool,

    /// Minimum platform release that can be migrated
    #[serde(default = "default_min_platform_version")]
    pub min_platform_version: String,

    /// Premium add-ons whose presence blocks the migration
    #[serde(default = "default_incompatible_addons")]
    pub incompatible_addons: Vec<String>,

    /// Add-on that triggers the extra flag/setting overlay when installed
    #[serde(default = "default_overlay_addon")]
    pub overlay_addon: String,

    #[serde(default)]
    pub rollback_mode: RollbackMode,
}

fn default_min_platform_version() -> String {
    "8.2.2109".to_string()
}

fn default_incompatible_addons() -> Vec<String> {
    [
        "enterpriseSecurity",
        "enterpriseSecurityPCICP",
        "itsi",
        "pci",
        "stream",
        "vmware",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_overlay_addon() -> String {
    "enterpriseSecurity".to_string()
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            cluster_support: false,
            min_platform_version: default_min_platform_version(),
            incompatible_addons: default_incompatible_addons(),
            overlay_addon: default_overlay_addon(),
            rollback_mode: RollbackMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PollingConfig {
    /// Delay between poll rounds in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Delay between approval checks in seconds
    #[serde(default = "default_interval_secs")]
    pub approval_interval_secs: u64,

    /// Maximum resync rounds for bounded polling stages
    #[serde(default = "default_resync_budget")]
    pub resync_budget: u32,

    /// Wait after rollback approval before confirming hosts
    #[serde(default = "default_rollback_settle_secs")]
    pub rollback_settle_secs: u64,

    /// Worker pool size; half of the logical CPUs when unset
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Changed-resource runs tolerated when nudging non-participating hosts
    #[serde(default = "default_max_changed_runs")]
    pub max_changed_runs: u32,
}

const fn default_interval_secs() -> u64 {
    30
}

const fn default_resync_budget() -> u32 {
    20
}

const fn default_rollback_settle_secs() -> u64 {
    45
}

const fn default_max_changed_runs() -> u32 {
    1
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            approval_interval_secs: default_interval_secs(),
            resync_budget: default_resync_budget(),
            rollback_settle_secs: default_rollback_settle_secs(),
            worker_threads: None,
            max_changed_runs: default_max_changed_runs(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn approval_interval(&self) -> Duration {
        Duration::from_secs(self.approval_interval_secs)
    }

    pub fn rollback_settle(&self) -> Duration {
        Duration::from_secs(self.rollback_settle_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RemoteConfig {
    /// Remote shell program
    #[serde(default = "default_ssh_program")]
    pub program: String,

    /// Access team; non-prod environments append `-{env}`
    #[serde(default = "default_team")]
    pub team: String,

    /// Timeout for exit-code checks in seconds
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,

    /// Timeout for captured-output queries in seconds
    #[serde(default = "default_capture_timeout_secs")]
    pub capture_timeout_secs: u64,

    /// Timeout for background triggers in seconds
    #[serde(default = "default_trigger_timeout_secs")]
    pub trigger_timeout_secs: u64,
}

fn default_ssh_program() -> String {
    "sft".to_string()
}

fn default_team() -> String {
    "splunk".to_string()
}

const fn default_check_timeout_secs() -> u64 {
    30
}

const fn default_capture_timeout_secs() -> u64 {
    120
}

const fn default_trigger_timeout_secs() -> u64 {
    1200
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            program: default_ssh_program(),
            team: default_team(),
            check_timeout_secs: default_check_timeout_secs(),
            capture_timeout_secs: default_capture_timeout_secs(),
            trigger_timeout_secs: default_trigger_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn team_for(&self, environment: Environment) -> String {
        match environment {
            Environment::Prod => self.team.clone(),
            other => format!("{}-{other}", self.team),
        }
    }
}

/// Remote command templates. `{since}` expands to the run start timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProbeConfig {
    #[serde(default = "default_connectivity_command")]
    pub connectivity_command: String,

    #[serde(default = "default_resync_command")]
    pub resync_command: String,

    /// Exit code 0 once the migration procedure has started on the host
    #[serde(default = "default_trigger_check")]
    pub trigger_check: String,

    /// Captured output scanned for pass/fail markers
    #[serde(default = "default_status_query")]
    pub status_query: String,

    #[serde(default = "default_pass_marker")]
    pub pass_marker: String,

    #[serde(default = "default_fail_marker")]
    pub fail_marker: String,

    #[serde(default = "default_store_local_check")]
    pub store_local_check: String,

    #[serde(default = "default_store_external_check")]
    pub store_external_check: String,
}

fn default_connectivity_command() -> String {
    "echo \"Connected to `hostname`\"".to_string()
}

fn default_resync_command() -> String {
    "sudo puppet agent -t".to_string()
}

fn default_status_query() -> String {
    r"sudo journalctl --since '{since}' | egrep kvstore-external-migrate-script | egrep -v '\[\/.*\]|msg=audit|grep'"
        .to_string()
}

fn default_trigger_check() -> String {
    format!("{} | egrep '(migration_backup__)'", default_status_query())
}

fn default_pass_marker() -> String {
    "main=>PASS".to_string()
}

fn default_fail_marker() -> String {
    "main=>FAIL".to_string()
}

fn default_store_local_check() -> String {
    "sudo /opt/splunk/bin/splunk btool server list kvstore --debug | grep \"defaultKVStoreType.*=.*local\""
        .to_string()
}

fn default_store_external_check() -> String {
    "sudo /opt/splunk/bin/splunk btool server list kvstore --debug | grep \"defaultKVStoreType.*=.*external\""
        .to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connectivity_command: default_connectivity_command(),
            resync_command: default_resync_command(),
            trigger_check: default_trigger_check(),
            status_query: default_status_query(),
            pass_marker: default_pass_marker(),
            fail_marker: default_fail_marker(),
            store_local_check: default_store_local_check(),
            store_external_check: default_store_external_check(),
        }
    }
}

/// Values written by the migration. String settings may use `{stack}` and
/// `{scs_domain}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TargetConfig {
    #[serde(default = "default_root_flags")]
    pub root_flags: FeatureFlags,

    #[serde(default = "default_role_flags")]
    pub role_flags: FeatureFlags,

    #[serde(default = "default_platform_settings")]
    pub platform_settings: PlatformSettings,

    #[serde(default = "default_scs_domains")]
    pub scs_domains: BTreeMap<Environment, String>,

    #[serde(default = "default_overlay_flags")]
    pub overlay_flags: FeatureFlags,

    #[serde(default = "default_overlay_settings")]
    pub overlay_settings: PlatformSettings,

    /// Flag whose prior presence decides the `disable` rollback behavior
    #[serde(default = "default_primary_flag")]
    pub primary_flag: String,

    #[serde(default = "default_disabled_flags")]
    pub disabled_flags: FeatureFlags,
}

fn flags(entries: &[(&str, bool)]) -> FeatureFlags {
    entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

fn default_root_flags() -> FeatureFlags {
    flags(&[
        ("scs_tokens_enabled", true),
        ("external_kvstore_enabled", true),
        ("ec_scs_enabled", true),
    ])
}

fn default_role_flags() -> FeatureFlags {
    flags(&[("auto_kvstore_to_external_migration_enabled", true)])
}

fn default_platform_settings() -> PlatformSettings {
    PlatformSettings::from([
        (
            "scs_environment".to_string(),
            Value::String("{stack}.{scs_domain}".to_string()),
        ),
        ("scs_tenant".to_string(), Value::String("{stack}".to_string())),
    ])
}

fn default_scs_domains() -> BTreeMap<Environment, String> {
    BTreeMap::from([
        (Environment::Dev, "api.playground.scs.splunk.com".to_string()),
        (Environment::Stg, "api.staging.scs.splunk.com".to_string()),
        (Environment::Prod, "api.scs.splunk.com".to_string()),
    ])
}

fn default_overlay_flags() -> FeatureFlags {
    flags(&[("mvl_enabled", true), ("collection_cache_enabled", true)])
}

fn default_overlay_settings() -> PlatformSettings {
    PlatformSettings::from([
        (
            "kvstore_collection_cache".to_string(),
            Value::String("indexer".to_string()),
        ),
        ("kvstore_collection_cache_timeout".to_string(), Value::from(5)),
    ])
}

fn default_primary_flag() -> String {
    "external_kvstore_enabled".to_string()
}

fn default_disabled_flags() -> FeatureFlags {
    flags(&[("external_kvstore_enabled", false), ("ec_scs_enabled", false)])
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            root_flags: default_root_flags(),
            role_flags: default_role_flags(),
            platform_settings: default_platform_settings(),
            scs_domains: default_scs_domains(),
            overlay_flags: default_overlay_flags(),
            overlay_settings: default_overlay_settings(),
            primary_flag: default_primary_flag(),
            disabled_flags: default_disabled_flags(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CloudctlConfig {
    #[serde(default = "default_cloudctl_program")]
    pub program: String,

    /// Give up retrying idempotent reads after this many seconds
    #[serde(default = "default_read_retry_secs")]
    pub read_retry_secs: u64,
}

fn default_cloudctl_program() -> String {
    "cloudctl".to_string()
}

const fn default_read_retry_secs() -> u64 {
    60
}

impl Default for CloudctlConfig {
    fn default() -> Self {
        Self {
            program: default_cloudctl_program(),
            read_retry_secs: default_read_retry_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InventoryConfig {
    #[serde(default = "default_inventory_program")]
    pub program: String,
}

fn default_inventory_program() -> String {
    "aws".to_string()
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            program: default_inventory_program(),
        }
    }
}

/// Argument vectors run to add/remove downtime. `{stack}`, `{ticket}` and
/// `{user}` expand. Both empty disables downtime handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DowntimeConfig {
    #[serde(default)]
    pub add_command: Vec<String>,

    #[serde(default)]
    pub remove_command: Vec<String>,

    /// Output meaning the stack is not enrolled in monitoring; treated as success
    #[serde(default = "default_not_enrolled_marker")]
    pub not_enrolled_marker: String,

    /// Seconds a downtime command may run before it is killed
    #[serde(default = "default_downtime_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_not_enrolled_marker() -> String {
    "no host found".to_string()
}

const fn default_downtime_timeout_secs() -> u64 {
    120
}

impl Default for DowntimeConfig {
    fn default() -> Self {
        Self {
            add_command: Vec::new(),
            remove_command: Vec::new(),
            not_enrolled_marker: default_not_enrolled_marker(),
            timeout_secs: default_downtime_timeout_secs(),
        }
    }
}

impl DowntimeConfig {
    pub fn is_configured(&self) -> bool {
        !self.add_command.is_empty() && !self.remove_command.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
