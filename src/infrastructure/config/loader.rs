use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::PlatformVersion;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid resync_budget: {0}. Must be at least 1")]
    InvalidResyncBudget(u32),

    #[error("Invalid {0}: must be at least 1 second")]
    ZeroInterval(&'static str),

    #[error("Invalid worker_threads: {0}. Must be at least 1")]
    InvalidWorkerThreads(usize),

    #[error("Invalid min_platform_version: {0}")]
    InvalidPlatformVersion(String),

    #[error("{0} program cannot be empty")]
    EmptyProgram(&'static str),

    #[error("At least one root target flag is required")]
    EmptyRootFlags,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Project config directory, relative to the working directory.
    pub const CONFIG_DIR: &'static str = ".kv-migrator";

    /// Environment variable prefix; `__` separates nested keys.
    pub const ENV_PREFIX: &'static str = "KVMIGRATOR_";

    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .kv-migrator/config.yaml
    /// 3. .kv-migrator/local.yaml (optional operator overrides)
    /// 4. Environment variables (KVMIGRATOR_* prefix)
    pub fn load() -> Result<Config> {
        let dir = Path::new(Self::CONFIG_DIR);
        let config: Config = Self::figment(&[dir.join("config.yaml"), dir.join("local.yaml")])
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let config: Config = Self::figment(&[path.to_path_buf()])
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(files: &[std::path::PathBuf]) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        for file in files {
            figment = figment.merge(Yaml::file(file));
        }
        figment.merge(Env::prefixed(Self::ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        // Polling
        let polling = &config.polling;
        if polling.resync_budget == 0 {
            return Err(ConfigError::InvalidResyncBudget(polling.resync_budget));
        }
        if polling.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("polling.interval_secs"));
        }
        if polling.approval_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("polling.approval_interval_secs"));
        }
        if let Some(threads) = polling.worker_threads {
            if threads == 0 {
                return Err(ConfigError::InvalidWorkerThreads(threads));
            }
        }
        if polling.max_changed_runs == 0 {
            return Err(ConfigError::ValidationFailed(
                "polling.max_changed_runs must be at least 1".to_string(),
            ));
        }

        // Subprocess timeouts
        let remote = &config.remote;
        for (name, secs) in [
            ("remote.check_timeout_secs", remote.check_timeout_secs),
            ("remote.capture_timeout_secs", remote.capture_timeout_secs),
            ("remote.trigger_timeout_secs", remote.trigger_timeout_secs),
            ("downtime.timeout_secs", config.downtime.timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }

        // Migration preconditions
        config
            .migration
            .min_platform_version
            .parse::<PlatformVersion>()
            .map_err(ConfigError::InvalidPlatformVersion)?;

        // External programs
        if remote.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram("remote"));
        }
        if config.cloudctl.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram("cloudctl"));
        }
        if config.inventory.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram("inventory"));
        }

        // Targets
        if config.targets.root_flags.is_empty() {
            return Err(ConfigError::EmptyRootFlags);
        }
        if config.targets.role_flags.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "targets.role_flags cannot be empty".to_string(),
            ));
        }

        let downtime = &config.downtime;
        if downtime.add_command.is_empty() != downtime.remove_command.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "downtime.add_command and downtime.remove_command must be set together"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Environment, RollbackMode};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.polling.resync_budget, 20);
        assert_eq!(config.polling.interval_secs, 30);
        assert_eq!(config.polling.rollback_settle_secs, 45);
        assert_eq!(config.remote.trigger_timeout_secs, 1200);
        assert_eq!(config.migration.min_platform_version, "8.2.2109");
        assert_eq!(config.migration.rollback_mode, RollbackMode::Restore);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
logging:
  level: debug
  format: json
migration:
  cluster_support: true
  rollback_mode: disable
polling:
  resync_budget: 5
  worker_threads: 3
targets:
  scs_domains:
    lve: api.example.com
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert!(config.migration.cluster_support);
        assert_eq!(config.migration.rollback_mode, RollbackMode::Disable);
        assert_eq!(config.polling.resync_budget, 5);
        assert_eq!(config.polling.worker_threads, Some(3));
        assert_eq!(config.polling.interval_secs, 30, "unset fields keep defaults");
        assert_eq!(
            config.targets.scs_domains.get(&Environment::Prod).map(String::as_str),
            Some("api.example.com")
        );

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn test_validate_zero_budget() {
        let mut config = Config::default();
        config.polling.resync_budget = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidResyncBudget(0)
        ));
    }

    #[test]
    fn test_validate_zero_intervals() {
        let mut config = Config::default();
        config.polling.interval_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroInterval("polling.interval_secs")
        ));

        let mut config = Config::default();
        config.remote.trigger_timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroInterval("remote.trigger_timeout_secs")
        ));
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = Config::default();
        config.polling.worker_threads = Some(0);
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidWorkerThreads(0)
        ));
    }

    #[test]
    fn test_validate_bad_version_floor() {
        let mut config = Config::default();
        config.migration.min_platform_version = "nine".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidPlatformVersion(_)
        ));
    }

    #[test]
    fn test_validate_empty_program_and_flags() {
        let mut config = Config::default();
        config.remote.program = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyProgram("remote")
        ));

        let mut config = Config::default();
        config.targets.root_flags.clear();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyRootFlags
        ));
    }

    #[test]
    fn test_validate_downtime_pairs() {
        let mut config = Config::default();
        config.downtime.add_command = vec!["mute".to_string(), "{stack}".to_string()];
        assert!(ConfigLoader::validate(&config).is_err());
        config.downtime.remove_command = vec!["unmute".to_string(), "{stack}".to_string()];
        assert!(ConfigLoader::validate(&config).is_ok());

        config.downtime.timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroInterval("downtime.timeout_secs")
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "polling:\n  resync_budget: 7\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "polling:\n  resync_budget: 9\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = ConfigLoader::figment(&[
            base_file.path().to_path_buf(),
            override_file.path().to_path_buf(),
        ])
        .extract()
        .unwrap();

        assert_eq!(config.polling.resync_budget, 9, "Override should win");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }

    #[test]
    fn test_env_override() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "polling:\n  resync_budget: 7").unwrap();
        file.flush().unwrap();

        temp_env::with_vars(
            [
                ("KVMIGRATOR_POLLING__RESYNC_BUDGET", Some("3")),
                ("KVMIGRATOR_MIGRATION__CLUSTER_SUPPORT", Some("true")),
                ("KVMIGRATOR_REMOTE__TEAM", Some("ops")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.polling.resync_budget, 3);
                assert!(config.migration.cluster_support);
                assert_eq!(config.remote.team, "ops");
            },
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = ConfigLoader::load_from_file("/nonexistent/kv-migrator.yaml");
        assert!(result.is_err());
    }
}
