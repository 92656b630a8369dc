//! Configuration resolution for mpu-updater
//!
//! Every setting resolves with the same priority:
//! command-line argument → environment variable (`MPU_*`) → TOML file →
//! built-in default.
//!
//! The TOML file is `~/.config/mpu/mpu-updater.toml` unless `--config` or
//! `MPU_CONFIG` names another one.

use crate::models::UpdateKind;
use crate::services::product_api::ApiCredentials;
use crate::services::{BatchSettings, ExecutorSettings};
use mpu_common::config::{env_non_empty, load_toml_config, resolve_config_path, LoggingConfig};
use mpu_common::time::millis_to_duration;
use mpu_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const MODULE_NAME: &str = "mpu-updater";
pub const CONFIG_ENV_VAR: &str = "MPU_CONFIG";
pub const DEFAULT_PORT: u16 = 5780;
pub const DEFAULT_BASE_URL: &str = "https://openapi-api.alibaba.com/rest";
pub const DEFAULT_LOOKUP_FILE: &str = "product_skus.csv";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Marketplace API section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSection {
    pub base_url: Option<String>,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub access_token: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Per-kind tuning; unset fields keep the kind's defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTuning {
    pub workers: Option<usize>,
    pub chunk_size: Option<usize>,
    pub max_retries: Option<u32>,
    pub max_rate_limit_retries: Option<u32>,
    pub request_delay_ms: Option<u64>,
    pub adaptive_delay: Option<bool>,
    pub rate_limit_delay_ms: Option<u64>,
    pub retry_backoff_ms: Option<u64>,
}

impl KindTuning {
    /// Overlay these values onto `settings`
    pub fn apply(&self, mut settings: BatchSettings) -> BatchSettings {
        if let Some(workers) = self.workers {
            settings.workers = workers.max(1);
        }
        if let Some(chunk_size) = self.chunk_size {
            // 0 disables chunking
            settings.chunk_size = (chunk_size > 0).then_some(chunk_size);
        }
        if let Some(delay) = self.request_delay_ms {
            settings.initial_delay = millis_to_duration(delay);
        }
        if let Some(adaptive) = self.adaptive_delay {
            settings.adaptive_delay = adaptive;
        }
        apply_executor(&mut settings.executor, self);
        settings
    }
}

fn apply_executor(executor: &mut ExecutorSettings, tuning: &KindTuning) {
    if let Some(max_retries) = tuning.max_retries {
        executor.max_retries = max_retries;
    }
    if let Some(max) = tuning.max_rate_limit_retries {
        executor.max_rate_limit_retries = max;
    }
    if let Some(ms) = tuning.rate_limit_delay_ms {
        executor.rate_limit_backoff = millis_to_duration(ms);
    }
    if let Some(ms) = tuning.retry_backoff_ms {
        executor.retry_backoff_ms = ms;
    }
}

/// On-disk configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub lookup_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub port: Option<u16>,
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub price: KindTuning,
    #[serde(default)]
    pub inventory: KindTuning,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Starter file written by `init-config`
    pub fn template() -> Self {
        Self {
            lookup_file: Some(PathBuf::from(DEFAULT_LOOKUP_FILE)),
            output_dir: Some(PathBuf::from(".")),
            port: Some(DEFAULT_PORT),
            api: ApiSection {
                base_url: Some(DEFAULT_BASE_URL.to_string()),
                app_key: Some("your_app_key_here".to_string()),
                app_secret: Some("your_app_secret_here".to_string()),
                access_token: Some("your_access_token_here".to_string()),
                timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            },
            price: KindTuning::default(),
            inventory: KindTuning::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Command-line values that take priority over everything else
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub lookup_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub port: Option<u16>,
    /// Applied to whichever kind is being run
    pub tuning: KindTuning,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    pub lookup_file: PathBuf,
    pub output_dir: PathBuf,
    pub port: u16,
    pub base_url: String,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub access_token: Option<String>,
    pub request_timeout: Duration,
    pub price: KindTuning,
    pub inventory: KindTuning,
    pub logging: LoggingConfig,
    /// File the TOML layer was read from, if any
    pub source_file: Option<PathBuf>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            lookup_file: PathBuf::from(DEFAULT_LOOKUP_FILE),
            output_dir: PathBuf::from("."),
            port: DEFAULT_PORT,
            base_url: DEFAULT_BASE_URL.to_string(),
            app_key: None,
            app_secret: None,
            access_token: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            price: KindTuning::default(),
            inventory: KindTuning::default(),
            logging: LoggingConfig::default(),
            source_file: None,
        }
    }
}

impl UpdaterConfig {
    /// Resolve from CLI overrides, the environment and the config file
    pub fn load(cli: CliOverrides) -> Result<Self> {
        let path = resolve_config_path(cli.config_file.as_deref(), CONFIG_ENV_VAR, MODULE_NAME);
        let toml = match &path {
            Some(path) => load_toml_config::<TomlConfig>(path)?,
            None => {
                info!("No config file found, using environment and defaults");
                TomlConfig::default()
            }
        };
        Ok(Self::resolve_layers(cli, toml, path))
    }

    fn resolve_layers(cli: CliOverrides, toml: TomlConfig, source_file: Option<PathBuf>) -> Self {
        let env_path = |name: &str| env_non_empty(name).map(PathBuf::from);

        let lookup_file = cli
            .lookup_file
            .or_else(|| env_path("MPU_LOOKUP_FILE"))
            .or(toml.lookup_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOOKUP_FILE));

        let output_dir = cli
            .output_dir
            .or_else(|| env_path("MPU_OUTPUT_DIR"))
            .or(toml.output_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let port = cli
            .port
            .or_else(|| env_non_empty("MPU_PORT").and_then(|p| p.parse().ok()))
            .or(toml.port)
            .unwrap_or(DEFAULT_PORT);

        let base_url = env_non_empty("MPU_BASE_URL")
            .or(toml.api.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = env_non_empty("MPU_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .or(toml.api.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut price = toml.price;
        let mut inventory = toml.inventory;
        overlay(&mut price, &cli.tuning);
        overlay(&mut inventory, &cli.tuning);

        Self {
            lookup_file,
            output_dir,
            port,
            base_url,
            app_key: env_non_empty("MPU_APP_KEY").or(toml.api.app_key),
            app_secret: env_non_empty("MPU_APP_SECRET").or(toml.api.app_secret),
            access_token: env_non_empty("MPU_ACCESS_TOKEN").or(toml.api.access_token),
            request_timeout: Duration::from_secs(timeout_secs),
            price,
            inventory,
            logging: toml.logging,
            source_file,
        }
    }

    /// Effective batch settings for `kind`
    pub fn batch_settings(&self, kind: UpdateKind) -> BatchSettings {
        let tuning = match kind {
            UpdateKind::Price => &self.price,
            UpdateKind::Inventory => &self.inventory,
        };
        tuning.apply(BatchSettings::for_kind(kind))
    }

    /// Credentials for the HTTP client; rejects missing or placeholder values
    pub fn api_credentials(&self) -> Result<ApiCredentials> {
        let app_key = require_credential("MPU_APP_KEY", self.app_key.as_deref())?;
        require_credential("MPU_APP_SECRET", self.app_secret.as_deref())?;
        let access_token = require_credential("MPU_ACCESS_TOKEN", self.access_token.as_deref())?;

        Ok(ApiCredentials {
            base_url: self.base_url.clone(),
            app_key,
            access_token,
        })
    }
}

fn overlay(target: &mut KindTuning, cli: &KindTuning) {
    macro_rules! take {
        ($($field:ident),*) => {
            $(if cli.$field.is_some() { target.$field = cli.$field; })*
        };
    }
    take!(
        workers,
        chunk_size,
        max_retries,
        max_rate_limit_retries,
        request_delay_ms,
        adaptive_delay,
        rate_limit_delay_ms,
        retry_backoff_ms
    );
}

/// Template values such as `your_app_key_here` count as unset
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value.is_empty() || value.starts_with("your_") || value.starts_with("your-") || value.ends_with("_here")
}

fn require_credential(name: &str, value: Option<&str>) -> Result<String> {
    match value {
        Some(v) if !is_placeholder(v) => Ok(v.trim().to_string()),
        _ => Err(Error::Config(format!(
            "API credential {} not configured. Set it in the environment or in the [api] \
             section of the config file",
            name
        ))),
    }
}

/// Config file path for `init-config`
pub fn init_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    cli_arg
        .map(Path::to_path_buf)
        .or_else(|| mpu_common::config::default_config_path(MODULE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: [&str; 9] = [
        "MPU_CONFIG",
        "MPU_APP_KEY",
        "MPU_APP_SECRET",
        "MPU_ACCESS_TOKEN",
        "MPU_BASE_URL",
        "MPU_LOOKUP_FILE",
        "MPU_OUTPUT_DIR",
        "MPU_PORT",
        "MPU_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("mpu-updater.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    #[serial]
    fn test_priority_cli_env_toml_default() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "lookup_file = \"toml.csv\"\noutput_dir = \"toml-out\"\nport = 6000\n",
        );
        std::env::set_var("MPU_OUTPUT_DIR", "env-out");

        let config = UpdaterConfig::load(CliOverrides {
            config_file: Some(path),
            lookup_file: Some(PathBuf::from("cli.csv")),
            ..Default::default()
        })
        .unwrap();
        clear_env();

        assert_eq!(config.lookup_file, PathBuf::from("cli.csv"));
        assert_eq!(config.output_dir, PathBuf::from("env-out"));
        assert_eq!(config.port, 6000);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    #[serial]
    fn test_kind_tuning_layers() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "[price]\nworkers = 8\nchunk_size = 0\n\n[inventory]\nmax_retries = 5\n",
        );

        let config = UpdaterConfig::load(CliOverrides {
            config_file: Some(path),
            tuning: KindTuning {
                max_retries: Some(2),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();

        let price = config.batch_settings(UpdateKind::Price);
        assert_eq!(price.workers, 8);
        assert_eq!(price.chunk_size, None);
        assert_eq!(price.executor.max_retries, 2);

        let inventory = config.batch_settings(UpdateKind::Inventory);
        assert_eq!(inventory.workers, 10);
        assert_eq!(inventory.executor.max_retries, 2);
    }

    #[test]
    #[serial]
    fn test_env_credentials_override_toml() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "[api]\napp_key = \"toml-key\"\napp_secret = \"toml-secret\"\naccess_token = \"toml-token\"\n",
        );
        std::env::set_var("MPU_ACCESS_TOKEN", "env-token");

        let config = UpdaterConfig::load(CliOverrides {
            config_file: Some(path),
            ..Default::default()
        })
        .unwrap();
        clear_env();

        let credentials = config.api_credentials().unwrap();
        assert_eq!(credentials.app_key, "toml-key");
        assert_eq!(credentials.access_token, "env-token");
    }

    #[test]
    #[serial]
    fn test_placeholder_credentials_rejected() {
        clear_env();
        let config = UpdaterConfig {
            app_key: Some("your_app_key_here".to_string()),
            app_secret: Some("secret".to_string()),
            access_token: Some("token".to_string()),
            ..UpdaterConfig::default()
        };
        let err = config.api_credentials().unwrap_err();
        assert!(err.to_string().contains("MPU_APP_KEY"));

        let missing = UpdaterConfig::default();
        assert!(missing.api_credentials().is_err());
    }

    #[test]
    #[serial]
    fn test_explicit_missing_config_file_is_error() {
        clear_env();
        let result = UpdaterConfig::load(CliOverrides {
            config_file: Some(PathBuf::from("/no/such/mpu-updater.toml")),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_template_round_trips_through_toml() {
        let text = toml::to_string_pretty(&TomlConfig::template()).unwrap();
        let parsed: TomlConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.port, Some(DEFAULT_PORT));
        assert!(is_placeholder(parsed.api.app_key.as_deref().unwrap()));
    }

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("  "));
        assert!(is_placeholder("your_access_token_here"));
        assert!(!is_placeholder("501504"));
    }
}
