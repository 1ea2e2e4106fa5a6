use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::models::{Settings, DEFAULT_STORE_NAME};
use crate::persistence::json_files::{DEFAULT_INVENTORY_FILE, DEFAULT_SETTINGS_FILE};
use crate::persistence::StorageConfig;
use crate::qr::{CorrectionLevel, LabelRenderer, DEFAULT_LABEL_SIZE};
use crate::services::inventory::DEFAULT_PAGE_SIZE;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_DATA_DIR: &str = "data";
const CONFIG_DIR: &str = "config";

/// QR label rendering options
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct QrConfig {
    /// Edge length of saved labels in pixels
    #[serde(default = "default_qr_size")]
    #[validate(range(min = 64, max = 2048))]
    pub size_px: u32,

    /// Error correction level: L, M, Q or H
    #[serde(default = "default_error_correction")]
    #[validate(custom = "validate_error_correction")]
    pub error_correction: String,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            size_px: default_qr_size(),
            error_correction: default_error_correction(),
        }
    }
}

impl QrConfig {
    pub fn correction_level(&self) -> CorrectionLevel {
        self.error_correction.parse().unwrap_or_default()
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Directory holding the inventory and settings documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_inventory_file")]
    #[validate(length(min = 1))]
    pub inventory_file: String,

    #[serde(default = "default_settings_file")]
    #[validate(length(min = 1))]
    pub settings_file: String,

    /// Store name used when no settings document exists
    #[serde(default = "default_store_name")]
    #[validate(length(min = 1))]
    pub default_store_name: String,

    /// Inventory rows per page
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100))]
    pub page_size: usize,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    #[validate]
    pub qr: QrConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENV.to_string(),
            data_dir: default_data_dir(),
            inventory_file: default_inventory_file(),
            settings_file: default_settings_file(),
            default_store_name: default_store_name(),
            page_size: default_page_size(),
            log_level: default_log_level(),
            log_json: false,
            qr: QrConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// File locations handed to the JSON file gateway.
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            data_dir: self.data_dir.clone(),
            inventory_file: self.inventory_file.clone(),
            settings_file: self.settings_file.clone(),
        }
    }

    /// Settings used when the settings document is missing or unreadable.
    pub fn default_settings(&self) -> Settings {
        Settings::with_store_name(self.default_store_name.clone())
    }

    pub fn label_renderer(&self) -> LabelRenderer {
        LabelRenderer::new(self.qr.size_px, self.qr.correction_level())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_inventory_file() -> String {
    DEFAULT_INVENTORY_FILE.to_string()
}

fn default_settings_file() -> String {
    DEFAULT_SETTINGS_FILE.to_string()
}

fn default_store_name() -> String {
    DEFAULT_STORE_NAME.to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_qr_size() -> u32 {
    DEFAULT_LABEL_SIZE
}

fn default_error_correction() -> String {
    CorrectionLevel::default().to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_error_correction(level: &str) -> Result<(), ValidationError> {
    match level.parse::<CorrectionLevel>() {
        Ok(_) => Ok(()),
        Err(_) => {
            let mut err = ValidationError::new("error_correction");
            err.message = Some("Must be one of: L, M, Q, H".into());
            Err(err)
        }
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("naqshi_inventory={},naqshi={}", level, level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    // Logs go to stderr so command output on stdout stays parseable.
    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Loads configuration from `config_dir` for the `run_env` profile.
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    let config = Config::builder()
        .set_default("environment", run_env)?
        .set_default("data_dir", DEFAULT_DATA_DIR)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
