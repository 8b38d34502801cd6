//! Configuration loading and resolution
//!
//! Resource identifiers (state machine, inference endpoint, storage layout)
//! come from a TOML bootstrap file plus environment overrides, resolved once
//! at startup.
//!
//! Config file priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SCONES_CONFIG` environment variable
//! 3. `~/.config/scones/config.toml`
//! 4. `/etc/scones/config.toml`
//! 5. Compiled defaults (fallback)
//!
//! Individual values may then be overridden through `SCONES_*` variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::{Error, Result};

/// Minimum confidence for a classification to be accepted
pub const DEFAULT_THRESHOLD: f64 = 0.94;

/// Default gateway port
pub const DEFAULT_PORT: u16 = 5780;

pub const DEFAULT_MAPPING_KEY: &str = "projects/ml-workflow/landingzone/label_categories.json";
pub const DEFAULT_CATEGORIZED_PREFIX: &str = "projects/ml-workflow/landingzone/categorized_data";
pub const DEFAULT_UNKNOWN_CATEGORY: &str = "unknown";
pub const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Response of the fixed inference backend: five zero scores
pub const DEFAULT_FIXED_RESPONSE: &str = "[0, 0, 0, 0, 0]";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SCONES_CONFIG";

/// Pipeline configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// State machine started by the trigger step
    #[serde(default)]
    pub state_machine_arn: String,

    /// Minimum confidence score (inclusive)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Directory for per-invocation scratch files
    ///
    /// Defaults to the platform temp directory.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// AWS region override (otherwise resolved from the environment)
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Object store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Amazon S3
    S3,
    /// Local directory tree (`<local_root>/<bucket>/<key>`)
    Local,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            other => Err(Error::Config(format!("Unknown storage backend: {}", other))),
        }
    }
}

/// Object store layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,

    /// Root directory for the local backend
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    /// Key of the category mapping object (same bucket as the upload)
    #[serde(default = "default_mapping_key")]
    pub mapping_key: String,

    /// Key prefix under which categorized objects are filed
    #[serde(default = "default_categorized_prefix")]
    pub categorized_prefix: String,

    /// Category used when the threshold was not met
    #[serde(default = "default_unknown_category")]
    pub unknown_category: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            local_root: default_local_root(),
            mapping_key: default_mapping_key(),
            categorized_prefix: default_categorized_prefix(),
            unknown_category: default_unknown_category(),
        }
    }
}

impl StorageConfig {
    /// Destination key for a file filed under `category`
    pub fn categorized_key(&self, category: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.categorized_prefix.trim_end_matches('/'),
            category,
            file_name
        )
    }
}

/// Inference backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceBackend {
    /// SageMaker runtime `InvokeEndpoint`
    SageMaker,
    /// Plain HTTP POST to an invocation URL
    Http,
    /// Fixed response, no network access
    Fixed,
}

impl FromStr for InferenceBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sagemaker" => Ok(InferenceBackend::SageMaker),
            "http" => Ok(InferenceBackend::Http),
            "fixed" => Ok(InferenceBackend::Fixed),
            other => Err(Error::Config(format!("Unknown inference backend: {}", other))),
        }
    }
}

/// Inference endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_backend")]
    pub backend: InferenceBackend,

    /// Endpoint name (sagemaker backend)
    #[serde(default)]
    pub endpoint_name: String,

    /// Invocation URL (http backend)
    #[serde(default)]
    pub url: Option<String>,

    /// Content type declared for the image bytes
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Response body returned by the fixed backend
    #[serde(default = "default_fixed_response")]
    pub fixed_response: String,

    /// Request timeout (http backend)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: default_inference_backend(),
            endpoint_name: String::new(),
            url: None,
            content_type: default_content_type(),
            fixed_response: default_fixed_response(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Gateway listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::S3
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./scones-data")
}

fn default_mapping_key() -> String {
    DEFAULT_MAPPING_KEY.to_string()
}

fn default_categorized_prefix() -> String {
    DEFAULT_CATEGORIZED_PREFIX.to_string()
}

fn default_unknown_category() -> String {
    DEFAULT_UNKNOWN_CATEGORY.to_string()
}

fn default_inference_backend() -> InferenceBackend {
    InferenceBackend::SageMaker
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_fixed_response() -> String {
    DEFAULT_FIXED_RESPONSE.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            state_machine_arn: String::new(),
            threshold: default_threshold(),
            scratch_dir: None,
            region: None,
            storage: StorageConfig::default(),
            inference: InferenceConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Scratch directory for downloaded objects
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Apply `SCONES_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(arn) = std::env::var("SCONES_STATE_MACHINE_ARN") {
            self.state_machine_arn = arn;
        }
        if let Ok(threshold) = std::env::var("SCONES_THRESHOLD") {
            self.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("SCONES_THRESHOLD is not a number: {}", threshold)))?;
        }
        if let Ok(backend) = std::env::var("SCONES_INFERENCE_BACKEND") {
            self.inference.backend = backend.parse()?;
        }
        if let Ok(endpoint) = std::env::var("SCONES_ENDPOINT_NAME") {
            self.inference.endpoint_name = endpoint;
        }
        if let Ok(backend) = std::env::var("SCONES_STORAGE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Ok(port) = std::env::var("SCONES_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("SCONES_PORT is not a port number: {}", port)))?;
        }
        Ok(())
    }

    /// Check the settings every step relies on
    ///
    /// The state machine ARN is only needed by the trigger step and is
    /// checked separately by [`validate_workflow_target`](Self::validate_workflow_target).
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::Config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        match self.inference.backend {
            InferenceBackend::SageMaker if self.inference.endpoint_name.trim().is_empty() => {
                return Err(Error::Config(
                    "inference.endpoint_name is required for the sagemaker backend".to_string(),
                ));
            }
            InferenceBackend::Http if self.inference.url.as_deref().map_or(true, str::is_empty) => {
                return Err(Error::Config(
                    "inference.url is required for the http backend".to_string(),
                ));
            }
            _ => {}
        }
        if self.inference.content_type.trim().is_empty() {
            return Err(Error::Config("inference.content_type must not be empty".to_string()));
        }
        if self.storage.mapping_key.trim().is_empty() {
            return Err(Error::Config("storage.mapping_key must not be empty".to_string()));
        }
        if self.storage.categorized_prefix.trim().is_empty() {
            return Err(Error::Config("storage.categorized_prefix must not be empty".to_string()));
        }
        if self.storage.unknown_category.trim().is_empty() {
            return Err(Error::Config("storage.unknown_category must not be empty".to_string()));
        }
        Ok(())
    }

    /// Check that a state machine is configured for starting workflows
    pub fn validate_workflow_target(&self) -> Result<()> {
        if self.state_machine_arn.trim().is_empty() {
            return Err(Error::Config("state_machine_arn is required".to_string()));
        }
        Ok(())
    }
}

/// Locates and loads the configuration file
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Config file to load, if any
    ///
    /// An explicit path (CLI or environment) is returned even when it does
    /// not exist so that `load` can report it; discovered paths must exist.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        let user_config = dirs::config_dir().map(|d| d.join("scones").join("config.toml"));
        let system_config = PathBuf::from("/etc/scones/config.toml");

        user_config
            .into_iter()
            .chain(std::iter::once(system_config))
            .find(|path| path.exists())
    }

    /// Load configuration, apply environment overrides
    ///
    /// Validation is left to the caller so that partial configurations can
    /// still be inspected.
    pub fn load(&self) -> Result<PipelineConfig> {
        let mut config = match self.resolve_path() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                PipelineConfig::from_file(&path)?
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                PipelineConfig::default()
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> PipelineConfig {
        PipelineConfig {
            state_machine_arn: "arn:aws:states:us-east-1:000000000000:stateMachine:scones".to_string(),
            inference: InferenceConfig {
                endpoint_name: "scones-ep".to_string(),
                ..InferenceConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.threshold, 0.94);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.inference.backend, InferenceBackend::SageMaker);
        assert_eq!(config.inference.content_type, "image/png");
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_categorized_key() {
        let storage = StorageConfig::default();
        assert_eq!(
            storage.categorized_key("bicycle", "cat.png"),
            "projects/ml-workflow/landingzone/categorized_data/bicycle/cat.png"
        );

        let trailing = StorageConfig {
            categorized_prefix: "out/".to_string(),
            ..StorageConfig::default()
        };
        assert_eq!(trailing.categorized_key("unknown", "a.png"), "out/unknown/a.png");
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_arn_only_blocks_workflow_target() {
        let config = PipelineConfig {
            state_machine_arn: String::new(),
            ..valid_config()
        };
        assert!(config.validate().is_ok());
        assert!(matches!(config.validate_workflow_target(), Err(Error::Config(_))));
        assert!(valid_config().validate_workflow_target().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let config = PipelineConfig {
            threshold: 1.5,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_backend_requirements() {
        let mut config = valid_config();
        config.inference.backend = InferenceBackend::Http;
        assert!(config.validate().is_err());

        config.inference.url = Some("http://localhost:8080/invocations".to_string());
        assert!(config.validate().is_ok());

        config.inference.backend = InferenceBackend::Fixed;
        config.inference.endpoint_name.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("SageMaker".parse::<InferenceBackend>().unwrap(), InferenceBackend::SageMaker);
        assert_eq!(" fixed ".parse::<InferenceBackend>().unwrap(), InferenceBackend::Fixed);
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert!("gcs".parse::<StorageBackend>().is_err());
    }
}
