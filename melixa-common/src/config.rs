//! Bootstrap configuration loading and path resolution
//!
//! Configuration is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file never stops startup: a warning is logged and compiled
//! defaults are used. A TOML file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MELIXA_CONFIG";

/// Environment variable overriding the classifier artifact path
pub const ARTIFACT_ENV_VAR: &str = "MELIXA_ARTIFACT";

/// Environment variable overriding the reference corpus path
pub const CORPUS_ENV_VAR: &str = "MELIXA_CORPUS";

/// Bootstrap configuration loaded from TOML
///
/// Read once at process start. The loaded model, corpus and statistics are
/// immutable afterwards, so changing this file requires a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to the persisted classifier artifact (JSON)
    #[serde(default)]
    pub artifact_path: Option<PathBuf>,

    /// Path to the reference corpus store (JSON)
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,

    /// Number of recommendations returned per request
    ///
    /// Default: 5
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Timeout wrapped around one whole pipeline run, in seconds
    ///
    /// Default: 60
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Prediction blend tuning (optional)
    #[serde(default)]
    pub prediction: PredictionTuning,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            artifact_path: None,
            corpus_path: None,
            top_k: default_top_k(),
            request_timeout_secs: default_request_timeout_secs(),
            logging: LoggingConfig::default(),
            prediction: PredictionTuning::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Tunable constants of the prediction blend
///
/// The defaults were hand-tuned against a handful of tracks, not fitted on
/// held-out data, so they are exposed here rather than baked in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionTuning {
    /// Calibration exponent applied before renormalization
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Model confidence above which the model dominates the blend
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,

    /// Model confidence above which model and heuristic are weighted equally
    #[serde(default = "default_medium_confidence")]
    pub medium_confidence: f64,
}

impl Default for PredictionTuning {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            high_confidence: default_high_confidence(),
            medium_confidence: default_medium_confidence(),
        }
    }
}

impl PredictionTuning {
    /// Reject values that would break the blend invariants
    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(Error::Config(format!(
                "prediction.temperature must be a positive number, got {}",
                self.temperature
            )));
        }
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.high_confidence) || !in_unit(self.medium_confidence) {
            return Err(Error::Config(
                "prediction confidence thresholds must lie in [0, 1]".to_string(),
            ));
        }
        if self.medium_confidence >= self.high_confidence {
            return Err(Error::Config(format!(
                "prediction.medium_confidence ({}) must be below prediction.high_confidence ({})",
                self.medium_confidence, self.high_confidence
            )));
        }
        Ok(())
    }
}

fn default_top_k() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_temperature() -> f64 {
    1.3
}

fn default_high_confidence() -> f64 {
    0.6
}

fn default_medium_confidence() -> f64 {
    0.4
}

/// OS-dependent compiled defaults (lowest priority)
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    /// Data folder holding models and the reference corpus
    pub data_folder: PathBuf,
    /// Default classifier artifact location
    pub artifact_path: PathBuf,
    /// Default reference corpus location
    pub corpus_path: PathBuf,
    /// Default log level
    pub log_level: String,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        let data_folder = default_data_folder();
        Self {
            artifact_path: data_folder.join("models").join("mood_classifier.json"),
            corpus_path: data_folder.join("corpus").join("features.json"),
            data_folder,
            log_level: default_log_level(),
        }
    }
}

/// Get OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/melixa (or /var/lib/melixa for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("melixa"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/melixa"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/melixa
        dirs::data_dir()
            .map(|d| d.join("melixa"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/melixa"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\melixa
        dirs::data_local_dir()
            .map(|d| d.join("melixa"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\melixa"))
    } else {
        PathBuf::from("./melixa_data")
    }
}

/// Candidate config file locations, in lookup order
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("melixa").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        paths.push(PathBuf::from("/etc/melixa/config.toml"));
    }
    paths
}

/// Parse a TOML config file
///
/// # Errors
/// - `Error::Io` if the file cannot be read
/// - `Error::Config` if the content is not a valid config
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    config.prediction.validate()?;
    Ok(config)
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolves which config file to read and loads it
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_config: Option<PathBuf>,
}

impl ConfigResolver {
    /// Create a resolver; `cli_config` is the `--config` flag if given
    pub fn new(cli_config: Option<PathBuf>) -> Self {
        Self { cli_config }
    }

    /// Explicitly requested config file (CLI flag, then environment)
    fn explicit_path(&self) -> Option<PathBuf> {
        self.cli_config
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
    }

    /// Config file that will be read, if any
    pub fn config_file(&self) -> Option<PathBuf> {
        if let Some(path) = self.explicit_path() {
            return Some(path);
        }
        default_config_paths().into_iter().find(|p| p.exists())
    }

    /// Load configuration with graceful degradation
    ///
    /// An explicitly requested file must exist. When no file is requested and
    /// none is found at the default locations, compiled defaults are returned.
    pub fn load(&self) -> Result<TomlConfig> {
        if let Some(path) = self.explicit_path() {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading config from {}", path.display());
            return load_toml_config(&path);
        }

        match default_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => {
                info!("Loading config from {}", path.display());
                load_toml_config(&path)
            }
            None => {
                warn!("No config file found, using compiled defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Model and corpus locations after resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPaths {
    pub artifact_path: PathBuf,
    pub corpus_path: PathBuf,
}

/// Resolve one path: CLI > environment > TOML > compiled default
pub fn resolve_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
    default: &Path,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default.to_path_buf()
}

/// Resolve artifact and corpus paths for startup
pub fn resolve_model_paths(
    config: &TomlConfig,
    cli_artifact: Option<&Path>,
    cli_corpus: Option<&Path>,
) -> ResolvedPaths {
    let defaults = CompiledDefaults::for_current_platform();
    ResolvedPaths {
        artifact_path: resolve_path(
            cli_artifact,
            ARTIFACT_ENV_VAR,
            config.artifact_path.as_deref(),
            &defaults.artifact_path,
        ),
        corpus_path: resolve_path(
            cli_corpus,
            CORPUS_ENV_VAR,
            config.corpus_path.as_deref(),
            &defaults.corpus_path,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = TomlConfig::default();
        assert_eq!(config.top_k, 5);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
        assert_eq!(config.prediction.temperature, 1.3);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_partial_prediction_section() {
        let config: TomlConfig = toml::from_str("[prediction]\ntemperature = 1.5\n").unwrap();
        assert_eq!(config.prediction.temperature, 1.5);
        assert_eq!(config.prediction.high_confidence, 0.6);
        assert_eq!(config.prediction.medium_confidence, 0.4);
    }

    #[test]
    fn test_tuning_validation() {
        assert!(PredictionTuning::default().validate().is_ok());

        let bad_temp = PredictionTuning {
            temperature: 0.0,
            ..Default::default()
        };
        assert!(bad_temp.validate().is_err());

        let inverted = PredictionTuning {
            high_confidence: 0.3,
            medium_confidence: 0.5,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_compiled_defaults_layout() {
        let defaults = CompiledDefaults::for_current_platform();
        assert!(defaults.artifact_path.starts_with(&defaults.data_folder));
        assert!(defaults.corpus_path.ends_with("corpus/features.json"));
    }
}
