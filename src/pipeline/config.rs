// Pipeline configuration
// Defaults, TOML/JSON loading, validation and environment overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::arranger::AlternationConfig;
use crate::events::DEFAULT_WINDOW_SECS;
use crate::groove::GridResolution;

/// Disables the ML classifier when set to a truthy value
pub const ENV_DISABLE_ML: &str = "BEATMAPPER_DISABLE_ML";

/// Overrides the classifier model path
pub const ENV_MODEL_PATH: &str = "BEATMAPPER_MODEL_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for one beatmap run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the separation collaborator before onset detection
    pub isolate_drums: bool,

    /// Hits scoring below this are labeled "unknown" [0.0, 1.0]
    pub confidence_threshold: f32,

    /// Onset detector sensitivity [0.0, 1.0]
    pub detection_sensitivity: f32,

    pub quantization_grid: GridResolution,

    /// Hits further than this from a grid line stay unsnapped
    pub max_snap_error_ms: f64,

    pub use_ml_classifier: bool,

    /// Model file; the default data-dir location is tried when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    /// Fixed tempo; estimated from the onsets when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,

    /// Remove "unknown" hits instead of mapping them to the fallback lane
    pub drop_unknown: bool,

    /// Audio analyzed after each onset, in seconds
    pub classification_window_secs: f64,

    /// Beatmap title; the input file stem when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub alternation: AlternationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            isolate_drums: true,
            confidence_threshold: 0.5,
            detection_sensitivity: 0.5,
            quantization_grid: GridResolution::Sixteenth,
            max_snap_error_ms: 50.0,
            use_ml_classifier: true,
            model_path: None,
            bpm: None,
            drop_unknown: false,
            classification_window_secs: DEFAULT_WINDOW_SECS,
            title: None,
            alternation: AlternationConfig::default(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_unit_range(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, format!("{} is outside [0, 1]", value)));
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(field, format!("{} must be a positive number", value)));
    }
    Ok(())
}

impl PipelineConfig {
    /// Load a config file, picking the parser from the extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let config = match extension.as_str() {
            "toml" => Self::from_toml_str(&contents)?,
            "json" => Self::from_json_str(&contents)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_range("confidence_threshold", self.confidence_threshold)?;
        check_unit_range("detection_sensitivity", self.detection_sensitivity)?;
        check_positive("max_snap_error_ms", self.max_snap_error_ms)?;
        check_positive("classification_window_secs", self.classification_window_secs)?;
        check_positive("alternation.cymbal_window_secs", self.alternation.cymbal_window_secs)?;
        check_positive("alternation.tom_window_secs", self.alternation.tom_window_secs)?;

        if let Some(bpm) = self.bpm {
            check_positive("bpm", bpm)?;
        }
        if let Some(path) = &self.model_path {
            if path.as_os_str().is_empty() {
                return Err(invalid("model_path", "path is empty"));
            }
        }

        Ok(())
    }

    /// Apply the ML environment overrides through `lookup`.
    ///
    /// Called once at pipeline entry so the rest of a run sees a single,
    /// fixed decision.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DISABLE_ML) {
            if is_truthy(&value) {
                log::info!("{} is set, ML classifier disabled", ENV_DISABLE_ML);
                self.use_ml_classifier = false;
            }
        }

        if let Some(value) = lookup(ENV_MODEL_PATH) {
            let value = value.trim();
            if !value.is_empty() {
                log::info!("{} overrides model path to {}", ENV_MODEL_PATH, value);
                self.model_path = Some(PathBuf::from(value));
            }
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_process_env(&mut self) {
        self.apply_env_overrides(|key| std::env::var(key).ok());
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
