use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::{OutlierPolicy, QualityFilterConfig};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "POWERBOX_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub schema_file: PathBuf,
    pub archive_dir: PathBuf,
    pub log_dir: PathBuf,
    pub quality: QualityConfig,
    pub relational: RelationalConfig,
    pub flat_file: FlatFileConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    pub missingness_threshold: f64,
    pub iqr_multiplier: f64,
    pub outlier_policy: OutlierPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationalConfig {
    pub store: PathBuf,
    pub table: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlatFileConfig {
    pub path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema_file: PathBuf::from(DEFAULT_SCHEMA_FILE),
            archive_dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            quality: QualityConfig::default(),
            relational: RelationalConfig::default(),
            flat_file: FlatFileConfig::default(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            missingness_threshold: DEFAULT_MISSINGNESS_THRESHOLD,
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            outlier_policy: OutlierPolicy::default(),
        }
    }
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            store: PathBuf::from(DEFAULT_STORE),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl Default for FlatFileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_FLAT_FILE),
        }
    }
}

impl PipelineConfig {
    /// Resolve and load the config file.
    ///
    /// An explicit path must exist. Otherwise `POWERBOX_CONFIG` is tried,
    /// then `powerbox.toml` in the working directory; when neither names an
    /// existing file the defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = env::var(CONFIG_ENV) {
            if !path.trim().is_empty() {
                return Self::from_file(Path::new(&path));
            }
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            return Self::from_file(default_path);
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.quality.missingness_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PipelineError::Config(format!(
                "quality.missingness_threshold must be within [0, 1], got {threshold}"
            )));
        }
        let k = self.quality.iqr_multiplier;
        if !k.is_finite() || k < 0.0 {
            return Err(PipelineError::Config(format!(
                "quality.iqr_multiplier must be a non-negative number, got {k}"
            )));
        }
        if self.relational.table.trim().is_empty() {
            return Err(PipelineError::Config("relational.table must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn quality_filter_config(&self) -> QualityFilterConfig {
        QualityFilterConfig {
            missingness_threshold: self.quality.missingness_threshold,
            iqr_multiplier: self.quality.iqr_multiplier,
            outlier_policy: self.quality.outlier_policy,
            ..QualityFilterConfig::default()
        }
    }
}
