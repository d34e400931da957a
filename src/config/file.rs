use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError};

/// Optional tool configuration (`--config httest.toml`). Command-line
/// flags win; config values only fill options left unset.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub variables: Option<BTreeMap<String, String>>,
    pub output: Option<String>,
    pub max_concurrent: Option<usize>,
    pub load: Option<LoadDefaults>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadDefaults {
    pub rate: Option<f64>,
    pub duration: Option<String>,
    pub ramp: Option<String>,
    pub uniform: Option<bool>,
    pub count: Option<u64>,
    pub concurrent: Option<usize>,
    pub max_error_rate: Option<f64>,
}

impl ConfigFile {
    /// # Errors
    ///
    /// Unreadable or unparseable files.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::config(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source: err,
            })
        })?;
        toml::from_str(&raw).map_err(|err| {
            AppError::config(ConfigError::ParseConfig {
                path: path.to_path_buf(),
                source: err,
            })
        })
    }
}
