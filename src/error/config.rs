use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse '{path}': {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to parse config '{path}': {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Variables file '{path}' must be a flat JSON object of strings.")]
    VarsFileShape { path: PathBuf },
    #[error("Invalid variable definition '{input}': expected name=value.")]
    InvalidVariable { input: String },
    #[error("Invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },
    #[error("Invalid status '{value}'.")]
    InvalidStatus { value: String },
    #[error("Check tag already registered: {tag}")]
    DuplicateCheck { tag: String },
    #[error("Extractor tag already registered: {tag}")]
    DuplicateExtractor { tag: String },
}
