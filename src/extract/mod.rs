//! Pluggable variable extraction from responses.
//!
//! Extractors pull a single string value out of a response after a test
//! passes; the suite binds it into the shared variable scope so later
//! tests can reference it. Same registry shape as checks: tags map to
//! variant constructors, no package-level state.

mod builtins;


pub use builtins::{BodyExtractor, CookieExtractor, HeaderExtractor};

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{ConfigError, ExtractError};
use crate::http::Response;

/// Capability contract every extractor variant implements.
pub trait Extractor: std::fmt::Debug + Send + Sync {
    /// Compile the extractor's parameters.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Malformed` for invalid parameters.
    fn prepare(&mut self) -> Result<(), ExtractError> {
        Ok(())
    }

    /// Pull the value out of a response.
    ///
    /// # Errors
    ///
    /// `ExtractError::NotFound` when the response has no such value.
    fn extract(&self, response: &Response) -> Result<String, ExtractError>;
}

/// Constructor for one extractor variant from its declarative JSON form.
pub type ExtractorFactory = fn(&Value) -> Result<Box<dyn Extractor>, ExtractError>;

#[derive(Debug, Clone, Default)]
pub struct ExtractorRegistry {
    factories: BTreeMap<String, ExtractorFactory>,
}

impl ExtractorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (tag, factory) in builtins::builtin_extractors() {
            if let Err(err) = registry.register(tag, factory) {
                tracing::warn!("Skipping duplicate builtin extractor: {}", err);
            }
        }
        registry
    }

    /// Register an extractor variant under `tag`.
    ///
    /// # Errors
    ///
    /// Returns an error when the tag is already taken.
    pub fn register(&mut self, tag: &str, factory: ExtractorFactory) -> Result<(), ConfigError> {
        if self.factories.contains_key(tag) {
            return Err(ConfigError::DuplicateExtractor {
                tag: tag.to_owned(),
            });
        }
        self.factories.insert(tag.to_owned(), factory);
        Ok(())
    }

    /// Build and prepare the extractor described by `spec`, an object
    /// carrying an `Extractor` tag field.
    ///
    /// # Errors
    ///
    /// `ExtractError::Malformed` for a missing or unknown tag, or
    /// parameters that do not compile.
    pub fn compile(&self, spec: &Value) -> Result<Box<dyn Extractor>, ExtractError> {
        let tag = spec
            .get("Extractor")
            .and_then(Value::as_str)
            .ok_or_else(|| ExtractError::Malformed("missing Extractor tag".to_owned()))?;
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| ExtractError::Malformed(format!("unknown extractor: {tag}")))?;
        let mut extractor = factory(spec)?;
        extractor.prepare()?;
        Ok(extractor)
    }
}
