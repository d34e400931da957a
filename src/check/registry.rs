use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{CheckError, ConfigError};

use super::Check;
use super::builtins;

/// Constructor for one check variant from its declarative JSON form.
pub type CheckFactory = fn(&Value) -> Result<Box<dyn Check>, CheckError>;

/// Maps declarative `Check` tags to variant constructors.
///
/// Registries are built explicitly and handed to compilation rather than
/// living in package-level state, so parallel suites can carry different
/// plugin sets and tests stay isolated.
#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    factories: BTreeMap<String, CheckFactory>,
}

impl CheckRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (tag, factory) in builtins::builtin_checks() {
            if let Err(err) = registry.register(tag, factory) {
                tracing::warn!("Skipping duplicate builtin check: {}", err);
            }
        }
        registry
    }

    /// Register a check variant under `tag`.
    ///
    /// # Errors
    ///
    /// Returns an error when the tag is already taken.
    pub fn register(&mut self, tag: &str, factory: CheckFactory) -> Result<(), ConfigError> {
        if self.factories.contains_key(tag) {
            return Err(ConfigError::DuplicateCheck {
                tag: tag.to_owned(),
            });
        }
        self.factories.insert(tag.to_owned(), factory);
        Ok(())
    }

    /// Build and prepare the check described by `spec`, an object
    /// carrying a `Check` tag field next to the variant's parameters.
    ///
    /// # Errors
    ///
    /// `CheckError::Malformed` for a missing or unknown tag, parameters
    /// that do not deserialize, or a failing `prepare`.
    pub fn compile(&self, spec: &Value) -> Result<Box<dyn Check>, CheckError> {
        let tag = spec
            .get("Check")
            .and_then(Value::as_str)
            .ok_or_else(|| CheckError::Malformed("missing Check tag".to_owned()))?;
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| CheckError::Malformed(format!("unknown check: {tag}")))?;
        let mut check = factory(spec)?;
        check.prepare()?;
        Ok(check)
    }
}
