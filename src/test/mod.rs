//! Declarative test model and the poll/retry execution state machine.
//!
//! A [`Test`] is immutable template data. Preparation resolves variables
//! and compiles checks into a [`PreparedTest`]; running one produces a
//! [`TestResult`]. The declarative value itself is never mutated by
//! execution.



pub use exec::{PreparedTest, prepare};
pub use result::{CheckResult, Status, TestResult};

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Declarative request template, pre-substitution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Request {
    /// HTTP method; empty means GET.
    pub method: String,
    #[serde(rename = "URL")]
    pub url: String,
    /// Multi-valued parameters, routed per [`ParamsAs`].
    pub params: BTreeMap<String, Vec<String>>,
    pub params_as: ParamsAs,
    /// Multi-valued header template.
    pub header: BTreeMap<String, Vec<String>>,
    pub cookies: Vec<Cookie>,
    /// Literal body, or `@file:<path>` / `@vfile:<path>` references.
    pub body: String,
    pub follow_redirects: bool,
    /// Per-request timeout like `10s`; empty uses the default.
    pub timeout: String,
}

/// Where parameters end up in the outbound request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamsAs {
    #[default]
    Url,
    Body,
    Multipart,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Retry policy. `max` of 0 or 1 is a single attempt; negative disables
/// the test entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Poll {
    pub max: i32,
    /// Pause between attempts, e.g. `100ms`.
    pub sleep: String,
}

impl Default for Poll {
    fn default() -> Self {
        Self {
            max: 1,
            sleep: String::new(),
        }
    }
}

/// One declarative test: a request plus an ordered list of checks.
///
/// Checks and extractors stay as tagged JSON trees until preparation so
/// variable substitution can reach every nested string of every
/// polymorphic variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Test {
    pub name: String,
    pub description: String,
    pub request: Request,
    pub checks: Vec<serde_json::Value>,
    /// Variable name to extractor spec, applied after a passing run.
    pub data_extraction: BTreeMap<String, serde_json::Value>,
    pub poll: Poll,
    /// Lowest-priority variable defaults.
    pub variables: BTreeMap<String, String>,
    /// Directory `@file:` references resolve against; set by the loader.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Test {
    /// Disabled tests are reported Skipped without any network call.
    #[must_use]
    pub const fn disabled(&self) -> bool {
        self.poll.max < 0
    }
}
