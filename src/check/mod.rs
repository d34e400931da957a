//! Pluggable response checks.
//!
//! A check is stateless declarative input plus one compiled form:
//! `prepare` validates and compiles the parameters, `execute` evaluates
//! the assertion against a captured response. Concrete variants are
//! looked up by tag through an explicitly constructed [`CheckRegistry`];
//! the executor treats every registered check identically.

mod builtins;
mod registry;


pub use builtins::{Body, Header, Json, Latency, SetCookie, StatusCode};
pub use registry::{CheckFactory, CheckRegistry};

use crate::error::CheckError;
use crate::http::Response;

/// Capability contract every check variant implements.
pub trait Check: std::fmt::Debug + Send + Sync {
    /// Stable tag naming this check in results.
    fn name(&self) -> &'static str;

    /// Compile the check's parameters. A `CheckError::Malformed` here
    /// marks the owning test Bogus before any request is made.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::Malformed` for invalid parameters.
    fn prepare(&mut self) -> Result<(), CheckError> {
        Ok(())
    }

    /// Evaluate the check against a captured response.
    ///
    /// # Errors
    ///
    /// `CheckError::Failed` when the assertion does not hold,
    /// `CheckError::Malformed` when the check cannot be evaluated at all.
    fn execute(&self, response: &Response) -> Result<(), CheckError>;

    /// The status code this check expects, for the short-circuit rule:
    /// when the first declared check expects 200 and does not pass, the
    /// remaining checks of the test are skipped.
    fn gate_status(&self) -> Option<u16> {
        None
    }
}
