use thiserror::Error;

use super::{ConfigError, RequestError};

/// Failure modes of a single check run against a response.
///
/// `Failed` is an assertion that did not hold against a well-formed
/// response; `Malformed` means the check itself is misconfigured. The
/// test executor maps `Failed` to a `Fail` status and `Malformed` to
/// `Bogus`.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{0}")]
    Failed(String),
    #[error("malformed check: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed extractor: {0}")]
    Malformed(String),
    #[error("{0}")]
    NotFound(String),
}

/// Anything that goes wrong before the first request of a test is sent.
/// A test failing preparation is reported as Bogus, never executed.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
