use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No enabled tests to draw load from.")]
    NoEnabledTests,
    #[error("Error rate {observed:.4} exceeded limit {limit:.4} after {total} requests.")]
    ErrorRateExceeded {
        observed: f64,
        limit: f64,
        total: u64,
    },
    #[error("Rate must be positive.")]
    InvalidRate,
    #[error("Concurrency level must be positive.")]
    InvalidConcurrency,
}
