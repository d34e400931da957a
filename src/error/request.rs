use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported method '{method}'.")]
    InvalidMethod { method: String },
    #[error("Body-style parameters cannot be sent with {method}.")]
    BodyParamsWithMethod { method: String },
    #[error("Request body and body-style parameters are mutually exclusive.")]
    BodyConflict,
    #[error("Invalid timeout '{input}'.")]
    InvalidTimeout { input: String },
    #[error("Failed to read body file '{path}': {source}")]
    ReadBodyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to build request: {source}")]
    BuildRequestFailed {
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to build HTTP client: {source}")]
    BuildClientFailed {
        #[source]
        source: reqwest::Error,
    },
}
