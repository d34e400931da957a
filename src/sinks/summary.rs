//! JSON export of aggregated run statistics.

use std::path::Path;

use crate::error::{AppError, AppResult, SinkError};

/// Serialize `summary` as pretty JSON and write it to `path`.
///
/// # Errors
///
/// Serialization or file I/O.
pub async fn write_summary_json<S>(path: &Path, summary: &S) -> AppResult<()>
where
    S: serde::Serialize,
{
    let json = serde_json::to_vec_pretty(summary)
        .map_err(|err| AppError::sink(SinkError::Serialize { source: err }))?;
    tokio::fs::write(path, json).await.map_err(|err| {
        AppError::sink(SinkError::Write {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    Ok(())
}
