//! Streaming per-request CSV log.
//!
//! Every record is flushed as it arrives, so an aborted run keeps
//! everything recorded up to the abort.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult, SinkError};
use crate::load::LoadRecord;

pub struct LiveLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LiveLog {
    /// Create the file and write the header row.
    ///
    /// # Errors
    ///
    /// File creation or the initial write.
    pub fn create(path: &Path) -> AppResult<Self> {
        let file = File::create(path).map_err(|err| {
            AppError::sink(SinkError::Create {
                path: path.to_path_buf(),
                source: err,
            })
        })?;
        let mut log = Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        };
        log.write_line("id,started_ms,duration_ms,full_ms,status,conc_tot,conc_own,error")?;
        Ok(log)
    }

    /// Append one record and flush it to disk.
    ///
    /// # Errors
    ///
    /// Write or flush failures.
    pub fn write(&mut self, record: &LoadRecord) -> AppResult<()> {
        let error = record
            .error
            .as_deref()
            .unwrap_or_default()
            .replace([',', '\n', '\r'], " ");
        let line = format!(
            "{},{},{},{},{},{},{},{}",
            record.id,
            record.started_ms,
            record.duration_ms,
            record.full_ms,
            record.status,
            record.conc_tot,
            record.conc_own,
            error
        );
        self.write_line(&line)
    }

    fn write_line(&mut self, line: &str) -> AppResult<()> {
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .map_err(|err| {
                AppError::sink(SinkError::Write {
                    path: self.path.clone(),
                    source: err,
                })
            })
    }
}
