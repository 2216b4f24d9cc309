use crate::config::OutputConfig;
use crate::model::Record;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Upper bound of `_N` suffixes tried before giving up
const MAX_SUFFIX: u32 = 1000;

/// Errors raised while persisting or loading dumps
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to persist {0}")]
    Persist(String),
}

/// Why the records are being persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistReason {
    Completed,
    Interrupted,
    Fatal,
}

impl PersistReason {
    /// Marker inserted into the file name
    fn tag(&self) -> Option<&'static str> {
        match self {
            PersistReason::Completed => None,
            PersistReason::Interrupted => Some("interrupt_dump"),
            PersistReason::Fatal => Some("error_dump"),
        }
    }
}

impl fmt::Display for PersistReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PersistReason::Completed => "completed",
            PersistReason::Interrupted => "interrupted",
            PersistReason::Fatal => "fatal",
        })
    }
}

/// Writes the records of a run as one JSON array
///
/// Dumps are written to a temporary file in the target directory and moved
/// into place without replacing anything: if the timestamped name is taken,
/// `_2`, `_3`, ... is appended.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    directory: PathBuf,
    prefix: String,
}

impl Checkpoint {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.directory.clone(), config.prefix.clone())
    }

    /// File name for a dump taken at `at`
    ///
    /// `{prefix}_{ts}.json`, `{prefix}_interrupt_dump_{ts}.json` or
    /// `{prefix}_error_dump_{ts}.json` with `ts` as `YYYYmmdd_HHMMSS` in UTC.
    pub fn file_name(&self, reason: PersistReason, at: DateTime<Utc>) -> String {
        let ts = at.format("%Y%m%d_%H%M%S");
        match reason.tag() {
            Some(tag) => format!("{}_{}_{}.json", self.prefix, tag, ts),
            None => format!("{}_{}.json", self.prefix, ts),
        }
    }

    /// Persists every record, returning the path written
    pub fn persist(
        &self,
        records: &[Record],
        reason: PersistReason,
    ) -> Result<PathBuf, CheckpointError> {
        self.persist_at(records, reason, Utc::now())
    }

    pub fn persist_at(
        &self,
        records: &[Record],
        reason: PersistReason,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, CheckpointError> {
        let path = self.directory.join(self.file_name(reason, at));
        let written = write_json_new(&path, records)?;
        tracing::info!(
            "Saved {} records ({}) to {}",
            records.len(),
            reason,
            written.display()
        );
        Ok(written)
    }
}

/// Atomically writes `value` as indented JSON to `path` or a suffixed sibling
///
/// Never replaces an existing file.
///
/// # Returns
///
/// The path actually written
pub fn write_json_new<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<PathBuf, CheckpointError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    let mut candidate = path.to_path_buf();
    let mut n = 1;
    loop {
        match tmp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists && n < MAX_SUFFIX => {
                tmp = e.file;
                n += 1;
                candidate = suffixed(path, n);
            }
            Err(e) => {
                return Err(CheckpointError::Persist(format!(
                    "{}: {}",
                    candidate.display(),
                    e.error
                )))
            }
        }
    }
}

/// `dir/name.json` -> `dir/name_{n}.json`
fn suffixed(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    path.with_file_name(name)
}

/// Loads a dump written by [`Checkpoint::persist`]
pub fn load_records(path: &Path) -> Result<Vec<Record>, CheckpointError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
