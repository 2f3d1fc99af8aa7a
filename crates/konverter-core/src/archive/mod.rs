//! Archive Packager: bundles converted files into one zip and delivers it.
//!
//! The bundle is named `<prefix>_<UTC timestamp>.zip`, with the timestamp at
//! seconds precision and dashes instead of colons so it is a valid file name
//! everywhere. Delivery goes through an [`ArchiveSink`]: a browser download in
//! the WASM bindings, a directory on native hosts.

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Default bundle name prefix.
pub const DEFAULT_ARCHIVE_PREFIX: &str = "konverterede-billeder";

/// Error types for packaging and delivery.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Nothing to package")]
    Empty,

    #[error("Invalid archive timestamp: {0}")]
    Timestamp(String),

    #[error("Failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to deliver archive: {0}")]
    Delivery(String),
}

/// One member of the bundle.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

/// A finished bundle, ready for delivery.
#[derive(Debug, Clone)]
pub struct Archive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Archive {
    pub const MIME_TYPE: &'static str = "application/zip";
}

/// Builds zip bundles from `(name, bytes)` pairs.
#[derive(Debug, Clone)]
pub struct ArchivePackager {
    prefix: String,
}

impl Default for ArchivePackager {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_PREFIX)
    }
}

impl ArchivePackager {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Bundle file name for the given time (milliseconds since the epoch).
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Timestamp` if `now_ms` is out of range.
    pub fn archive_file_name(&self, now_ms: f64) -> Result<String, ArchiveError> {
        let nanos = (now_ms * 1_000_000.0) as i128;
        let timestamp = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|e| ArchiveError::Timestamp(e.to_string()))?
            .format(format_description!(
                "[year]-[month]-[day]T[hour]-[minute]-[second]"
            ))
            .map_err(|e| ArchiveError::Timestamp(e.to_string()))?;
        Ok(format!("{}_{}.zip", self.prefix, timestamp))
    }

    /// Compress `entries` into one deflated zip, one member per entry.
    ///
    /// Member names are used as given; callers are responsible for making
    /// them unique.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Empty` for an empty list, or the zip/IO error
    /// that stopped writing.
    pub fn pack(&self, entries: &[ArchiveEntry], now_ms: f64) -> Result<Archive, ArchiveError> {
        if entries.is_empty() {
            return Err(ArchiveError::Empty);
        }
        let file_name = self.archive_file_name(now_ms)?;

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in entries {
            writer.start_file(entry.name.as_str(), options)?;
            writer.write_all(&entry.bytes)?;
            debug!(name = %entry.name, size = entry.bytes.len(), "Added archive member");
        }
        let bytes = writer.finish()?.into_inner();

        info!(file_name = %file_name, members = entries.len(), size = bytes.len(), "Packaged archive");
        Ok(Archive { file_name, bytes })
    }
}

/// Destination for finished bundles.
pub trait ArchiveSink {
    /// Hand the bundle to the user (download, save, ...).
    fn deliver(&self, archive: &Archive) -> Result<(), ArchiveError>;
}

/// Writes bundles into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArchiveSink for DirectorySink {
    fn deliver(&self, archive: &Archive) -> Result<(), ArchiveError> {
        let path = self.dir.join(&archive.file_name);
        std::fs::write(&path, &archive.bytes)?;
        info!(path = %path.display(), "Saved archive");
        Ok(())
    }
}
