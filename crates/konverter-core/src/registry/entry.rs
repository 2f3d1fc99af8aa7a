//! File entries and their lifecycle status.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::preview::PreviewRef;
use crate::format::OutputFormat;
use crate::Dimensions;

static NEXT_FILE_ID: AtomicU32 = AtomicU32::new(1);

/// Session-scoped identifier of a file entry.
///
/// Allocated from a process-wide monotonic counter, so identifiers are unique
/// across registries and never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(u32);

impl FileId {
    pub(crate) fn next() -> Self {
        FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u32) -> Self {
        FileId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file-{}", self.0)
    }
}

/// A user-supplied source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Original file name, including extension
    pub name: String,
    /// Declared media type (may be empty)
    pub mime_type: String,
    /// Raw file content
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size of the content in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Converted output held by an entry in the `Success` state.
#[derive(Debug, Clone)]
pub struct SuccessData {
    /// Converted bytes in the entry's target format
    pub bytes: Arc<[u8]>,
    /// Reference for preview/download; released when the entry leaves `Success`
    pub preview: Option<PreviewRef>,
}

/// Lifecycle status of a file entry.
///
/// Result data lives inside the `Success` variant, so an entry has result data
/// exactly when it has succeeded.
#[derive(Debug, Clone, Default)]
pub enum FileStatus {
    #[default]
    NotStarted,
    InProgress,
    Success(SuccessData),
    Failed,
}

impl FileStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            FileStatus::NotStarted => StatusKind::NotStarted,
            FileStatus::InProgress => StatusKind::InProgress,
            FileStatus::Success(_) => StatusKind::Success,
            FileStatus::Failed => StatusKind::Failed,
        }
    }

    /// `Success` and `Failed` are terminal for a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Success(_) | FileStatus::Failed)
    }
}

/// Data-free view of [`FileStatus`], for events and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusKind {
    NotStarted,
    InProgress,
    Success,
    Failed,
}

/// One user-added image and its conversion state.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub id: FileId,
    pub source: SourceFile,
    pub status: FileStatus,
    /// Target format captured for this file
    pub convert_to: OutputFormat,
    /// Human-readable outcome (timing on success, hint on failure)
    pub status_tooltip: Option<String>,
    /// Probed source dimensions; absent while pending or if probing failed
    pub dimensions: Option<Dimensions>,
    /// Preview reference of the original source
    pub source_preview: Option<PreviewRef>,
}

impl FileEntry {
    pub fn success_data(&self) -> Option<&SuccessData> {
        match &self.status {
            FileStatus::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn status_kind(&self) -> StatusKind {
        self.status.kind()
    }
}
