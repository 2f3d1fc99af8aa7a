//! Konverter Core - batch image conversion library
//!
//! This crate provides everything behind the converter UI except presentation:
//! the registry of user-added files and their conversion lifecycle, the session
//! settings, the codec engine that decodes, resizes and re-encodes images, the
//! request/response bridge that runs the engine off the UI thread, the batch
//! orchestrator that drives a conversion run, and the archive packager that
//! bundles the results.
//!
//! # Module Structure
//!
//! - `format` - Output formats, content sniffing and accepted input types
//! - `settings` - Session settings, presets and the observable settings store
//! - `registry` - File entries, lifecycle status and preview references
//! - `convert` - The codec engine (decode, orient, resize, encode)
//! - `bridge` - The async conversion contract and the native worker bridge
//! - `batch` - Sequential batch runs, output naming, progress and cancellation
//! - `archive` - Zip bundling and delivery of converted files
//! - `clock` - Wall clock abstraction and elapsed-time formatting

pub mod archive;
pub mod batch;
pub mod bridge;
pub mod clock;
pub mod convert;
pub mod format;
pub mod registry;
pub mod settings;

pub use archive::{Archive, ArchiveEntry, ArchiveError, ArchivePackager, ArchiveSink, DirectorySink};
pub use batch::{BatchError, BatchOrchestrator, BatchSummary, CancellationToken, Progress, RunState};
pub use bridge::{BridgeError, ConversionBridge};
pub use clock::{Clock, SystemClock};
pub use convert::{CodecEngine, ConvertError, ConvertOptions, ConvertRequest, EngineOptions};
pub use format::OutputFormat;
pub use registry::{FileEntry, FileId, FileRegistry, FileStatus, PreviewStore, SourceFile};
pub use settings::{ScaleMode, Settings, SettingsStore};

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check if either side is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
