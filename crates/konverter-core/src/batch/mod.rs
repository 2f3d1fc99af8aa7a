//! Batch Orchestrator: sequential conversion runs over the file registry.
//!
//! This module provides:
//! - [`BatchOrchestrator`], the `idle -> running -> completed` state machine
//! - Descriptive output naming (`photo_s50_q80.webp`) and archive name dedup
//! - Progress counters and the completion summary
//! - Cooperative cancellation between files

mod cancel;
mod naming;
mod orchestrator;
mod progress;

pub use cancel::CancellationToken;
pub use naming::{output_file_name, strip_extension, UniqueNames};
pub use orchestrator::{
    BatchError, BatchOrchestrator, RunState, CANCELLED_TOOLTIP, INTERRUPTED_TOOLTIP,
};
pub use progress::{BatchSummary, Progress};
