//! Konverter WASM - WebAssembly bindings for Konverter
//!
//! This crate exposes konverter-core to the browser in two roles:
//!
//! - inside a Web Worker, the codec engine (`convert_file`, `convert_rgba`, ...)
//! - on the page, a [`JsSession`] that owns the file list and settings and
//!   drives batch runs through a [`JsWorkerBridge`]
//!
//! # Module Structure
//!
//! - `worker` - Worker-side conversion exports
//! - `bridge` - Page-side bridge to the worker
//! - `session` - File registry, settings and batch runs for the page
//! - `browser` - Object URLs, downloads and the `Date.now()` clock
//! - `logging` - `tracing` output to the browser console
//!
//! # Usage
//!
//! ```typescript
//! import init, { JsSession, JsWorkerBridge } from '@konverter/wasm';
//!
//! // Initialize WASM module (must call first)
//! await init();
//!
//! const bridge = new JsWorkerBridge(callWorker);
//! const session = new JsSession(bridge);
//! ```

use wasm_bindgen::prelude::*;

mod bridge;
mod browser;
mod logging;
mod session;
mod worker;

// Re-export public types
pub use bridge::JsWorkerBridge;
pub use session::{
    bitmap_accept_attribute, is_valid_bitmap_input, presets, supported_bitmap_formats,
    EntryView, JsSession, SummaryView,
};
pub use worker::{
    configure_engine, convert_file, convert_file_base64, convert_rgba, is_heic,
    output_file_name, probe_dimensions,
};

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    logging::install(tracing::Level::INFO);
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
