//! UI-side session: file registry, settings and batch runs for one page.
//!
//! # Example
//!
//! ```typescript
//! import { JsSession, JsWorkerBridge, bitmap_accept_attribute } from '@konverter/wasm';
//!
//! const session = new JsSession(bridge);
//! input.accept = bitmap_accept_attribute();
//! session.on_change(() => render(session.entries()));
//! session.on_progress(({ completed, total }) => bar.value = completed / total);
//!
//! for (const file of input.files) {
//!   session.add_file(file.name, file.type, new Uint8Array(await file.arrayBuffer()));
//! }
//! session.probe_pending();
//!
//! session.set_format('JPG');
//! const summary = await session.convert_all();
//! alert(summary.message);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Promise};
use konverter_core::batch::{BatchError, BatchOrchestrator, BatchSummary, CancellationToken};
use konverter_core::format::{self, OutputFormat};
use konverter_core::registry::{FileEntry, FileId, FileRegistry, SourceFile, StatusKind};
use konverter_core::settings::{
    Preset, ScaleMode, Settings, SettingsStore, MAX_WIDTH_PRESETS, QUALITY_PRESETS, SCALE_PRESETS,
};
use konverter_core::Dimensions;
use serde::Serialize;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::bridge::JsWorkerBridge;
use crate::browser::{describe_js_error, BrowserDownloadSink, JsClock, ObjectUrlStore};

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(JsValue::from)
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Call a JS callback, logging (not throwing) its errors.
fn invoke(callback: &Function, arg: &JsValue) {
    if let Err(e) = callback.call1(&JsValue::NULL, arg) {
        warn!(error = %describe_js_error(&e), "Callback threw");
    }
}

/// Plain-object view of a file entry for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub id: u32,
    pub name: String,
    pub size: f64,
    pub mime_type: String,
    pub status: StatusKind,
    pub convert_to: OutputFormat,
    pub status_tooltip: Option<String>,
    pub dimensions: Option<Dimensions>,
    /// Output size under the current settings, when dimensions are known
    pub preview_dimensions: Option<Dimensions>,
    pub source_preview: Option<String>,
    pub result_preview: Option<String>,
    pub result_size: Option<f64>,
}

impl EntryView {
    pub fn new(entry: &FileEntry, settings: &Settings) -> Self {
        let success = entry.success_data();
        Self {
            id: entry.id.raw(),
            name: entry.source.name.clone(),
            size: entry.source.size() as f64,
            mime_type: entry.source.mime_type.clone(),
            status: entry.status_kind(),
            convert_to: entry.convert_to,
            status_tooltip: entry.status_tooltip.clone(),
            dimensions: entry.dimensions,
            preview_dimensions: entry.dimensions.map(|d| settings.preview_dimensions(d)),
            source_preview: entry.source_preview.as_ref().map(|p| p.as_str().to_string()),
            result_preview: success
                .and_then(|s| s.preview.as_ref())
                .map(|p| p.as_str().to_string()),
            result_size: success.map(|s| s.bytes.len() as f64),
        }
    }
}

/// Completion summary for the page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
    pub cancelled: bool,
    pub archive_name: Option<String>,
    pub all_succeeded: bool,
    /// User-facing completion text
    pub message: String,
}

impl From<BatchSummary> for SummaryView {
    fn from(summary: BatchSummary) -> Self {
        Self {
            all_succeeded: summary.all_succeeded(),
            message: summary.message(),
            succeeded: summary.succeeded,
            failed: summary.failed,
            total: summary.total,
            cancelled: summary.cancelled,
            archive_name: summary.archive_name,
        }
    }
}

/// One converter page: its files, its settings and its batch runs.
#[wasm_bindgen]
pub struct JsSession {
    registry: FileRegistry,
    settings: SettingsStore,
    orchestrator: Rc<BatchOrchestrator<JsWorkerBridge>>,
    /// Token of the run started by `convert_all`, until that run settles
    active_run: Rc<RefCell<Option<CancellationToken>>>,
}

#[wasm_bindgen]
impl JsSession {
    /// Create a session converting through `bridge`.
    #[wasm_bindgen(constructor)]
    pub fn new(bridge: &JsWorkerBridge) -> JsSession {
        let registry = FileRegistry::new(Rc::new(ObjectUrlStore));
        let settings = SettingsStore::default();
        let orchestrator = BatchOrchestrator::new(
            registry.clone(),
            settings.clone(),
            bridge.clone(),
            Rc::new(BrowserDownloadSink),
        )
        .with_clock(Rc::new(JsClock));

        JsSession {
            registry,
            settings,
            orchestrator: Rc::new(orchestrator),
            active_run: Rc::new(RefCell::new(None)),
        }
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Add a file, capturing the current output format. Returns its id.
    pub fn add_file(&self, name: String, mime_type: String, bytes: Vec<u8>) -> u32 {
        let ids = self
            .registry
            .add([SourceFile::new(name, mime_type, bytes)], self.settings.format());
        ids.first().map(|id| id.raw()).unwrap_or_default()
    }

    /// Probe dimensions of newly added files. Returns how many were found.
    pub fn probe_pending(&self) -> usize {
        self.registry.probe_pending()
    }

    pub fn remove(&self, id: u32) -> bool {
        self.registry.remove(FileId::from_raw(id))
    }

    pub fn remove_all(&self) -> usize {
        self.registry.remove_all()
    }

    #[wasm_bindgen(getter)]
    pub fn file_count(&self) -> usize {
        self.registry.len()
    }

    /// All entries as plain objects, in insertion order.
    pub fn entries(&self) -> Result<JsValue, JsValue> {
        let settings = self.settings.snapshot();
        let views: Vec<EntryView> = self
            .registry
            .entries()
            .iter()
            .map(|entry| EntryView::new(entry, &settings))
            .collect();
        to_js(&views)
    }

    /// Set every entry's target format to the current setting.
    pub fn apply_format(&self) {
        self.registry.apply_format(self.settings.format());
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn settings(&self) -> Result<JsValue, JsValue> {
        to_js(&self.settings.snapshot())
    }

    /// Replace all settings from `{ format, quality, scaleMode, scale, maxWidth }`.
    pub fn set_settings(&self, settings: JsValue) -> Result<(), JsValue> {
        let settings: Settings = serde_wasm_bindgen::from_value(settings).map_err(js_error)?;
        self.settings.replace(settings);
        Ok(())
    }

    pub fn set_format(&self, format: &str) -> Result<(), JsValue> {
        let format: OutputFormat = format.parse().map_err(js_error)?;
        self.settings.set_format(format);
        Ok(())
    }

    pub fn set_quality(&self, quality: u8) {
        self.settings.set_quality(quality);
    }

    /// Set the resize mode: `'scale'` or `'maxWidth'`.
    pub fn set_scale_mode(&self, mode: JsValue) -> Result<(), JsValue> {
        let mode: ScaleMode = serde_wasm_bindgen::from_value(mode).map_err(js_error)?;
        self.settings.set_scale_mode(mode);
        Ok(())
    }

    pub fn set_scale(&self, scale: u32) {
        self.settings.set_scale(scale);
    }

    pub fn set_max_width(&self, max_width: u32) {
        self.settings.set_max_width(max_width);
    }

    // ------------------------------------------------------------------
    // Runs
    // ------------------------------------------------------------------

    /// Whether the convert action should be enabled.
    pub fn can_convert(&self) -> bool {
        self.orchestrator.can_run()
    }

    /// Latest `{ completed, total }`.
    pub fn progress(&self) -> Result<JsValue, JsValue> {
        to_js(&self.orchestrator.progress())
    }

    /// Call `callback()` after every registry or settings change.
    pub fn on_change(&self, callback: Function) {
        let on_registry = callback.clone();
        self.registry
            .subscribe(move |_| invoke(&on_registry, &JsValue::UNDEFINED));
        self.settings
            .subscribe(move |_| invoke(&callback, &JsValue::UNDEFINED));
    }

    /// Call `callback({ completed, total })` after every converted file.
    pub fn on_progress(&self, callback: Function) {
        self.orchestrator.on_progress(move |progress| match to_js(&progress) {
            Ok(value) => invoke(&callback, &value),
            Err(e) => warn!(error = %describe_js_error(&e), "Could not serialize progress"),
        });
    }

    /// Convert all files. Resolves with the summary, rejects if the run was refused.
    ///
    /// The run is registered before the returned promise is first polled, so a
    /// second call made meanwhile is refused without replacing the first run's
    /// cancel token.
    pub fn convert_all(&self) -> Promise {
        if self.active_run.borrow().is_some() {
            return Promise::reject(&js_error(BatchError::AlreadyRunning));
        }

        let orchestrator = Rc::clone(&self.orchestrator);
        let active_run = Rc::clone(&self.active_run);
        let token = CancellationToken::new();
        *active_run.borrow_mut() = Some(token.clone());

        future_to_promise(async move {
            let result = orchestrator.run(&token).await;
            active_run.borrow_mut().take();
            to_js(&SummaryView::from(result.map_err(js_error)?))
        })
    }

    /// Stop the current run after the file being converted.
    pub fn cancel(&self) {
        if let Some(token) = self.active_run.borrow().as_ref() {
            token.cancel();
        }
    }
}

// ============================================================================
// Input validation and presets
// ============================================================================

/// Whether a picked file is an accepted bitmap (extension and media type).
#[wasm_bindgen]
pub fn is_valid_bitmap_input(file_name: &str, mime_type: &str) -> bool {
    format::is_valid_bitmap_input(file_name, mime_type)
}

/// Human-readable list of accepted formats.
#[wasm_bindgen]
pub fn supported_bitmap_formats() -> String {
    format::supported_bitmap_formats()
}

/// Value for the file input's `accept` attribute.
#[wasm_bindgen]
pub fn bitmap_accept_attribute() -> String {
    format::bitmap_accept_attribute()
}

/// `{ formats, quality, scale, maxWidth }` option lists for the settings form.
#[wasm_bindgen]
pub fn presets() -> Result<JsValue, JsValue> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Presets {
        formats: [OutputFormat; 4],
        quality: &'static [Preset<u8>],
        scale: &'static [Preset<u32>],
        max_width: &'static [Preset<u32>],
    }

    to_js(&Presets {
        formats: OutputFormat::ALL,
        quality: &QUALITY_PRESETS,
        scale: &SCALE_PRESETS,
        max_width: &MAX_WIDTH_PRESETS,
    })
}
