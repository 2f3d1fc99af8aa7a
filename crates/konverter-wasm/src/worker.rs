//! Worker-side exports: the codec engine behind a message boundary.
//!
//! These functions run inside a Web Worker. Each worker holds exactly one
//! engine instance; the worker script calls one function per request message
//! and posts the result back.
//!
//! # Functions
//!
//! - [`convert_file`] - Convert encoded source bytes
//! - [`convert_file_base64`] - Same, returning base64 text for string-only transports
//! - [`convert_rgba`] - Convert pixels decoded by JS (HEIC via a JS decoder)
//! - [`is_heic`] - Content sniffing for HEIC/HEIF sources
//! - [`probe_dimensions`] - Header-only size probe
//! - [`configure_engine`] - Replace the engine options
//!
//! # Example
//!
//! ```typescript
//! import init, { convert_file, is_heic, convert_rgba } from '@konverter/wasm';
//!
//! await init();
//! self.postMessage('ready');
//! self.onmessage = async ({ data: { id, content, options } }) => {
//!   try {
//!     const bytes = is_heic(content)
//!       ? await decodeHeicThenConvert(content, options)
//!       : convert_file(content, options);
//!     self.postMessage({ id, bytes }, [bytes.buffer]);
//!   } catch (error) {
//!     self.postMessage({ id, error: String(error) });
//!   }
//! };
//! ```

use std::cell::RefCell;

use konverter_core::batch;
use konverter_core::bridge::encode_payload;
use konverter_core::convert::{self, CodecEngine, ConvertOptions, EngineOptions, RgbaFrame};
use konverter_core::format;
use konverter_core::OutputFormat;
use wasm_bindgen::prelude::*;

thread_local! {
    static ENGINE: RefCell<CodecEngine> = RefCell::new(CodecEngine::default());
}

fn parse_options(options: JsValue) -> Result<ConvertOptions, JsValue> {
    serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Convert encoded image bytes.
///
/// # Arguments
///
/// * `content` - Unmodified source file content
/// * `options` - `{ convertTo: 'WEBP' | 'JPG' | 'PNG' | 'GIF', quality?, scale?, maxWidth? }`
///
/// # Errors
///
/// Returns an error if the options are malformed or the source cannot be
/// decoded, resized or encoded.
#[wasm_bindgen]
pub fn convert_file(content: &[u8], options: JsValue) -> Result<Vec<u8>, JsValue> {
    let options = parse_options(options)?;
    ENGINE
        .with(|engine| engine.borrow().convert(content, &options))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Convert and return the result as base64 text.
#[wasm_bindgen]
pub fn convert_file_base64(content: &[u8], options: JsValue) -> Result<String, JsValue> {
    convert_file(content, options).map(|bytes| encode_payload(&bytes))
}

/// Convert RGBA pixels decoded outside the engine.
///
/// Used for HEIC sources: the worker decodes them with a JS decoder and passes
/// the pixel buffer here for resizing and encoding.
///
/// # Arguments
///
/// * `pixels` - RGBA pixel data (4 bytes per pixel, row-major order)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `options` - Same shape as for [`convert_file`]
#[wasm_bindgen]
pub fn convert_rgba(
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    options: JsValue,
) -> Result<Vec<u8>, JsValue> {
    let options = parse_options(options)?;
    let frame = RgbaFrame::new(width, height, pixels);
    ENGINE
        .with(|engine| engine.borrow().convert_frame(frame, &options))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Whether `content` is a HEIC/HEIF container.
#[wasm_bindgen]
pub fn is_heic(content: &[u8]) -> bool {
    format::is_heif(content)
}

/// Probe `{ width, height }` from the header, or `undefined`.
#[wasm_bindgen]
pub fn probe_dimensions(content: &[u8]) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&convert::probe_dimensions(content)).map_err(JsValue::from)
}

/// Replace the engine options (`{ filter?, autoOrient?, allowUpscale? }`).
#[wasm_bindgen]
pub fn configure_engine(options: JsValue) -> Result<(), JsValue> {
    let options: EngineOptions =
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))?;
    ENGINE.with(|engine| *engine.borrow_mut() = CodecEngine::new(options));
    tracing::debug!(?options, "Engine reconfigured");
    Ok(())
}

/// Descriptive output name, e.g. `photo_s50_q80.webp`.
#[wasm_bindgen]
pub fn output_file_name(
    original: &str,
    format: &str,
    scale: u32,
    quality: u8,
) -> Result<String, JsValue> {
    let format: OutputFormat = format
        .parse()
        .map_err(|e: format::UnknownFormat| JsValue::from_str(&e.to_string()))?;
    Ok(batch::output_file_name(original, format, scale, quality))
}
