//! Browser implementations of the core's platform seams.
//!
//! - [`ObjectUrlStore`] backs preview references with `URL.createObjectURL`
//! - [`BrowserDownloadSink`] delivers archives through a temporary `<a download>`
//! - [`JsClock`] reads `Date.now()`

use std::sync::Arc;

use js_sys::{Array, Uint8Array};
use konverter_core::archive::{Archive, ArchiveError, ArchiveSink};
use konverter_core::clock::Clock;
use konverter_core::registry::{PreviewRef, PreviewStore};
use tracing::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

/// Describe a thrown JS value for logs and error messages.
pub(crate) fn describe_js_error(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn blob_from_bytes(bytes: &[u8], mime_type: &str) -> Result<Blob, JsValue> {
    let parts = Array::of1(&Uint8Array::from(bytes));
    let options = BlobPropertyBag::new();
    options.set_type(mime_type);
    Blob::new_with_u8_array_sequence_and_options(&parts, &options)
}

fn object_url(bytes: &[u8], mime_type: &str) -> Result<String, JsValue> {
    let blob = blob_from_bytes(bytes, mime_type)?;
    Url::create_object_url_with_blob(&blob)
}

/// Preview references as blob object URLs.
#[derive(Debug, Default)]
pub struct ObjectUrlStore;

impl PreviewStore for ObjectUrlStore {
    fn create(&self, bytes: &Arc<[u8]>, mime_type: &str) -> Option<PreviewRef> {
        match object_url(bytes, mime_type) {
            Ok(url) => Some(PreviewRef::new(url)),
            Err(e) => {
                warn!(error = %describe_js_error(&e), "Could not create object URL");
                None
            }
        }
    }

    fn release(&self, preview: &PreviewRef) {
        if let Err(e) = Url::revoke_object_url(preview.as_str()) {
            warn!(error = %describe_js_error(&e), "Could not revoke object URL");
        }
    }
}

/// Triggers a browser download for each delivered archive.
#[derive(Debug, Default)]
pub struct BrowserDownloadSink;

impl BrowserDownloadSink {
    fn download(archive: &Archive) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("No document"))?;
        let body = document.body().ok_or_else(|| JsValue::from_str("No body"))?;

        let url = object_url(&archive.bytes, Archive::MIME_TYPE)?;
        let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
        anchor.set_href(&url);
        anchor.set_download(&archive.file_name);

        body.append_child(&anchor)?;
        anchor.click();
        body.remove_child(&anchor)?;
        Url::revoke_object_url(&url)?;
        debug!(file_name = %archive.file_name, "Download triggered");
        Ok(())
    }
}

impl ArchiveSink for BrowserDownloadSink {
    fn deliver(&self, archive: &Archive) -> Result<(), ArchiveError> {
        Self::download(archive).map_err(|e| ArchiveError::Delivery(describe_js_error(&e)))
    }
}

/// `Date.now()` clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsClock;

impl Clock for JsClock {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}
