//! UI-side conversion bridge backed by a JS worker function.
//!
//! The page owns a Web Worker that loads this module and calls the worker-side
//! exports (`convert_file`, `convert_file_base64`, ...). On the UI side the
//! page wraps its `postMessage` round trip in a function
//! `(content: Uint8Array, options: object) => Promise<Uint8Array | ArrayBuffer | string>`
//! and hands it to [`JsWorkerBridge`]. String responses are treated as base64.
//!
//! # Example
//!
//! ```typescript
//! import { JsWorkerBridge, JsSession } from '@konverter/wasm';
//!
//! const bridge = new JsWorkerBridge((content, options) => workerCall(content, options));
//! worker.addEventListener('message', (e) => {
//!   if (e.data === 'ready') bridge.set_ready(true);
//! });
//! const session = new JsSession(bridge);
//! ```

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

use js_sys::{ArrayBuffer, Function, Promise, Uint8Array};
use konverter_core::bridge::{decode_payload, BridgeError, ConversionBridge};
use konverter_core::convert::ConvertRequest;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::browser::describe_js_error;

/// Conversion bridge that forwards requests to a JS worker function.
///
/// Cloning shares the readiness flag, so the page can keep a handle and flip
/// it once the worker reports that its engine is loaded.
#[wasm_bindgen]
#[derive(Clone)]
pub struct JsWorkerBridge {
    convert_fn: Function,
    ready: Rc<Cell<bool>>,
}

#[wasm_bindgen]
impl JsWorkerBridge {
    /// Create a bridge around `convert_fn`. It starts out not ready.
    #[wasm_bindgen(constructor)]
    pub fn new(convert_fn: Function) -> JsWorkerBridge {
        JsWorkerBridge {
            convert_fn,
            ready: Rc::new(Cell::new(false)),
        }
    }

    /// Mark the worker as initialized (or lost).
    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
        tracing::debug!(ready, "Worker readiness changed");
    }

    #[wasm_bindgen(getter)]
    pub fn ready(&self) -> bool {
        self.ready.get()
    }
}

/// Turn a worker response into bytes.
fn response_bytes(value: JsValue) -> Result<Vec<u8>, BridgeError> {
    if value.is_null() || value.is_undefined() {
        return Err(BridgeError::NoData);
    }
    if let Some(text) = value.as_string() {
        return Ok(decode_payload(&text)?);
    }
    if let Some(array) = value.dyn_ref::<Uint8Array>() {
        return Ok(array.to_vec());
    }
    if value.is_instance_of::<ArrayBuffer>() {
        return Ok(Uint8Array::new(&value).to_vec());
    }
    Err(BridgeError::Worker(format!(
        "Unexpected worker response: {:?}",
        value
    )))
}

fn worker_error(value: JsValue) -> BridgeError {
    BridgeError::Worker(describe_js_error(&value))
}

impl ConversionBridge for JsWorkerBridge {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn convert(&self, request: ConvertRequest) -> impl Future<Output = Result<Vec<u8>, BridgeError>> {
        let call = serde_wasm_bindgen::to_value(&request.options)
            .map_err(|e| BridgeError::Worker(e.to_string()))
            .and_then(|options| {
                let content = Uint8Array::from(&request.content[..]);
                self.convert_fn
                    .call2(&JsValue::NULL, &content, &options)
                    .map_err(worker_error)
            });

        async move {
            // Plain values are accepted as well as promises
            let response = JsFuture::from(Promise::resolve(&call?))
                .await
                .map_err(worker_error)?;
            response_bytes(response)
        }
    }
}
