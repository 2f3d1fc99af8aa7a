//! The Conversion Bridge: an async request/response contract to the codec engine.
//!
//! The engine never runs on the UI thread. A bridge forwards one
//! [`ConvertRequest`] at a time to an isolated execution context and resolves
//! with the converted bytes or a typed error. Failures are per request; a bad
//! file never takes the bridge down.
//!
//! Two implementations exist:
//! - [`WorkerBridge`] (native targets) owns a dedicated thread with its own engine
//! - `JsWorkerBridge` in the WASM bindings forwards to a Web Worker

mod transport;
#[cfg(not(target_arch = "wasm32"))]
mod worker;

use std::future::Future;

use thiserror::Error;

pub use transport::{decode_payload, encode_payload, TransportError};
#[cfg(not(target_arch = "wasm32"))]
pub use worker::WorkerBridge;

use crate::convert::{ConvertError, ConvertRequest};

/// Error types for the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The worker has not finished initializing.
    #[error("Conversion worker is not ready")]
    NotReady,

    /// The worker is gone or dropped the request.
    #[error("Conversion worker disconnected")]
    Disconnected,

    /// The worker could not be started.
    #[error("Failed to start conversion worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// The engine panicked while handling the request.
    #[error("Conversion worker panicked")]
    WorkerPanicked,

    /// The worker answered without any bytes.
    #[error("Conversion returned no data")]
    NoData,

    /// The response could not be decoded.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The worker reported an error message of its own.
    #[error("Worker error: {0}")]
    Worker(String),

    /// The engine rejected the source or options.
    #[error(transparent)]
    Conversion(#[from] ConvertError),
}

/// Async contract to the codec engine.
///
/// Callers issue at most one request at a time; implementations may rely on
/// that and need not queue internally.
pub trait ConversionBridge {
    /// Whether the underlying engine finished initializing.
    fn is_ready(&self) -> bool;

    /// Convert one source file.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError` if the request could not be delivered, the
    /// engine failed, or the response was unusable.
    fn convert(&self, request: ConvertRequest) -> impl Future<Output = Result<Vec<u8>, BridgeError>>;
}
