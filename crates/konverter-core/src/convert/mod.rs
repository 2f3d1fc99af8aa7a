//! Conversion pipeline for Konverter.
//!
//! This module provides functionality for:
//! - Decoding any supported raster source (content-sniffed, not by file name)
//! - Routing HEIC/HEIF sources through a dedicated decoder
//! - Baking EXIF orientation into the pixels
//! - Resizing by percentage or to a fixed width with preserved aspect ratio
//! - Encoding to WebP, JPEG, PNG or GIF
//!
//! # Architecture
//!
//! The engine is designed to run in a background worker (a native thread via
//! [`crate::bridge::WorkerBridge`], or a Web Worker via the WASM bindings).
//! All operations are synchronous and single-threaded within the engine.
//!
//! # Examples
//!
//! ```ignore
//! use konverter_core::convert::{CodecEngine, ConvertOptions};
//! use konverter_core::OutputFormat;
//!
//! let png = std::fs::read("photo.png").unwrap();
//! let mut options = ConvertOptions::new(OutputFormat::Webp);
//! options.scale = Some(50);
//! let webp = CodecEngine::default().convert(&png, &options).unwrap();
//! ```

mod encode;
mod engine;
mod heic;
mod orientation;
mod resize;
mod types;

pub use encode::encode_image;
pub use engine::{probe_dimensions, CodecEngine};
pub use heic::HeicDecoder;
pub use orientation::{apply_orientation, read_orientation, Orientation};
pub use resize::{apply_resize, height_for_width, ResizePolicy};
pub use types::{ConvertError, ConvertOptions, ConvertRequest, EngineOptions, FilterType, RgbaFrame};
