//! Core types for the conversion pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::OutputFormat;

/// Error types for a single conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// The source buffer is empty.
    #[error("Empty input")]
    EmptyInput,

    /// The source could not be decoded.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The source is HEIC/HEIF but no HEIC decoder is installed.
    #[error("HEIC input requires a HEIC decoder")]
    HeicUnsupported,

    /// The HEIC decoder rejected the source.
    #[error("HEIC decode failed: {0}")]
    Heic(String),

    /// A raw pixel frame does not match its declared dimensions.
    #[error("Invalid pixel frame: expected {expected} bytes (width * height * 4), got {actual}")]
    InvalidFrame { expected: usize, actual: usize },

    /// Width or height is zero.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Scale percentage of zero.
    #[error("Invalid scale: {0}% (must be 1-100)")]
    InvalidScale(u32),

    /// Maximum width of zero.
    #[error("Invalid max width: {0}px (must be positive)")]
    InvalidMaxWidth(u32),

    /// The encoder for the target format failed.
    #[error("{format} encoding failed: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },
}

/// Per-call conversion parameters.
///
/// When both `scale` and `max_width` are present, `scale` wins; callers are
/// expected to pass only the one matching the active resize mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Target format
    pub convert_to: OutputFormat,
    /// Quality percentage; engine default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Scale percentage (1-100); 100 means no resize
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Output width in pixels, height keeps the aspect ratio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
}

impl ConvertOptions {
    /// Options converting to `convert_to` with engine defaults and no resize.
    pub fn new(convert_to: OutputFormat) -> Self {
        Self {
            convert_to,
            quality: None,
            scale: None,
            max_width: None,
        }
    }
}

/// A conversion request: unmodified source bytes plus options.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    /// The source file content, shared with the registry entry
    pub content: Arc<[u8]>,
    pub options: ConvertOptions,
}

impl ConvertRequest {
    pub fn new(content: impl Into<Arc<[u8]>>, options: ConvertOptions) -> Self {
        Self {
            content: content.into(),
            options,
        }
    }
}

/// Filter type for resize operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    #[default]
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Codec engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    /// Interpolation used for every resize
    pub filter: FilterType,
    /// Apply EXIF orientation before re-encoding
    pub auto_orient: bool,
    /// Let `max_width` enlarge images narrower than the target
    pub allow_upscale: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
            auto_orient: true,
            allow_upscale: false,
        }
    }
}

/// Raw RGBA8 pixels with explicit dimensions, as produced by a HEIC decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data in row-major order (4 bytes per pixel)
    pub pixels: Vec<u8>,
}

impl RgbaFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wrap the frame as an `image` buffer, validating its size.
    pub fn into_image(self) -> Result<image::DynamicImage, ConvertError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConvertError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        let expected = (self.width as usize) * (self.height as usize) * 4;
        if self.pixels.len() != expected {
            return Err(ConvertError::InvalidFrame {
                expected,
                actual: self.pixels.len(),
            });
        }

        image::RgbaImage::from_raw(self.width, self.height, self.pixels)
            .map(image::DynamicImage::ImageRgba8)
            .ok_or(ConvertError::InvalidFrame {
                expected,
                actual: 0,
            })
    }
}
