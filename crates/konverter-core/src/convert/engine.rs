//! The codec engine: decode, orient, resize, encode.
//!
//! One engine instance serves one worker. It is synchronous and holds no
//! per-call state, but callers still treat it as single-owner so that at most
//! one source and one result buffer are alive at a time.

use std::io::Cursor;

use image::{DynamicImage, ImageReader};
use tracing::debug;

use super::encode::encode_image;
use super::heic::HeicDecoder;
use super::orientation::{apply_orientation, read_orientation};
use super::resize::{apply_resize, ResizePolicy};
use super::{ConvertError, ConvertOptions, EngineOptions, RgbaFrame};
use crate::format::{sniff_source, SourceKind};
use crate::Dimensions;

/// Image conversion engine.
pub struct CodecEngine {
    options: EngineOptions,
    heic: Option<Box<dyn HeicDecoder + Send>>,
}

impl Default for CodecEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl CodecEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            heic: None,
        }
    }

    /// Install the decoder used for HEIC/HEIF sources.
    pub fn with_heic_decoder(mut self, decoder: impl HeicDecoder + Send + 'static) -> Self {
        self.heic = Some(Box::new(decoder));
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Convert encoded source bytes.
    ///
    /// The source encoding is detected from content. HEIF sources are decoded
    /// to raw RGBA through the HEIC decoder first; everything else is decoded
    /// by the `image` crate.
    ///
    /// # Errors
    ///
    /// Any decode, resize-parameter or encode failure aborts this conversion
    /// only and is returned as a `ConvertError`.
    pub fn convert(&self, content: &[u8], options: &ConvertOptions) -> Result<Vec<u8>, ConvertError> {
        let policy = ResizePolicy::from_options(options.scale, options.max_width)?;
        let image = self.decode(content)?;
        self.finish(image, policy, options)
    }

    /// Convert an already-decoded RGBA frame (e.g. from an external HEIC decoder).
    pub fn convert_frame(
        &self,
        frame: RgbaFrame,
        options: &ConvertOptions,
    ) -> Result<Vec<u8>, ConvertError> {
        let policy = ResizePolicy::from_options(options.scale, options.max_width)?;
        let image = frame.into_image()?;
        self.finish(image, policy, options)
    }

    fn decode(&self, content: &[u8]) -> Result<DynamicImage, ConvertError> {
        if content.is_empty() {
            return Err(ConvertError::EmptyInput);
        }

        match sniff_source(content) {
            SourceKind::Heif => {
                let decoder = self.heic.as_ref().ok_or(ConvertError::HeicUnsupported)?;
                let frame = decoder.decode(content).map_err(ConvertError::Heic)?;
                debug!(width = frame.width, height = frame.height, "Decoded HEIF source");
                frame.into_image()
            }
            kind => {
                let image = ImageReader::new(Cursor::new(content))
                    .with_guessed_format()
                    .map_err(|e| ConvertError::Decode(e.to_string()))?
                    .decode()
                    .map_err(|e| ConvertError::Decode(e.to_string()))?;
                debug!(?kind, width = image.width(), height = image.height(), "Decoded source");

                if self.options.auto_orient {
                    Ok(apply_orientation(image, read_orientation(content)))
                } else {
                    Ok(image)
                }
            }
        }
    }

    fn finish(
        &self,
        image: DynamicImage,
        policy: ResizePolicy,
        options: &ConvertOptions,
    ) -> Result<Vec<u8>, ConvertError> {
        let image = apply_resize(
            image,
            policy,
            self.options.filter,
            self.options.allow_upscale,
        );
        encode_image(&image, options.convert_to, options.quality)
    }
}

/// Read image dimensions from the header without decoding pixels.
///
/// Returns `None` for unrecognized content, HEIF sources and corrupt headers.
pub fn probe_dimensions(content: &[u8]) -> Option<Dimensions> {
    if content.is_empty() || matches!(sniff_source(content), SourceKind::Heif) {
        return None;
    }
    let (width, height) = ImageReader::new(Cursor::new(content))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some(Dimensions::new(width, height))
}
