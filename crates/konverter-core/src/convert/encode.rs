//! Encoding into the target format.
//!
//! JPEG uses the `image` crate's encoder with an explicit quality. WebP below
//! quality 100 goes through libwebp's lossy encoder; at 100, or without a
//! quality, it is written losslessly. PNG and GIF have no quality setting.

use std::io::Cursor;

use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use super::ConvertError;
use crate::format::OutputFormat;

/// Encode an image into `format`.
///
/// # Arguments
///
/// * `image` - The decoded (and possibly resized) image
/// * `format` - Target format
/// * `quality` - Quality percentage; the encoder default applies when `None`
///
/// # Errors
///
/// Returns `ConvertError::InvalidDimensions` for empty images and
/// `ConvertError::Encode` when the encoder rejects the image (for example
/// dimensions beyond what GIF or JPEG can represent).
pub fn encode_image(
    image: &DynamicImage,
    format: OutputFormat,
    quality: Option<u8>,
) -> Result<Vec<u8>, ConvertError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ConvertError::InvalidDimensions { width, height });
    }

    let encode_err = |e: image::ImageError| ConvertError::Encode {
        format,
        message: e.to_string(),
    };

    let mut buffer = Cursor::new(Vec::new());
    match format {
        OutputFormat::Jpg => {
            // JPEG has no alpha channel
            let rgb = image.to_rgb8();
            let encoder = match quality {
                Some(quality) => JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)),
                None => JpegEncoder::new(&mut buffer),
            };
            encoder
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(encode_err)?;
        }
        OutputFormat::Png => {
            let rgba = image.to_rgba8();
            PngEncoder::new(&mut buffer)
                .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(encode_err)?;
        }
        OutputFormat::Webp => {
            let rgba = image.to_rgba8();
            match quality {
                Some(quality) if quality < 100 => {
                    return encode_lossy_webp(rgba.as_raw(), width, height, quality);
                }
                _ => WebPEncoder::new_lossless(&mut buffer)
                    .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(encode_err)?,
            }
        }
        OutputFormat::Gif => {
            let rgba = image.to_rgba8();
            // The trailer is written when the encoder drops
            let mut encoder = GifEncoder::new(&mut buffer);
            encoder
                .encode(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(encode_err)?;
        }
    }

    Ok(buffer.into_inner())
}

fn encode_lossy_webp(
    rgba: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, ConvertError> {
    let memory = webp::Encoder::from_rgba(rgba, width, height)
        .encode_simple(false, f32::from(quality))
        .map_err(|e| ConvertError::Encode {
            format: OutputFormat::Webp,
            message: format!("{:?}", e),
        })?;
    Ok(memory.to_vec())
}
