//! HEIC/HEIF decoding seam.
//!
//! The `image` crate cannot read HEIC, so sources sniffed as HEIF go through a
//! dedicated decoder that yields raw RGBA pixels plus dimensions. The engine
//! then treats that frame like any other decoded image.

use super::RgbaFrame;

/// A decoder for HEIC/HEIF sources.
pub trait HeicDecoder {
    /// Decode the primary image of a HEIF container to RGBA8 pixels.
    ///
    /// Errors are reported as human-readable messages; the engine wraps them
    /// in `ConvertError::Heic`.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaFrame, String>;
}

impl<F> HeicDecoder for F
where
    F: Fn(&[u8]) -> Result<RgbaFrame, String>,
{
    fn decode(&self, bytes: &[u8]) -> Result<RgbaFrame, String> {
        self(bytes)
    }
}
