//! Output formats, content sniffing, and accepted input types.
//!
//! The converter writes one of a fixed set of output formats. Source files are
//! classified by their content rather than their file name: HEIC/HEIF sources
//! need a dedicated decoder before the codec engine can read them, everything
//! else is handed to the engine for self-detection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an unknown output format name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown output format: {0}")]
pub struct UnknownFormat(pub String);

/// Target format for converted images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    /// WebP (default)
    #[default]
    Webp,
    /// JPEG
    Jpg,
    /// Portable Network Graphics
    Png,
    /// Graphics Interchange Format
    Gif,
}

impl OutputFormat {
    /// All selectable output formats, in presentation order.
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Webp,
        OutputFormat::Jpg,
        OutputFormat::Png,
        OutputFormat::Gif,
    ];

    /// Upper-case display name, as shown in the format picker.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Webp => "WEBP",
            OutputFormat::Jpg => "JPG",
            OutputFormat::Png => "PNG",
            OutputFormat::Gif => "GIF",
        }
    }

    /// Lower-case file extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Gif => "image/gif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WEBP" => Ok(OutputFormat::Webp),
            "JPG" | "JPEG" => Ok(OutputFormat::Jpg),
            "PNG" => Ok(OutputFormat::Png),
            "GIF" => Ok(OutputFormat::Gif),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

// ============================================================================
// Content sniffing
// ============================================================================

/// Source encoding detected from file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// HEIC/HEIF container; needs the dedicated HEIC decoder.
    Heif,
    /// A raster format the codec engine recognizes by its magic bytes.
    Raster(image::ImageFormat),
    /// Nothing recognizable; the engine will still attempt a decode.
    Unknown,
}

// ISO-BMFF major brands identifying a HEIF still image or sequence.
const HEIF_BRANDS: [&[u8; 4]; 10] = [
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"hevm", b"hevs", b"mif1", b"msf1",
];

// Brands that only ever appear in HEVC-coded HEIF files.
const HEVC_BRANDS: [&[u8; 4]; 4] = [b"heic", b"heix", b"hevc", b"hevx"];

// AVIF shares the container and lists mif1 as a compatible brand.
const AVIF_BRANDS: [&[u8; 4]; 2] = [b"avif", b"avis"];

/// Classify source bytes by content.
pub fn sniff_source(bytes: &[u8]) -> SourceKind {
    if is_heif(bytes) {
        return SourceKind::Heif;
    }
    match image::guess_format(bytes) {
        Ok(format) => SourceKind::Raster(format),
        Err(_) => SourceKind::Unknown,
    }
}

/// Check whether bytes start with an ISO-BMFF `ftyp` box declaring HEIF content.
pub fn is_heif(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }

    let major = &bytes[8..12];
    if HEIF_BRANDS.iter().any(|brand| major == &brand[..]) {
        return true;
    }
    if AVIF_BRANDS.iter().any(|brand| major == &brand[..]) {
        return false;
    }

    // Compatible brands start after major brand + minor version
    let box_size = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let end = box_size.min(bytes.len());
    if end <= 16 {
        return false;
    }
    bytes[16..end]
        .chunks_exact(4)
        .any(|brand| HEVC_BRANDS.iter().any(|hevc| brand == &hevc[..]))
}

// ============================================================================
// Accepted inputs
// ============================================================================

/// File extensions accepted as bitmap input (lower-case, with dot).
pub const BITMAP_EXTENSIONS: [&str; 16] = [
    ".bmp", ".dib", ".jpg", ".jpeg", ".png", ".gif", ".tiff", ".tif", ".tga", ".pcx", ".ico",
    ".cur", ".webp", ".avif", ".heic", ".heif",
];

/// MIME types accepted as bitmap input.
pub const BITMAP_MIME_TYPES: [&str; 16] = [
    "image/bmp",
    "image/x-bmp",
    "image/x-ms-bmp",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/tiff",
    "image/tif",
    "image/x-tga",
    "image/x-pcx",
    "image/x-icon",
    "image/vnd.microsoft.icon",
    "image/webp",
    "image/avif",
    "image/heic",
    "image/heif",
];

/// Check whether a file name ends in an accepted bitmap extension.
pub fn has_valid_bitmap_extension(file_name: &str) -> bool {
    match file_name.rfind('.') {
        Some(dot) => {
            let extension = file_name[dot..].to_ascii_lowercase();
            BITMAP_EXTENSIONS.contains(&extension.as_str())
        }
        None => false,
    }
}

pub fn has_valid_bitmap_mime_type(mime_type: &str) -> bool {
    BITMAP_MIME_TYPES.contains(&mime_type)
}

/// Check both the extension and the declared MIME type of an input file.
pub fn is_valid_bitmap_input(file_name: &str, mime_type: &str) -> bool {
    has_valid_bitmap_extension(file_name) && has_valid_bitmap_mime_type(mime_type)
}

/// Human-readable list of accepted formats, e.g. `bmp, dib, jpg, ...`.
pub fn supported_bitmap_formats() -> String {
    BITMAP_EXTENSIONS
        .iter()
        .map(|ext| ext.trim_start_matches('.'))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Value for an `<input accept="...">` attribute.
pub fn bitmap_accept_attribute() -> String {
    BITMAP_EXTENSIONS.join(",")
}
