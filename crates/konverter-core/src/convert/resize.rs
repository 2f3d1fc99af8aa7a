//! Resize policy for conversions.
//!
//! A conversion resizes by percentage (`scale`) or to a fixed width with the
//! aspect ratio preserved (`max_width`). Neither path enlarges an image unless
//! [`EngineOptions::allow_upscale`](super::EngineOptions) opts in for `max_width`.

use image::DynamicImage;

use super::{ConvertError, FilterType};

/// Which resize a conversion performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePolicy {
    /// Keep the original size.
    Original,
    /// Percentage of the original size in both axes (1-99).
    Scale(u32),
    /// Exact output width; height follows the aspect ratio.
    MaxWidth(u32),
}

impl ResizePolicy {
    /// Select the policy from the optional request parameters.
    ///
    /// `scale` takes precedence when both are given. A scale of 100 or more is
    /// treated as "no resize".
    ///
    /// # Errors
    ///
    /// Returns `ConvertError::InvalidScale` for a zero scale and
    /// `ConvertError::InvalidMaxWidth` for a zero width.
    pub fn from_options(scale: Option<u32>, max_width: Option<u32>) -> Result<Self, ConvertError> {
        match (scale, max_width) {
            (Some(0), _) => Err(ConvertError::InvalidScale(0)),
            (Some(scale), _) if scale >= 100 => Ok(ResizePolicy::Original),
            (Some(scale), _) => Ok(ResizePolicy::Scale(scale)),
            (None, Some(0)) => Err(ConvertError::InvalidMaxWidth(0)),
            (None, Some(width)) => Ok(ResizePolicy::MaxWidth(width)),
            (None, None) => Ok(ResizePolicy::Original),
        }
    }

    /// Compute the output size for an image of `width` x `height`.
    ///
    /// Returns `None` when no resize is needed.
    pub fn target_dimensions(
        &self,
        width: u32,
        height: u32,
        allow_upscale: bool,
    ) -> Option<(u32, u32)> {
        if width == 0 || height == 0 {
            return None;
        }

        match *self {
            ResizePolicy::Original => None,
            ResizePolicy::Scale(percent) => {
                let factor = percent as f64 / 100.0;
                Some((
                    ((width as f64 * factor).round() as u32).max(1),
                    ((height as f64 * factor).round() as u32).max(1),
                ))
            }
            ResizePolicy::MaxWidth(max_width) => {
                if max_width == width || (max_width > width && !allow_upscale) {
                    return None;
                }
                Some((max_width, height_for_width(max_width, width, height)))
            }
        }
    }
}

/// Height that preserves the aspect ratio at `target_width`.
///
/// Computed as `round(target_width * height / width)`, never less than 1.
pub fn height_for_width(target_width: u32, width: u32, height: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    let scaled = (target_width as f64 * height as f64 / width as f64).round() as u32;
    scaled.max(1)
}

/// Apply a resize policy to a decoded image.
pub fn apply_resize(
    image: DynamicImage,
    policy: ResizePolicy,
    filter: FilterType,
    allow_upscale: bool,
) -> DynamicImage {
    match policy.target_dimensions(image.width(), image.height(), allow_upscale) {
        Some((width, height)) => image.resize_exact(width, height, filter.to_image_filter()),
        None => image,
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: max width output always has the requested width and an
        /// aspect ratio within rounding of the original.
        #[test]
        fn prop_max_width_preserves_aspect(
            width in 1u32..=8000,
            height in 1u32..=8000,
            max_width in 1u32..=4000,
        ) {
            if let Some((w, h)) = ResizePolicy::MaxWidth(max_width).target_dimensions(width, height, true) {
                prop_assert_eq!(w, max_width);
                let exact = max_width as f64 * height as f64 / width as f64;
                prop_assert!((h as f64 - exact.max(1.0)).abs() <= 0.5 + f64::EPSILON * exact);
            }
        }

        /// Property: the scale path never enlarges an image.
        #[test]
        fn prop_scale_never_upscales(
            width in 1u32..=8000,
            height in 1u32..=8000,
            scale in 1u32..=200,
        ) {
            let policy = ResizePolicy::from_options(Some(scale), None).unwrap();
            if let Some((w, h)) = policy.target_dimensions(width, height, false) {
                prop_assert!(w <= width);
                prop_assert!(h <= height);
            }
        }
    }
}
