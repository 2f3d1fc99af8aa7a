//! Session settings for conversion runs.
//!
//! [`Settings`] holds the output format, quality and resize policy the user has
//! picked. [`SettingsStore`] is the shared, observable handle the UI writes to
//! and the batch orchestrator snapshots at the start of a run.
//!
//! Only the resize field matching the active [`ScaleMode`] affects conversion;
//! the other one is retained so switching modes back restores it.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::convert::ConvertOptions;
use crate::format::OutputFormat;
use crate::Dimensions;

/// Default quality percentage.
pub const DEFAULT_QUALITY: u8 = 95;
/// Default scale percentage (no resize).
pub const DEFAULT_SCALE: u32 = 100;
/// Default maximum width in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 1000;

/// How the output size is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScaleMode {
    /// Percentage of the original size in both axes.
    #[default]
    Scale,
    /// Fixed output width, height follows the aspect ratio.
    MaxWidth,
}

/// Conversion settings for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Target format
    pub format: OutputFormat,
    /// Quality percentage (0-100)
    pub quality: u8,
    /// Active resize mode
    pub scale_mode: ScaleMode,
    /// Scale percentage, used in [`ScaleMode::Scale`]
    pub scale: u32,
    /// Target width in pixels, used in [`ScaleMode::MaxWidth`]
    pub max_width: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            quality: DEFAULT_QUALITY,
            scale_mode: ScaleMode::default(),
            scale: DEFAULT_SCALE,
            max_width: DEFAULT_MAX_WIDTH,
        }
    }
}

impl Settings {
    /// The scale percentage if it is the active resize parameter.
    pub fn active_scale(&self) -> Option<u32> {
        match self.scale_mode {
            ScaleMode::Scale => Some(self.scale),
            ScaleMode::MaxWidth => None,
        }
    }

    /// The maximum width if it is the active resize parameter.
    pub fn active_max_width(&self) -> Option<u32> {
        match self.scale_mode {
            ScaleMode::Scale => None,
            ScaleMode::MaxWidth => Some(self.max_width),
        }
    }

    /// Build bridge options for a given target format.
    ///
    /// Exactly one of `scale` / `max_width` is set, chosen by the active mode.
    pub fn convert_options(&self, convert_to: OutputFormat) -> ConvertOptions {
        ConvertOptions {
            convert_to,
            quality: Some(self.quality),
            scale: self.active_scale(),
            max_width: self.active_max_width(),
        }
    }

    /// Predict output dimensions for the resize preview.
    ///
    /// Mirrors what the engine does with default options: scale rounds both
    /// axes, max width never grows the image and derives the height from the
    /// aspect ratio.
    pub fn preview_dimensions(&self, original: Dimensions) -> Dimensions {
        if original.is_empty() {
            return original;
        }
        match self.scale_mode {
            ScaleMode::Scale => {
                let factor = self.scale.min(100) as f64 / 100.0;
                Dimensions::new(
                    ((original.width as f64 * factor).round() as u32).max(1),
                    ((original.height as f64 * factor).round() as u32).max(1),
                )
            }
            ScaleMode::MaxWidth => {
                let width = original.width.min(self.max_width).max(1);
                let height = (width as f64 * original.height as f64 / original.width as f64)
                    .round() as u32;
                Dimensions::new(width, height.max(1))
            }
        }
    }
}

// ============================================================================
// Presets
// ============================================================================

/// A selectable value with its UI label and description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset<T> {
    pub label: &'static str,
    pub value: T,
    pub description: &'static str,
}

pub const QUALITY_PRESETS: [Preset<u8>; 5] = [
    Preset { label: "Fuld", value: 100, description: "Maksimal kvalitet, største filstørrelse" },
    Preset { label: "Meget god", value: 95, description: "Høj kvalitet, god komprimering" },
    Preset { label: "God", value: 80, description: "Balanceret kvalitet og filstørrelse" },
    Preset { label: "Medium", value: 60, description: "Moderat kvalitet, mindre filer" },
    Preset { label: "Lav", value: 40, description: "Lav kvalitet, mindste filer" },
];

pub const SCALE_PRESETS: [Preset<u32>; 4] = [
    Preset { label: "100%", value: 100, description: "Original størrelse" },
    Preset { label: "75%", value: 75, description: "Tre fjerdedele størrelse" },
    Preset { label: "50%", value: 50, description: "Halv størrelse" },
    Preset { label: "25%", value: 25, description: "Kvart størrelse" },
];

pub const MAX_WIDTH_PRESETS: [Preset<u32>; 8] = [
    Preset { label: "XL", value: 1500, description: "Ekstra stor (1500px)" },
    Preset { label: "Meget stor", value: 1000, description: "Meget stor (1000px)" },
    Preset { label: "Stor", value: 750, description: "Stor (750px)" },
    Preset { label: "Medium", value: 500, description: "Medium (500px)" },
    Preset { label: "Lille", value: 250, description: "Lille (250px)" },
    Preset { label: "Meget lille", value: 125, description: "Meget lille (125px)" },
    Preset { label: "Ekstra lille", value: 75, description: "Ekstra lille (75px)" },
    Preset { label: "Tiny", value: 32, description: "Tiny (32px)" },
];

// ============================================================================
// Store
// ============================================================================

type SettingsObserver = Rc<dyn Fn(&Settings)>;

#[derive(Default)]
struct StoreInner {
    settings: Settings,
    observers: Vec<(u64, SettingsObserver)>,
    next_subscription: u64,
}

/// Shared handle to the session settings.
///
/// Cloning the handle shares the same state. The store lives on the UI thread;
/// observers are notified after every setter call, outside of any borrow, so
/// they may read the store again.
#[derive(Clone, Default)]
pub struct SettingsStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        let store = Self::default();
        store.inner.borrow_mut().settings = settings;
        store
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.inner.borrow().settings
    }

    pub fn format(&self) -> OutputFormat {
        self.inner.borrow().settings.format
    }

    pub fn quality(&self) -> u8 {
        self.inner.borrow().settings.quality
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.inner.borrow().settings.scale_mode
    }

    pub fn scale(&self) -> u32 {
        self.inner.borrow().settings.scale
    }

    pub fn max_width(&self) -> u32 {
        self.inner.borrow().settings.max_width
    }

    pub fn set_format(&self, format: OutputFormat) {
        self.update(|s| s.format = format);
    }

    pub fn set_quality(&self, quality: u8) {
        self.update(|s| s.quality = quality);
    }

    pub fn set_scale_mode(&self, mode: ScaleMode) {
        self.update(|s| s.scale_mode = mode);
    }

    pub fn set_scale(&self, scale: u32) {
        self.update(|s| s.scale = scale);
    }

    pub fn set_max_width(&self, max_width: u32) {
        self.update(|s| s.max_width = max_width);
    }

    /// Replace all settings at once.
    pub fn replace(&self, settings: Settings) {
        self.update(|s| *s = settings);
    }

    /// Register an observer called with the new settings after each change.
    ///
    /// Returns a subscription id for [`SettingsStore::unsubscribe`].
    pub fn subscribe(&self, observer: impl Fn(&Settings) + 'static) -> u64 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_subscription;
        inner.next_subscription += 1;
        inner.observers.push((id, Rc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, subscription: u64) {
        self.inner
            .borrow_mut()
            .observers
            .retain(|(id, _)| *id != subscription);
    }

    fn update(&self, change: impl FnOnce(&mut Settings)) {
        let (settings, observers) = {
            let mut inner = self.inner.borrow_mut();
            change(&mut inner.settings);
            let observers: Vec<SettingsObserver> =
                inner.observers.iter().map(|(_, o)| Rc::clone(o)).collect();
            (inner.settings, observers)
        };
        debug!(?settings, "Settings changed");
        for observer in observers {
            observer(&settings);
        }
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("settings", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.format, OutputFormat::Webp);
        assert_eq!(settings.quality, 95);
        assert_eq!(settings.scale_mode, ScaleMode::Scale);
        assert_eq!(settings.scale, 100);
        assert_eq!(settings.max_width, 1000);
    }

    #[test]
    fn test_only_active_resize_field_is_used() {
        let mut settings = Settings::default();
        settings.scale = 50;
        settings.max_width = 500;

        let options = settings.convert_options(OutputFormat::Png);
        assert_eq!(options.scale, Some(50));
        assert_eq!(options.max_width, None);

        settings.scale_mode = ScaleMode::MaxWidth;
        let options = settings.convert_options(OutputFormat::Png);
        assert_eq!(options.scale, None);
        assert_eq!(options.max_width, Some(500));
        // Inactive field is retained
        assert_eq!(settings.scale, 50);
    }

    #[test]
    fn test_preview_dimensions_scale() {
        let mut settings = Settings::default();
        settings.scale = 75;
        let preview = settings.preview_dimensions(Dimensions::new(1001, 333));
        assert_eq!(preview, Dimensions::new(751, 250));
    }

    #[test]
    fn test_preview_dimensions_max_width() {
        let mut settings = Settings::default();
        settings.scale_mode = ScaleMode::MaxWidth;
        settings.max_width = 500;
        assert_eq!(
            settings.preview_dimensions(Dimensions::new(2000, 1000)),
            Dimensions::new(500, 250)
        );
        // Smaller than max width: unchanged
        assert_eq!(
            settings.preview_dimensions(Dimensions::new(300, 200)),
            Dimensions::new(300, 200)
        );
    }

    #[test]
    fn test_preview_dimensions_empty_input() {
        let settings = Settings::default();
        assert_eq!(
            settings.preview_dimensions(Dimensions::new(0, 0)),
            Dimensions::new(0, 0)
        );
    }

    #[test]
    fn test_presets_contain_defaults() {
        assert!(QUALITY_PRESETS.iter().any(|p| p.value == DEFAULT_QUALITY));
        assert!(SCALE_PRESETS.iter().any(|p| p.value == DEFAULT_SCALE));
        assert!(MAX_WIDTH_PRESETS.iter().any(|p| p.value == DEFAULT_MAX_WIDTH));
    }

    #[test]
    fn test_store_setters_and_snapshot() {
        let store = SettingsStore::default();
        store.set_format(OutputFormat::Jpg);
        store.set_quality(80);
        store.set_scale_mode(ScaleMode::MaxWidth);
        store.set_max_width(250);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.format, OutputFormat::Jpg);
        assert_eq!(snapshot.quality, 80);
        assert_eq!(snapshot.scale_mode, ScaleMode::MaxWidth);
        assert_eq!(snapshot.max_width, 250);
        assert_eq!(snapshot.scale, DEFAULT_SCALE);
    }

    #[test]
    fn test_store_clones_share_state() {
        let store = SettingsStore::default();
        let other = store.clone();
        other.set_scale(25);
        assert_eq!(store.scale(), 25);
    }

    #[test]
    fn test_store_notifies_observers() {
        let store = SettingsStore::default();
        let seen = Rc::new(Cell::new(0u8));
        let seen_clone = Rc::clone(&seen);
        let subscription = store.subscribe(move |settings| seen_clone.set(settings.quality));

        store.set_quality(60);
        assert_eq!(seen.get(), 60);

        store.unsubscribe(subscription);
        store.set_quality(40);
        assert_eq!(seen.get(), 60);
    }

    #[test]
    fn test_observer_can_read_store() {
        let store = SettingsStore::default();
        let reader = store.clone();
        let seen = Rc::new(Cell::new(OutputFormat::Webp));
        let seen_clone = Rc::clone(&seen);
        store.subscribe(move |_| seen_clone.set(reader.format()));

        store.set_format(OutputFormat::Gif);
        assert_eq!(seen.get(), OutputFormat::Gif);
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: Settings = serde::Deserialize::deserialize(
            serde::de::value::MapDeserializer::<_, serde::de::value::Error>::new(
                [("quality", 80u8)].into_iter(),
            ),
        )
        .unwrap();
        assert_eq!(settings.quality, 80);
        assert_eq!(settings.max_width, DEFAULT_MAX_WIDTH);
    }
}
