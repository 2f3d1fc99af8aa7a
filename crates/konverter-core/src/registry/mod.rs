//! The file registry: user-added images and their conversion lifecycle.
//!
//! The registry is the single owner of file entries. It assigns identifiers,
//! keeps insertion order, captures each file's target format, probes source
//! dimensions in the background, and releases preview references when entries
//! go away. Status changes come from the batch orchestrator only.

mod entry;
mod preview;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

pub use entry::{FileEntry, FileId, FileStatus, SourceFile, StatusKind, SuccessData};
pub use preview::{MemoryPreviewStore, PreviewRef, PreviewStore};

use crate::convert::probe_dimensions;
use crate::format::OutputFormat;
use crate::Dimensions;

/// A change to the registry, delivered to observers after it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Added(Vec<FileId>),
    Removed(FileId),
    Cleared,
    StatusChanged(FileId, StatusKind),
    DimensionsProbed(FileId, Dimensions),
    FormatApplied(OutputFormat),
}

/// A status transition requested by the orchestrator.
#[derive(Debug, Clone)]
pub(crate) enum StatusUpdate {
    InProgress,
    Success { bytes: Arc<[u8]>, tooltip: String },
    Failed { tooltip: String },
}

type RegistryObserver = Rc<dyn Fn(&RegistryEvent)>;

#[derive(Default)]
struct RegistryInner {
    entries: Vec<FileEntry>,
    pending_probes: Vec<FileId>,
    observers: Vec<(u64, RegistryObserver)>,
    next_subscription: u64,
}

/// Shared handle to the ordered collection of file entries.
///
/// Cloning the handle shares the same entries. Like the settings store it is
/// confined to the UI thread, and observers run outside of any borrow.
#[derive(Clone)]
pub struct FileRegistry {
    inner: Rc<RefCell<RegistryInner>>,
    previews: Rc<dyn PreviewStore>,
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::new(Rc::new(MemoryPreviewStore::new()))
    }
}

impl FileRegistry {
    pub fn new(previews: Rc<dyn PreviewStore>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner::default())),
            previews,
        }
    }

    /// Append entries for `files`, each capturing `convert_to`.
    ///
    /// New entries start as `NotStarted` with a source preview reference and
    /// are queued for dimension probing. Identifiers are returned in input order.
    pub fn add(
        &self,
        files: impl IntoIterator<Item = SourceFile>,
        convert_to: OutputFormat,
    ) -> Vec<FileId> {
        let ids = {
            let mut inner = self.inner.borrow_mut();
            let mut ids = Vec::new();
            for source in files {
                let id = FileId::next();
                let source_preview = self.previews.create(&source.bytes, &source.mime_type);
                debug!(%id, name = %source.name, size = source.size(), "Adding file");
                inner.entries.push(FileEntry {
                    id,
                    source,
                    status: FileStatus::NotStarted,
                    convert_to,
                    status_tooltip: None,
                    dimensions: None,
                    source_preview,
                });
                inner.pending_probes.push(id);
                ids.push(id);
            }
            ids
        };
        if !ids.is_empty() {
            self.notify(RegistryEvent::Added(ids.clone()));
        }
        ids
    }

    /// Probe dimensions for every entry queued by [`FileRegistry::add`].
    ///
    /// Probe failures leave `dimensions` absent and are otherwise ignored.
    /// Entries removed since they were queued are skipped. Returns the number
    /// of entries that received dimensions.
    pub fn probe_pending(&self) -> usize {
        let pending = std::mem::take(&mut self.inner.borrow_mut().pending_probes);
        let mut probed = 0;
        for id in pending {
            let Some(bytes) = self.with_entry(id, |e| Arc::clone(&e.source.bytes)) else {
                continue;
            };
            let Some(dimensions) = probe_dimensions(&bytes) else {
                debug!(%id, "Could not probe dimensions");
                continue;
            };
            let applied = self
                .with_entry_mut(id, |e| e.dimensions = Some(dimensions))
                .is_some();
            if applied {
                probed += 1;
                self.notify(RegistryEvent::DimensionsProbed(id, dimensions));
            }
        }
        probed
    }

    /// Remove one entry, releasing its preview references.
    ///
    /// Unknown identifiers are ignored. Returns whether an entry was removed.
    pub fn remove(&self, id: FileId) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner.pending_probes.retain(|p| *p != id);
            inner
                .entries
                .iter()
                .position(|e| e.id == id)
                .map(|index| inner.entries.remove(index))
        };
        match removed {
            Some(entry) => {
                self.release_previews(&entry);
                debug!(%id, "Removed file");
                self.notify(RegistryEvent::Removed(id));
                true
            }
            None => false,
        }
    }

    /// Remove every entry. Returns the number removed.
    pub fn remove_all(&self) -> usize {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner.pending_probes.clear();
            std::mem::take(&mut inner.entries)
        };
        for entry in &removed {
            self.release_previews(entry);
        }
        debug!(count = removed.len(), "Cleared registry");
        self.notify(RegistryEvent::Cleared);
        removed.len()
    }

    /// Set `convert_to` on every entry.
    pub fn apply_format(&self, format: OutputFormat) {
        for entry in self.inner.borrow_mut().entries.iter_mut() {
            entry.convert_to = format;
        }
        self.notify(RegistryEvent::FormatApplied(format));
    }

    /// Apply a status transition.
    ///
    /// `InProgress` may be entered from any state and discards earlier result
    /// data. `Success` and `Failed` are only accepted from `InProgress`.
    /// Returns `false` if the entry is gone or the transition was refused.
    pub(crate) fn update_status(&self, id: FileId, update: StatusUpdate) -> bool {
        let outcome = self.with_entry_mut(id, |entry| {
            let mut released = None;
            match update {
                StatusUpdate::InProgress => {
                    if let FileStatus::Success(data) = std::mem::take(&mut entry.status) {
                        released = data.preview;
                    }
                    entry.status = FileStatus::InProgress;
                    entry.status_tooltip = None;
                }
                _ if !matches!(entry.status, FileStatus::InProgress) => {
                    return Err(entry.status.kind());
                }
                StatusUpdate::Success { bytes, tooltip } => {
                    let preview = self.previews.create(&bytes, entry.convert_to.mime_type());
                    entry.status = FileStatus::Success(SuccessData { bytes, preview });
                    entry.status_tooltip = Some(tooltip);
                }
                StatusUpdate::Failed { tooltip } => {
                    entry.status = FileStatus::Failed;
                    entry.status_tooltip = Some(tooltip);
                }
            }
            Ok((entry.status.kind(), released))
        });

        match outcome {
            Some(Ok((kind, released))) => {
                if let Some(preview) = released {
                    self.previews.release(&preview);
                }
                self.notify(RegistryEvent::StatusChanged(id, kind));
                true
            }
            Some(Err(current)) => {
                warn!(%id, ?current, "Refusing status change out of a non-running state");
                false
            }
            None => false,
        }
    }

    /// Snapshot of one entry.
    pub fn get(&self, id: FileId) -> Option<FileEntry> {
        self.with_entry(id, FileEntry::clone)
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<FileEntry> {
        self.inner.borrow().entries.clone()
    }

    /// Identifiers of all entries in insertion order.
    pub fn ids(&self) -> Vec<FileId> {
        self.inner.borrow().entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Register an observer called after each change.
    pub fn subscribe(&self, observer: impl Fn(&RegistryEvent) + 'static) -> u64 {
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

    fn with_entry<R>(&self, id: FileId, f: impl FnOnce(&FileEntry) -> R) -> Option<R> {
        self.inner.borrow().entries.iter().find(|e| e.id == id).map(f)
    }

    fn with_entry_mut<R>(&self, id: FileId, f: impl FnOnce(&mut FileEntry) -> R) -> Option<R> {
        self.inner
            .borrow_mut()
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .map(f)
    }

    fn release_previews(&self, entry: &FileEntry) {
        if let Some(preview) = &entry.source_preview {
            self.previews.release(preview);
        }
        if let Some(SuccessData {
            preview: Some(preview),
            ..
        }) = entry.success_data()
        {
            self.previews.release(preview);
        }
    }

    fn notify(&self, event: RegistryEvent) {
        let observers: Vec<RegistryObserver> = self
            .inner
            .borrow()
            .observers
            .iter()
            .map(|(_, o)| Rc::clone(o))
            .collect();
        for observer in observers {
            observer(&event);
        }
    }
}

impl std::fmt::Debug for FileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::encode_image;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])));
        encode_image(&img, OutputFormat::Png, None).unwrap()
    }

    fn registry_with_store() -> (FileRegistry, Rc<MemoryPreviewStore>) {
        let store = Rc::new(MemoryPreviewStore::new());
        (FileRegistry::new(store.clone()), store)
    }

    fn source(name: &str) -> SourceFile {
        SourceFile::new(name, "image/png", png(4, 2))
    }

    #[test]
    fn test_add_appends_in_order() {
        let registry = FileRegistry::default();
        let first = registry.add(vec![source("a.png"), source("b.png")], OutputFormat::Webp);
        let second = registry.add(vec![source("c.png")], OutputFormat::Jpg);

        let entries = registry.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(registry.ids(), [first[0], first[1], second[0]]);
        assert_eq!(entries[0].source.name, "a.png");
        assert_eq!(entries[2].convert_to, OutputFormat::Jpg);
        assert!(entries.iter().all(|e| e.status_kind() == StatusKind::NotStarted));
        assert!(entries.iter().all(|e| e.source_preview.is_some()));
    }

    #[test]
    fn test_add_empty_is_noop() {
        let registry = FileRegistry::default();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        registry.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        assert!(registry.add(Vec::new(), OutputFormat::Webp).is_empty());
        assert!(registry.is_empty());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_probe_pending_sets_dimensions() {
        let registry = FileRegistry::default();
        let ids = registry.add(
            vec![
                SourceFile::new("ok.png", "image/png", png(7, 3)),
                SourceFile::new("bad.png", "image/png", b"garbage".to_vec()),
            ],
            OutputFormat::Webp,
        );
        assert_eq!(registry.probe_pending(), 1);
        assert_eq!(registry.get(ids[0]).unwrap().dimensions, Some(Dimensions::new(7, 3)));
        assert_eq!(registry.get(ids[1]).unwrap().dimensions, None);
        // The queue is drained
        assert_eq!(registry.probe_pending(), 0);
    }

    #[test]
    fn test_probe_skips_removed_entries() {
        let registry = FileRegistry::default();
        let ids = registry.add(vec![source("a.png")], OutputFormat::Webp);
        registry.remove(ids[0]);
        assert_eq!(registry.probe_pending(), 0);
    }

    #[test]
    fn test_remove_releases_source_and_result_previews() {
        let (registry, store) = registry_with_store();
        let ids = registry.add(vec![source("a.png"), source("b.png")], OutputFormat::Png);
        assert_eq!(store.live_count(), 2);

        assert!(registry.update_status(ids[0], StatusUpdate::InProgress));
        assert!(registry.update_status(
            ids[0],
            StatusUpdate::Success {
                bytes: Arc::from(png(2, 1)),
                tooltip: "done".to_string(),
            }
        ));
        assert_eq!(store.live_count(), 3);

        assert!(registry.remove(ids[0]));
        assert_eq!(store.live_count(), 1);
        assert_eq!(store.release_count(), 2);
        assert_eq!(registry.ids(), [ids[1]]);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let (registry, store) = registry_with_store();
        registry.add(vec![source("a.png")], OutputFormat::Png);
        assert!(!registry.remove(FileId::from_raw(u32::MAX)));
        assert_eq!(registry.len(), 1);
        assert_eq!(store.release_count(), 0);
    }

    #[test]
    fn test_remove_all_releases_everything() {
        let (registry, store) = registry_with_store();
        registry.add(vec![source("a.png"), source("b.png"), source("c.png")], OutputFormat::Png);
        assert_eq!(registry.remove_all(), 3);
        assert!(registry.is_empty());
        assert_eq!(store.live_count(), 0);
        assert_eq!(store.release_count(), 3);
    }

    #[test]
    fn test_repeated_remove_releases_once() {
        let (registry, store) = registry_with_store();
        let ids = registry.add(vec![source("a.png"), source("b.png")], OutputFormat::Png);

        assert!(registry.remove(ids[0]));
        assert!(!registry.remove(ids[0]));
        assert_eq!(store.release_calls(), 1);
        assert_eq!(store.release_count(), 1);
        assert_eq!(registry.ids(), [ids[1]]);
    }

    #[test]
    fn test_remove_all_twice() {
        let (registry, store) = registry_with_store();
        let ids = registry.add(vec![source("a.png"), source("b.png")], OutputFormat::Png);
        assert!(registry.update_status(ids[0], StatusUpdate::InProgress));
        assert!(registry.update_status(
            ids[0],
            StatusUpdate::Success {
                bytes: Arc::from(png(2, 1)),
                tooltip: "done".to_string(),
            }
        ));

        assert_eq!(registry.remove_all(), 2);
        assert!(registry.is_empty());
        assert_eq!(store.release_calls(), 3);

        assert_eq!(registry.remove_all(), 0);
        assert!(registry.is_empty());
        assert_eq!(store.release_calls(), 3);
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_success_requires_in_progress() {
        let registry = FileRegistry::default();
        let id = registry.add(vec![source("a.png")], OutputFormat::Png)[0];
        let refused = registry.update_status(
            id,
            StatusUpdate::Failed {
                tooltip: "nope".to_string(),
            },
        );
        assert!(!refused);
        assert_eq!(registry.get(id).unwrap().status_kind(), StatusKind::NotStarted);
    }

    #[test]
    fn test_restart_discards_previous_result() {
        let (registry, store) = registry_with_store();
        let id = registry.add(vec![source("a.png")], OutputFormat::Png)[0];
        registry.update_status(id, StatusUpdate::InProgress);
        registry.update_status(
            id,
            StatusUpdate::Success {
                bytes: Arc::from(vec![1u8]),
                tooltip: "done".to_string(),
            },
        );
        assert!(registry.get(id).unwrap().success_data().is_some());

        registry.update_status(id, StatusUpdate::InProgress);
        let entry = registry.get(id).unwrap();
        assert!(entry.success_data().is_none());
        assert_eq!(entry.status_tooltip, None);
        assert_eq!(store.live_count(), 1);
    }

    #[test]
    fn test_apply_format() {
        let registry = FileRegistry::default();
        registry.add(vec![source("a.png")], OutputFormat::Png);
        registry.add(vec![source("b.png")], OutputFormat::Gif);
        registry.apply_format(OutputFormat::Jpg);
        assert!(registry.entries().iter().all(|e| e.convert_to == OutputFormat::Jpg));
    }

    #[test]
    fn test_observers_see_events_and_can_read_back() {
        let registry = FileRegistry::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let reader = registry.clone();
        let sub = registry.subscribe(move |event| {
            sink.borrow_mut().push((event.clone(), reader.len()));
        });

        let ids = registry.add(vec![source("a.png")], OutputFormat::Png);
        registry.remove(ids[0]);
        registry.unsubscribe(sub);
        registry.add(vec![source("b.png")], OutputFormat::Png);

        let seen = seen.borrow();
        assert_eq!(
            *seen,
            vec![
                (RegistryEvent::Added(ids.clone()), 1),
                (RegistryEvent::Removed(ids[0]), 0),
            ]
        );
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashSet;

        proptest! {
            #[test]
            fn prop_ids_unique_and_order_preserved(
                batches in prop::collection::vec(0usize..5, 1..6),
                removals in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
            ) {
                let registry = FileRegistry::default();
                let mut expected = Vec::new();
                for (b, count) in batches.iter().enumerate() {
                    let files = (0..*count).map(|i| SourceFile::new(
                        format!("{}-{}.png", b, i),
                        "image/png",
                        vec![0u8],
                    ));
                    expected.extend(registry.add(files, OutputFormat::Png));
                }
                for index in removals {
                    if expected.is_empty() {
                        break;
                    }
                    let id = expected.remove(index.index(expected.len()));
                    prop_assert!(registry.remove(id));
                }

                let ids = registry.ids();
                let unique: HashSet<_> = ids.iter().collect();
                prop_assert_eq!(unique.len(), ids.len());
                prop_assert_eq!(ids, expected);
            }
        }
    }
}
