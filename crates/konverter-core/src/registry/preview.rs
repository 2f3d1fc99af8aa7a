//! Locally resolvable byte references for previews and results.
//!
//! In the browser a preview reference is an object URL that pins a blob in
//! memory until it is revoked. The registry creates one per added source and
//! one per successful result, and releases each exactly once when its entry is
//! removed or its result replaced.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// An opaque, locally resolvable reference to a byte buffer (e.g. an object URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PreviewRef(String);

impl PreviewRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates and releases preview references.
pub trait PreviewStore {
    /// Create a reference for `bytes`. Returns `None` if the platform refused.
    fn create(&self, bytes: &Arc<[u8]>, mime_type: &str) -> Option<PreviewRef>;

    /// Release a reference previously returned by [`PreviewStore::create`].
    fn release(&self, preview: &PreviewRef);
}

/// In-memory preview store, for native hosts and tests.
///
/// References look like `memory://preview/<n>` and resolve back to the shared
/// buffer until released.
#[derive(Debug, Default)]
pub struct MemoryPreviewStore {
    buffers: RefCell<HashMap<PreviewRef, Arc<[u8]>>>,
    next: Cell<u64>,
    released: Cell<usize>,
    release_calls: Cell<usize>,
}

impl MemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the bytes behind a live reference.
    pub fn resolve(&self, preview: &PreviewRef) -> Option<Arc<[u8]>> {
        self.buffers.borrow().get(preview).cloned()
    }

    /// Number of references created and not yet released.
    pub fn live_count(&self) -> usize {
        self.buffers.borrow().len()
    }

    /// Number of successful release calls so far.
    pub fn release_count(&self) -> usize {
        self.released.get()
    }

    /// Number of release calls so far, including ones for unknown references.
    pub fn release_calls(&self) -> usize {
        self.release_calls.get()
    }
}

impl PreviewStore for MemoryPreviewStore {
    fn create(&self, bytes: &Arc<[u8]>, _mime_type: &str) -> Option<PreviewRef> {
        let n = self.next.get();
        self.next.set(n + 1);
        let preview = PreviewRef::new(format!("memory://preview/{}", n));
        self.buffers
            .borrow_mut()
            .insert(preview.clone(), Arc::clone(bytes));
        Some(preview)
    }

    fn release(&self, preview: &PreviewRef) {
        self.release_calls.set(self.release_calls.get() + 1);
        if self.buffers.borrow_mut().remove(preview).is_some() {
            self.released.set(self.released.get() + 1);
        }
    }
}
