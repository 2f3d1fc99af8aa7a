//! The batch run state machine.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::cancel::CancellationToken;
use super::naming::{output_file_name, UniqueNames};
use super::progress::{BatchSummary, Progress};
use crate::archive::{ArchiveEntry, ArchivePackager, ArchiveSink};
use crate::bridge::{BridgeError, ConversionBridge};
use crate::clock::{elapsed_between, format_elapsed, Clock, SystemClock};
use crate::convert::ConvertRequest;
use crate::registry::{FileId, FileRegistry, FileStatus, StatusUpdate};
use crate::settings::{Settings, SettingsStore};

/// Tooltip for entries skipped after cancellation.
pub const CANCELLED_TOOLTIP: &str = "Konverteringen blev annulleret";
/// Tooltip for entries left behind by a run that ended abnormally.
pub const INTERRUPTED_TOOLTIP: &str = "Konverteringen blev afbrudt";

/// Reasons a run is refused before it starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("No files to convert")]
    EmptyRegistry,

    #[error("Conversion worker is not ready")]
    BridgeNotReady,

    #[error("A conversion run is already in progress")]
    AlreadyRunning,
}

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
}

type ProgressObserver = Rc<dyn Fn(Progress)>;

/// Drives conversion runs over the file registry.
///
/// A run converts every entry strictly one after another in registry order,
/// updates each entry's status as it goes, publishes `(completed, total)`
/// after every file, and finally bundles the successful outputs into one
/// archive. Per-file failures never abort the run.
pub struct BatchOrchestrator<B> {
    registry: FileRegistry,
    settings: SettingsStore,
    bridge: B,
    packager: ArchivePackager,
    sink: Rc<dyn ArchiveSink>,
    clock: Rc<dyn Clock>,
    state: Rc<Cell<RunState>>,
    progress: Cell<Progress>,
    observers: RefCell<Vec<ProgressObserver>>,
}

impl<B: ConversionBridge> BatchOrchestrator<B> {
    pub fn new(
        registry: FileRegistry,
        settings: SettingsStore,
        bridge: B,
        sink: Rc<dyn ArchiveSink>,
    ) -> Self {
        Self {
            registry,
            settings,
            bridge,
            packager: ArchivePackager::default(),
            sink,
            clock: Rc::new(SystemClock),
            state: Rc::new(Cell::new(RunState::Idle)),
            progress: Cell::new(Progress::default()),
            observers: RefCell::new(Vec::new()),
        }
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_packager(mut self, packager: ArchivePackager) -> Self {
        self.packager = packager;
        self
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Latest published progress.
    pub fn progress(&self) -> Progress {
        self.progress.get()
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Whether a run could start right now.
    pub fn can_run(&self) -> bool {
        self.state.get() != RunState::Running && !self.registry.is_empty() && self.bridge.is_ready()
    }

    /// Register an observer for progress updates.
    pub fn on_progress(&self, observer: impl Fn(Progress) + 'static) {
        self.observers.borrow_mut().push(Rc::new(observer));
    }

    /// Convert every entry in the registry.
    ///
    /// The settings are snapshotted once at the start; their format is applied
    /// to every entry so conversion and naming agree. Between files the
    /// `cancel` token is checked; once set, the remaining entries are marked
    /// failed and the run winds down normally.
    ///
    /// # Errors
    ///
    /// Returns `BatchError` only when the run is refused up front. Everything
    /// that goes wrong afterwards is reported per entry and in the summary.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<BatchSummary, BatchError> {
        if self.state.get() == RunState::Running {
            return Err(BatchError::AlreadyRunning);
        }
        if self.registry.is_empty() {
            return Err(BatchError::EmptyRegistry);
        }
        if !self.bridge.is_ready() {
            return Err(BatchError::BridgeNotReady);
        }

        let settings = self.settings.snapshot();
        let ids = self.registry.ids();
        let total = ids.len();
        info!(total, format = %settings.format, ?settings, "Starting conversion run");

        self.state.set(RunState::Running);
        let _guard = RunGuard {
            registry: self.registry.clone(),
            ids: ids.clone(),
            state: Rc::clone(&self.state),
        };

        self.registry.apply_format(settings.format);
        for id in &ids {
            self.registry.update_status(*id, StatusUpdate::InProgress);
        }
        self.publish(Progress::new(0, total));

        let mut names = UniqueNames::new();
        let mut outputs = Vec::new();
        let mut failed = 0;
        let mut cancelled = false;

        for (index, id) in ids.iter().copied().enumerate() {
            if !cancelled && cancel.is_cancelled() {
                info!(remaining = total - index, "Conversion run cancelled");
                cancelled = true;
            }

            if cancelled {
                self.registry.update_status(
                    id,
                    StatusUpdate::Failed {
                        tooltip: CANCELLED_TOOLTIP.to_string(),
                    },
                );
                failed += 1;
            } else {
                match self.convert_one(id, &settings, &mut names).await {
                    Some(entry) => outputs.push(entry),
                    None => failed += 1,
                }
            }

            self.publish(Progress::new(index + 1, total));
        }

        let archive_name = if outputs.is_empty() {
            None
        } else {
            self.deliver(&outputs)
        };

        self.state.set(RunState::Completed);
        let summary = BatchSummary {
            succeeded: outputs.len(),
            failed,
            total,
            cancelled,
            archive_name,
        };
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            total,
            "Conversion run finished"
        );
        Ok(summary)
    }

    /// Convert one entry and record the outcome. Returns the archive member on success.
    async fn convert_one(
        &self,
        id: FileId,
        settings: &Settings,
        names: &mut UniqueNames,
    ) -> Option<ArchiveEntry> {
        let Some(entry) = self.registry.get(id) else {
            warn!(%id, "Entry removed during run");
            return None;
        };

        let request = ConvertRequest {
            content: Arc::clone(&entry.source.bytes),
            options: settings.convert_options(entry.convert_to),
        };

        let started = self.clock.now_ms();
        let result = match self.bridge.convert(request).await {
            Ok(bytes) if bytes.is_empty() => Err(BridgeError::NoData),
            other => other,
        };
        let elapsed = elapsed_between(started, self.clock.now_ms());

        match result {
            Ok(bytes) => {
                let bytes: Arc<[u8]> = Arc::from(bytes);
                let name = names.claim(output_file_name(
                    &entry.source.name,
                    entry.convert_to,
                    settings.scale,
                    settings.quality,
                ));
                debug!(%id, %name, size = bytes.len(), ?elapsed, "Converted file");
                self.registry.update_status(
                    id,
                    StatusUpdate::Success {
                        bytes: Arc::clone(&bytes),
                        tooltip: format!("Færdig på {}", format_elapsed(elapsed)),
                    },
                );
                Some(ArchiveEntry { name, bytes })
            }
            Err(e) => {
                warn!(%id, name = %entry.source.name, error = %e, "Conversion failed");
                self.registry.update_status(
                    id,
                    StatusUpdate::Failed {
                        tooltip: format!("Konvertering fejlede: {}", e),
                    },
                );
                None
            }
        }
    }

    /// Package and hand off the outputs. Failures are logged, never propagated.
    fn deliver(&self, outputs: &[ArchiveEntry]) -> Option<String> {
        let archive = match self.packager.pack(outputs, self.clock.now_ms()) {
            Ok(archive) => archive,
            Err(e) => {
                error!(error = %e, "Failed to package archive");
                return None;
            }
        };
        match self.sink.deliver(&archive) {
            Ok(()) => Some(archive.file_name),
            Err(e) => {
                error!(error = %e, file_name = %archive.file_name, "Failed to deliver archive");
                None
            }
        }
    }

    fn publish(&self, progress: Progress) {
        self.progress.set(progress);
        let observers: Vec<ProgressObserver> = self.observers.borrow().iter().cloned().collect();
        for observer in observers {
            observer(progress);
        }
    }
}

/// Resolves any entry of the run still `InProgress` when the run ends,
/// including when the run future is dropped mid-flight or unwinds.
struct RunGuard {
    registry: FileRegistry,
    ids: Vec<FileId>,
    state: Rc<Cell<RunState>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut stuck = 0;
        for id in &self.ids {
            let in_progress = self
                .registry
                .get(*id)
                .is_some_and(|e| matches!(e.status, FileStatus::InProgress));
            if in_progress {
                self.registry.update_status(
                    *id,
                    StatusUpdate::Failed {
                        tooltip: INTERRUPTED_TOOLTIP.to_string(),
                    },
                );
                stuck += 1;
            }
        }
        if stuck > 0 {
            warn!(stuck, "Conversion run ended abnormally");
        }
        if self.state.get() == RunState::Running {
            self.state.set(RunState::Completed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{Archive, ArchiveError};
    use crate::format::OutputFormat;
    use crate::registry::{SourceFile, StatusKind};
    use crate::settings::ScaleMode;
    use futures::executor::block_on;
    use std::future::Future;
    use std::task::Poll;

    /// Clock that advances 5ms per reading.
    #[derive(Default)]
    struct TickClock(Cell<f64>);

    impl Clock for TickClock {
        fn now_ms(&self) -> f64 {
            let now = self.0.get() + 5.0;
            self.0.set(now);
            now
        }
    }

    /// Bridge stub that echoes the request, optionally failing on given calls.
    #[derive(Default)]
    struct StubBridge {
        not_ready: bool,
        fail_on: Vec<usize>,
        empty_on: Vec<usize>,
        calls: Cell<usize>,
        in_flight: Cell<usize>,
        max_in_flight: Cell<usize>,
        spans: RefCell<Vec<(u32, u32)>>,
        tick: Cell<u32>,
    }

    impl StubBridge {
        fn next_tick(&self) -> u32 {
            let t = self.tick.get() + 1;
            self.tick.set(t);
            t
        }
    }

    fn yield_once() -> impl Future<Output = ()> {
        let mut yielded = false;
        futures::future::poll_fn(move |cx| {
            if yielded {
                Poll::Ready(())
            } else {
                yielded = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
    }

    impl ConversionBridge for StubBridge {
        fn is_ready(&self) -> bool {
            !self.not_ready
        }

        fn convert(&self, request: ConvertRequest) -> impl Future<Output = Result<Vec<u8>, BridgeError>> {
            async move {
                let call = self.calls.get();
                self.calls.set(call + 1);
                self.in_flight.set(self.in_flight.get() + 1);
                self.max_in_flight
                    .set(self.max_in_flight.get().max(self.in_flight.get()));
                let start = self.next_tick();

                yield_once().await;

                let end = self.next_tick();
                self.spans.borrow_mut().push((start, end));
                self.in_flight.set(self.in_flight.get() - 1);

                if self.fail_on.contains(&call) {
                    return Err(BridgeError::Worker(format!("stub failure {}", call)));
                }
                if self.empty_on.contains(&call) {
                    return Ok(Vec::new());
                }
                let mut out = request.options.convert_to.extension().as_bytes().to_vec();
                out.extend_from_slice(&request.content);
                Ok(out)
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: RefCell<Vec<Archive>>,
        fail: bool,
    }

    impl ArchiveSink for RecordingSink {
        fn deliver(&self, archive: &Archive) -> Result<(), ArchiveError> {
            if self.fail {
                return Err(ArchiveError::Delivery("blocked".to_string()));
            }
            self.delivered.borrow_mut().push(archive.clone());
            Ok(())
        }
    }

    struct Fixture {
        registry: FileRegistry,
        settings: SettingsStore,
        sink: Rc<RecordingSink>,
        orchestrator: BatchOrchestrator<StubBridge>,
    }

    fn fixture(files: &[&str], bridge: StubBridge, settings: Settings) -> Fixture {
        fixture_with_sink(files, bridge, settings, RecordingSink::default())
    }

    fn fixture_with_sink(
        files: &[&str],
        bridge: StubBridge,
        settings: Settings,
        sink: RecordingSink,
    ) -> Fixture {
        let registry = FileRegistry::default();
        let settings = SettingsStore::new(settings);
        registry.add(
            files
                .iter()
                .map(|name| SourceFile::new(*name, "image/png", name.as_bytes().to_vec())),
            settings.format(),
        );
        let sink = Rc::new(sink);
        let orchestrator =
            BatchOrchestrator::new(registry.clone(), settings.clone(), bridge, sink.clone())
                .with_clock(Rc::new(TickClock::default()));
        Fixture {
            registry,
            settings,
            sink,
            orchestrator,
        }
    }

    fn archive_names(archive: &Archive) -> Vec<String> {
        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive.bytes.clone())).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn settings(quality: u8, scale: u32) -> Settings {
        Settings {
            quality,
            scale,
            ..Settings::default()
        }
    }

    #[test]
    fn test_all_succeed() {
        let f = fixture(&["a.png", "b.jpg", "c.gif"], StubBridge::default(), settings(80, 50));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        f.orchestrator.on_progress(move |p| sink.borrow_mut().push(p));

        let summary = block_on(f.orchestrator.run(&CancellationToken::new())).unwrap();

        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 0);
        assert!(summary.all_succeeded());
        assert!(f
            .registry
            .entries()
            .iter()
            .all(|e| e.status_kind() == StatusKind::Success));
        assert_eq!(f.orchestrator.progress(), Progress::new(3, 3));
        assert_eq!(f.orchestrator.state(), RunState::Completed);

        let progress: Vec<usize> = seen.borrow().iter().map(|p| p.completed).collect();
        assert_eq!(progress, [0, 1, 2, 3]);

        let delivered = f.sink.delivered.borrow();
        assert_eq!(delivered.len(), 1);
        assert_eq!(summary.archive_name.as_deref(), Some(delivered[0].file_name.as_str()));
        assert_eq!(
            archive_names(&delivered[0]),
            ["a_s50_q80.webp", "b_s50_q80.webp", "c_s50_q80.webp"]
        );
    }

    #[test]
    fn test_failure_at_k_continues() {
        let bridge = StubBridge {
            fail_on: vec![1],
            ..StubBridge::default()
        };
        let f = fixture(&["a.png", "b.png", "c.png"], bridge, settings(100, 100));

        let summary = block_on(f.orchestrator.run(&CancellationToken::new())).unwrap();

        let entries = f.registry.entries();
        assert_eq!(entries[0].status_kind(), StatusKind::Success);
        assert_eq!(entries[1].status_kind(), StatusKind::Failed);
        assert_eq!(entries[2].status_kind(), StatusKind::Success);
        assert!(entries[1]
            .status_tooltip
            .as_deref()
            .unwrap()
            .contains("stub failure 1"));
        assert_eq!((summary.succeeded, summary.failed, summary.total), (2, 1, 3));
        assert!(!summary.all_succeeded());

        let delivered = f.sink.delivered.borrow();
        assert_eq!(archive_names(&delivered[0]), ["a.webp", "c.webp"]);
    }

    #[test]
    fn test_empty_result_is_failure() {
        let bridge = StubBridge {
            empty_on: vec![0],
            ..StubBridge::default()
        };
        let f = fixture(&["a.png"], bridge, Settings::default());
        let summary = block_on(f.orchestrator.run(&CancellationToken::new())).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.archive_name, None);
        assert!(f.sink.delivered.borrow().is_empty());
        assert_eq!(f.orchestrator.state(), RunState::Completed);
    }

    #[test]
    fn test_calls_never_overlap() {
        let f = fixture(&["a.png", "b.png", "c.png"], StubBridge::default(), Settings::default());
        block_on(f.orchestrator.run(&CancellationToken::new())).unwrap();

        let bridge = f.orchestrator.bridge();
        assert_eq!(bridge.max_in_flight.get(), 1);
        let spans = bridge.spans.borrow();
        assert_eq!(spans.len(), 3);
        for pair in spans.windows(2) {
            assert!(pair[0].1 < pair[1].0, "calls overlap: {:?}", pair);
        }
    }

    #[test]
    fn test_success_tooltip_reports_elapsed() {
        let f = fixture(&["a.png"], StubBridge::default(), Settings::default());
        block_on(f.orchestrator.run(&CancellationToken::new())).unwrap();
        let entry = &f.registry.entries()[0];
        assert_eq!(entry.status_tooltip.as_deref(), Some("Færdig på 5ms"));
        assert!(entry.success_data().is_some());
    }

    #[test]
    fn test_max_width_run_keeps_scale_suffix_and_snapshot_format() {
        let mut s = settings(60, 50);
        s.scale_mode = ScaleMode::MaxWidth;
        s.format = OutputFormat::Png;
        let f = fixture(&["a.heic"], StubBridge::default(), s);
        // Entry captured WEBP at add time; the run re-applies the snapshot format
        f.registry.apply_format(OutputFormat::Webp);

        block_on(f.orchestrator.run(&CancellationToken::new())).unwrap();

        let entry = &f.registry.entries()[0];
        assert_eq!(entry.convert_to, OutputFormat::Png);
        assert_eq!(&entry.success_data().unwrap().bytes[..3], b"png");
        let delivered = f.sink.delivered.borrow();
        assert_eq!(archive_names(&delivered[0]), ["a_s50_q60.png"]);
    }

    #[test]
    fn test_duplicate_names_are_deduplicated() {
        let f = fixture(&["a.png", "a.jpg"], StubBridge::default(), settings(100, 100));
        block_on(f.orchestrator.run(&CancellationToken::new())).unwrap();
        let delivered = f.sink.delivered.borrow();
        assert_eq!(archive_names(&delivered[0]), ["a.webp", "a_2.webp"]);
    }

    #[test]
    fn test_refuses_empty_registry() {
        let f = fixture(&[], StubBridge::default(), Settings::default());
        assert!(!f.orchestrator.can_run());
        let result = block_on(f.orchestrator.run(&CancellationToken::new()));
        assert_eq!(result, Err(BatchError::EmptyRegistry));
        assert_eq!(f.orchestrator.state(), RunState::Idle);
    }

    #[test]
    fn test_refuses_when_bridge_not_ready() {
        let bridge = StubBridge {
            not_ready: true,
            ..StubBridge::default()
        };
        let f = fixture(&["a.png"], bridge, Settings::default());
        let result = block_on(f.orchestrator.run(&CancellationToken::new()));
        assert_eq!(result, Err(BatchError::BridgeNotReady));
        assert_eq!(f.registry.entries()[0].status_kind(), StatusKind::NotStarted);
    }

    #[test]
    fn test_cancellation_between_files() {
        let f = fixture(&["a.png", "b.png", "c.png"], StubBridge::default(), Settings::default());
        let token = CancellationToken::new();
        let trigger = token.clone();
        f.orchestrator.on_progress(move |p| {
            if p.completed == 1 {
                trigger.cancel();
            }
        });

        let summary = block_on(f.orchestrator.run(&token)).unwrap();

        assert!(summary.cancelled);
        assert_eq!((summary.succeeded, summary.failed), (1, 2));
        assert_eq!(f.orchestrator.progress(), Progress::new(3, 3));
        assert_eq!(f.orchestrator.bridge().calls.get(), 1);
        let entries = f.registry.entries();
        assert_eq!(entries[1].status_tooltip.as_deref(), Some(CANCELLED_TOOLTIP));
        assert_eq!(archive_names(&f.sink.delivered.borrow()[0]).len(), 1);
    }

    #[test]
    fn test_dropped_run_resolves_stuck_entries() {
        let f = fixture(&["a.png", "b.png"], StubBridge::default(), Settings::default());
        let token = CancellationToken::new();
        {
            let mut run = Box::pin(f.orchestrator.run(&token));
            let waker = futures::task::noop_waker();
            let mut cx = std::task::Context::from_waker(&waker);
            // First poll parks inside the first conversion
            assert!(run.as_mut().poll(&mut cx).is_pending());
            assert!(f
                .registry
                .entries()
                .iter()
                .all(|e| e.status_kind() == StatusKind::InProgress));
        }

        let entries = f.registry.entries();
        assert!(entries.iter().all(|e| e.status_kind() == StatusKind::Failed));
        assert_eq!(entries[0].status_tooltip.as_deref(), Some(INTERRUPTED_TOOLTIP));
        assert_eq!(f.orchestrator.state(), RunState::Completed);
    }

    #[test]
    fn test_delivery_failure_keeps_successes() {
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let f = fixture_with_sink(&["a.png"], StubBridge::default(), Settings::default(), sink);
        let summary = block_on(f.orchestrator.run(&CancellationToken::new())).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.archive_name, None);
        assert_eq!(f.registry.entries()[0].status_kind(), StatusKind::Success);
    }

    #[test]
    fn test_rerun_restarts_entries() {
        let bridge = StubBridge {
            fail_on: vec![0],
            ..StubBridge::default()
        };
        let f = fixture(&["a.png"], bridge, Settings::default());
        block_on(f.orchestrator.run(&CancellationToken::new())).unwrap();
        assert_eq!(f.registry.entries()[0].status_kind(), StatusKind::Failed);

        f.settings.set_quality(40);
        let summary = block_on(f.orchestrator.run(&CancellationToken::new())).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(archive_names(&f.sink.delivered.borrow()[0]), ["a_q40.webp"]);
    }
}
