//! Native worker bridge: one dedicated thread owning one codec engine.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use tracing::{debug, error, info};

use super::{BridgeError, ConversionBridge};
use crate::convert::{CodecEngine, ConvertRequest};

type Reply = Result<Vec<u8>, BridgeError>;

struct Job {
    request: ConvertRequest,
    reply: oneshot::Sender<Reply>,
}

/// Bridge backed by a dedicated worker thread.
///
/// Requests are queued on a channel and handled in arrival order by the single
/// engine instance on the worker. Dropping the bridge closes the queue and
/// joins the thread.
pub struct WorkerBridge {
    jobs: Option<mpsc::Sender<Job>>,
    ready: Arc<AtomicBool>,
    initialized: Shared<oneshot::Receiver<()>>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerBridge {
    /// Start a worker with a default engine.
    pub fn spawn() -> Result<Self, BridgeError> {
        Self::spawn_with(CodecEngine::default)
    }

    /// Start a worker whose engine is built on the worker thread by `factory`.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Spawn` if the thread could not be created.
    pub fn spawn_with<F>(factory: F) -> Result<Self, BridgeError>
    where
        F: FnOnce() -> CodecEngine + Send + 'static,
    {
        let (jobs, queue) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let ready = Arc::new(AtomicBool::new(false));
        let worker_ready = Arc::clone(&ready);

        let handle = thread::Builder::new()
            .name("konverter-worker".to_string())
            .spawn(move || {
                let engine = factory();
                worker_ready.store(true, Ordering::Release);
                let _ = ready_tx.send(());
                info!("Conversion worker ready");

                for job in queue {
                    let reply = run_job(&engine, &job.request);
                    // The caller may have given up on this request
                    let _ = job.reply.send(reply);
                }
                debug!("Conversion worker stopped");
            })?;

        Ok(Self {
            jobs: Some(jobs),
            ready,
            initialized: ready_rx.shared(),
            handle: Some(handle),
        })
    }

    /// Resolves once the engine is constructed.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Disconnected` if the worker died during startup.
    pub fn initialized(&self) -> impl Future<Output = Result<(), BridgeError>> {
        self.initialized
            .clone()
            .map(|signal| signal.map_err(|_| BridgeError::Disconnected))
    }
}

fn run_job(engine: &CodecEngine, request: &ConvertRequest) -> Reply {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.convert(&request.content, &request.options)
    }));
    match outcome {
        Ok(Ok(bytes)) => {
            debug!(input = request.content.len(), output = bytes.len(), "Converted");
            Ok(bytes)
        }
        Ok(Err(e)) => Err(BridgeError::Conversion(e)),
        Err(_) => {
            error!("Codec engine panicked; worker continues");
            Err(BridgeError::WorkerPanicked)
        }
    }
}

impl ConversionBridge for WorkerBridge {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn convert(&self, request: ConvertRequest) -> impl Future<Output = Result<Vec<u8>, BridgeError>> {
        let (reply, response) = oneshot::channel();
        let sent = match &self.jobs {
            Some(jobs) => jobs.send(Job { request, reply }).is_ok(),
            None => false,
        };
        async move {
            if !sent {
                return Err(BridgeError::Disconnected);
            }
            response.await.map_err(|_| BridgeError::Disconnected)?
        }
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Conversion worker thread panicked");
            }
        }
    }
}
