//! UI Marshal
//!
//! The resource tree has a single owner: the interactive thread. Background
//! work never touches the tree directly; it hands closures to a `UiMarshal`,
//! which runs each one exactly once on the owning thread and resolves when it
//! has finished. `UiThread` is the channel-backed owner used by the CLI and
//! the tests; an embedding UI toolkit provides its own implementation.

use crate::error::BrowserError;
use crate::tree::resource_tree::ResourceTree;
use async_trait::async_trait;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

/// Closure executed on the tree-owning thread
pub type UiJob = Box<dyn FnOnce(&mut ResourceTree) + Send + 'static>;

/// Receiver of batch visual-update notifications
///
/// Every mutation of the tree happens between one `begin_update` and one
/// `end_update`, so a renderer never observes a half-applied batch.
pub trait RenderSink: Send + Sync {
    fn begin_update(&self);
    fn end_update(&self);
}

/// Render sink that ignores notifications
#[derive(Debug, Default)]
pub struct NullRenderSink;

impl RenderSink for NullRenderSink {
    fn begin_update(&self) {}
    fn end_update(&self) {}
}

/// Render sink that logs each bracket at trace level
#[derive(Debug, Default)]
pub struct TracingRenderSink;

impl RenderSink for TracingRenderSink {
    fn begin_update(&self) {
        trace!("begin tree update");
    }

    fn end_update(&self) {
        trace!("end tree update");
    }
}

/// Render sink that counts brackets and tracks nesting
#[derive(Debug, Default)]
pub struct CountingRenderSink {
    begins: AtomicUsize,
    ends: AtomicUsize,
    depth: AtomicUsize,
    max_depth: AtomicUsize,
}

impl CountingRenderSink {
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }

    /// Deepest bracket nesting observed (1 when batches never overlap)
    pub fn max_depth(&self) -> usize {
        self.max_depth.load(Ordering::SeqCst)
    }
}

impl RenderSink for CountingRenderSink {
    fn begin_update(&self) {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_depth.fetch_max(depth, Ordering::SeqCst);
    }

    fn end_update(&self) {
        self.ends.fetch_add(1, Ordering::SeqCst);
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Capability to run a closure on the tree's owning thread
#[async_trait]
pub trait UiMarshal: Send + Sync {
    /// Run `job` exactly once on the owning thread and wait for it to finish
    ///
    /// The owning thread stays usable even if `job` panics; the panic is
    /// reported as `BrowserError::MarshalPanicked`.
    async fn execute(&self, job: UiJob) -> Result<(), BrowserError>;
}

/// Run a read-only closure on the owning thread and return its result
pub async fn invoke<M, F, R>(marshal: &M, f: F) -> Result<R, BrowserError>
where
    M: UiMarshal + ?Sized,
    F: FnOnce(&mut ResourceTree) -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    marshal
        .execute(Box::new(move |tree| {
            let _ = tx.send(f(tree));
        }))
        .await?;
    rx.await.map_err(|_| BrowserError::MarshalClosed)
}

/// Run a mutating closure on the owning thread inside one update bracket
pub async fn update<M, F, R>(marshal: &M, f: F) -> Result<R, BrowserError>
where
    M: UiMarshal + ?Sized,
    F: FnOnce(&mut ResourceTree) -> R + Send + 'static,
    R: Send + 'static,
{
    invoke(marshal, move |tree| tree.batch(f)).await
}

struct UiRequest {
    job: UiJob,
    done: oneshot::Sender<Result<(), BrowserError>>,
}

/// Dedicated thread that owns a `ResourceTree` and runs marshalled jobs in order
pub struct UiThread {
    sender: Option<mpsc::Sender<UiRequest>>,
    handle: Option<JoinHandle<ResourceTree>>,
}

impl UiThread {
    /// Move `tree` onto a new owner thread
    pub fn spawn(tree: ResourceTree) -> Result<Self, BrowserError> {
        let (sender, receiver) = mpsc::channel::<UiRequest>();
        let handle = std::thread::Builder::new()
            .name("restree-ui".to_string())
            .spawn(move || run_owner_loop(tree, receiver))
            .map_err(|e| BrowserError::UiThread(e.to_string()))?;
        debug!("UI owner thread started");
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Stop the owner thread after queued jobs ran and hand the tree back
    pub fn shutdown(mut self) -> Result<ResourceTree, BrowserError> {
        self.sender.take();
        let handle = self.handle.take().ok_or(BrowserError::MarshalClosed)?;
        handle
            .join()
            .map_err(|payload| BrowserError::MarshalPanicked(panic_message(payload.as_ref())))
    }
}

impl Drop for UiThread {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[async_trait]
impl UiMarshal for UiThread {
    async fn execute(&self, job: UiJob) -> Result<(), BrowserError> {
        let sender = self.sender.as_ref().ok_or(BrowserError::MarshalClosed)?;
        let (done, wait) = oneshot::channel();
        sender
            .send(UiRequest { job, done })
            .map_err(|_| BrowserError::MarshalClosed)?;
        wait.await.map_err(|_| BrowserError::MarshalClosed)?
    }
}

fn run_owner_loop(mut tree: ResourceTree, receiver: mpsc::Receiver<UiRequest>) -> ResourceTree {
    while let Ok(UiRequest { job, done }) = receiver.recv() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&mut tree)));
        let result = outcome.map_err(|payload| {
            let message = panic_message(payload.as_ref());
            error!(error = %message, "UI job panicked");
            BrowserError::MarshalPanicked(message)
        });
        let _ = done.send(result);
    }
    debug!("UI owner thread stopped");
    tree
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
