//! Change Reconciler
//!
//! Applies filesystem notifications and mutation acknowledgements to the
//! resource tree. Every accepted event goes through one FIFO queue: while a
//! population run is active the queue only grows, and when the run finishes
//! it is drained in arrival order before the engine returns to idle. Outside
//! a run the submitting caller drains the queue itself, so live events are
//! applied synchronously unless someone else is already draining.
//!
//! Each event is resolved to the smallest affected subtree: the deepest
//! directory still present in the tree is re-listed, never the whole tree.

use crate::error::{BrowserError, ResourceError};
use crate::marshal::{invoke, update, UiMarshal};
use crate::population::{refresh_directory, RefreshOutcome};
use crate::service::ResourceService;
use crate::tree::path::{relative_components, VirtualPath};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

/// Kind of filesystem notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
    Renamed,
}

/// One native filesystem notification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsChange {
    pub kind: ChangeKind,
    /// Absolute native path (the new path for renames)
    pub path: PathBuf,
    /// Previous native path, set for renames
    pub old_path: Option<PathBuf>,
    /// Root directory of the watcher that reported the change
    pub watch_root: PathBuf,
}

/// A user mutation the resource service has completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationApplied {
    Copied { source: VirtualPath, dest: VirtualPath },
    Moved { source: VirtualPath, dest: VirtualPath },
    Deleted { path: VirtualPath },
    Renamed { from: VirtualPath, to: VirtualPath },
}

/// Deferred unit of reconciliation work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEvent {
    Filesystem(FsChange),
    Mutation(MutationApplied),
    /// Re-list one directory on behalf of the UI
    Refresh(VirtualPath),
}

/// What happened to a submitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The caller drained the queue; `applied` events ran, this one included
    Applied { applied: usize },
    /// A population run or another drainer will apply it
    Queued { pending: usize },
}

/// Engine activity as seen by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Populating,
    Draining,
}

struct Gate {
    phase: Phase,
    pending: VecDeque<PendingEvent>,
}

/// Applies change events to the tree in arrival order
pub struct ChangeReconciler {
    service: Arc<dyn ResourceService>,
    marshal: Arc<dyn UiMarshal>,
    gate: Mutex<Gate>,
    /// Signalled whenever the gate returns to `Idle`
    idle: Notify,
}

impl ChangeReconciler {
    pub fn new(service: Arc<dyn ResourceService>, marshal: Arc<dyn UiMarshal>) -> Self {
        Self {
            service,
            marshal,
            gate: Mutex::new(Gate {
                phase: Phase::Idle,
                pending: VecDeque::new(),
            }),
            idle: Notify::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.gate.lock().phase
    }

    pub fn is_populating(&self) -> bool {
        self.phase() == Phase::Populating
    }

    /// Number of events waiting to be applied
    pub fn pending_len(&self) -> usize {
        self.gate.lock().pending.len()
    }

    /// Created/changed/deleted notification from a watcher
    pub async fn on_changed(
        &self,
        kind: ChangeKind,
        path: PathBuf,
        watch_root: PathBuf,
    ) -> Disposition {
        self.submit(PendingEvent::Filesystem(FsChange {
            kind,
            path,
            old_path: None,
            watch_root,
        }))
        .await
    }

    /// Rename notification from a watcher
    pub async fn on_renamed(
        &self,
        path: PathBuf,
        old_path: PathBuf,
        watch_root: PathBuf,
    ) -> Disposition {
        self.submit(PendingEvent::Filesystem(FsChange {
            kind: ChangeKind::Renamed,
            path,
            old_path: Some(old_path),
            watch_root,
        }))
        .await
    }

    /// Acknowledgement of a completed copy/move/delete/rename
    pub async fn on_mutation_applied(&self, mutation: MutationApplied) -> Disposition {
        self.submit(PendingEvent::Mutation(mutation)).await
    }

    /// Accept an event into the queue and drain it if nobody else is busy
    pub async fn submit(&self, event: PendingEvent) -> Disposition {
        {
            let mut gate = self.gate.lock();
            gate.pending.push_back(event);
            if gate.phase != Phase::Idle {
                trace!(phase = ?gate.phase, pending = gate.pending.len(), "Event queued");
                return Disposition::Queued {
                    pending: gate.pending.len(),
                };
            }
            gate.phase = Phase::Draining;
        }
        let applied = self.drain().await;
        Disposition::Applied { applied }
    }

    /// Enter the populating phase
    ///
    /// Waits for an active queue drain to finish. Fails if another
    /// population run is active.
    pub(crate) async fn begin_population(&self) -> Result<PopulationRun<'_>, BrowserError> {
        loop {
            let mut idle = pin!(self.idle.notified());
            idle.as_mut().enable();
            {
                let mut gate = self.gate.lock();
                match gate.phase {
                    Phase::Idle => {
                        gate.phase = Phase::Populating;
                        return Ok(PopulationRun {
                            reconciler: self,
                            armed: true,
                        });
                    }
                    Phase::Populating => return Err(BrowserError::AlreadyPopulating),
                    Phase::Draining => {
                        trace!(pending = gate.pending.len(), "Population waiting for drain");
                    }
                }
            }
            idle.await;
        }
    }

    /// Leave the populating phase, applying everything queued meanwhile
    pub(crate) async fn finish_population(&self, mut run: PopulationRun<'_>) -> usize {
        run.armed = false;
        {
            let mut gate = self.gate.lock();
            gate.phase = Phase::Draining;
            if !gate.pending.is_empty() {
                info!(pending = gate.pending.len(), "Draining events queued during population");
            }
        }
        self.drain().await
    }

    /// Apply queued events until the queue is empty, then go idle
    ///
    /// Must only be entered by the caller that moved the phase to `Draining`.
    async fn drain(&self) -> usize {
        let mut guard = DrainGuard {
            reconciler: self,
            armed: true,
        };
        let mut applied = 0;
        loop {
            let next = {
                let mut gate = self.gate.lock();
                match gate.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        gate.phase = Phase::Idle;
                        self.idle.notify_waiters();
                        break;
                    }
                }
            };
            if let Err(payload) = AssertUnwindSafe(self.apply(&next)).catch_unwind().await {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                warn!(event = ?next, error = %message, "Reconciliation step panicked; skipping event");
            }
            applied += 1;
        }
        guard.armed = false;
        applied
    }

    /// Apply one event; failures are logged and swallowed
    async fn apply(&self, event: &PendingEvent) {
        let result = match event {
            PendingEvent::Filesystem(change) => self.apply_fs_change(change).await,
            PendingEvent::Mutation(mutation) => self.apply_mutation(mutation).await,
            PendingEvent::Refresh(path) => self.refresh(path).await,
        };
        if let Err(e) = result {
            warn!(event = ?event, error = %e, "Failed to apply change event");
        }
    }

    async fn apply_fs_change(&self, change: &FsChange) -> Result<(), BrowserError> {
        let Some(target) = to_virtual(&change.path, &change.watch_root) else {
            debug!(path = %change.path.display(), "Change outside watch root ignored");
            return Ok(());
        };
        debug!(kind = ?change.kind, path = %target, "Applying filesystem change");

        match change.kind {
            ChangeKind::Created | ChangeKind::Changed => self.refresh_nearest(&target).await,
            ChangeKind::Deleted => {
                self.remove_node(&target).await?;
                self.refresh_nearest(&target.parent()).await
            }
            ChangeKind::Renamed => {
                let old = change
                    .old_path
                    .as_deref()
                    .and_then(|old| to_virtual(old, &change.watch_root));
                if let Some(old) = old {
                    self.remove_node(&old).await?;
                    if old.parent() != target.parent() {
                        self.refresh_nearest(&old.parent()).await?;
                    }
                }
                self.refresh_nearest(&target).await
            }
        }
    }

    async fn apply_mutation(&self, mutation: &MutationApplied) -> Result<(), BrowserError> {
        debug!(mutation = ?mutation, "Applying mutation acknowledgement");
        match mutation {
            MutationApplied::Copied { dest, .. } => self.refresh_nearest(dest).await,
            MutationApplied::Moved { source, dest }
            | MutationApplied::Renamed {
                from: source,
                to: dest,
            } => {
                self.remove_node(source).await?;
                self.refresh_nearest(&source.parent()).await?;
                self.refresh_nearest(dest).await
            }
            MutationApplied::Deleted { path } => {
                self.remove_node(path).await?;
                self.refresh_nearest(&path.parent()).await
            }
        }
    }

    async fn remove_node(&self, path: &VirtualPath) -> Result<(), BrowserError> {
        let target = path.clone();
        let removed = update(self.marshal.as_ref(), move |tree| tree.remove(&target)).await?;
        if !removed {
            debug!(path = %path, "Stale path, nothing to remove");
        }
        Ok(())
    }

    /// Re-list the deepest directory present in the tree along `path`
    async fn refresh_nearest(&self, path: &VirtualPath) -> Result<(), BrowserError> {
        let target = path.clone();
        let directory = invoke(self.marshal.as_ref(), move |tree| {
            tree.nearest_directory(&target)
        })
        .await?;
        self.refresh(&directory).await
    }

    async fn refresh(&self, directory: &VirtualPath) -> Result<(), BrowserError> {
        let outcome =
            refresh_directory(self.service.as_ref(), self.marshal.as_ref(), directory).await?;
        match outcome {
            RefreshOutcome::Failed(ResourceError::NotFound(_)) | RefreshOutcome::Removed => {
                debug!(path = %directory, "Directory vanished during refresh");
            }
            RefreshOutcome::Failed(e) => {
                warn!(path = %directory, error = %e, "Directory refresh failed");
            }
            RefreshOutcome::Stale => debug!(path = %directory, "Directory left the tree before refresh"),
            RefreshOutcome::Refreshed { children } => {
                trace!(path = %directory, children, "Directory refreshed");
            }
        }
        Ok(())
    }
}

/// Translate a watcher-reported native path into a virtual path
///
/// Returns `None` for paths outside the watch root.
fn to_virtual(path: &Path, watch_root: &Path) -> Option<VirtualPath> {
    if !path.starts_with(watch_root) {
        return None;
    }
    Some(VirtualPath::from_components(relative_components(
        path, watch_root,
    )))
}

/// Marks an active population run; returns the engine to idle if dropped early
pub(crate) struct PopulationRun<'a> {
    reconciler: &'a ChangeReconciler,
    armed: bool,
}

impl Drop for PopulationRun<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut gate = self.reconciler.gate.lock();
            if gate.phase == Phase::Populating {
                warn!(
                    pending = gate.pending.len(),
                    "Population run abandoned; queued events wait for the next event"
                );
                gate.phase = Phase::Idle;
                self.reconciler.idle.notify_waiters();
            }
        }
    }
}

struct DrainGuard<'a> {
    reconciler: &'a ChangeReconciler,
    armed: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut gate = self.reconciler.gate.lock();
            if gate.phase == Phase::Draining {
                gate.phase = Phase::Idle;
                self.reconciler.idle.notify_waiters();
            }
        }
    }
}
