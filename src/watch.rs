//! Watch bridge
//!
//! Turns native filesystem notifications on the data and user-data roots into
//! reconciler calls. Notifications are forwarded in arrival order through one
//! channel; a single task feeds them to the `ChangeReconciler`.

use crate::config::WatchConfig;
use crate::error::BrowserError;
use crate::reconcile::{ChangeKind, ChangeReconciler, FsChange, PendingEvent};
use crate::service::local::matches_name;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Live watchers plus the task applying their events
///
/// Dropping the bridge stops both.
pub struct WatchBridge {
    _watchers: Vec<RecommendedWatcher>,
    task: JoinHandle<()>,
    roots: Vec<PathBuf>,
}

impl WatchBridge {
    /// Watch `roots` recursively and forward changes to `reconciler`
    ///
    /// Must be called from within a Tokio runtime. Missing roots are skipped.
    pub fn start(
        reconciler: Arc<ChangeReconciler>,
        roots: &[PathBuf],
        config: &WatchConfig,
    ) -> Result<Self, BrowserError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BrowserError::Watch(format!("No async runtime: {}", e)))?;
        let (tx, rx) = mpsc::unbounded_channel::<FsChange>();

        let mut watched: Vec<PathBuf> = Vec::new();
        let mut watchers = Vec::new();
        for root in roots {
            if watched.contains(root) {
                continue;
            }
            if !root.is_dir() {
                warn!(root = %root.display(), "Watch root does not exist; skipping");
                continue;
            }

            let tx = tx.clone();
            let base = root.clone();
            let ignore = config.ignore_patterns.clone();
            let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
                match res {
                    Ok(event) => {
                        let Some(change) = convert_event(event, &base) else {
                            return;
                        };
                        if is_ignored(&change, &ignore) {
                            trace!(path = %change.path.display(), "Ignored change");
                            return;
                        }
                        if tx.send(change).is_err() {
                            debug!("Watch bridge closed; dropping event");
                        }
                    }
                    Err(e) => warn!(error = %e, "Watch error"),
                }
            })?;
            watcher.watch(root, RecursiveMode::Recursive)?;
            info!(root = %root.display(), "Watching root");
            watchers.push(watcher);
            watched.push(root.clone());
        }

        let task = runtime.spawn(run_event_loop(reconciler, rx));
        Ok(Self {
            _watchers: watchers,
            task,
            roots: watched,
        })
    }

    /// Roots actually being watched
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl Drop for WatchBridge {
    fn drop(&mut self) {
        self.task.abort();
        debug!("Watch bridge stopped");
    }
}

async fn run_event_loop(reconciler: Arc<ChangeReconciler>, mut rx: mpsc::UnboundedReceiver<FsChange>) {
    while let Some(change) = rx.recv().await {
        let disposition = reconciler.submit(PendingEvent::Filesystem(change)).await;
        trace!(disposition = ?disposition, "Change submitted");
    }
}

/// Map a notify event onto a change for the reconciler
pub fn convert_event(event: Event, watch_root: &Path) -> Option<FsChange> {
    let change = |kind: ChangeKind, path: &PathBuf| FsChange {
        kind,
        path: path.clone(),
        old_path: None,
        watch_root: watch_root.to_path_buf(),
    };

    match event.kind {
        EventKind::Create(_) => event.paths.first().map(|p| change(ChangeKind::Created, p)),
        EventKind::Modify(ModifyKind::Name(mode)) => {
            // notify 6 reports a full rename as one event with [from, to]
            if event.paths.len() >= 2 {
                return Some(FsChange {
                    kind: ChangeKind::Renamed,
                    path: event.paths[1].clone(),
                    old_path: Some(event.paths[0].clone()),
                    watch_root: watch_root.to_path_buf(),
                });
            }
            let kind = match mode {
                RenameMode::From => ChangeKind::Deleted,
                RenameMode::To => ChangeKind::Created,
                _ => ChangeKind::Changed,
            };
            event.paths.first().map(|p| change(kind, p))
        }
        EventKind::Modify(_) => event.paths.first().map(|p| change(ChangeKind::Changed, p)),
        EventKind::Remove(_) => event.paths.first().map(|p| change(ChangeKind::Deleted, p)),
        _ => None,
    }
}

/// True if any component below the watch root matches an ignore pattern
fn is_ignored(change: &FsChange, patterns: &[String]) -> bool {
    let relative = change
        .path
        .strip_prefix(&change.watch_root)
        .unwrap_or(&change.path);
    relative.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            patterns.iter().any(|pattern| matches_name(&name, pattern))
        }
        _ => false,
    })
}
