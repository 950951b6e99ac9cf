//! Resource browser core
//!
//! Owns the collaborating components and exposes the operations a view
//! layer drives: open, navigate, expand/collapse, drag-and-drop hover and the
//! copy/move/delete/rename relay.

use crate::config::{HoverConfig, RestreeConfig, WatchConfig};
use crate::error::BrowserError;
use crate::hover::{HoverExpansionTracker, HoverOutcome};
use crate::marshal::{invoke, update, UiMarshal};
use crate::population::{CancelFlag, PopulationReport, PopulationWorker};
use crate::reconcile::{ChangeReconciler, MutationApplied, PendingEvent};
use crate::service::ResourceService;
use crate::tree::path::VirtualPath;
use crate::tree::resource_tree::ResourceTree;
use crate::watch::WatchBridge;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Contents of one directory as shown in the file list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub path: VirtualPath,
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

/// Facade over population, reconciliation, hover and the mutation relay
pub struct Browser {
    service: Arc<dyn ResourceService>,
    marshal: Arc<dyn UiMarshal>,
    reconciler: Arc<ChangeReconciler>,
    worker: PopulationWorker,
    hover: Arc<Mutex<HoverExpansionTracker>>,
    cancel: CancelFlag,
    watch_config: WatchConfig,
    watch: Mutex<Option<WatchBridge>>,
}

impl Browser {
    pub fn new(
        config: &RestreeConfig,
        service: Arc<dyn ResourceService>,
        marshal: Arc<dyn UiMarshal>,
    ) -> Self {
        let reconciler = Arc::new(ChangeReconciler::new(
            Arc::clone(&service),
            Arc::clone(&marshal),
        ));
        let cancel = CancelFlag::new();
        let worker = PopulationWorker::new(
            Arc::clone(&service),
            Arc::clone(&marshal),
            Arc::clone(&reconciler),
            config.population.clone(),
            cancel.clone(),
        );
        Self {
            service,
            marshal,
            reconciler,
            worker,
            hover: Arc::new(Mutex::new(HoverExpansionTracker::from_config(&config.hover))),
            cancel,
            watch_config: config.watch.clone(),
            watch: Mutex::new(None),
        }
    }

    pub fn reconciler(&self) -> &Arc<ChangeReconciler> {
        &self.reconciler
    }

    pub fn service(&self) -> &Arc<dyn ResourceService> {
        &self.service
    }

    /// Populate the tree from `root`
    pub async fn open(&self, root: &VirtualPath) -> Result<PopulationReport, BrowserError> {
        self.worker.populate(root).await
    }

    /// Drop the whole tree and populate it again from the root
    ///
    /// Rejected without touching the tree while another run is active.
    pub async fn reset(&self) -> Result<PopulationReport, BrowserError> {
        self.worker.repopulate_from_scratch().await
    }

    /// List the ancestors of `path` that are not in the tree yet
    ///
    /// Each missing level is re-listed through the reconciler queue, so `open`
    /// can then start below the root. Fails with `NotInTree` if a level does
    /// not appear, which includes requests made while a run is active.
    pub async fn reveal(&self, path: &VirtualPath) -> Result<(), BrowserError> {
        let mut current = VirtualPath::root();
        for component in path.components() {
            let next = current.join(component);
            if !self.contains(&next).await? {
                self.reconciler
                    .submit(PendingEvent::Refresh(current.clone()))
                    .await;
                if !self.contains(&next).await? {
                    return Err(BrowserError::NotInTree(path.clone()));
                }
            }
            current = next;
        }
        Ok(())
    }

    /// List a directory for the file view and queue a refresh of its tree node
    pub async fn navigate(&self, path: &VirtualPath) -> Result<Listing, BrowserError> {
        let entries = self.service.list_entries(path).await?;

        let mut listing = Listing {
            path: path.clone(),
            ..Listing::default()
        };
        for entry in &entries {
            if entry.is_directory {
                listing.directories.push(entry.name().to_string());
            } else {
                listing.files.push(entry.name().to_string());
            }
        }
        listing.directories.sort();
        listing.files.sort();

        let disposition = self
            .reconciler
            .submit(PendingEvent::Refresh(path.clone()))
            .await;
        debug!(path = %path, disposition = ?disposition, "Navigated");
        Ok(listing)
    }

    /// Mark a directory expanded; never lists it
    pub async fn request_expand(&self, path: &VirtualPath) -> Result<bool, BrowserError> {
        let target = path.clone();
        update(self.marshal.as_ref(), move |tree| {
            let id = tree.lookup(&target)?;
            Some(tree.expand(id))
        })
        .await?
        .ok_or_else(|| BrowserError::NotInTree(path.clone()))
    }

    pub async fn request_collapse(&self, path: &VirtualPath) -> Result<bool, BrowserError> {
        let target = path.clone();
        update(self.marshal.as_ref(), move |tree| {
            let id = tree.lookup(&target)?;
            Some(tree.collapse(id))
        })
        .await?
        .ok_or_else(|| BrowserError::NotInTree(path.clone()))
    }

    /// Move `source` into the directory `dest_dir`; returns the new path
    pub async fn request_move(
        &self,
        source: &VirtualPath,
        dest_dir: &VirtualPath,
    ) -> Result<VirtualPath, BrowserError> {
        self.check_drop_target(source, dest_dir).await?;
        let dest = dest_dir.join(source.name());
        if dest == *source {
            return Err(BrowserError::InvalidMove(format!(
                "{} is already in {}",
                source, dest_dir
            )));
        }
        self.service.move_entry(source, &dest).await?;
        info!(source = %source, dest = %dest, "Moved resource");
        self.reconciler
            .on_mutation_applied(MutationApplied::Moved {
                source: source.clone(),
                dest: dest.clone(),
            })
            .await;
        Ok(dest)
    }

    /// Copy `source` into the directory `dest_dir`; returns the new path
    pub async fn request_copy(
        &self,
        source: &VirtualPath,
        dest_dir: &VirtualPath,
    ) -> Result<VirtualPath, BrowserError> {
        self.check_drop_target(source, dest_dir).await?;
        let dest = dest_dir.join(source.name());
        self.service.copy(source, &dest).await?;
        info!(source = %source, dest = %dest, "Copied resource");
        self.reconciler
            .on_mutation_applied(MutationApplied::Copied {
                source: source.clone(),
                dest: dest.clone(),
            })
            .await;
        Ok(dest)
    }

    pub async fn request_delete(&self, path: &VirtualPath) -> Result<(), BrowserError> {
        if path.is_root() {
            return Err(BrowserError::InvalidMove("The root cannot be deleted".to_string()));
        }
        self.service.delete(path).await?;
        info!(path = %path, "Deleted resource");
        self.reconciler
            .on_mutation_applied(MutationApplied::Deleted { path: path.clone() })
            .await;
        Ok(())
    }

    /// Rename in place; returns the new path
    pub async fn request_rename(
        &self,
        path: &VirtualPath,
        new_name: &str,
    ) -> Result<VirtualPath, BrowserError> {
        validate_name(new_name)?;
        if path.is_root() {
            return Err(BrowserError::InvalidMove("The root cannot be renamed".to_string()));
        }
        let renamed = self.service.rename(path, new_name).await?;
        info!(from = %path, to = %renamed, "Renamed resource");
        self.reconciler
            .on_mutation_applied(MutationApplied::Renamed {
                from: path.clone(),
                to: renamed.clone(),
            })
            .await;
        Ok(renamed)
    }

    /// Report the drag pointer over `path`
    pub async fn pointer_enter(&self, path: &VirtualPath) -> Result<HoverOutcome, BrowserError> {
        self.pointer_enter_at(path, Instant::now()).await
    }

    /// Same as `pointer_enter` with a caller-supplied event time
    pub async fn pointer_enter_at(
        &self,
        path: &VirtualPath,
        now: Instant,
    ) -> Result<HoverOutcome, BrowserError> {
        let hover = Arc::clone(&self.hover);
        let target = path.clone();
        update(self.marshal.as_ref(), move |tree| {
            let mut tracker = hover.lock();
            match tree.lookup(&target) {
                Some(id) => tracker.on_pointer_enter(tree, id, now),
                None => {
                    tracker.on_pointer_leave(tree);
                    HoverOutcome::Ignored
                }
            }
        })
        .await
    }

    pub async fn pointer_leave(&self) -> Result<(), BrowserError> {
        let hover = Arc::clone(&self.hover);
        update(self.marshal.as_ref(), move |tree| hover.lock().on_pointer_leave(tree)).await
    }

    async fn contains(&self, path: &VirtualPath) -> Result<bool, BrowserError> {
        let target = path.clone();
        invoke(self.marshal.as_ref(), move |tree| tree.lookup(&target).is_some()).await
    }

    /// Run a read-only closure against the tree on its owning thread
    pub async fn with_tree<F, R>(&self, f: F) -> Result<R, BrowserError>
    where
        F: FnOnce(&ResourceTree) -> R + Send + 'static,
        R: Send + 'static,
    {
        invoke(self.marshal.as_ref(), move |tree| f(tree)).await
    }

    /// Start forwarding filesystem changes of both roots
    pub fn start_watching(&self) -> Result<(), BrowserError> {
        let mut slot = self.watch.lock();
        if slot.is_some() {
            return Ok(());
        }
        let roots = [self.service.data_root(), self.service.user_data_root()];
        let bridge = WatchBridge::start(Arc::clone(&self.reconciler), &roots, &self.watch_config)?;
        *slot = Some(bridge);
        Ok(())
    }

    pub fn is_watching(&self) -> bool {
        self.watch.lock().is_some()
    }

    pub fn stop_watching(&self) {
        self.watch.lock().take();
    }

    /// Cancel any population run and stop watching
    pub fn close(&self) {
        info!("Closing resource browser");
        self.cancel.cancel();
        self.stop_watching();
    }

    /// Replace the hover dwell settings
    pub fn set_hover_config(&self, config: &HoverConfig) {
        *self.hover.lock() = HoverExpansionTracker::from_config(config);
    }

    /// Reject drops into the dragged entry itself or below it
    async fn check_drop_target(
        &self,
        source: &VirtualPath,
        dest_dir: &VirtualPath,
    ) -> Result<(), BrowserError> {
        if source.is_root() {
            return Err(BrowserError::InvalidMove("The root cannot be moved".to_string()));
        }
        let (src, dest) = (source.clone(), dest_dir.clone());
        let inside = invoke(self.marshal.as_ref(), move |tree| {
            match (tree.lookup(&src), tree.lookup(&dest)) {
                (Some(a), Some(b)) => tree.is_ancestor(a, b),
                _ => dest.starts_with(&src),
            }
        })
        .await?;
        if inside {
            return Err(BrowserError::InvalidMove(format!(
                "Cannot drop {} into {}",
                source, dest_dir
            )));
        }
        Ok(())
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn validate_name(name: &str) -> Result<(), BrowserError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(BrowserError::InvalidName(name.to_string()));
    }
    Ok(())
}
