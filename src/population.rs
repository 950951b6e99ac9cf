//! Population Worker
//!
//! Breadth-first traversal of the remote namespace. Each level of the
//! traversal is listed with bounded concurrency off the UI thread, then
//! attached to the tree in one marshalled update. Listing failures become
//! error placeholders and never stop the run.

use crate::config::PopulationConfig;
use crate::error::{BrowserError, ResourceError};
use crate::marshal::{invoke, update, UiMarshal};
use crate::reconcile::{ChangeReconciler, PopulationRun};
use crate::service::{ResourceEntry, ResourceService};
use crate::tree::path::VirtualPath;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Shared cancellation signal, raised when the browser window closes
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A directory whose listing failed during population
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopulationFailure {
    pub path: VirtualPath,
    pub error: String,
}

/// Summary of one population run
#[derive(Debug, Clone, Serialize)]
pub struct PopulationReport {
    pub root: VirtualPath,
    pub directories_listed: usize,
    pub nodes_attached: usize,
    pub failures: Vec<PopulationFailure>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl PopulationReport {
    fn new(root: VirtualPath) -> Self {
        Self {
            root,
            directories_listed: 0,
            nodes_attached: 0,
            failures: Vec::new(),
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failures.is_empty()
    }
}

/// Result of re-listing a single directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Children replaced; `children` directories now attached
    Refreshed { children: usize },
    /// The directory no longer exists and was removed from the tree
    Removed,
    /// Listing failed; the directory now holds an error placeholder
    Failed(ResourceError),
    /// The directory left the tree before the listing arrived
    Stale,
}

/// Re-list one directory and apply the result in a single update
pub async fn refresh_directory(
    service: &dyn ResourceService,
    marshal: &dyn UiMarshal,
    path: &VirtualPath,
) -> Result<RefreshOutcome, BrowserError> {
    let target = path.clone();
    match service.list_entries(path).await {
        Ok(entries) => {
            let attached = update(marshal, move |tree| {
                tree.insert_or_replace_subtree(&target, &entries)
            })
            .await?;
            Ok(match attached {
                Some(children) => RefreshOutcome::Refreshed {
                    children: children.len(),
                },
                None => RefreshOutcome::Stale,
            })
        }
        Err(ResourceError::NotFound(_)) if !path.is_root() => {
            update(marshal, move |tree| tree.remove(&target)).await?;
            Ok(RefreshOutcome::Removed)
        }
        Err(error) => {
            let message = error.to_string();
            update(marshal, move |tree| tree.set_error_placeholder(&target, message)).await?;
            Ok(RefreshOutcome::Failed(error))
        }
    }
}

struct LevelOutcome {
    next: Vec<VirtualPath>,
    attached: usize,
    failures: Vec<PopulationFailure>,
}

/// Walks the namespace and fills the tree
pub struct PopulationWorker {
    service: Arc<dyn ResourceService>,
    marshal: Arc<dyn UiMarshal>,
    reconciler: Arc<ChangeReconciler>,
    config: PopulationConfig,
    cancel: CancelFlag,
}

impl PopulationWorker {
    pub fn new(
        service: Arc<dyn ResourceService>,
        marshal: Arc<dyn UiMarshal>,
        reconciler: Arc<ChangeReconciler>,
        config: PopulationConfig,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            service,
            marshal,
            reconciler,
            config,
            cancel,
        }
    }

    /// Populate the subtree under `root`
    ///
    /// Waits for an active queue drain, and rejects the call with
    /// `AlreadyPopulating` while another run is active. Events received
    /// during the run are applied in order before this returns.
    #[instrument(skip_all, fields(root = %root))]
    pub async fn populate(&self, root: &VirtualPath) -> Result<PopulationReport, BrowserError> {
        let run = self.reconciler.begin_population().await?;
        self.run(run, root).await
    }

    /// Drop the whole tree and populate it again from the root
    ///
    /// The tree is wiped only after this run owns the engine, so a rejected
    /// call leaves it untouched.
    #[instrument(skip_all)]
    pub async fn repopulate_from_scratch(&self) -> Result<PopulationReport, BrowserError> {
        let run = self.reconciler.begin_population().await?;
        warn!("Resetting resource tree");
        if let Err(e) = update(self.marshal.as_ref(), |tree| tree.reset()).await {
            self.reconciler.finish_population(run).await;
            return Err(e);
        }
        self.run(run, &VirtualPath::root()).await
    }

    async fn run(
        &self,
        run: PopulationRun<'_>,
        root: &VirtualPath,
    ) -> Result<PopulationReport, BrowserError> {
        let start = Instant::now();
        info!("Population started");

        let mut report = PopulationReport::new(root.clone());
        let traversal = self.traverse(root, &mut report).await;
        let drained = self.reconciler.finish_population(run).await;
        traversal?;

        if self.config.expand_root && !report.cancelled {
            update(self.marshal.as_ref(), |tree| {
                let root = tree.root();
                tree.expand(root);
            })
            .await?;
        }

        report.elapsed = start.elapsed();
        info!(
            directories_listed = report.directories_listed,
            nodes_attached = report.nodes_attached,
            failures = report.failures.len(),
            cancelled = report.cancelled,
            drained_events = drained,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Population finished"
        );
        Ok(report)
    }

    async fn traverse(
        &self,
        root: &VirtualPath,
        report: &mut PopulationReport,
    ) -> Result<(), BrowserError> {
        let start = root.clone();
        let present = invoke(self.marshal.as_ref(), move |tree| tree.lookup(&start).is_some()).await?;
        if !present {
            return Err(BrowserError::NotInTree(root.clone()));
        }

        let concurrency = self.config.max_concurrent_queries.max(1);
        let mut queue: VecDeque<VirtualPath> = VecDeque::from([root.clone()]);
        let mut depth = 0usize;

        while !queue.is_empty() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                info!(depth, remaining = queue.len(), "Population cancelled");
                break;
            }

            let level: Vec<VirtualPath> = queue.drain(..).collect();
            debug!(depth, directories = level.len(), "Listing level");

            let cancel = self.cancel.clone();
            let listings: Vec<(VirtualPath, Option<Result<Vec<ResourceEntry>, ResourceError>>)> =
                stream::iter(level)
                    .map(|path| {
                        let service = Arc::clone(&self.service);
                        let cancel = cancel.clone();
                        async move {
                            if cancel.is_cancelled() {
                                return (path, None);
                            }
                            let result = service.list_entries(&path).await;
                            (path, Some(result))
                        }
                    })
                    .buffered(concurrency)
                    .collect()
                    .await;

            let skipped = listings.iter().filter(|(_, r)| r.is_none()).count();
            report.directories_listed += listings.len() - skipped;

            let outcome = update(self.marshal.as_ref(), move |tree| {
                let mut outcome = LevelOutcome {
                    next: Vec::new(),
                    attached: 0,
                    failures: Vec::new(),
                };
                for (path, result) in listings {
                    match result {
                        None => {}
                        Some(Ok(entries)) => {
                            if let Some(children) = tree.insert_or_replace_subtree(&path, &entries)
                            {
                                outcome.attached += children.len();
                                outcome.next.extend(children);
                            }
                        }
                        Some(Err(error)) => {
                            let message = error.to_string();
                            tree.set_error_placeholder(&path, message.clone());
                            outcome.failures.push(PopulationFailure {
                                path,
                                error: message,
                            });
                        }
                    }
                }
                outcome
            })
            .await?;

            for failure in &outcome.failures {
                warn!(path = %failure.path, error = %failure.error, "Failed to list directory");
            }
            report.nodes_attached += outcome.attached;
            report.failures.extend(outcome.failures);
            queue.extend(outcome.next);

            if skipped > 0 {
                report.cancelled = true;
                info!(depth, skipped, "Population cancelled mid-level");
                break;
            }
            depth += 1;
        }
        Ok(())
    }
}
