//! In-memory resource namespace
//!
//! Holds the namespace in a sorted map. Used to embed the browser without a
//! live engine connection and to script failures, call ordering and listing
//! stalls in tests.

use crate::error::ResourceError;
use crate::service::{ResourceEntry, ResourceService};
use crate::tree::path::VirtualPath;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock as AsyncRwLock};

#[derive(Default)]
struct MemoryState {
    /// path -> is_directory; the root is implicit
    entries: BTreeMap<VirtualPath, bool>,
    failures: HashMap<VirtualPath, ResourceError>,
    listing_calls: Vec<VirtualPath>,
}

/// Resource service over an in-memory namespace
pub struct MemoryResourceService {
    state: RwLock<MemoryState>,
    listing_gate: Arc<AsyncRwLock<()>>,
    data_root: PathBuf,
    user_data_root: PathBuf,
}

impl Default for MemoryResourceService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResourceService {
    pub fn new() -> Self {
        Self::with_roots(PathBuf::from("/memory/data"), PathBuf::from("/memory/user"))
    }

    pub fn with_roots(data_root: PathBuf, user_data_root: PathBuf) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            listing_gate: Arc::new(AsyncRwLock::new(())),
            data_root,
            user_data_root,
        }
    }

    /// Add a directory and any missing ancestors
    pub fn add_directory(&self, path: &str) -> &Self {
        let path = VirtualPath::parse(path);
        let mut state = self.state.write();
        insert_with_ancestors(&mut state.entries, path, true);
        self
    }

    /// Add a file and any missing ancestor directories
    pub fn add_file(&self, path: &str) -> &Self {
        let path = VirtualPath::parse(path);
        let mut state = self.state.write();
        insert_with_ancestors(&mut state.entries, path, false);
        self
    }

    /// Remove an entry and everything below it
    pub fn remove_entry(&self, path: &str) -> &Self {
        let path = VirtualPath::parse(path);
        self.state.write().entries.retain(|p, _| !p.starts_with(&path));
        self
    }

    /// Rename an entry in place without going through the service contract
    pub fn rename_entry(&self, from: &str, to: &str) -> &Self {
        let (from, to) = (VirtualPath::parse(from), VirtualPath::parse(to));
        let mut state = self.state.write();
        relocate(&mut state.entries, &from, &to, true);
        self
    }

    /// Make every listing of `path` fail with `error`
    pub fn fail_listing(&self, path: &str, error: ResourceError) -> &Self {
        self.state
            .write()
            .failures
            .insert(VirtualPath::parse(path), error);
        self
    }

    pub fn clear_failures(&self) -> &Self {
        self.state.write().failures.clear();
        self
    }

    /// Paths listed so far, in call order
    pub fn listing_calls(&self) -> Vec<VirtualPath> {
        self.state.read().listing_calls.clone()
    }

    pub fn contains(&self, path: &str) -> bool {
        let path = VirtualPath::parse(path);
        path.is_root() || self.state.read().entries.contains_key(&path)
    }

    /// Stall every listing until the returned guard is dropped
    pub async fn hold_listings(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.listing_gate).write_owned().await
    }

    /// Native path a watcher on the user-data root would report for `path`
    pub fn native_path(&self, path: &str) -> PathBuf {
        VirtualPath::parse(path).to_native(&self.user_data_root)
    }

    fn is_directory(state: &MemoryState, path: &VirtualPath) -> Option<bool> {
        if path.is_root() {
            return Some(true);
        }
        state.entries.get(path).copied()
    }
}

fn insert_with_ancestors(entries: &mut BTreeMap<VirtualPath, bool>, path: VirtualPath, is_dir: bool) {
    let mut ancestor = path.parent();
    while !ancestor.is_root() {
        entries.insert(ancestor.clone(), true);
        ancestor = ancestor.parent();
    }
    if !path.is_root() {
        entries.insert(path, is_dir);
    }
}

fn relocate(
    entries: &mut BTreeMap<VirtualPath, bool>,
    from: &VirtualPath,
    to: &VirtualPath,
    remove_source: bool,
) {
    let moved: Vec<(VirtualPath, bool)> = entries
        .iter()
        .filter(|(p, _)| p.starts_with(from))
        .map(|(p, is_dir)| {
            let suffix = &p.components()[from.depth()..];
            let target = VirtualPath::from_components(to.components().iter().chain(suffix));
            (target, *is_dir)
        })
        .collect();
    if remove_source {
        entries.retain(|p, _| !p.starts_with(from));
    }
    for (path, is_dir) in moved {
        insert_with_ancestors(entries, path, is_dir);
    }
}

#[async_trait]
impl ResourceService for MemoryResourceService {
    async fn list_entries(&self, path: &VirtualPath) -> Result<Vec<ResourceEntry>, ResourceError> {
        let _open = self.listing_gate.read().await;

        let mut state = self.state.write();
        state.listing_calls.push(path.clone());
        if let Some(error) = state.failures.get(path) {
            return Err(error.clone());
        }
        match Self::is_directory(&state, path) {
            None => return Err(ResourceError::NotFound(path.clone())),
            Some(false) => return Err(ResourceError::NotADirectory(path.clone())),
            Some(true) => {}
        }

        Ok(state
            .entries
            .iter()
            .filter(|(p, _)| !p.is_root() && p.parent() == *path)
            .map(|(p, is_dir)| ResourceEntry {
                path: p.clone(),
                is_directory: *is_dir,
            })
            .collect())
    }

    async fn copy(&self, source: &VirtualPath, dest: &VirtualPath) -> Result<(), ResourceError> {
        let mut state = self.state.write();
        if Self::is_directory(&state, source).is_none() || source.is_root() {
            return Err(ResourceError::NotFound(source.clone()));
        }
        if Self::is_directory(&state, dest).is_some() {
            return Err(ResourceError::AlreadyExists(dest.clone()));
        }
        relocate(&mut state.entries, source, dest, false);
        Ok(())
    }

    async fn move_entry(
        &self,
        source: &VirtualPath,
        dest: &VirtualPath,
    ) -> Result<(), ResourceError> {
        let mut state = self.state.write();
        if Self::is_directory(&state, source).is_none() || source.is_root() {
            return Err(ResourceError::NotFound(source.clone()));
        }
        if Self::is_directory(&state, dest).is_some() {
            return Err(ResourceError::AlreadyExists(dest.clone()));
        }
        relocate(&mut state.entries, source, dest, true);
        Ok(())
    }

    async fn delete(&self, path: &VirtualPath) -> Result<(), ResourceError> {
        let mut state = self.state.write();
        if path.is_root() {
            return Err(ResourceError::ReadOnly(path.clone()));
        }
        if Self::is_directory(&state, path).is_none() {
            return Err(ResourceError::NotFound(path.clone()));
        }
        state.entries.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn data_root(&self) -> PathBuf {
        self.data_root.clone()
    }

    fn user_data_root(&self) -> PathBuf {
        self.user_data_root.clone()
    }
}
