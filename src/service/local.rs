//! Local directory enumeration fallback
//!
//! Serves the namespace from two native directories: the read-only data root
//! and the writable user-data root layered on top of it. Listings are the
//! union of both (user data shadows data); mutations only ever touch the
//! user-data root.

use crate::error::ResourceError;
use crate::service::{ResourceEntry, ResourceService};
use crate::tree::path::VirtualPath;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

/// Local service configuration
#[derive(Debug, Clone)]
pub struct LocalServiceConfig {
    /// Whether to follow symbolic links (default: false)
    pub follow_symlinks: bool,
    /// Entry names to hide from listings (e.g., ".git", "*.tmp")
    pub ignore_patterns: Vec<String>,
}

impl Default for LocalServiceConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            ignore_patterns: vec![".git".to_string(), ".DS_Store".to_string()],
        }
    }
}

/// Resource service backed by local directories
#[derive(Debug, Clone)]
pub struct LocalResourceService {
    data_root: PathBuf,
    user_data_root: PathBuf,
    config: LocalServiceConfig,
}

impl LocalResourceService {
    /// Create a service over the given roots
    ///
    /// Both roots are canonicalized when they exist so that watcher-reported
    /// paths share their prefix.
    pub fn new(data_root: PathBuf, user_data_root: PathBuf) -> Self {
        Self::with_config(data_root, user_data_root, LocalServiceConfig::default())
    }

    pub fn with_config(
        data_root: PathBuf,
        user_data_root: PathBuf,
        config: LocalServiceConfig,
    ) -> Self {
        Self {
            data_root: dunce::canonicalize(&data_root).unwrap_or(data_root),
            user_data_root: dunce::canonicalize(&user_data_root).unwrap_or(user_data_root),
            config,
        }
    }

    fn layers(&self) -> [&Path; 2] {
        [&self.data_root, &self.user_data_root]
    }

    fn list_blocking(&self, path: &VirtualPath) -> Result<Vec<ResourceEntry>, ResourceError> {
        let mut merged: BTreeMap<String, bool> = BTreeMap::new();
        let mut found = false;

        for layer in self.layers() {
            let native = path.to_native(layer);
            if !native.exists() {
                continue;
            }
            if !native.is_dir() {
                return Err(ResourceError::NotADirectory(path.clone()));
            }
            found = true;

            let walker = WalkDir::new(&native)
                .min_depth(1)
                .max_depth(1)
                .follow_links(self.config.follow_symlinks);
            for entry in walker {
                let entry = entry.map_err(|e| {
                    ResourceError::Io(format!("Failed to list {}: {}", native.display(), e))
                })?;
                if self.should_ignore(&entry) {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                // Later layers shadow earlier ones
                merged.insert(name, entry.file_type().is_dir());
            }
        }

        if !found {
            return Err(ResourceError::NotFound(path.clone()));
        }

        Ok(merged
            .into_iter()
            .map(|(name, is_directory)| ResourceEntry {
                path: path.join(&name),
                is_directory,
            })
            .collect())
    }

    fn should_ignore(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        self.config
            .ignore_patterns
            .iter()
            .any(|pattern| matches_name(&name, pattern))
    }

    /// Native location of an existing entry, user data first
    fn resolve_existing(&self, path: &VirtualPath) -> Option<PathBuf> {
        let user = path.to_native(&self.user_data_root);
        if user.exists() {
            return Some(user);
        }
        let data = path.to_native(&self.data_root);
        data.exists().then_some(data)
    }

    /// Native location of an entry that may be modified
    fn resolve_writable(&self, path: &VirtualPath) -> Result<PathBuf, ResourceError> {
        if path.is_root() {
            return Err(ResourceError::ReadOnly(path.clone()));
        }
        let user = path.to_native(&self.user_data_root);
        if user.exists() {
            return Ok(user);
        }
        if path.to_native(&self.data_root).exists() {
            return Err(ResourceError::ReadOnly(path.clone()));
        }
        Err(ResourceError::NotFound(path.clone()))
    }

    fn destination(&self, dest: &VirtualPath) -> Result<PathBuf, ResourceError> {
        if dest.is_root() {
            return Err(ResourceError::ReadOnly(dest.clone()));
        }
        if self.resolve_existing(dest).is_some() {
            return Err(ResourceError::AlreadyExists(dest.clone()));
        }
        let native = dest.to_native(&self.user_data_root);
        if let Some(parent) = native.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(native)
    }

    fn copy_blocking(&self, source: &VirtualPath, dest: &VirtualPath) -> Result<(), ResourceError> {
        let from = self
            .resolve_existing(source)
            .ok_or_else(|| ResourceError::NotFound(source.clone()))?;
        let to = self.destination(dest)?;

        if from.is_dir() {
            if to.starts_with(&from) {
                return Err(ResourceError::Io(format!(
                    "Cannot copy {} into itself",
                    source
                )));
            }
            for entry in WalkDir::new(&from).follow_links(self.config.follow_symlinks) {
                let entry = entry.map_err(|e| ResourceError::Io(e.to_string()))?;
                let relative = entry
                    .path()
                    .strip_prefix(&from)
                    .map_err(|e| ResourceError::Io(e.to_string()))?;
                let target = to.join(relative);
                if entry.file_type().is_dir() {
                    fs::create_dir_all(&target)?;
                } else {
                    fs::copy(entry.path(), &target)?;
                }
            }
        } else {
            fs::copy(&from, &to)?;
        }
        Ok(())
    }

    fn move_blocking(&self, source: &VirtualPath, dest: &VirtualPath) -> Result<(), ResourceError> {
        let from = self.resolve_writable(source)?;
        let to = self.destination(dest)?;
        fs::rename(&from, &to)?;
        Ok(())
    }

    fn delete_blocking(&self, path: &VirtualPath) -> Result<(), ResourceError> {
        let native = self.resolve_writable(path)?;
        if native.is_dir() {
            fs::remove_dir_all(&native)?;
        } else {
            fs::remove_file(&native)?;
        }
        Ok(())
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, ResourceError>
    where
        T: Send + 'static,
        F: FnOnce(&LocalResourceService) -> Result<T, ResourceError> + Send + 'static,
    {
        let service = self.clone();
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| ResourceError::Transport(format!("Blocking task failed: {}", e)))?
    }
}

/// Match an entry name against an ignore pattern
///
/// Supports exact names and a single leading or trailing `*`.
pub(crate) fn matches_name(name: &str, pattern: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*') {
        return name.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    name == pattern
}

#[async_trait]
impl ResourceService for LocalResourceService {
    #[instrument(skip_all, fields(path = %path))]
    async fn list_entries(&self, path: &VirtualPath) -> Result<Vec<ResourceEntry>, ResourceError> {
        let path = path.clone();
        let entries = self.run_blocking(move |s| s.list_blocking(&path)).await?;
        debug!(entry_count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn copy(&self, source: &VirtualPath, dest: &VirtualPath) -> Result<(), ResourceError> {
        let (source, dest) = (source.clone(), dest.clone());
        self.run_blocking(move |s| s.copy_blocking(&source, &dest)).await
    }

    async fn move_entry(
        &self,
        source: &VirtualPath,
        dest: &VirtualPath,
    ) -> Result<(), ResourceError> {
        let (source, dest) = (source.clone(), dest.clone());
        self.run_blocking(move |s| s.move_blocking(&source, &dest)).await
    }

    async fn delete(&self, path: &VirtualPath) -> Result<(), ResourceError> {
        let path = path.clone();
        self.run_blocking(move |s| s.delete_blocking(&path)).await
    }

    fn data_root(&self) -> PathBuf {
        self.data_root.clone()
    }

    fn user_data_root(&self) -> PathBuf {
        self.user_data_root.clone()
    }
}
