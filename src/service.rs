//! Resource service contract
//!
//! The remote engine exposes its virtual namespace through this trait. The
//! core only lists directories and relays user mutations; everything else
//! about the transport is opaque.

use crate::error::ResourceError;
use crate::tree::path::VirtualPath;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod local;
pub mod memory;

pub use local::{LocalResourceService, LocalServiceConfig};
pub use memory::MemoryResourceService;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub path: VirtualPath,
    pub is_directory: bool,
}

impl ResourceEntry {
    pub fn directory(path: VirtualPath) -> Self {
        Self {
            path,
            is_directory: true,
        }
    }

    pub fn file(path: VirtualPath) -> Self {
        Self {
            path,
            is_directory: false,
        }
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }
}

/// Remote resource namespace
#[async_trait]
pub trait ResourceService: Send + Sync {
    /// List the direct entries of a directory
    async fn list_entries(&self, path: &VirtualPath) -> Result<Vec<ResourceEntry>, ResourceError>;

    /// Copy `source` to the full destination path `dest`
    async fn copy(&self, source: &VirtualPath, dest: &VirtualPath) -> Result<(), ResourceError>;

    /// Move `source` to the full destination path `dest`
    async fn move_entry(&self, source: &VirtualPath, dest: &VirtualPath)
        -> Result<(), ResourceError>;

    async fn delete(&self, path: &VirtualPath) -> Result<(), ResourceError>;

    /// Rename in place; returns the new path
    async fn rename(&self, path: &VirtualPath, new_name: &str) -> Result<VirtualPath, ResourceError> {
        let dest = path.parent().join(new_name);
        self.move_entry(path, &dest).await?;
        Ok(dest)
    }

    /// Native directory backing the read-only data namespace
    fn data_root(&self) -> PathBuf;

    /// Native directory backing the writable user-data namespace
    fn user_data_root(&self) -> PathBuf;
}
