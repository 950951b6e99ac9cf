//! Virtual path representation and relative-path arithmetic
//!
//! Virtual paths address the remote resource namespace independently of the
//! host's native path syntax. Every function here is total: malformed input
//! degrades to a best-effort path instead of an error.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Component, Path};
use unicode_normalization::UnicodeNormalization;

/// Marker used when displaying the root path
pub const ROOT_MARKER: &str = "/";

/// Absolute `/`-separated path into the resource namespace
///
/// The root is the empty component sequence. No component is ever empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath {
    components: Vec<String>,
}

impl VirtualPath {
    /// The namespace root
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a textual path
    ///
    /// Accepts `/` and `\` as separators, drops empty and `.` components and
    /// normalizes each component to NFC. Never fails.
    pub fn parse(path: &str) -> Self {
        Self::from_components(path.split(['/', '\\']))
    }

    /// Build a path from raw components, dropping empty and `.` ones
    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let components = components
            .into_iter()
            .filter_map(|c| normalize_component(c.as_ref()))
            .collect();
        Self { components }
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of components (root is 0)
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Final component, or the root marker for the root
    pub fn name(&self) -> &str {
        self.components
            .last()
            .map(String::as_str)
            .unwrap_or(ROOT_MARKER)
    }

    /// Parent path; the root is its own parent
    pub fn parent(&self) -> VirtualPath {
        let mut components = self.components.clone();
        components.pop();
        Self { components }
    }

    /// Append one or more components (a `/` inside `name` splits it)
    pub fn join(&self, name: &str) -> VirtualPath {
        let mut components = self.components.clone();
        components.extend(name.split(['/', '\\']).filter_map(normalize_component));
        Self { components }
    }

    /// True if `prefix` is this path or one of its ancestors
    pub fn starts_with(&self, prefix: &VirtualPath) -> bool {
        self.components.starts_with(&prefix.components)
    }

    /// Resolve this path below a native directory
    pub fn to_native(&self, base: &Path) -> std::path::PathBuf {
        let mut native = base.to_path_buf();
        for component in &self.components {
            native.push(component);
        }
        native
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str(ROOT_MARKER);
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl From<&str> for VirtualPath {
    fn from(path: &str) -> Self {
        VirtualPath::parse(path)
    }
}

impl Serialize for VirtualPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VirtualPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(VirtualPath::parse(&raw))
    }
}

fn normalize_component(component: &str) -> Option<String> {
    let trimmed = component.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    Some(trimmed.nfc().collect())
}

/// Components of a native path, in comparison form
///
/// Root markers and `.` are skipped; prefixes (drive letters) are kept so two
/// paths on different volumes never share a prefix.
fn native_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().to_string()),
            Component::Normal(name) => Some(name.to_string_lossy().nfc().collect()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir | Component::CurDir => None,
        })
        .collect()
}

/// Strip the longest common component prefix of `path` and `base`
///
/// Returns the components of `path` that remain. Translates watcher-reported
/// native paths into the root-relative sequence used for tree lookup.
pub fn relative_components(path: &Path, base: &Path) -> Vec<String> {
    let path = native_components(path);
    let base = native_components(base);
    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();
    path.get(common..).map(<[String]>::to_vec).unwrap_or_default()
}

/// Final component of a `/`-separated path, or the whole path for the root marker
pub fn last_component(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        return path;
    }
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
}
