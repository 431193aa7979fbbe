//! Resource identity for synchronized trees

use serde::{Deserialize, Serialize};

/// A resource path normalized to use forward slashes internally.
///
/// Paths identify resources inside one synchronized tree; they are never
/// touched as filesystem paths by this workspace. Normalizing separators
/// up front keeps identity comparisons and upward traversal consistent
/// regardless of where a selection originated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl ResourcePath {
    /// Create a new ResourcePath from any string-like input.
    ///
    /// Converts backslashes to forward slashes and strips a trailing
    /// slash so `"a/b"` and `"a/b/"` name the same resource.
    pub fn new(path: impl AsRef<str>) -> Self {
        let normalized = path.as_ref().replace('\\', "/");
        let trimmed = normalized.trim_end_matches('/');
        let inner = if trimmed.is_empty() && normalized.starts_with('/') {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
        Self { inner }
    }

    /// Get the normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Join this path with a child segment.
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.replace('\\', "/");
        let segment = segment.trim_matches('/');
        if self.inner.is_empty() || self.inner == "/" {
            Self::new(format!("{}{}", self.inner, segment))
        } else {
            Self::new(format!("{}/{}", self.inner, segment))
        }
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.inner.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(0) => Some(Self {
                inner: "/".to_string(),
            }),
            Some(idx) => Some(Self {
                inner: trimmed[..idx].to_string(),
            }),
            None => None,
        }
    }

    /// Get the final path component.
    pub fn file_name(&self) -> Option<&str> {
        let trimmed = self.inner.trim_end_matches('/');
        trimmed.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

impl std::fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for ResourcePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Whether a resource is a leaf file or a container folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A leaf resource with content
    File,
    /// A container resource owning children
    Folder,
}

/// A resource inside one synchronized tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Identity of the resource within the tree
    pub path: ResourcePath,
    /// File or folder
    pub kind: ResourceKind,
}

impl Resource {
    /// Create a file resource.
    pub fn file(path: impl AsRef<str>) -> Self {
        Self {
            path: ResourcePath::new(path),
            kind: ResourceKind::File,
        }
    }

    /// Create a folder resource.
    pub fn folder(path: impl AsRef<str>) -> Self {
        Self {
            path: ResourcePath::new(path),
            kind: ResourceKind::Folder,
        }
    }

    /// Whether this resource is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == ResourceKind::Folder
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}
