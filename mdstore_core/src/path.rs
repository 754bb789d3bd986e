//! Canonical relative paths used as tree keys.

use std::fmt;
use tracing::warn;

/// A normalized, always-relative, slash-separated path.
///
/// The empty path renders as `""` and names a node itself rather than one
/// of its children.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetadataPath {
    segments: Vec<String>,
}

impl MetadataPath {
    /// Normalize `path`: empty and `.` segments are dropped.
    ///
    /// Absolute input is coerced to a relative path and logged as a
    /// warning, since callers are expected to pass relative paths.
    pub fn new(path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        let created = Self {
            segments: path
                .split('/')
                .filter(|segment| !segment.is_empty() && *segment != ".")
                .map(str::to_string)
                .collect(),
        };

        if path.starts_with('/') {
            warn!(
                requested = path,
                created = %created,
                "absolute metadata path coerced to a relative path"
            );
        }

        created
    }

    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, `None` for the empty path.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path without its last segment, `None` for the empty path.
    pub fn parent(&self) -> Option<MetadataPath> {
        let (_, parent) = self.segments.split_last()?;
        Some(Self {
            segments: parent.to_vec(),
        })
    }

    /// Append a single segment.
    pub fn join(&self, segment: &str) -> MetadataPath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }
}

impl fmt::Display for MetadataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl From<&str> for MetadataPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for MetadataPath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&String> for MetadataPath {
    fn from(path: &String) -> Self {
        Self::new(path)
    }
}

impl From<&MetadataPath> for MetadataPath {
    fn from(path: &MetadataPath) -> Self {
        path.clone()
    }
}
