//! Bag-relative file paths.

use std::path::{Component, Path, PathBuf};

use crate::error::{BagError, BagResult};

/// Payload directory name under the bag root.
pub const PAYLOAD_DIR: &str = "data";

/// A normalized POSIX path relative to the bag root (e.g. `data/a/b.txt`).
///
/// Never empty, never absolute, never contains `.` or `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BagPath(String);

impl BagPath {
    /// Parse and normalize a relative path; backslashes are treated as separators.
    pub fn new(raw: &str) -> BagResult<Self> {
        let invalid = |reason: &str| BagError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let unified = raw.replace('\\', "/");
        if unified.starts_with('/') {
            return Err(invalid("absolute paths are not allowed"));
        }
        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(invalid("parent segments are not allowed")),
                s if s.contains(':') && segments.is_empty() && s.len() == 2 => {
                    return Err(invalid("drive prefixes are not allowed"))
                }
                s => segments.push(s),
            }
        }
        if segments.is_empty() {
            return Err(invalid("path is empty"));
        }
        Ok(Self(segments.join("/")))
    }

    /// Relativize a filesystem path against `base`.
    pub fn relative_to(path: &Path, base: &Path) -> Option<Self> {
        let rest = path.strip_prefix(base).ok()?;
        let mut segments = Vec::new();
        for component in rest.components() {
            match component {
                Component::Normal(s) => segments.push(s.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(Self(segments.join("/")))
    }

    /// `data/<payload_path>`.
    pub fn payload(payload_path: &str) -> BagResult<Self> {
        let inner = Self::new(payload_path)?;
        Ok(Self(format!("{}/{}", PAYLOAD_DIR, inner.0)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for paths under `data/`.
    pub fn is_payload(&self) -> bool {
        self.0
            .strip_prefix(PAYLOAD_DIR)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Resolve against a bag root directory.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |p, s| p.join(s))
    }
}

impl std::fmt::Display for BagPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BagPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
