use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Per-request scratch root plus its sibling archive path.
///
/// Both are removed when the guard drops, whatever the outcome of the
/// request. Removal is recursive and best effort: a failure on one entry is
/// logged and the rest of the tree is still removed.
#[derive(Debug)]
pub struct ScratchSpace {
    root: PathBuf,
    archive: PathBuf,
}

impl ScratchSpace {
    /// Create `<base>/<label>_bag_<uuid>` and reserve
    /// `<base>/<label>_bag_<uuid>.<extension>` for the archive.
    pub fn allocate(base: &Path, label: &str, extension: &str) -> io::Result<Self> {
        fs::create_dir_all(base)?;
        let name = format!("{}_bag_{}", label, Uuid::new_v4());
        let root = base.join(&name);
        // create_dir (not create_dir_all) fails if the name is already taken.
        fs::create_dir(&root)?;
        let archive = base.join(format!("{}.{}", name, extension));
        debug!(root = %root.display(), "allocated scratch space");
        Ok(Self { root, archive })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.archive) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.archive.display(), error = %e, "failed to remove archive");
            }
        }
        remove_tree(&self.root);
        debug!(root = %self.root.display(), "released scratch space");
    }
}

/// Recursively remove `path`, logging and skipping entries that fail.
pub(crate) fn remove_tree(path: &Path) {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to list directory for removal");
            return;
        }
    };
    for entry in entries.flatten() {
        let child = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            remove_tree(&child);
        } else if let Err(e) = fs::remove_file(&child) {
            warn!(path = %child.display(), error = %e, "failed to remove file");
        }
    }
    if let Err(e) = fs::remove_dir(path) {
        warn!(path = %path.display(), error = %e, "failed to remove directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_per_allocation() {
        let base = tempfile::tempdir().unwrap();
        let a = ScratchSpace::allocate(base.path(), "res", "tar.gz").unwrap();
        let b = ScratchSpace::allocate(base.path(), "res", "tar.gz").unwrap();
        assert_ne!(a.root(), b.root());
        let name = a.root().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("res_bag_"));
        assert_eq!(
            a.archive().file_name().unwrap().to_str().unwrap(),
            format!("{}.tar.gz", name)
        );
    }

    #[test]
    fn drop_removes_non_empty_tree_and_archive() {
        let base = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::allocate(base.path(), "res", "tar.gz").unwrap();
        let root = scratch.root().to_path_buf();
        let archive = scratch.archive().to_path_buf();
        fs::create_dir_all(root.join("data/deep/er")).unwrap();
        fs::write(root.join("data/deep/er/f.bin"), b"x").unwrap();
        fs::write(root.join("bagit.txt"), b"x").unwrap();
        fs::write(&archive, b"archive").unwrap();

        drop(scratch);
        assert!(!root.exists());
        assert!(!archive.exists());
    }

    #[test]
    fn drop_tolerates_already_removed_paths() {
        let base = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::allocate(base.path(), "res", "tar.gz").unwrap();
        fs::remove_dir(scratch.root()).unwrap();
        drop(scratch);
    }
}
