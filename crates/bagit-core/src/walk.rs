//! Directory traversal shared by verification and callers that admit whole trees.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Every regular file below `dir`, sorted. Symlinks are not followed.
pub fn collect_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if dir.is_dir() {
        collect_files_inner(dir, &mut out)?;
    }
    out.sort();
    Ok(out)
}

fn collect_files_inner(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let ft = entry.file_type()?;
        if ft.is_dir() {
            collect_files_inner(&path, out)?;
        } else if ft.is_file() {
            out.push(path);
        }
    }
    Ok(())
}
