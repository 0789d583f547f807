//! Packaging a written bag tree into one compressed file.
//!
//! The bundled [`TarGzPackager`] writes a reproducible `.tar.gz`: entries in
//! sorted order, mtime 0, fixed modes and owners, so packaging the same tree
//! twice yields identical bytes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use tar::{Builder, Header};
use tracing::info;

use crate::walk::collect_files;

/// Media type of the bundled tar.gz packaging.
pub const TAR_GZ_MEDIA_TYPE: &str = "application/vnd.datamanager.bagit+tar+gzip";

/// Turns a bag directory into a single archive file.
pub trait ArchivePackager: Send + Sync + std::fmt::Debug {
    /// Media type announced when the archive is delivered.
    fn media_type(&self) -> &str;

    /// File extension, without the leading dot.
    fn extension(&self) -> &str;

    /// Write `bag_dir` to `archive`. The archive's single top-level entry is
    /// the bag directory's own name.
    fn package(&self, bag_dir: &Path, archive: &Path) -> Result<()>;
}

/// Deterministic gzip-compressed tar.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzPackager;

fn create_deterministic_tar<W: Write>(writer: W) -> Builder<GzEncoder<W>> {
    let encoder = GzBuilder::new()
        .mtime(0)
        .operating_system(255)
        .write(writer, Compression::default());

    let mut tar = Builder::new(encoder);
    tar.mode(tar::HeaderMode::Deterministic);
    tar
}

fn append_file<W: Write>(tar: &mut Builder<W>, entry_path: &str, file: &Path) -> Result<()> {
    let source = File::open(file).with_context(|| format!("open {}", file.display()))?;
    let len = source
        .metadata()
        .with_context(|| format!("stat {}", file.display()))?
        .len();

    let mut header = Header::new_gnu();
    header
        .set_path(entry_path)
        .with_context(|| format!("set_path {}", entry_path))?;
    header.set_size(len);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_cksum();
    tar.append(&header, source)
        .with_context(|| format!("append {}", entry_path))?;
    Ok(())
}

impl ArchivePackager for TarGzPackager {
    fn media_type(&self) -> &str {
        TAR_GZ_MEDIA_TYPE
    }

    fn extension(&self) -> &str {
        "tar.gz"
    }

    fn package(&self, bag_dir: &Path, archive: &Path) -> Result<()> {
        let prefix = bag_dir
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("bag directory {} has no usable name", bag_dir.display()))?;
        let files = collect_files(bag_dir)
            .with_context(|| format!("list bag directory {}", bag_dir.display()))?;

        let out = File::create(archive)
            .with_context(|| format!("create archive {}", archive.display()))?;
        let mut tar = create_deterministic_tar(BufWriter::new(out));
        for file in &files {
            let relative = file
                .strip_prefix(bag_dir)
                .context("bag file outside bag directory")?;
            let mut entry_path = prefix.to_string();
            for component in relative.components() {
                entry_path.push('/');
                entry_path.push_str(&component.as_os_str().to_string_lossy());
            }
            append_file(&mut tar, &entry_path, file)?;
        }

        let gz = tar.into_inner().context("finalize tar")?;
        let mut writer = gz.finish().context("finish gzip")?;
        writer.flush().context("flush archive")?;

        info!(
            bag = %bag_dir.display(),
            archive = %archive.display(),
            entries = files.len(),
            "packaged bag"
        );
        Ok(())
    }
}
