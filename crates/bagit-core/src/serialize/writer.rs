use std::fs;
use std::io::Cursor;
use std::path::Path;

use tracing::{debug, info};

use crate::bag::{Bag, BagPath, ManifestClass, ManifestSet, PAYLOAD_DIR};
use crate::checksum::digest_all;
use crate::error::{BagError, BagResult};

use super::text;
use super::{BAGIT_TXT, BAG_INFO_TXT, FETCH_TXT};

fn write_atomic(path: &Path, content: &[u8]) -> BagResult<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(|e| BagError::Serialization {
        path: temp_path.clone(),
        message: format!("failed to write temp file: {}", e),
    })?;
    fs::rename(&temp_path, path).map_err(|e| BagError::Serialization {
        path: path.to_path_buf(),
        message: format!("failed to rename temp file: {}", e),
    })?;
    Ok(())
}

pub(crate) fn same_location(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Copy every locally present manifest-covered file from the bag root.
fn copy_local_files(bag: &Bag, destination: &Path) -> BagResult<()> {
    let paths = bag
        .payload_manifests
        .paths()
        .into_iter()
        .chain(bag.tag_manifests.paths());
    for path in paths {
        let src = path.to_fs_path(&bag.root_dir);
        if !src.is_file() {
            continue;
        }
        let dst = path.to_fs_path(destination);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| BagError::io(parent, e))?;
        }
        fs::copy(&src, &dst).map_err(|e| BagError::io(&dst, e))?;
        debug!(path = %path, "copied file to write destination");
    }
    Ok(())
}

/// Serialize `bag` under `destination`.
///
/// Writes the declaration, metadata, payload manifests, `fetch.txt` when
/// there are fetch entries, and tag manifests covering admitted tag files
/// plus every descriptor written here. Output depends only on the model, so
/// repeated writes are byte-identical.
///
/// Returns the tag-manifest entries computed for the descriptors.
pub(crate) fn write_bag(bag: &Bag, destination: &Path) -> BagResult<ManifestSet> {
    fs::create_dir_all(destination.join(PAYLOAD_DIR))
        .map_err(|e| BagError::io(destination, e))?;

    if !same_location(&bag.root_dir, destination) {
        copy_local_files(bag, destination)?;
    }

    let mut descriptors: Vec<(String, Vec<u8>)> = Vec::new();
    descriptors.push((
        BAGIT_TXT.to_string(),
        text::render_declaration(&bag.version, &bag.encoding).into_bytes(),
    ));
    descriptors.push((
        BAG_INFO_TXT.to_string(),
        text::render_metadata(&bag.metadata).into_bytes(),
    ));
    for manifest in bag.payload_manifests.iter() {
        descriptors.push((
            ManifestClass::Payload.file_name(manifest.algorithm),
            text::render_manifest(manifest).into_bytes(),
        ));
    }

    let fetch_path = destination.join(FETCH_TXT);
    if bag.fetch_entries().is_empty() {
        if fetch_path.is_file() {
            fs::remove_file(&fetch_path).map_err(|e| BagError::io(&fetch_path, e))?;
        }
    } else {
        descriptors.push((
            FETCH_TXT.to_string(),
            text::render_fetch(bag.fetch_entries()).into_bytes(),
        ));
    }

    let mut tag_manifests = bag.tag_manifests.clone();
    let tag_algorithms = tag_manifests.algorithms();
    let mut descriptor_checksums = ManifestSet::for_algorithms(&tag_algorithms);
    for (name, content) in &descriptors {
        write_atomic(&destination.join(name), content)?;
        if !tag_algorithms.is_empty() {
            let digests = digest_all(Cursor::new(content), &tag_algorithms, name)?;
            let path = BagPath::new(name)?;
            tag_manifests.record_all(&path, &digests);
            descriptor_checksums.record_all(&path, &digests);
        }
    }

    for manifest in tag_manifests.iter() {
        let name = ManifestClass::Tag.file_name(manifest.algorithm);
        write_atomic(
            &destination.join(&name),
            text::render_manifest(manifest).as_bytes(),
        )?;
    }

    info!(
        destination = %destination.display(),
        payload_manifests = bag.payload_manifests.iter().count(),
        tag_manifests = tag_manifests.iter().count(),
        fetch_entries = bag.fetch_entries().len(),
        "wrote bag"
    );
    Ok(descriptor_checksums)
}
