use std::fs;
use std::path::Path;

use tracing::debug;
use url::Url;

use crate::bag::{Bag, BagPath, FetchEntry, ManifestClass, ManifestSet};
use crate::checksum::Algorithm;
use crate::error::{BagError, BagResult};

use super::text::{self, ParseError};
use super::{is_descriptor, BAGIT_TXT, BAG_INFO_TXT, FETCH_TXT};

fn read_text(path: &Path) -> BagResult<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| BagError::Serialization {
                path: path.to_path_buf(),
                message: "tag file is not valid UTF-8".to_string(),
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BagError::io(path, e)),
    }
}

fn parse_failed(path: &Path, err: ParseError) -> BagError {
    BagError::Serialization {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Recognize `manifest-<alg>.txt` and `tagmanifest-<alg>.txt`.
fn manifest_kind(file_name: &str) -> Option<(ManifestClass, &str)> {
    let stem = file_name.strip_suffix(".txt")?;
    if let Some(alg) = stem.strip_prefix("tagmanifest-") {
        Some((ManifestClass::Tag, alg))
    } else {
        stem.strip_prefix("manifest-")
            .map(|alg| (ManifestClass::Payload, alg))
    }
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Reconstruct the model of the bag stored at `root`.
///
/// Tag-manifest entries for descriptor files are kept apart in
/// `descriptor_checksums` so verification can check them while writes
/// recompute them.
pub(crate) fn read_bag(root: &Path) -> BagResult<Bag> {
    let declaration_path = root.join(BAGIT_TXT);
    let declaration = read_text(&declaration_path)?.ok_or_else(|| BagError::Serialization {
        path: declaration_path.clone(),
        message: "bag declaration is missing".to_string(),
    })?;
    let (version, encoding) =
        text::parse_declaration(&declaration).map_err(|e| parse_failed(&declaration_path, e))?;

    let mut bag = Bag::new(root);
    bag.version = version;
    bag.encoding = encoding;

    let info_path = root.join(BAG_INFO_TXT);
    if let Some(info) = read_text(&info_path)? {
        bag.metadata = text::parse_metadata(&info).map_err(|e| parse_failed(&info_path, e))?;
    }

    let mut manifest_files: Vec<(ManifestClass, Algorithm, std::path::PathBuf)> = Vec::new();
    let listing = fs::read_dir(root).map_err(|e| BagError::io(root, e))?;
    for entry in listing {
        let entry = entry.map_err(|e| BagError::io(root, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some((class, alg)) = manifest_kind(&name) {
            manifest_files.push((class, alg.parse()?, entry.path()));
        }
    }
    manifest_files.sort();

    bag.payload_manifests = ManifestSet::default();
    bag.tag_manifests = ManifestSet::default();
    for (class, algorithm, path) in manifest_files {
        let content = read_text(&path)?.unwrap_or_default();
        let lines = text::parse_manifest(&content).map_err(|e| parse_failed(&path, e))?;
        bag.manifests_mut(class).ensure(algorithm);
        if class == ManifestClass::Tag {
            bag.descriptor_checksums.ensure(algorithm);
        }
        for (checksum, raw_path) in lines {
            let bag_path = BagPath::new(&raw_path)?;
            let manifests = if class == ManifestClass::Tag && is_descriptor(bag_path.as_str()) {
                &mut bag.descriptor_checksums
            } else {
                bag.manifests_mut(class)
            };
            manifests.record(algorithm, &bag_path, &checksum);
        }
    }

    let fetch_path = root.join(FETCH_TXT);
    if let Some(fetch) = read_text(&fetch_path)? {
        let lines = text::parse_fetch(&fetch).map_err(|e| parse_failed(&fetch_path, e))?;
        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            let url = Url::parse(&line.url).map_err(|e| BagError::Serialization {
                path: fetch_path.clone(),
                message: format!("invalid URL {:?}: {}", line.url, e),
            })?;
            entries.push(FetchEntry {
                url,
                length: line.length,
                path: BagPath::new(&line.path)?,
            });
        }
        bag.fetch_entries = Some(entries);
    }

    let mut local: Vec<(ManifestClass, BagPath, u64)> = Vec::new();
    for class in [ManifestClass::Payload, ManifestClass::Tag] {
        for path in bag.manifests(class).paths() {
            let fs_path = path.to_fs_path(root);
            if !bag.is_fetch_destination(path) && fs_path.is_file() {
                local.push((class, path.clone(), file_len(&fs_path)));
            }
        }
    }
    for (class, path, len) in local {
        bag.track_local_file(class, &path, len);
    }
    let fetch_bytes: u64 = bag
        .fetch_entries()
        .iter()
        .map(FetchEntry::declared_length)
        .sum();
    bag.payload_size_bytes += fetch_bytes;

    debug!(
        root = %root.display(),
        payload_files = bag.payload_manifests.paths().len(),
        tag_files = bag.tag_manifests.paths().len(),
        "read bag from disk"
    );
    Ok(bag)
}
