use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;

use tracing::{info, warn};

use crate::bag::{BagPath, ManifestClass, PAYLOAD_DIR};
use crate::checksum::{digest_all, same_digest, Algorithm};
use crate::error::{BagError, BagResult, VerifyFailure};
use crate::walk::collect_files;

use super::BagBuilder;

impl BagBuilder {
    /// Recompute every manifest checksum against the files on disk.
    ///
    /// Descriptor files are checked against the tag-manifest entries
    /// recorded by the last write or load.
    ///
    /// Fetch destinations that are not present locally cannot be verified.
    /// Unless `fetch_files_downloaded` is set, their presence makes the
    /// whole verification a no-op; when it is set, every absent fetch file
    /// is reported as missing.
    pub fn validate_checksums(&self, fetch_files_downloaded: bool) -> BagResult<()> {
        let bag = &self.bag;
        let root = &bag.root_dir;

        let pending = bag
            .fetch_entries()
            .iter()
            .filter(|e| !e.path.to_fs_path(root).is_file())
            .count();
        if pending > 0 && !fetch_files_downloaded {
            warn!(
                pending,
                "fetch files not downloaded, skipping checksum verification"
            );
            return Ok(());
        }

        let mut failures = Vec::new();
        for class in [ManifestClass::Payload, ManifestClass::Tag] {
            let descriptors = match class {
                ManifestClass::Payload => None,
                ManifestClass::Tag => Some(&bag.descriptor_checksums),
            };
            let manifests = bag
                .manifests(class)
                .iter()
                .chain(descriptors.into_iter().flat_map(|d| d.iter()));
            let mut expected: BTreeMap<&BagPath, Vec<(Algorithm, &str)>> = BTreeMap::new();
            for manifest in manifests {
                for (path, checksum) in &manifest.entries {
                    expected
                        .entry(path)
                        .or_default()
                        .push((manifest.algorithm, checksum.as_str()));
                }
            }

            for (path, sums) in expected {
                let fs_path = path.to_fs_path(root);
                let Ok(file) = File::open(&fs_path) else {
                    failures.push(VerifyFailure::MissingFile {
                        path: path.to_string(),
                    });
                    continue;
                };
                let algorithms: BTreeSet<Algorithm> = sums.iter().map(|(a, _)| *a).collect();
                let digests = digest_all(file, &algorithms, path.as_str())?;
                for (algorithm, expected) in sums {
                    let actual = digests.get(&algorithm).map(String::as_str).unwrap_or("");
                    if !same_digest(expected, actual) {
                        failures.push(VerifyFailure::Mismatch {
                            path: path.to_string(),
                            algorithm,
                            expected: expected.to_string(),
                            actual: actual.to_string(),
                        });
                    }
                }
            }
        }

        let listed = bag.payload_manifests.paths();
        let data_dir = root.join(PAYLOAD_DIR);
        let on_disk = collect_files(&data_dir).map_err(|e| BagError::io(&data_dir, e))?;
        for file in on_disk {
            match BagPath::relative_to(&file, root) {
                Some(path) if listed.contains(&path) => {}
                Some(path) => failures.push(VerifyFailure::NotInManifest {
                    path: path.to_string(),
                }),
                None => failures.push(VerifyFailure::NotInManifest {
                    path: file.display().to_string(),
                }),
            }
        }

        if failures.is_empty() {
            info!(root = %root.display(), "checksums verified");
            Ok(())
        } else {
            Err(BagError::VerificationFailed { failures })
        }
    }
}
