use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::bag::{BagPath, FetchEntry, ManifestClass, PAYLOAD_DIR};
use crate::checksum::{digest_all, Algorithm};
use crate::error::{BagError, BagResult};
use crate::serialize::is_descriptor;

use super::BagBuilder;

/// Directory that holds descriptive metadata documents.
pub const METADATA_DIR: &str = "metadata";

/// Where admitted content lands and which manifests cover it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Below `data/`, covered by payload manifests.
    Payload,
    /// Below the bag root, covered by tag manifests.
    TagFile,
    /// Below `metadata/`, covered by tag manifests.
    Metadata,
}

impl ContentKind {
    pub fn manifest_class(self) -> ManifestClass {
        match self {
            Self::Payload => ManifestClass::Payload,
            Self::TagFile | Self::Metadata => ManifestClass::Tag,
        }
    }

    /// Place a path relative to this kind's directory into the bag.
    fn place(self, relative: &str) -> BagResult<BagPath> {
        match self {
            Self::Payload => BagPath::payload(relative),
            Self::Metadata => BagPath::new(&format!("{}/{}", METADATA_DIR, relative)),
            Self::TagFile => BagPath::new(relative),
        }
    }

    /// Reject in-bag paths that belong to the other manifest class or to a
    /// file the writer owns.
    fn check(self, path: &BagPath) -> BagResult<()> {
        let reason = match self {
            Self::Payload if !path.is_payload() => {
                Some(format!("payload must be located below {}/", PAYLOAD_DIR))
            }
            Self::TagFile | Self::Metadata if path.is_payload() => {
                Some(format!("tag files must not be located below {}/", PAYLOAD_DIR))
            }
            Self::TagFile | Self::Metadata if is_descriptor(path.as_str()) => {
                Some("name is reserved for a bag descriptor".to_string())
            }
            _ => None,
        };
        match reason {
            Some(reason) => Err(BagError::InvalidPath {
                path: path.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn check_readable(source: &Path) -> BagResult<()> {
    let unreadable = |message: String| BagError::SourceUnreadable {
        path: source.to_path_buf(),
        message,
    };
    let meta = fs::metadata(source).map_err(|e| unreadable(e.to_string()))?;
    if !meta.is_file() {
        return Err(unreadable("not a regular file".to_string()));
    }
    File::open(source).map_err(|e| unreadable(e.to_string()))?;
    Ok(())
}

impl BagBuilder {
    /// Copy a payload file into `data/`.
    ///
    /// With `in_bag` set the file lands at `data/<in_bag>`; otherwise at its
    /// path relative to `root`. With neither, `source` must already be
    /// located below the bag's `data/` directory and is admitted in place.
    pub fn add_payload(
        &mut self,
        source: impl AsRef<Path>,
        root: Option<&Path>,
        in_bag: Option<&str>,
    ) -> BagResult<BagPath> {
        self.admit(ContentKind::Payload, source.as_ref(), root, in_bag)
    }

    /// Copy a tag file below the bag root. Placement rules as for
    /// [`add_payload`](Self::add_payload).
    pub fn add_tagfile(
        &mut self,
        source: impl AsRef<Path>,
        root: Option<&Path>,
        in_bag: Option<&str>,
    ) -> BagResult<BagPath> {
        self.admit(ContentKind::TagFile, source.as_ref(), root, in_bag)
    }

    /// Copy a descriptive metadata document below `metadata/`.
    pub fn add_metadata_file(
        &mut self,
        source: impl AsRef<Path>,
        root: Option<&Path>,
        in_bag: Option<&str>,
    ) -> BagResult<BagPath> {
        self.admit(ContentKind::Metadata, source.as_ref(), root, in_bag)
    }

    /// Copy-in admission shared by all content kinds.
    pub fn admit(
        &mut self,
        kind: ContentKind,
        source: &Path,
        root: Option<&Path>,
        in_bag: Option<&str>,
    ) -> BagResult<BagPath> {
        check_readable(source)?;
        let source_abs = absolute(source);
        let bag_root = absolute(&self.bag.root_dir);

        let path = match (in_bag, root) {
            (Some(in_bag), _) => kind.place(in_bag)?,
            (None, Some(root)) => {
                let relative = BagPath::relative_to(&source_abs, &absolute(root)).ok_or_else(
                    || BagError::PathNotRelative {
                        path: source.to_path_buf(),
                        root: root.to_path_buf(),
                    },
                )?;
                kind.place(relative.as_str())?
            }
            (None, None) => BagPath::relative_to(&source_abs, &bag_root).ok_or_else(|| {
                BagError::PathNotRelative {
                    path: source.to_path_buf(),
                    root: self.bag.root_dir.clone(),
                }
            })?,
        };
        kind.check(&path)?;

        let class = kind.manifest_class();
        let destination = path.to_fs_path(&self.bag.root_dir);
        let in_place = absolute(&destination) == source_abs;

        if !in_place {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| BagError::io(parent, e))?;
            }
            fs::copy(source, &destination).map_err(|e| BagError::io(&destination, e))?;
        }

        let file = File::open(&destination).map_err(|e| BagError::io(&destination, e))?;
        let len = file
            .metadata()
            .map_err(|e| BagError::io(&destination, e))?
            .len();
        let algorithms = self.bag.manifests(class).algorithms();
        let digests = digest_all(file, &algorithms, path.as_str())?;

        if class == ManifestClass::Payload && self.drop_fetch_entry(&path) {
            self.bag.payload_manifests.remove_path(&path);
            debug!(path = %path, "local file replaces fetch entry");
        }
        self.bag.manifests_mut(class).record_all(&path, &digests);
        self.bag.track_local_file(class, &path, len);

        debug!(
            path = %path,
            kind = ?kind,
            bytes = len,
            copied = !in_place,
            "admitted file"
        );
        Ok(path)
    }

    fn fetch_list(&mut self) -> BagResult<&mut Vec<FetchEntry>> {
        let profile = &self.profile.location;
        self.bag
            .fetch_entries
            .as_mut()
            .ok_or_else(|| BagError::FetchNotAllowed {
                profile: profile.clone(),
            })
    }

    /// Remove any fetch entry for `path` along with its declared length.
    fn drop_fetch_entry(&mut self, path: &BagPath) -> bool {
        let Some(list) = self.bag.fetch_entries.as_mut() else {
            return false;
        };
        let mut removed = 0;
        let before = list.len();
        list.retain(|e| {
            if &e.path == path {
                removed += e.declared_length();
                false
            } else {
                true
            }
        });
        let dropped = list.len() != before;
        self.bag.payload_size_bytes = self.bag.payload_size_bytes.saturating_sub(removed);
        dropped
    }

    /// Register a fetch entry, replacing any earlier entry for the same path.
    fn push_fetch_entry(&mut self, entry: FetchEntry) -> BagResult<()> {
        self.drop_fetch_entry(&entry.path);
        let length = entry.declared_length();
        self.fetch_list()?.push(entry);
        self.bag.payload_size_bytes += length;
        Ok(())
    }

    /// Fail when `entry` would reference a path already stored locally.
    fn check_fetch_target(&mut self, entry: &FetchEntry) -> BagResult<()> {
        self.fetch_list()?;
        if self.bag.local_files.contains_key(&entry.path) {
            return Err(BagError::InvalidPath {
                path: entry.path.to_string(),
                reason: "path already holds a locally stored file".to_string(),
            });
        }
        Ok(())
    }

    /// Reference remote payload by URL.
    ///
    /// The content is read once from its URL to compute every payload
    /// checksum; it is never stored in the bag.
    pub fn add_fetch_item(&mut self, entry: FetchEntry) -> BagResult<()> {
        self.check_fetch_target(&entry)?;
        let reader = self
            .source
            .open(&entry.url)
            .map_err(|e| BagError::SourceUnreadable {
                path: PathBuf::from(entry.url.as_str()),
                message: e.to_string(),
            })?;
        let algorithms = self.bag.payload_manifests.algorithms();
        let digests = digest_all(reader, &algorithms, entry.url.as_str())?;

        self.bag.payload_manifests.remove_path(&entry.path);
        self.bag.payload_manifests.record_all(&entry.path, &digests);
        debug!(url = %entry.url, path = %entry.path, "admitted fetch entry");
        self.push_fetch_entry(entry)
    }

    /// Reference remote payload by URL with caller-supplied checksums.
    ///
    /// Only manifests whose algorithm appears in `checksums` receive an
    /// entry. Gaps are reported by
    /// [`validate_profile_conformance`](Self::validate_profile_conformance).
    pub fn add_fetch_item_with_checksums(
        &mut self,
        entry: FetchEntry,
        checksums: &BTreeMap<Algorithm, String>,
    ) -> BagResult<()> {
        self.check_fetch_target(&entry)?;
        self.bag.payload_manifests.remove_path(&entry.path);
        for algorithm in self.bag.payload_manifests.algorithms() {
            if let Some(checksum) = checksums.get(&algorithm) {
                self.bag
                    .payload_manifests
                    .record(algorithm, &entry.path, checksum);
            }
        }
        let missing = self.bag.payload_manifests.missing_for(&entry.path);
        if !missing.is_empty() {
            warn!(
                path = %entry.path,
                missing = ?missing,
                "fetch entry lacks checksums for required algorithms"
            );
        }
        debug!(url = %entry.url, path = %entry.path, "admitted fetch entry");
        self.push_fetch_entry(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{builder, profile_with};
    use super::*;
    use url::Url;

    const SHA256_TEN: &str = "c775e7b757ede630cd0aa1113bd102661ab38829ca52a6422ab782862f268646";

    #[test]
    fn payload_is_copied_and_checksummed() {
        let src = tempfile::tempdir().unwrap();
        let bag_dir = tempfile::tempdir().unwrap();
        fs::write(src.path().join("ten.bin"), b"1234567890").unwrap();

        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Sha256], &[], false, vec![]));
        let path = b
            .add_payload(src.path().join("ten.bin"), Some(src.path()), None)
            .unwrap();
        assert_eq!(path.as_str(), "data/ten.bin");
        assert_eq!(
            fs::read(bag_dir.path().join("data/ten.bin")).unwrap(),
            b"1234567890"
        );
        let manifest = b.bag().payload_manifests.get(Algorithm::Sha256).unwrap().clone();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[&path], SHA256_TEN);
        assert_eq!(b.bag_size(), 10);
        assert_eq!(b.payload_size(), 10);
    }

    #[test]
    fn override_path_wins_over_root() {
        let src = tempfile::tempdir().unwrap();
        let bag_dir = tempfile::tempdir().unwrap();
        fs::write(src.path().join("x.txt"), b"x").unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Md5], &[], false, vec![]));
        let path = b
            .add_payload(src.path().join("x.txt"), None, Some("nested/y.txt"))
            .unwrap();
        assert_eq!(path.as_str(), "data/nested/y.txt");
        assert!(bag_dir.path().join("data/nested/y.txt").is_file());
    }

    #[test]
    fn source_outside_root_is_rejected() {
        let src = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let bag_dir = tempfile::tempdir().unwrap();
        fs::write(src.path().join("x.txt"), b"x").unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Md5], &[], false, vec![]));
        let err = b
            .add_payload(src.path().join("x.txt"), Some(other.path()), None)
            .unwrap_err();
        assert!(matches!(err, BagError::PathNotRelative { .. }));
        assert_eq!(b.bag_size(), 0);
    }

    #[test]
    fn unreadable_source_is_rejected() {
        let bag_dir = tempfile::tempdir().unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Md5], &[], false, vec![]));
        let err = b
            .add_payload(bag_dir.path().join("missing.bin"), None, Some("m.bin"))
            .unwrap_err();
        assert!(matches!(err, BagError::SourceUnreadable { .. }));
        let err = b.add_payload(bag_dir.path(), None, Some("dir")).unwrap_err();
        assert!(matches!(err, BagError::SourceUnreadable { .. }));
    }

    #[test]
    fn file_inside_bag_is_admitted_in_place() {
        let bag_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(bag_dir.path().join("data")).unwrap();
        fs::write(bag_dir.path().join("data/in.txt"), b"abc").unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Md5], &[], false, vec![]));
        let path = b
            .add_payload(bag_dir.path().join("data/in.txt"), None, None)
            .unwrap();
        assert_eq!(path.as_str(), "data/in.txt");
        assert_eq!(
            b.bag().payload_manifests.get(Algorithm::Md5).unwrap().entries[&path],
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn tag_files_go_to_tag_manifests() {
        let src = tempfile::tempdir().unwrap();
        let bag_dir = tempfile::tempdir().unwrap();
        fs::write(src.path().join("datacite.xml"), b"<resource/>").unwrap();
        let mut b = builder(
            bag_dir.path(),
            profile_with(&[Algorithm::Md5], &[Algorithm::Sha1], false, vec![]),
        );
        let path = b
            .add_metadata_file(src.path().join("datacite.xml"), Some(src.path()), None)
            .unwrap();
        assert_eq!(path.as_str(), "metadata/datacite.xml");
        let bag = b.bag();
        assert!(bag.payload_manifests.paths().is_empty());
        assert!(bag.tag_manifests.get(Algorithm::Sha1).unwrap().entries.contains_key(&path));
        assert_eq!(bag.bag_size_bytes, 11);
        assert_eq!(bag.payload_size_bytes, 0);
    }

    #[test]
    fn tag_files_cannot_shadow_descriptors_or_payload() {
        let src = tempfile::tempdir().unwrap();
        let bag_dir = tempfile::tempdir().unwrap();
        fs::write(src.path().join("x"), b"x").unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[], &[Algorithm::Md5], false, vec![]));
        let err = b
            .add_tagfile(src.path().join("x"), None, Some("bagit.txt"))
            .unwrap_err();
        assert!(matches!(err, BagError::InvalidPath { .. }));
        let err = b
            .add_tagfile(src.path().join("x"), None, Some("data/x"))
            .unwrap_err();
        assert!(matches!(err, BagError::InvalidPath { .. }));
    }

    #[test]
    fn readmission_keeps_sizes_exact() {
        let src = tempfile::tempdir().unwrap();
        let bag_dir = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a"), b"12345").unwrap();
        fs::write(src.path().join("b"), b"12").unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Md5], &[], false, vec![]));
        b.add_payload(src.path().join("a"), None, Some("f")).unwrap();
        b.add_payload(src.path().join("b"), None, Some("f")).unwrap();
        assert_eq!(b.bag_size(), 2);
        assert_eq!(b.payload_size(), 2);
    }

    #[test]
    fn fetch_is_rejected_when_profile_forbids_it() {
        let bag_dir = tempfile::tempdir().unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Md5], &[], false, vec![]));
        let entry = FetchEntry::new(Url::parse("https://example.org/a").unwrap(), 3, "a").unwrap();
        let err = b.add_fetch_item(entry.clone()).unwrap_err();
        assert!(matches!(err, BagError::FetchNotAllowed { .. }));
        let err = b
            .add_fetch_item_with_checksums(entry, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, BagError::FetchNotAllowed { .. }));
        assert_eq!(b.payload_size(), 0);
    }

    #[test]
    fn fetch_item_is_digested_from_its_url() {
        let remote = tempfile::tempdir().unwrap();
        let bag_dir = tempfile::tempdir().unwrap();
        fs::write(remote.path().join("r.bin"), b"1234567890").unwrap();
        let url = Url::from_file_path(remote.path().join("r.bin")).unwrap();

        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Sha256], &[], true, vec![]));
        b.add_fetch_item(FetchEntry::new(url, 10, "r.bin").unwrap())
            .unwrap();
        let bag = b.bag();
        let path = BagPath::new("data/r.bin").unwrap();
        assert_eq!(
            bag.payload_manifests.get(Algorithm::Sha256).unwrap().entries[&path],
            SHA256_TEN
        );
        assert_eq!(bag.fetch_entries().len(), 1);
        assert_eq!(bag.payload_size_bytes, 10);
        assert_eq!(bag.bag_size_bytes, 0);
        assert!(!bag_dir.path().join("data/r.bin").exists());
    }

    #[test]
    fn unreachable_fetch_url_leaves_bag_untouched() {
        let bag_dir = tempfile::tempdir().unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Md5], &[], true, vec![]));
        let url = Url::from_file_path(bag_dir.path().join("absent")).unwrap();
        let err = b.add_fetch_item(FetchEntry::new(url, 7, "absent").unwrap()).unwrap_err();
        assert!(matches!(err, BagError::SourceUnreadable { .. }));
        assert!(b.bag().fetch_entries().is_empty());
        assert_eq!(b.payload_size(), 0);
    }

    #[test]
    fn precomputed_checksums_fill_matching_manifests_only() {
        let bag_dir = tempfile::tempdir().unwrap();
        let mut b = builder(
            bag_dir.path(),
            profile_with(&[Algorithm::Md5, Algorithm::Sha256], &[], true, vec![]),
        );
        let entry =
            FetchEntry::new(Url::parse("https://example.org/big").unwrap(), 1024, "big").unwrap();
        let checksums = BTreeMap::from([(Algorithm::Md5, "AABB".to_string())]);
        b.add_fetch_item_with_checksums(entry.clone(), &checksums)
            .unwrap();
        let bag = b.bag();
        assert_eq!(bag.payload_manifests.get(Algorithm::Md5).unwrap().entries[&entry.path], "aabb");
        assert!(!bag
            .payload_manifests
            .get(Algorithm::Sha256)
            .unwrap()
            .entries
            .contains_key(&entry.path));
        assert_eq!(bag.payload_size_bytes, 1024);
    }

    #[test]
    fn re_adding_a_fetch_destination_replaces_it() {
        let bag_dir = tempfile::tempdir().unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Md5], &[], true, vec![]));
        let sums = BTreeMap::from([(Algorithm::Md5, "00".to_string())]);
        let first = FetchEntry::new(Url::parse("https://a.example/x").unwrap(), 5, "x").unwrap();
        let second = FetchEntry::new(Url::parse("https://b.example/x").unwrap(), 8, "x").unwrap();
        b.add_fetch_item_with_checksums(first, &sums).unwrap();
        b.add_fetch_item_with_checksums(second, &sums).unwrap();
        assert_eq!(b.payload_size(), 8);
        assert_eq!(b.bag().fetch_entries()[0].url.host_str(), Some("b.example"));
    }

    #[test]
    fn local_file_replaces_fetch_entry() {
        let src = tempfile::tempdir().unwrap();
        let bag_dir = tempfile::tempdir().unwrap();
        fs::write(src.path().join("x"), b"abc").unwrap();
        let mut b = builder(
            bag_dir.path(),
            profile_with(&[Algorithm::Md5, Algorithm::Sha1], &[], true, vec![]),
        );
        let entry = FetchEntry::new(Url::parse("https://a.example/x").unwrap(), 100, "x").unwrap();
        let sums = BTreeMap::from([(Algorithm::Md5, "00".to_string())]);
        b.add_fetch_item_with_checksums(entry, &sums).unwrap();
        assert_eq!(b.payload_size(), 100);

        let path = b.add_payload(src.path().join("x"), None, Some("x")).unwrap();
        let bag = b.bag();
        assert!(bag.fetch_entries().is_empty());
        assert_eq!(bag.payload_size_bytes, 3);
        assert_eq!(bag.bag_size_bytes, 3);
        assert_eq!(
            bag.payload_manifests.get(Algorithm::Md5).unwrap().entries[&path],
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert!(bag.payload_manifests.missing_for(&path).is_empty());
        b.validate_checksums(false).unwrap();
    }

    #[test]
    fn fetch_entry_cannot_shadow_local_file() {
        let src = tempfile::tempdir().unwrap();
        let bag_dir = tempfile::tempdir().unwrap();
        fs::write(src.path().join("x"), b"abc").unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[Algorithm::Md5], &[], true, vec![]));
        let path = b.add_payload(src.path().join("x"), None, Some("x")).unwrap();

        let entry = FetchEntry::new(Url::parse("https://a.example/x").unwrap(), 100, "x").unwrap();
        let sums = BTreeMap::from([(Algorithm::Md5, "00".to_string())]);
        let err = b
            .add_fetch_item_with_checksums(entry.clone(), &sums)
            .unwrap_err();
        assert!(matches!(err, BagError::InvalidPath { .. }));
        let err = b.add_fetch_item(entry).unwrap_err();
        assert!(matches!(err, BagError::InvalidPath { .. }));

        let bag = b.bag();
        assert!(bag.fetch_entries().is_empty());
        assert_eq!(bag.payload_size_bytes, 3);
        assert_eq!(
            bag.payload_manifests.get(Algorithm::Md5).unwrap().entries[&path],
            "900150983cd24fb0d6963f7d28e17f72"
        );
        b.validate_checksums(false).unwrap();
    }

    #[test]
    fn profile_without_manifest_requirements_uses_sha512() {
        let src = tempfile::tempdir().unwrap();
        let bag_dir = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a"), b"12345").unwrap();
        let mut b = builder(bag_dir.path(), profile_with(&[], &[], false, vec![]));
        b.add_payload(src.path().join("a"), None, Some("f")).unwrap();
        let path = b.add_payload(src.path().join("a"), None, Some("f")).unwrap();

        assert_eq!(b.bag_size(), 5);
        assert_eq!(b.payload_size(), 5);
        let manifest = b.bag().payload_manifests.get(Algorithm::Sha512).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert!(manifest.entries.contains_key(&path));
        b.validate_checksums(false).unwrap();
        b.write().unwrap();
        assert!(bag_dir.path().join("manifest-sha512.txt").is_file());
    }
}
