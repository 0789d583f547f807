//! Checksum manifests.

use std::collections::{BTreeMap, BTreeSet};

use crate::bag::path::BagPath;
use crate::checksum::{Algorithm, DigestSet};

/// Which manifest family a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ManifestClass {
    /// `manifest-<alg>.txt`, covering `data/`.
    Payload,
    /// `tagmanifest-<alg>.txt`, covering tag files.
    Tag,
}

impl ManifestClass {
    pub fn file_name(self, algorithm: Algorithm) -> String {
        match self {
            Self::Payload => format!("manifest-{}.txt", algorithm.bagit_name()),
            Self::Tag => format!("tagmanifest-{}.txt", algorithm.bagit_name()),
        }
    }
}

impl std::fmt::Display for ManifestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payload => f.write_str("payload"),
            Self::Tag => f.write_str("tag"),
        }
    }
}

/// One checksum ledger for one algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub algorithm: Algorithm,
    pub entries: BTreeMap<BagPath, String>,
}

impl Manifest {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            entries: BTreeMap::new(),
        }
    }
}

/// The manifests of one class, one per algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSet {
    manifests: BTreeMap<Algorithm, Manifest>,
}

impl ManifestSet {
    pub fn for_algorithms<'a>(algorithms: impl IntoIterator<Item = &'a Algorithm>) -> Self {
        Self {
            manifests: algorithms
                .into_iter()
                .map(|a| (*a, Manifest::new(*a)))
                .collect(),
        }
    }

    pub fn algorithms(&self) -> BTreeSet<Algorithm> {
        self.manifests.keys().copied().collect()
    }

    pub fn get(&self, algorithm: Algorithm) -> Option<&Manifest> {
        self.manifests.get(&algorithm)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests.values()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Ensure a (possibly empty) manifest exists for `algorithm`.
    pub fn ensure(&mut self, algorithm: Algorithm) -> &mut Manifest {
        self.manifests
            .entry(algorithm)
            .or_insert_with(|| Manifest::new(algorithm))
    }

    /// Record `checksum` for `path` if a manifest for `algorithm` exists.
    pub fn record(&mut self, algorithm: Algorithm, path: &BagPath, checksum: &str) -> bool {
        match self.manifests.get_mut(&algorithm) {
            Some(m) => {
                m.entries.insert(path.clone(), checksum.to_ascii_lowercase());
                true
            }
            None => false,
        }
    }

    /// Record one entry per manifest from a digest set.
    pub fn record_all(&mut self, path: &BagPath, digests: &DigestSet) {
        for (algorithm, checksum) in digests {
            self.record(*algorithm, path, checksum);
        }
    }

    pub fn remove_path(&mut self, path: &BagPath) {
        for m in self.manifests.values_mut() {
            m.entries.remove(path);
        }
    }

    /// Every path listed by at least one manifest.
    pub fn paths(&self) -> BTreeSet<&BagPath> {
        self.manifests
            .values()
            .flat_map(|m| m.entries.keys())
            .collect()
    }

    /// Algorithms whose manifest has no entry for `path`.
    pub fn missing_for(&self, path: &BagPath) -> Vec<Algorithm> {
        self.manifests
            .values()
            .filter(|m| !m.entries.contains_key(path))
            .map(|m| m.algorithm)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_only_touches_existing_manifests() {
        let mut set = ManifestSet::for_algorithms(&[Algorithm::Md5]);
        let p = BagPath::new("data/a").unwrap();
        assert!(set.record(Algorithm::Md5, &p, "ABCDEF"));
        assert!(!set.record(Algorithm::Sha256, &p, "00"));
        assert_eq!(set.get(Algorithm::Md5).unwrap().entries[&p], "abcdef");
        assert!(set.get(Algorithm::Sha256).is_none());
    }

    #[test]
    fn missing_for_lists_gaps() {
        let mut set = ManifestSet::for_algorithms(&[Algorithm::Md5, Algorithm::Sha256]);
        let p = BagPath::new("data/a").unwrap();
        set.record(Algorithm::Md5, &p, "00");
        assert_eq!(set.missing_for(&p), vec![Algorithm::Sha256]);
        assert_eq!(set.paths().len(), 1);
    }

    #[test]
    fn file_names_follow_bagit_convention() {
        assert_eq!(
            ManifestClass::Payload.file_name(Algorithm::Sha256),
            "manifest-sha256.txt"
        );
        assert_eq!(ManifestClass::Tag.file_name(Algorithm::Md5), "tagmanifest-md5.txt");
    }
}
