//! In-memory model of one bag.
//!
//! The model does no I/O. It is mutated only by
//! [`BagBuilder`](crate::builder::BagBuilder), which owns it for the lifetime
//! of one construction.

pub mod fetch;
pub mod manifest;
pub mod metadata;
pub mod path;
pub mod size;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use fetch::FetchEntry;
pub use manifest::{Manifest, ManifestClass, ManifestSet};
pub use metadata::Metadata;
pub use path::{BagPath, PAYLOAD_DIR};
pub use size::display_size;

/// BagIt declaration version written to `bagit.txt`.
pub const BAGIT_VERSION: &str = "0.97";
/// Tag file character encoding written to `bagit.txt`.
pub const TAG_FILE_ENCODING: &str = "UTF-8";

/// Well-known `bag-info.txt` keys.
pub mod keys {
    pub const PROFILE_IDENTIFIER: &str = "BagIt-Profile-Identifier";
    pub const BAG_SIZE: &str = "Bag-Size";
    pub const EXTERNAL_IDENTIFIER: &str = "External-Identifier";
    pub const EXTERNAL_DESCRIPTION: &str = "External-Description";
    pub const BAGGING_DATE: &str = "Bagging-Date";
}

/// One bag: root location, metadata, manifests, fetch entries and sizes.
#[derive(Debug, Clone)]
pub struct Bag {
    pub root_dir: PathBuf,
    pub version: String,
    pub encoding: String,
    pub metadata: Metadata,
    pub payload_manifests: ManifestSet,
    pub tag_manifests: ManifestSet,
    /// Tag-manifest entries for the descriptor files as they are on disk.
    /// Every write to the root directory recomputes them.
    pub descriptor_checksums: ManifestSet,
    /// `None` when the profile forbids fetch entries.
    pub fetch_entries: Option<Vec<FetchEntry>>,
    /// Locally stored payload and tag files with the bytes counted for each.
    pub local_files: BTreeMap<BagPath, u64>,
    pub bag_size_bytes: u64,
    pub payload_size_bytes: u64,
}

impl Bag {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            version: BAGIT_VERSION.to_string(),
            encoding: TAG_FILE_ENCODING.to_string(),
            metadata: Metadata::new(),
            payload_manifests: ManifestSet::default(),
            tag_manifests: ManifestSet::default(),
            descriptor_checksums: ManifestSet::default(),
            fetch_entries: None,
            local_files: BTreeMap::new(),
            bag_size_bytes: 0,
            payload_size_bytes: 0,
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn manifests(&self, class: ManifestClass) -> &ManifestSet {
        match class {
            ManifestClass::Payload => &self.payload_manifests,
            ManifestClass::Tag => &self.tag_manifests,
        }
    }

    pub fn manifests_mut(&mut self, class: ManifestClass) -> &mut ManifestSet {
        match class {
            ManifestClass::Payload => &mut self.payload_manifests,
            ManifestClass::Tag => &mut self.tag_manifests,
        }
    }

    pub fn fetch_entries(&self) -> &[FetchEntry] {
        self.fetch_entries.as_deref().unwrap_or(&[])
    }

    pub fn is_fetch_destination(&self, path: &BagPath) -> bool {
        self.fetch_entries().iter().any(|e| &e.path == path)
    }

    /// Account for one locally stored file, replacing any earlier count for
    /// the same path.
    pub fn track_local_file(&mut self, class: ManifestClass, path: &BagPath, bytes: u64) {
        let previous = self.local_files.insert(path.clone(), bytes).unwrap_or(0);
        self.bag_size_bytes = self.bag_size_bytes.saturating_sub(previous) + bytes;
        if class == ManifestClass::Payload {
            self.payload_size_bytes = self.payload_size_bytes.saturating_sub(previous) + bytes;
        }
    }

    /// Refresh the derived `Bag-Size` field from `bag_size_bytes`.
    pub fn refresh_bag_size(&mut self) {
        self.metadata
            .replace(keys::BAG_SIZE, display_size(self.bag_size_bytes));
    }
}
