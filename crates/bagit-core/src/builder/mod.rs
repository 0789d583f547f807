//! Bag construction.
//!
//! A [`BagBuilder`] owns one [`Bag`] for the duration of one construction:
//!
//! 1. `create` (or `load`) binds the bag to a [`Profile`] and prepares one
//!    empty manifest per required algorithm and manifest class.
//! 2. Content is admitted by copy-in (`add_payload`, `add_tagfile`,
//!    `add_metadata_file`) or by reference (`add_fetch_item*`). Every
//!    checksum goes through [`digest_all`](crate::checksum::digest_all).
//! 3. Metadata is validated against the profile
//!    (`validate_and_apply_properties`), the bag structure is checked
//!    (`validate_profile_conformance`) and checksums are verified
//!    (`validate_checksums`).
//! 4. `write` serializes the descriptor files.
//!
//! Validation and writing may be repeated; both are idempotent. A builder
//! is not meant to be shared between threads while mutating; concurrent
//! builds each get their own builder and share the profile via `Arc`.

mod admit;
mod conformance;
mod verify;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bag::{keys, Bag, ManifestClass, ManifestSet};
use crate::checksum::Algorithm;
use crate::config::BagitConfig;
use crate::error::{BagError, BagResult};
use crate::profile::Profile;
use crate::serialize;
use crate::source::{RemoteSource, SourceOpener};

pub use admit::{ContentKind, METADATA_DIR};

/// Payload algorithm used when the profile does not require any.
pub const DEFAULT_PAYLOAD_ALGORITHM: Algorithm = Algorithm::Sha512;

/// Builds, validates and writes one bag against one profile.
#[derive(Debug)]
pub struct BagBuilder {
    bag: Bag,
    profile: Arc<Profile>,
    source: Arc<dyn RemoteSource>,
    /// Required manifests that were not on disk when the bag was loaded.
    absent_manifests: BTreeSet<(ManifestClass, Algorithm)>,
}

fn default_source(config: &BagitConfig) -> Arc<dyn RemoteSource> {
    Arc::new(SourceOpener::new(Duration::from_secs(
        config.http_timeout_secs,
    )))
}

impl BagBuilder {
    /// Start an empty bag at `root_dir` against `config.profile_url`.
    pub fn create(root_dir: impl Into<PathBuf>, config: &BagitConfig) -> BagResult<Self> {
        let source = default_source(config);
        let profile = Profile::load(&config.profile_url, source.as_ref())?;
        Ok(Self::with_profile(root_dir, Arc::new(profile), source))
    }

    /// Start an empty bag against an already loaded profile.
    pub fn with_profile(
        root_dir: impl Into<PathBuf>,
        profile: Arc<Profile>,
        source: Arc<dyn RemoteSource>,
    ) -> Self {
        let mut bag = Bag::new(root_dir);
        bag.payload_manifests = if profile.required_payload_algorithms.is_empty() {
            ManifestSet::for_algorithms(&[DEFAULT_PAYLOAD_ALGORITHM])
        } else {
            ManifestSet::for_algorithms(&profile.required_payload_algorithms)
        };
        bag.tag_manifests = ManifestSet::for_algorithms(&profile.required_tag_algorithms);
        bag.fetch_entries = profile.fetch_allowed.then(Vec::new);
        bag.metadata
            .add(keys::PROFILE_IDENTIFIER, profile.location.clone());

        info!(
            root = %bag.root_dir.display(),
            profile = %profile.location,
            "created bag"
        );
        Self {
            bag,
            profile,
            source,
            absent_manifests: BTreeSet::new(),
        }
    }

    /// Reopen the bag stored at `root_dir`.
    ///
    /// The profile is taken from the bag's `BagIt-Profile-Identifier`,
    /// falling back to `config.profile_url` when the bag does not name one.
    pub fn load(root_dir: impl Into<PathBuf>, config: &BagitConfig) -> BagResult<Self> {
        let root_dir = root_dir.into();
        let source = default_source(config);
        let bag = serialize::read_bag(&root_dir)?;
        let location = bag
            .metadata
            .first(keys::PROFILE_IDENTIFIER)
            .unwrap_or(&config.profile_url)
            .to_string();
        let profile = Profile::load(&location, source.as_ref())?;
        Ok(Self::from_bag(bag, Arc::new(profile), source))
    }

    /// Wrap a bag read from disk, adding manifests the profile requires but
    /// the bag lacks.
    ///
    /// Added manifests stay reported as missing by
    /// [`validate_profile_conformance`](Self::validate_profile_conformance)
    /// until the bag is written back to its root directory.
    pub fn from_bag(mut bag: Bag, profile: Arc<Profile>, source: Arc<dyn RemoteSource>) -> Self {
        let mut absent_manifests = BTreeSet::new();
        let required = [
            (ManifestClass::Payload, &profile.required_payload_algorithms),
            (ManifestClass::Tag, &profile.required_tag_algorithms),
        ];
        for (class, algorithms) in required {
            for algorithm in algorithms {
                let manifests = bag.manifests_mut(class);
                if manifests.get(*algorithm).is_none() {
                    absent_manifests.insert((class, *algorithm));
                    manifests.ensure(*algorithm);
                }
            }
        }
        if profile.required_payload_algorithms.is_empty() && bag.payload_manifests.is_empty() {
            bag.payload_manifests.ensure(DEFAULT_PAYLOAD_ALGORITHM);
        }
        if profile.fetch_allowed && bag.fetch_entries.is_none() {
            bag.fetch_entries = Some(Vec::new());
        }
        if !absent_manifests.is_empty() {
            warn!(
                root = %bag.root_dir.display(),
                missing = ?absent_manifests,
                "bag lacks required manifests"
            );
        }
        info!(
            root = %bag.root_dir.display(),
            profile = %profile.location,
            "loaded bag"
        );
        Self {
            bag,
            profile,
            source,
            absent_manifests,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn root_dir(&self) -> &Path {
        &self.bag.root_dir
    }

    /// Append a value under `key`; repeats are kept.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.bag.metadata.add(key, value);
        self
    }

    /// Drop any values under `key`, then append `value`.
    pub fn replace_metadata(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.bag.metadata.replace(key, value);
        self
    }

    /// Validate `properties` against the profile's `Bag-Info` requirements
    /// and apply them.
    ///
    /// Fields the profile declares are applied with replace semantics; all
    /// other properties are appended. Every declared field is checked before
    /// returning and all violations are reported together in
    /// [`BagError::MetadataRejected`]. Nothing is applied unless the whole
    /// set passes.
    pub fn validate_and_apply_properties(
        &mut self,
        properties: &BTreeMap<String, String>,
    ) -> BagResult<()> {
        let mut candidate = self.bag.metadata.clone();
        for (key, value) in properties {
            if self.profile.requirement(key).is_some() {
                candidate.replace(key.clone(), value.clone());
            } else {
                candidate.add(key.clone(), value.clone());
            }
        }

        let violations = conformance::metadata_violations(&self.profile, &candidate);
        if !violations.is_empty() {
            debug!(count = violations.len(), "metadata rejected");
            return Err(BagError::MetadataRejected { violations });
        }

        self.bag.metadata = candidate;
        info!(applied = properties.len(), "metadata validated and applied");
        Ok(())
    }

    pub fn required_payload_algorithms(&self) -> &BTreeSet<Algorithm> {
        &self.profile.required_payload_algorithms
    }

    pub fn required_tag_algorithms(&self) -> &BTreeSet<Algorithm> {
        &self.profile.required_tag_algorithms
    }

    /// Write the bag to its root directory.
    pub fn write(&mut self) -> BagResult<()> {
        let root = self.bag.root_dir.clone();
        self.write_to(&root)
    }

    /// Write the bag under `destination`, copying local content there when
    /// it differs from the root directory.
    pub fn write_to(&mut self, destination: &Path) -> BagResult<()> {
        let mut bag = self.bag.clone();
        bag.refresh_bag_size();
        let descriptor_checksums = serialize::write_bag(&bag, destination)?;
        if serialize::same_location(&self.bag.root_dir, destination) {
            self.bag.descriptor_checksums = descriptor_checksums;
            self.absent_manifests.clear();
        }
        Ok(())
    }

    /// Current bag state with `Bag-Size` refreshed.
    pub fn bag(&mut self) -> &Bag {
        self.bag.refresh_bag_size();
        &self.bag
    }

    /// Bytes of locally stored payload and tag files.
    pub fn bag_size(&self) -> u64 {
        self.bag.bag_size_bytes
    }

    /// Bytes of payload, including declared lengths of fetch entries.
    pub fn payload_size(&self) -> u64 {
        self.bag.payload_size_bytes
    }

    /// Consume the builder.
    pub fn into_bag(mut self) -> Bag {
        self.bag.refresh_bag_size();
        self.bag
    }
}
