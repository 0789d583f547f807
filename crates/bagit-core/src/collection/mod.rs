//! Collection assembly.
//!
//! Turns a list of remote content descriptors plus descriptive metadata
//! documents into one packaged bag and streams it to a [`DeliverySink`].
//! Content is referenced through `fetch.txt`, never copied. Every request
//! runs in its own [`ScratchSpace`], which is removed on every exit path.
//!
//! Callers only ever see [`CollectionError`]; the underlying cause is logged.

mod scratch;
mod sink;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use url::Url;

use crate::archive::{ArchivePackager, TarGzPackager};
use crate::bag::{keys, BagPath, FetchEntry};
use crate::builder::BagBuilder;
use crate::checksum::Algorithm;
use crate::config::BagitConfig;
use crate::error::BagResult;
use crate::profile::Profile;
use crate::source::{RemoteSource, SourceOpener};

pub use scratch::ScratchSpace;
pub use sink::{BufferedSink, DeliverySink, StreamSink, STATUS_OK};

/// One remote content item of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// Where the content can be read now; probed before assembly starts.
    pub content_url: Url,
    /// What `fetch.txt` points receivers at.
    pub fetch_url: Url,
    /// Destination below `data/`.
    pub relative_path: String,
    pub declared_length: u64,
    pub declared_checksum: (Algorithm, String),
}

impl ContentDescriptor {
    /// Descriptor whose content and fetch URLs coincide.
    pub fn new(
        url: Url,
        relative_path: impl Into<String>,
        declared_length: u64,
        algorithm: Algorithm,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            content_url: url.clone(),
            fetch_url: url,
            relative_path: relative_path.into(),
            declared_length,
            declared_checksum: (algorithm, checksum.into()),
        }
    }

    pub fn with_fetch_url(mut self, fetch_url: Url) -> Self {
        self.fetch_url = fetch_url;
        self
    }
}

/// A descriptive metadata document embedded verbatim as a tag file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDocument {
    /// Bag-relative path, e.g. `metadata/datacite.xml`.
    pub path: String,
    pub content: Vec<u8>,
}

impl TagDocument {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Failure signal at the collection boundary.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    /// Validation, assembly or packaging failed.
    #[error("failed to create BagIt package")]
    ConstructionFailed,
    /// The archive was built but could not be streamed out.
    #[error("failed to deliver BagIt package")]
    DeliveryFailed,
}

/// Assembles and delivers bags for collections of remote content.
///
/// One provider serves any number of concurrent requests; the profile is
/// loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct CollectionProvider {
    config: BagitConfig,
    profile: Arc<Profile>,
    source: Arc<dyn RemoteSource>,
    packager: Arc<dyn ArchivePackager>,
}

impl CollectionProvider {
    /// Load the configured profile and use the bundled source and packager.
    pub fn new(config: BagitConfig) -> BagResult<Self> {
        let source: Arc<dyn RemoteSource> = Arc::new(SourceOpener::new(Duration::from_secs(
            config.http_timeout_secs,
        )));
        let profile = Arc::new(Profile::load(&config.profile_url, source.as_ref())?);
        Ok(Self::with_parts(
            config,
            profile,
            source,
            Arc::new(TarGzPackager),
        ))
    }

    pub fn with_parts(
        config: BagitConfig,
        profile: Arc<Profile>,
        source: Arc<dyn RemoteSource>,
        packager: Arc<dyn ArchivePackager>,
    ) -> Self {
        Self {
            config,
            profile,
            source,
            packager,
        }
    }

    /// Media type of delivered archives.
    pub fn media_type(&self) -> &str {
        self.packager.media_type()
    }

    pub fn supports_media_type(&self, media_type: &str) -> bool {
        media_type.eq_ignore_ascii_case(self.media_type())
    }

    /// URL schemes content descriptors may use.
    pub fn can_provide(scheme: &str) -> bool {
        matches!(scheme, "http" | "https" | "file")
    }

    /// Build the bag for `resource_id` and stream the packaged archive.
    ///
    /// Every descriptor's content is probed before anything is created. The
    /// scratch directory and archive are removed before returning.
    pub fn provide(
        &self,
        resource_id: &str,
        descriptors: &[ContentDescriptor],
        documents: &[TagDocument],
        sink: &mut dyn DeliverySink,
    ) -> Result<(), CollectionError> {
        if let Err(e) = self.check_collection(resource_id, descriptors) {
            error!(resource = resource_id, error = ?e, "collection rejected");
            return Err(CollectionError::ConstructionFailed);
        }

        let scratch =
            ScratchSpace::allocate(&self.config.scratch_dir, resource_id, self.packager.extension())
                .map_err(|e| {
                    error!(
                        resource = resource_id,
                        scratch_dir = %self.config.scratch_dir.display(),
                        error = %e,
                        "failed to allocate scratch space"
                    );
                    CollectionError::ConstructionFailed
                })?;

        if let Err(e) = self.assemble(resource_id, descriptors, documents, &scratch) {
            error!(
                resource = resource_id,
                root = %scratch.root().display(),
                error = ?e,
                "failed to create bag"
            );
            return Err(CollectionError::ConstructionFailed);
        }

        if let Err(e) = self.deliver(&scratch, sink) {
            error!(resource = resource_id, error = %e, "failed to deliver bag");
            return Err(CollectionError::DeliveryFailed);
        }

        info!(
            resource = resource_id,
            items = descriptors.len(),
            documents = documents.len(),
            "delivered bag"
        );
        Ok(())
    }

    fn check_collection(&self, resource_id: &str, descriptors: &[ContentDescriptor]) -> Result<()> {
        let id_path = BagPath::new(resource_id).context("invalid resource identifier")?;
        anyhow::ensure!(
            !id_path.as_str().contains('/'),
            "resource identifier {:?} must be a single path segment",
            resource_id
        );

        for d in descriptors {
            anyhow::ensure!(
                Self::can_provide(d.content_url.scheme()),
                "unsupported URL scheme for {}",
                d.content_url
            );
            self.source
                .probe(&d.content_url)
                .with_context(|| {
                    format!(
                        "failed to locate/read content at relative path {} with URL {}",
                        d.relative_path, d.content_url
                    )
                })?;
        }
        Ok(())
    }

    fn assemble(
        &self,
        resource_id: &str,
        descriptors: &[ContentDescriptor],
        documents: &[TagDocument],
        scratch: &ScratchSpace,
    ) -> Result<()> {
        let mut builder =
            BagBuilder::with_profile(scratch.root(), self.profile.clone(), self.source.clone());

        for d in descriptors {
            let entry = FetchEntry::new(d.fetch_url.clone(), d.declared_length, &d.relative_path)?;
            let (algorithm, checksum) = &d.declared_checksum;
            let checksums = BTreeMap::from([(*algorithm, checksum.clone())]);
            builder.add_fetch_item_with_checksums(entry, &checksums)?;
        }

        for doc in documents {
            let path = BagPath::new(&doc.path)?;
            let destination = path.to_fs_path(scratch.root());
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::write(&destination, &doc.content)
                .with_context(|| format!("write {}", destination.display()))?;
            builder.add_tagfile(&destination, None, None)?;
        }

        let bagging_date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        builder
            .add_metadata(keys::EXTERNAL_IDENTIFIER, resource_id)
            .add_metadata(keys::BAGGING_DATE, bagging_date)
            .add_metadata(
                keys::EXTERNAL_DESCRIPTION,
                self.config.external_description.clone(),
            );

        builder.validate_profile_conformance()?;
        builder.write()?;

        self.packager
            .package(scratch.root(), scratch.archive())
            .context("package bag")?;
        Ok(())
    }

    fn deliver(&self, scratch: &ScratchSpace, sink: &mut dyn DeliverySink) -> io::Result<()> {
        let mut archive = File::open(scratch.archive())?;
        sink.start(self.media_type(), STATUS_OK)?;
        io::copy(&mut archive, sink)?;
        sink.flush()
    }
}
