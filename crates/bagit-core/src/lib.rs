//! BagIt bag assembly driven by BagIt profiles.
//!
//! This crate builds BagIt 0.97 bags, providing:
//!
//! - Profile loading (required manifest algorithms, `Bag-Info` rules, fetch policy)
//! - Single-pass multi-algorithm checksumming
//! - Copy-in admission of payload and tag files
//! - Reference-only admission of remote payload via `fetch.txt`
//! - Profile conformance and checksum verification
//! - Deterministic serialization and tar.gz packaging
//! - Collection assembly with guaranteed scratch cleanup
//!
//! # Quick Start
//!
//! ```no_run
//! use bagit_core::{BagBuilder, BagitConfig};
//! use std::collections::BTreeMap;
//!
//! # fn example() -> Result<(), bagit_core::BagError> {
//! let config = BagitConfig::from_env();
//! let mut builder = BagBuilder::create("/tmp/my-bag", &config)?;
//! builder.add_payload("/srv/export/report.pdf", Some("/srv/export".as_ref()), None)?;
//!
//! let mut properties = BTreeMap::new();
//! properties.insert("External-Identifier".to_string(), "report-1".to_string());
//! builder.validate_and_apply_properties(&properties)?;
//! builder.validate_profile_conformance()?;
//! builder.write()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `BAGIT_PROFILE_URL` | Profile location (default: RDA generic profile) |
//! | `BAGIT_SCRATCH_DIR` | Scratch directory for collection assembly |
//! | `BAGIT_HTTP_TIMEOUT` | Remote request timeout in seconds (default: 30) |
//! | `BAGIT_EXTERNAL_DESCRIPTION` | `External-Description` of collection bags |

pub mod archive;
pub mod bag;
pub mod builder;
pub mod checksum;
pub mod collection;
pub mod config;
pub mod error;
pub mod profile;
pub mod serialize;
pub mod source;
pub mod walk;

// Re-export main types
pub use archive::{ArchivePackager, TarGzPackager, TAR_GZ_MEDIA_TYPE};
pub use bag::{display_size, Bag, BagPath, FetchEntry, Manifest, ManifestClass, Metadata};
pub use builder::{BagBuilder, ContentKind};
pub use checksum::{digest_all, Algorithm, DigestSet};
pub use collection::{
    BufferedSink, CollectionError, CollectionProvider, ContentDescriptor, DeliverySink,
    ScratchSpace, StreamSink, TagDocument,
};
pub use config::{BagitConfig, DEFAULT_PROFILE_URL};
pub use error::{BagError, BagResult, ErrorClass, MetadataViolation, VerifyFailure};
pub use profile::{MetadataRequirement, Profile};
pub use source::{FileSource, HttpSource, RemoteSource, SourceOpener};
pub use walk::collect_files;
