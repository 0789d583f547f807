//! BagIt profile model.
//!
//! A profile is the policy a bag must satisfy: which checksum algorithms its
//! payload and tag manifests use, which `bag-info.txt` fields are mandatory
//! (and which values they may take), and whether `fetch.txt` is permitted.
//!
//! # Document shape
//!
//! ```json
//! {
//!   "BagIt-Profile-Info": { "BagIt-Profile-Identifier": "https://example.org/p.json" },
//!   "Bag-Info": {
//!     "External-Identifier": { "required": true },
//!     "Access": { "required": false, "values": ["open", "closed"], "repeatable": false }
//!   },
//!   "Manifests-Required": ["sha256"],
//!   "Tag-Manifests-Required": ["sha256"],
//!   "Allow-Fetch.txt": true,
//!   "Tag-Files-Required": ["metadata/datacite.xml"],
//!   "Accept-BagIt-Version": ["0.97", "1.0"]
//! }
//! ```

use std::collections::BTreeSet;
use std::io::Read;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::checksum::Algorithm;
use crate::error::{BagError, BagResult};
use crate::source::{parse_location, RemoteSource};

/// Requirement attached to one `bag-info.txt` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequirement {
    pub required: bool,
    /// `None` means any value is acceptable.
    pub acceptable_values: Option<Vec<String>>,
    pub repeatable: bool,
}

impl MetadataRequirement {
    pub fn accepts(&self, value: &str) -> bool {
        match &self.acceptable_values {
            Some(values) if !values.is_empty() => values.iter().any(|v| v == value),
            _ => true,
        }
    }

    pub fn restricts_values(&self) -> bool {
        self.acceptable_values
            .as_ref()
            .is_some_and(|values| !values.is_empty())
    }
}

/// Loaded, immutable profile. Share it as `Arc<Profile>` across builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Where the profile was loaded from; written into bag metadata.
    pub location: String,
    pub identifier: Option<String>,
    pub required_payload_algorithms: BTreeSet<Algorithm>,
    pub required_tag_algorithms: BTreeSet<Algorithm>,
    pub fetch_allowed: bool,
    /// Declaration order is preserved.
    pub metadata_requirements: Vec<(String, MetadataRequirement)>,
    pub tag_files_required: Vec<String>,
    pub accept_bagit_versions: Vec<String>,
    pub serialization: Option<String>,
    pub accept_serialization: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    #[serde(rename = "BagIt-Profile-Info", default)]
    info: Map<String, Value>,
    #[serde(rename = "Bag-Info", default)]
    bag_info: Map<String, Value>,
    #[serde(rename = "Manifests-Required", default)]
    manifests_required: Vec<String>,
    #[serde(rename = "Tag-Manifests-Required", default)]
    tag_manifests_required: Vec<String>,
    #[serde(rename = "Allow-Fetch.txt", default = "default_true")]
    allow_fetch: bool,
    #[serde(rename = "Tag-Files-Required", default)]
    tag_files_required: Vec<String>,
    #[serde(rename = "Accept-BagIt-Version", default)]
    accept_bagit_version: Vec<String>,
    #[serde(rename = "Serialization", default)]
    serialization: Option<String>,
    #[serde(rename = "Accept-Serialization", default)]
    accept_serialization: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRequirement {
    #[serde(default)]
    required: bool,
    #[serde(default)]
    values: Option<Vec<String>>,
    #[serde(default = "default_true")]
    repeatable: bool,
}

fn default_true() -> bool {
    true
}

fn parse_algorithms(names: &[String]) -> BagResult<BTreeSet<Algorithm>> {
    names.iter().map(|n| n.parse::<Algorithm>()).collect()
}

impl Profile {
    /// Parse a profile document. `location` is recorded for diagnostics.
    pub fn from_json(bytes: &[u8], location: &str) -> BagResult<Self> {
        let malformed = |message: String| BagError::ProfileMalformed {
            location: location.to_string(),
            message,
        };

        let raw: RawProfile = serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;

        let mut metadata_requirements = Vec::with_capacity(raw.bag_info.len());
        for (field, value) in raw.bag_info {
            let req: RawRequirement = serde_json::from_value(value)
                .map_err(|e| malformed(format!("Bag-Info.{}: {}", field, e)))?;
            metadata_requirements.push((
                field,
                MetadataRequirement {
                    required: req.required,
                    acceptable_values: req.values,
                    repeatable: req.repeatable,
                },
            ));
        }

        let identifier = match raw.info.get("BagIt-Profile-Identifier") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(malformed(format!(
                    "BagIt-Profile-Identifier must be a string, got {}",
                    other
                )))
            }
        };

        Ok(Self {
            location: location.to_string(),
            identifier,
            required_payload_algorithms: parse_algorithms(&raw.manifests_required)?,
            required_tag_algorithms: parse_algorithms(&raw.tag_manifests_required)?,
            fetch_allowed: raw.allow_fetch,
            metadata_requirements,
            tag_files_required: raw.tag_files_required,
            accept_bagit_versions: raw.accept_bagit_version,
            serialization: raw.serialization,
            accept_serialization: raw.accept_serialization,
        })
    }

    /// Fetch and parse the profile at `location` (URL or filesystem path).
    pub fn load(location: &str, source: &dyn RemoteSource) -> BagResult<Self> {
        let unavailable = |message: String| BagError::ProfileUnavailable {
            location: location.to_string(),
            message,
        };

        let url = parse_location(location)
            .ok_or_else(|| unavailable("not a valid URL or path".to_string()))?;
        debug!(profile = %url, "loading BagIt profile");

        let mut bytes = Vec::new();
        source
            .open(&url)
            .and_then(|mut r| r.read_to_end(&mut bytes))
            .map_err(|e| unavailable(e.to_string()))?;

        let profile = Self::from_json(&bytes, location)?;
        info!(
            profile = %location,
            payload_algorithms = ?profile.required_payload_algorithms,
            tag_algorithms = ?profile.required_tag_algorithms,
            fetch_allowed = profile.fetch_allowed,
            "loaded BagIt profile"
        );
        Ok(profile)
    }

    pub fn requirement(&self, field: &str) -> Option<&MetadataRequirement> {
        self.metadata_requirements
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(field))
            .map(|(_, r)| r)
    }

    pub fn accepts_version(&self, version: &str) -> bool {
        self.accept_bagit_versions.is_empty()
            || self.accept_bagit_versions.iter().any(|v| v == version)
    }
}
