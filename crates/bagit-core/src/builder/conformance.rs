use tracing::info;

use crate::bag::{BagPath, ManifestClass, Metadata};
use crate::checksum::Algorithm;
use crate::error::{BagError, BagResult, MetadataViolation};
use crate::profile::Profile;

use super::BagBuilder;

/// Check `metadata` against every `Bag-Info` requirement of `profile`.
pub(crate) fn metadata_violations(profile: &Profile, metadata: &Metadata) -> Vec<MetadataViolation> {
    let mut violations = Vec::new();
    for (field, requirement) in &profile.metadata_requirements {
        let values = metadata.get(field);
        if requirement.required && values.is_empty() {
            violations.push(MetadataViolation::MissingRequired {
                field: field.clone(),
            });
            continue;
        }
        for value in &values {
            if !requirement.accepts(value) {
                violations.push(MetadataViolation::InvalidValue {
                    field: field.clone(),
                    value: value.to_string(),
                    allowed: requirement.acceptable_values.clone().unwrap_or_default(),
                });
            }
        }
        if !requirement.repeatable && values.len() > 1 {
            violations.push(MetadataViolation::Repeated {
                field: field.clone(),
                count: values.len(),
            });
        }
    }
    violations
}

impl BagBuilder {
    /// Check the realized bag against the profile's structural rules.
    ///
    /// Covers fetch permission, metadata requirements, presence of every
    /// required manifest, manifest completeness, required tag files and the
    /// declared BagIt version. Checksum values are not recomputed here; see
    /// [`validate_checksums`](Self::validate_checksums).
    pub fn validate_profile_conformance(&self) -> BagResult<()> {
        let profile = &self.profile;
        let bag = &self.bag;
        let mut details = Vec::new();

        if !profile.fetch_allowed && !bag.fetch_entries().is_empty() {
            details.push(format!(
                "{} fetch entries present but the profile does not allow fetch.txt",
                bag.fetch_entries().len()
            ));
        }

        details.extend(
            metadata_violations(profile, &bag.metadata)
                .iter()
                .map(ToString::to_string),
        );

        for (class, required) in [
            (ManifestClass::Payload, &profile.required_payload_algorithms),
            (ManifestClass::Tag, &profile.required_tag_algorithms),
        ] {
            let manifests = bag.manifests(class);
            let absent = |algorithm: Algorithm| {
                manifests.get(algorithm).is_none()
                    || self.absent_manifests.contains(&(class, algorithm))
            };
            for algorithm in required.iter().filter(|a| absent(**a)) {
                details.push(format!("required {} manifest {} is missing", class, algorithm));
            }

            let mut covered = manifests.paths();
            if class == ManifestClass::Payload {
                covered.extend(bag.fetch_entries().iter().map(|e| &e.path));
            }
            for path in covered {
                for algorithm in manifests.missing_for(path).into_iter().filter(|a| !absent(*a)) {
                    details.push(format!(
                        "{} manifest {} has no entry for {}",
                        class, algorithm, path
                    ));
                }
            }
        }

        for required in &profile.tag_files_required {
            let present = BagPath::new(required)
                .map(|p| p.to_fs_path(&bag.root_dir).is_file())
                .unwrap_or(false);
            if !present {
                details.push(format!("required tag file {} is missing", required));
            }
        }

        if !profile.accepts_version(&bag.version) {
            details.push(format!(
                "BagIt version {} is not accepted (accepted: {})",
                bag.version,
                profile.accept_bagit_versions.join(", ")
            ));
        }

        if details.is_empty() {
            info!(profile = %profile.location, "bag conforms to profile");
            Ok(())
        } else {
            Err(BagError::ProfileNonConformant {
                profile: profile.location.clone(),
                details,
            })
        }
    }
}
