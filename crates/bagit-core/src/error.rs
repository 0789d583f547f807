//! Error types for bag construction and validation.

use std::path::PathBuf;

use crate::checksum::Algorithm;

/// Coarse classification of a [`BagError`].
///
/// Configuration errors abort before any bag state exists. Admission errors
/// fail one call and leave the builder usable. Validation errors block
/// finalization. Io errors are surfaced with full detail for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Admission,
    Validation,
    Io,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single unmet metadata requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataViolation {
    /// A required field has no value in the supplied properties or the bag.
    MissingRequired { field: String },
    /// A value outside the field's acceptable set.
    InvalidValue {
        field: String,
        value: String,
        allowed: Vec<String>,
    },
    /// A non-repeatable field carries more than one value.
    Repeated { field: String, count: usize },
}

impl std::fmt::Display for MetadataViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "mandatory metadata with key {} is missing", field)
            }
            Self::InvalidValue {
                field,
                value,
                allowed,
            } => write!(
                f,
                "invalid metadata value for key {}: provided {:?}, allowed values are {:?}",
                field, value, allowed
            ),
            Self::Repeated { field, count } => {
                write!(f, "metadata key {} is not repeatable but has {} values", field, count)
            }
        }
    }
}

/// A single checksum verification failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    Mismatch {
        path: String,
        algorithm: Algorithm,
        expected: String,
        actual: String,
    },
    MissingFile {
        path: String,
    },
    NotInManifest {
        path: String,
    },
}

impl std::fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mismatch {
                path,
                algorithm,
                expected,
                actual,
            } => write!(
                f,
                "{} checksum mismatch for {}: manifest {} vs computed {}",
                algorithm, path, expected, actual
            ),
            Self::MissingFile { path } => write!(f, "manifest lists {} but file is missing", path),
            Self::NotInManifest { path } => {
                write!(f, "payload file {} is not listed in any manifest", path)
            }
        }
    }
}

fn join_lines<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Bag construction errors.
#[derive(Debug, thiserror::Error)]
pub enum BagError {
    /// Profile document could not be fetched.
    #[error("profile unavailable at {location}: {message}")]
    ProfileUnavailable { location: String, message: String },

    /// Profile document does not match the profile schema.
    #[error("malformed profile at {location}: {message}")]
    ProfileMalformed { location: String, message: String },

    /// Algorithm name with no digest implementation.
    #[error("unsupported checksum algorithm: {name}")]
    UnsupportedAlgorithm { name: String },

    /// Source file missing or not readable.
    #[error("source {} is not readable: {message}", .path.display())]
    SourceUnreadable { path: PathBuf, message: String },

    /// Source is not located under the stated root and no in-bag path was given.
    #[error("file {} is not located relative to {}", .path.display(), .root.display())]
    PathNotRelative { path: PathBuf, root: PathBuf },

    /// In-bag path is empty, absolute or escapes the bag root.
    #[error("invalid in-bag path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The active profile forbids fetch entries.
    #[error("fetching is not allowed by the profile {profile}")]
    FetchNotAllowed { profile: String },

    /// One or more metadata requirements are unmet.
    #[error("metadata rejected: {}", join_lines(.violations))]
    MetadataRejected { violations: Vec<MetadataViolation> },

    /// The realized bag violates structural profile rules.
    #[error("bag does not conform to profile {profile}: {}", .details.join("; "))]
    ProfileNonConformant {
        profile: String,
        details: Vec<String>,
    },

    /// Manifest checksums do not match on-disk content.
    #[error("checksum verification failed: {}", join_lines(.failures))]
    VerificationFailed { failures: Vec<VerifyFailure> },

    /// A byte stream could not be fully consumed.
    #[error("failed to read {what}: {source}")]
    ReadError {
        what: String,
        #[source]
        source: std::io::Error,
    },

    /// A bag descriptor file could not be written or parsed.
    #[error("serialization error for {}: {message}", .path.display())]
    Serialization { path: PathBuf, message: String },

    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BagError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ProfileUnavailable { .. }
            | Self::ProfileMalformed { .. }
            | Self::UnsupportedAlgorithm { .. } => ErrorClass::Configuration,

            Self::SourceUnreadable { .. }
            | Self::PathNotRelative { .. }
            | Self::InvalidPath { .. }
            | Self::FetchNotAllowed { .. } => ErrorClass::Admission,

            Self::MetadataRejected { .. }
            | Self::ProfileNonConformant { .. }
            | Self::VerificationFailed { .. } => ErrorClass::Validation,

            Self::ReadError { .. } | Self::Serialization { .. } | Self::Io { .. } => ErrorClass::Io,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn read(what: impl Into<String>, source: std::io::Error) -> Self {
        Self::ReadError {
            what: what.into(),
            source,
        }
    }
}

/// Result type for bag operations.
pub type BagResult<T> = Result<T, BagError>;
