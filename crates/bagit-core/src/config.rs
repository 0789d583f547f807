//! Engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Profile used when none is configured: the RDA generic BagIt profile.
pub const DEFAULT_PROFILE_URL: &str = "https://raw.githubusercontent.com/RDAResearchDataRepositoryInteropWG/bagit-profiles/master/generic/0.1/profile.json";

/// Configuration for profile loading, remote sources and collection assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagitConfig {
    /// Location of the BagIt profile new bags are built against.
    #[serde(default = "default_profile_url")]
    pub profile_url: String,

    /// Directory under which per-request scratch roots are allocated.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Timeout for remote requests in seconds.
    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,

    /// Value written to `External-Description` by collection assembly.
    #[serde(default = "default_external_description")]
    pub external_description: String,
}

fn default_profile_url() -> String {
    DEFAULT_PROFILE_URL.to_string()
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_timeout() -> u64 {
    30
}

fn default_external_description() -> String {
    "BagIt export from KIT Data Manager 2.0".to_string()
}

impl Default for BagitConfig {
    fn default() -> Self {
        Self {
            profile_url: default_profile_url(),
            scratch_dir: default_scratch_dir(),
            http_timeout_secs: default_timeout(),
            external_description: default_external_description(),
        }
    }
}

impl BagitConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `BAGIT_PROFILE_URL` | Profile location |
    /// | `BAGIT_SCRATCH_DIR` | Scratch directory for collection assembly |
    /// | `BAGIT_HTTP_TIMEOUT` | Remote request timeout in seconds |
    /// | `BAGIT_EXTERNAL_DESCRIPTION` | `External-Description` for exported bags |
    pub fn from_env() -> Self {
        Self {
            profile_url: std::env::var("BAGIT_PROFILE_URL")
                .unwrap_or_else(|_| default_profile_url()),
            scratch_dir: std::env::var_os("BAGIT_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_scratch_dir),
            http_timeout_secs: std::env::var("BAGIT_HTTP_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            external_description: std::env::var("BAGIT_EXTERNAL_DESCRIPTION")
                .unwrap_or_else(|_| default_external_description()),
        }
    }

    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = url.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    pub fn with_external_description(mut self, description: impl Into<String>) -> Self {
        self.external_description = description.into();
        self
    }
}
