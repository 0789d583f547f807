//! Remote-reference (`fetch.txt`) entries.

use url::Url;

use crate::bag::path::BagPath;
use crate::error::BagResult;

/// A payload file referenced by URL instead of being stored in the bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEntry {
    pub url: Url,
    /// Declared length in bytes; `None` is written as `-`.
    pub length: Option<u64>,
    /// Bag-relative destination, always under `data/`.
    pub path: BagPath,
}

impl FetchEntry {
    /// Build an entry whose destination is `payload_path` below `data/`.
    pub fn new(url: Url, length: u64, payload_path: &str) -> BagResult<Self> {
        Ok(Self {
            url,
            length: Some(length),
            path: BagPath::payload(payload_path)?,
        })
    }

    pub fn declared_length(&self) -> u64 {
        self.length.unwrap_or(0)
    }
}
