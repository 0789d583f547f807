//! Single-pass multi-algorithm checksum engine.
//!
//! Every checksum in a bag (payload copy-in, tag copy-in, fetch references,
//! verification) is produced by [`digest_all`]: the source is read exactly
//! once and each chunk is fed to one running digest per requested algorithm.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{ErrorKind, Read};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{BagError, BagResult};

/// Read buffer size for streaming digests.
pub const CHUNK_SIZE: usize = 100 * 1024;

/// Checksum algorithms a bag manifest may use.
///
/// Ordering follows declaration order and drives manifest file ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha512,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha224,
        Algorithm::Sha256,
        Algorithm::Sha512,
    ];

    /// Lowercase BagIt name, as used in `manifest-<name>.txt`.
    pub fn bagit_name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha224 => 56,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.bagit_name())
    }
}

impl FromStr for Algorithm {
    type Err = BagError;

    /// Case-insensitive; `SHA-256`, `sha256` and `Sha256` are equivalent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Algorithm::ALL
            .into_iter()
            .find(|a| a.bagit_name() == normalized)
            .ok_or_else(|| BagError::UnsupportedAlgorithm {
                name: s.to_string(),
            })
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.bagit_name())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

enum RunningDigest {
    Md5(md5::Context),
    Sha1(sha1::Sha1),
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
}

impl RunningDigest {
    fn new(algorithm: Algorithm) -> Self {
        use sha1::Digest as _;
        use sha2::Digest as _;

        match algorithm {
            Algorithm::Md5 => Self::Md5(md5::Context::new()),
            Algorithm::Sha1 => Self::Sha1(sha1::Sha1::new()),
            Algorithm::Sha224 => Self::Sha224(sha2::Sha224::new()),
            Algorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            Algorithm::Sha512 => Self::Sha512(sha2::Sha512::new()),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        use sha1::Digest as _;
        use sha2::Digest as _;

        match self {
            Self::Md5(ctx) => ctx.consume(chunk),
            Self::Sha1(h) => h.update(chunk),
            Self::Sha224(h) => h.update(chunk),
            Self::Sha256(h) => h.update(chunk),
            Self::Sha512(h) => h.update(chunk),
        }
    }

    fn finish_hex(self) -> String {
        use sha1::Digest as _;
        use sha2::Digest as _;

        match self {
            Self::Md5(ctx) => format!("{:x}", md5::Digest::from(ctx)),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha224(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hex digests keyed by algorithm.
pub type DigestSet = BTreeMap<Algorithm, String>;

/// Stream `reader` once and return one lowercase hex digest per algorithm.
///
/// `what` names the source in the [`BagError::ReadError`] raised when the
/// stream cannot be fully consumed. Zero-length input yields the digests of
/// the empty string.
pub fn digest_all<R: Read>(
    mut reader: R,
    algorithms: &BTreeSet<Algorithm>,
    what: &str,
) -> BagResult<DigestSet> {
    let mut running: Vec<(Algorithm, RunningDigest)> = algorithms
        .iter()
        .map(|a| (*a, RunningDigest::new(*a)))
        .collect();
    let mut buf = vec![0_u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(BagError::read(what, e)),
        };
        for (_, digest) in running.iter_mut() {
            digest.update(&buf[..n]);
        }
    }

    Ok(running
        .into_iter()
        .map(|(a, d)| (a, d.finish_hex()))
        .collect())
}

/// Case-insensitive comparison of two hex digests.
pub fn same_digest(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct ChunkedReader<'a> {
        data: &'a [u8],
        pos: usize,
        max_chunk: usize,
    }

    impl<'a> Read for ChunkedReader<'a> {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.data.len() {
                return Ok(0);
            }
            let n = out
                .len()
                .min(self.max_chunk)
                .min(self.data.len().saturating_sub(self.pos));
            out[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _out: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("connection reset"))
        }
    }

    fn all() -> BTreeSet<Algorithm> {
        Algorithm::ALL.into_iter().collect()
    }

    #[test]
    fn empty_input_yields_well_known_digests() {
        let digests = digest_all(Cursor::new(b""), &all(), "empty").unwrap();
        assert_eq!(digests[&Algorithm::Md5], "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            digests[&Algorithm::Sha1],
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(
            digests[&Algorithm::Sha224],
            "d14a028c2a3a2bc9476102bb288234c415a2b01f828ea62ac5b3e42f"
        );
        assert_eq!(
            digests[&Algorithm::Sha256],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            digests[&Algorithm::Sha512],
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
             47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
        );
    }

    #[test]
    fn known_vector_abc() {
        let set: BTreeSet<_> = [Algorithm::Md5, Algorithm::Sha256].into_iter().collect();
        let digests = digest_all(Cursor::new(b"abc"), &set, "abc").unwrap();
        assert_eq!(digests.len(), 2);
        assert_eq!(digests[&Algorithm::Md5], "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            digests[&Algorithm::Sha256],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn chunked_stream_matches_single_read() {
        let payload: Vec<u8> = (0..(CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        let whole = digest_all(Cursor::new(&payload), &all(), "whole").unwrap();
        let chunked = digest_all(
            ChunkedReader {
                data: &payload,
                pos: 0,
                max_chunk: 7,
            },
            &all(),
            "chunked",
        )
        .unwrap();
        assert_eq!(whole, chunked);
    }

    #[test]
    fn read_failure_is_reported() {
        let err = digest_all(FailingReader, &all(), "remote").unwrap_err();
        assert!(matches!(err, BagError::ReadError { .. }));
        assert!(err.to_string().contains("remote"));
    }

    #[test]
    fn algorithm_names_are_case_insensitive() {
        assert_eq!("SHA-256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
        assert_eq!("sha1".parse::<Algorithm>().unwrap(), Algorithm::Sha1);
        assert_eq!("MD5".parse::<Algorithm>().unwrap(), Algorithm::Md5);
        assert!(matches!(
            "crc32".parse::<Algorithm>(),
            Err(BagError::UnsupportedAlgorithm { .. })
        ));
    }

    #[test]
    fn empty_algorithm_set_still_consumes_stream() {
        let digests = digest_all(Cursor::new(b"data"), &BTreeSet::new(), "none").unwrap();
        assert!(digests.is_empty());
    }
}
