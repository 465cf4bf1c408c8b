//! Single-pass multi-algorithm file digests.

use crate::{Error, Result};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Read size used when hashing files.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// The default verification set.
    pub const DEFAULT_SET: [HashAlgorithm; 3] =
        [HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256];

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
        }
    }

    /// Length of the hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(HashAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            other => Err(Error::InvalidInput(format!(
                "unsupported hash algorithm '{other}'; supported: md5, sha1, sha256"
            ))),
        }
    }
}

/// Hex digests keyed by algorithm.
pub type DigestSet = BTreeMap<HashAlgorithm, String>;

enum StreamingHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamingHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => StreamingHasher::Md5(Md5::new()),
            HashAlgorithm::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Md5(h) => h.update(data),
            StreamingHasher::Sha1(h) => h.update(data),
            StreamingHasher::Sha256(h) => h.update(data),
        }
    }

    fn finalize(self) -> String {
        match self {
            StreamingHasher::Md5(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha1(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hash everything `reader` yields with every algorithm in one pass.
pub fn digest_reader<R: Read>(
    mut reader: R,
    algorithms: &[HashAlgorithm],
    chunk_size: usize,
) -> Result<DigestSet> {
    if chunk_size == 0 {
        return Err(Error::InvalidInput("chunk size must be non-zero".to_string()));
    }

    let mut hashers: Vec<(HashAlgorithm, StreamingHasher)> = algorithms
        .iter()
        .map(|&alg| (alg, StreamingHasher::new(alg)))
        .collect();
    hashers.sort_by_key(|(alg, _)| *alg);
    hashers.dedup_by_key(|(alg, _)| *alg);

    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        for (_, hasher) in hashers.iter_mut() {
            hasher.update(&buf[..n]);
        }
    }

    Ok(hashers
        .into_iter()
        .map(|(alg, hasher)| (alg, hasher.finalize()))
        .collect())
}

/// Hash the file at `path` with every algorithm in one streaming pass.
pub fn compute_digests(path: &Path, algorithms: &[HashAlgorithm]) -> Result<DigestSet> {
    let file = File::open(path)?;
    let digests = digest_reader(file, algorithms, CHUNK_SIZE)?;
    tracing::debug!(path = %path.display(), algorithms = digests.len(), "digests computed");
    Ok(digests)
}
