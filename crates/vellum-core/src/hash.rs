//! Content hashes: algorithm-tagged digests that identify immutable blocks.
//!
//! A [`ContentHash`] is encoded as a multihash: `code || digest_len || digest`.
//! The algorithm set is closed; unknown codes are rejected at decode time
//! rather than carried around unverified.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CoreError, Result};

/// Length of every digest produced by a supported algorithm.
pub const DIGEST_LEN: usize = 32;

/// Hash algorithms a content hash may be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256, multihash code `0x12`.
    Sha2_256,
    /// BLAKE3 with 32-byte output, multihash code `0x1e`.
    Blake3,
}

impl HashAlgorithm {
    /// The multihash code for this algorithm.
    pub const fn code(self) -> u8 {
        match self {
            Self::Sha2_256 => 0x12,
            Self::Blake3 => 0x1e,
        }
    }

    /// Look up an algorithm by multihash code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x12 => Ok(Self::Sha2_256),
            0x1e => Ok(Self::Blake3),
            other => Err(CoreError::UnsupportedAlgorithm(format!(
                "multihash code 0x{:02x}",
                other
            ))),
        }
    }

    /// Digest length in bytes.
    pub const fn digest_len(self) -> usize {
        DIGEST_LEN
    }

    /// Compute the raw digest of `data`.
    pub fn digest(self, data: &[u8]) -> [u8; DIGEST_LEN] {
        match self {
            Self::Sha2_256 => Sha256::digest(data).into(),
            Self::Blake3 => *blake3::hash(data).as_bytes(),
        }
    }

    /// Human-readable name, as used in multihash tables.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha2_256 => "sha2-256",
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An algorithm-tagged digest identifying an immutable block.
///
/// Equality is exact: same algorithm and same digest bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash {
    algorithm: HashAlgorithm,
    digest: [u8; DIGEST_LEN],
}

/// A content hash or nothing.
///
/// Used wherever "no prior value" must be distinguished from a present value:
/// CAS expectations, tree entry values, pointer states.
pub type OptionalHash = Option<ContentHash>;

impl ContentHash {
    /// Hash `data` with the given algorithm.
    pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(data),
        }
    }

    /// Shorthand for a SHA-256 content hash.
    pub fn sha256(data: &[u8]) -> Self {
        Self::compute(HashAlgorithm::Sha2_256, data)
    }

    /// The algorithm this hash is tagged with.
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The raw digest bytes.
    pub const fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Whether `data` hashes to exactly this value.
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::compute(self.algorithm, data) == *self
    }

    /// Encode as multihash bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + DIGEST_LEN);
        buf.push(self.algorithm.code());
        buf.push(self.algorithm.digest_len() as u8);
        buf.extend_from_slice(&self.digest);
        buf
    }

    /// Decode from multihash bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (&code, rest) = bytes
            .split_first()
            .ok_or_else(|| CoreError::MalformedHash("empty".into()))?;
        if code & 0x80 != 0 {
            return Err(CoreError::UnsupportedAlgorithm(format!(
                "multi-byte multihash code starting 0x{:02x}",
                code
            )));
        }
        let algorithm = HashAlgorithm::from_code(code)?;

        let (&len, digest) = rest
            .split_first()
            .ok_or_else(|| CoreError::MalformedHash("missing digest length".into()))?;
        if len as usize != algorithm.digest_len() || digest.len() != algorithm.digest_len() {
            return Err(CoreError::MalformedHash(format!(
                "{} digest must be {} bytes, got length byte {} and {} bytes",
                algorithm,
                algorithm.digest_len(),
                len,
                digest.len()
            )));
        }

        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(digest);
        Ok(Self {
            algorithm,
            digest: arr,
        })
    }

    /// Convert to hex string (of the multihash bytes).
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::MalformedHash(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}:{})", self.algorithm, &hex::encode(self.digest)[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Render an optional hash for logs and error messages.
pub fn display_optional(hash: &OptionalHash) -> String {
    match hash {
        Some(h) => h.to_hex(),
        None => "absent".to_string(),
    }
}
