//! Cryptographic primitives for Vellum.
//!
//! Wraps Ed25519 signing with strong types and provides [`CryptoContext`],
//! the explicit capability table every hashing or verifying component is
//! handed at construction time.

use ciborium::value::Value;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{decode_value, encode_canonical, int_from_cbor};
use crate::error::{CoreError, Result};
use crate::hash::{ContentHash, HashAlgorithm};

/// Length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Signature schemes a public key may be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningScheme {
    Ed25519,
}

impl SigningScheme {
    /// Numeric tag used in key encodings.
    pub const fn tag(self) -> u64 {
        match self {
            Self::Ed25519 => 1,
        }
    }

    /// Look up a scheme by tag.
    pub fn from_tag(tag: u64) -> Result<Self> {
        match tag {
            1 => Ok(Self::Ed25519),
            other => Err(CoreError::UnsupportedAlgorithm(format!(
                "signing scheme {}",
                other
            ))),
        }
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a detached signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = Signature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }

    /// Verify a `signature || message` blob and return the message.
    pub fn open_message(&self, signed: &[u8]) -> Result<Vec<u8>> {
        if signed.len() < SIGNATURE_LEN {
            return Err(CoreError::InvalidSignature);
        }
        let (sig_bytes, message) = signed.split_at(SIGNATURE_LEN);
        let mut arr = [0u8; SIGNATURE_LEN];
        arr.copy_from_slice(sig_bytes);
        self.verify(message, &Ed25519Signature(arr))?;
        Ok(message.to_vec())
    }

    /// Encode as a key block: canonical CBOR `[scheme, key-bytes]`.
    ///
    /// The content hash of this block is the key's [`PublicKeyHash`].
    pub fn to_block(&self) -> Result<Vec<u8>> {
        encode_canonical(&Value::Array(vec![
            Value::Integer(SigningScheme::Ed25519.tag().into()),
            Value::Bytes(self.0.to_vec()),
        ]))
    }

    /// Decode a key block.
    pub fn from_block(bytes: &[u8]) -> Result<Self> {
        let items = match decode_value(bytes)? {
            Value::Array(items) if items.len() == 2 => items,
            _ => return Err(CoreError::InvalidPublicKey),
        };
        match SigningScheme::from_tag(int_from_cbor(&items[0])?)? {
            SigningScheme::Ed25519 => match &items[1] {
                Value::Bytes(b) if b.len() == 32 => {
                    let mut arr = [0u8; 32];
                    arr.copy_from_slice(b);
                    Ok(Self(arr))
                }
                _ => Err(CoreError::InvalidPublicKey),
            },
        }
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Ed25519PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; SIGNATURE_LEN]);

impl Ed25519Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from a slice, rejecting the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidSignature)?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Ed25519Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A keypair for signing blocks and pointer updates.
///
/// This wraps ed25519-dalek's SigningKey.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Produce a detached signature.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.signing_key.sign(message);
        Ed25519Signature(sig.to_bytes())
    }

    /// Produce `signature || message`.
    pub fn sign_message(&self, message: &[u8]) -> Vec<u8> {
        let mut signed = Vec::with_capacity(SIGNATURE_LEN + message.len());
        signed.extend_from_slice(&self.sign(message).0);
        signed.extend_from_slice(message);
        signed
    }

    /// Self-signature over this key's block, as required to register it.
    pub fn sign_own_key(&self) -> Result<Ed25519Signature> {
        Ok(self.sign(&self.public_key().to_block()?))
    }

    /// The [`PublicKeyHash`] of this keypair's public key.
    pub fn public_key_hash(&self, algorithm: HashAlgorithm) -> Result<PublicKeyHash> {
        let block = self.public_key().to_block()?;
        Ok(PublicKeyHash(ContentHash::compute(algorithm, &block)))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// An identity: the content hash of a public signing key block.
///
/// Owners namespace pointers; writers sign blocks and pointer updates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKeyHash(pub ContentHash);

impl PublicKeyHash {
    /// The underlying content hash.
    pub const fn hash(&self) -> &ContentHash {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self(ContentHash::from_hex(s)?))
    }

    /// Canonical CBOR encoding: a content-hash link.
    pub fn to_cbor_bytes(&self) -> Result<Vec<u8>> {
        encode_canonical(&crate::canonical::hash_to_cbor(&self.0))
    }

    /// Decode from canonical CBOR.
    pub fn from_cbor_bytes(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        Ok(Self(crate::canonical::hash_from_cbor(&value)?))
    }
}

impl fmt::Debug for PublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyHash({})", &hex::encode(self.0.digest())[..16])
    }
}

impl fmt::Display for PublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A writer credential: the registered public key hash plus the secret key.
#[derive(Clone, Debug)]
pub struct SigningIdentity {
    pub public_hash: PublicKeyHash,
    pub keypair: Keypair,
}

impl SigningIdentity {
    pub fn new(public_hash: PublicKeyHash, keypair: Keypair) -> Self {
        Self {
            public_hash,
            keypair,
        }
    }

    /// Detached signature over a block to be written.
    pub fn sign(&self, block: &[u8]) -> Ed25519Signature {
        self.keypair.sign(block)
    }

    /// `signature || message`, the payload format of pointer updates.
    pub fn sign_message(&self, message: &[u8]) -> Vec<u8> {
        self.keypair.sign_message(message)
    }
}

/// Explicit cryptographic context.
///
/// Constructed once by the process and passed to every component that
/// hashes, verifies, or generates keys.
#[derive(Debug, Clone)]
pub struct CryptoContext {
    accepted: Vec<HashAlgorithm>,
    preferred: HashAlgorithm,
    signing: SigningScheme,
}

impl CryptoContext {
    /// Context accepting only sha2-256.
    pub fn new() -> Self {
        Self {
            accepted: vec![HashAlgorithm::Sha2_256],
            preferred: HashAlgorithm::Sha2_256,
            signing: SigningScheme::Ed25519,
        }
    }

    /// Also accept `algorithm` when verifying.
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        if !self.accepted.contains(&algorithm) {
            self.accepted.push(algorithm);
        }
        self
    }

    /// Hash new data with `algorithm`, accepting it if necessary.
    pub fn with_preferred(mut self, algorithm: HashAlgorithm) -> Self {
        self = self.with_algorithm(algorithm);
        self.preferred = algorithm;
        self
    }

    pub fn preferred(&self) -> HashAlgorithm {
        self.preferred
    }

    /// Whether `algorithm` may be verified under this context.
    pub fn supports(&self, algorithm: HashAlgorithm) -> bool {
        self.accepted.contains(&algorithm)
    }

    /// Hash `data` with `algorithm`, if it is accepted.
    pub fn hash_with(&self, algorithm: HashAlgorithm, data: &[u8]) -> Result<ContentHash> {
        if !self.supports(algorithm) {
            return Err(CoreError::UnsupportedAlgorithm(algorithm.name().to_string()));
        }
        Ok(ContentHash::compute(algorithm, data))
    }

    /// Hash `data` with the preferred algorithm.
    pub fn hash(&self, data: &[u8]) -> ContentHash {
        ContentHash::compute(self.preferred, data)
    }

    /// Recompute the digest of `data` under the algorithm `claimed` names.
    ///
    /// Returns the recomputed hash; the caller compares it with `claimed`.
    pub fn recompute(&self, claimed: &ContentHash, data: &[u8]) -> Result<ContentHash> {
        self.hash_with(claimed.algorithm(), data)
    }

    /// Generate a fresh random keypair.
    pub fn generate_keypair(&self) -> Keypair {
        let mut rng = rand::thread_rng();
        match self.signing {
            SigningScheme::Ed25519 => Keypair {
                signing_key: SigningKey::generate(&mut rng),
            },
        }
    }
}

impl Default for CryptoContext {
    fn default() -> Self {
        Self::new()
    }
}
