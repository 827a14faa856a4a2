//! Compare-and-swap pairs for pointer updates.

use ciborium::value::Value;

use crate::canonical::{decode_value, encode_canonical, optional_hash_from_cbor, optional_hash_to_cbor};
use crate::crypto::{Ed25519PublicKey, SigningIdentity};
use crate::error::{CoreError, Result};
use crate::hash::{display_optional, OptionalHash};

/// `(original, updated)`: swap a pointer from `original` to `updated`.
///
/// A pair whose sides are equal is rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCasPair {
    original: OptionalHash,
    updated: OptionalHash,
}

impl HashCasPair {
    pub fn new(original: OptionalHash, updated: OptionalHash) -> Result<Self> {
        if original == updated {
            return Err(CoreError::NoOpCas(display_optional(&original)));
        }
        Ok(Self { original, updated })
    }

    pub fn original(&self) -> OptionalHash {
        self.original
    }

    pub fn updated(&self) -> OptionalHash {
        self.updated
    }

    /// Canonical CBOR `[original, updated]`, absent sides as `null`.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        encode_canonical(&Value::Array(vec![
            optional_hash_to_cbor(&self.original),
            optional_hash_to_cbor(&self.updated),
        ]))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let items = match decode_value(bytes).map_err(|e| CoreError::MalformedCasPair(e.to_string()))? {
            Value::Array(items) if items.len() == 2 => items,
            _ => return Err(CoreError::MalformedCasPair("expected a pair".into())),
        };
        let original = optional_hash_from_cbor(&items[0])
            .map_err(|e| CoreError::MalformedCasPair(e.to_string()))?;
        let updated = optional_hash_from_cbor(&items[1])
            .map_err(|e| CoreError::MalformedCasPair(e.to_string()))?;
        Self::new(original, updated)
    }

    /// `signature || serialized pair`, the payload sent to a pointer service.
    pub fn sign(&self, writer: &SigningIdentity) -> Result<Vec<u8>> {
        Ok(writer.sign_message(&self.serialize()?))
    }

    /// Verify a signed payload against the writer's key and decode it.
    pub fn open(signed: &[u8], writer_key: &Ed25519PublicKey) -> Result<Self> {
        Self::deserialize(&writer_key.open_message(signed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::hash::{ContentHash, HashAlgorithm};

    fn identity(seed: u8) -> SigningIdentity {
        let kp = Keypair::from_seed(&[seed; 32]);
        let hash = kp.public_key_hash(HashAlgorithm::Sha2_256).unwrap();
        SigningIdentity::new(hash, kp)
    }

    #[test]
    fn test_noop_rejected() {
        let h = ContentHash::sha256(b"root");
        assert!(matches!(
            HashCasPair::new(Some(h), Some(h)),
            Err(CoreError::NoOpCas(_))
        ));
        assert!(matches!(HashCasPair::new(None, None), Err(CoreError::NoOpCas(_))));
    }

    #[test]
    fn test_first_publish_encoding() {
        let h = ContentHash::sha256(b"root");
        let pair = HashCasPair::new(None, Some(h)).unwrap();
        let bytes = pair.serialize().unwrap();
        // [null, 42(h'...')]
        assert_eq!(&bytes[..4], &[0x82, 0xf6, 0xd8, 0x2a]);
        assert_eq!(HashCasPair::deserialize(&bytes).unwrap(), pair);
    }

    #[test]
    fn test_sign_and_open() {
        let writer = identity(3);
        let pair = HashCasPair::new(
            Some(ContentHash::sha256(b"a")),
            Some(ContentHash::sha256(b"b")),
        )
        .unwrap();
        let signed = pair.sign(&writer).unwrap();
        let opened = HashCasPair::open(&signed, &writer.keypair.public_key()).unwrap();
        assert_eq!(opened, pair);

        let other = identity(4);
        assert_eq!(
            HashCasPair::open(&signed, &other.keypair.public_key()),
            Err(CoreError::InvalidSignature)
        );
    }

    #[test]
    fn test_decoding_noop_pair_fails() {
        let h = ContentHash::sha256(b"x");
        let bytes = encode_canonical(&Value::Array(vec![
            optional_hash_to_cbor(&Some(h)),
            optional_hash_to_cbor(&Some(h)),
        ]))
        .unwrap();
        assert!(matches!(HashCasPair::deserialize(&bytes), Err(CoreError::NoOpCas(_))));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            HashCasPair::deserialize(&[0x01]),
            Err(CoreError::MalformedCasPair(_))
        ));
    }
}
