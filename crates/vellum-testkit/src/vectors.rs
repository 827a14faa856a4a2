//! Golden test vectors for deterministic verification.
//!
//! Each vector pins the exact bytes of one canonical encoding, so any
//! change to key ordering, tagging or hashing shows up here first.

use vellum_core::{
    ContentHash, Entry, HashAlgorithm, HashCasPair, Keypair, Result, SigningIdentity, TreeNode,
};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Expected output (hex).
    pub expected: &'static str,
    /// Produces the actual output.
    pub compute: fn() -> Result<Vec<u8>>,
}

/// Seed of the key used by signing vectors.
pub const SIGNER_SEED: [u8; 32] = [0x42; 32];

/// Multihash of the empty leaf.
pub const EMPTY_LEAF_HASH: &str =
    "12201b49c7f21836d4448f1942a745ac2eb2f32fe3d6e91e6013bc6f67f33a1a7d30";

fn empty_leaf() -> Result<Vec<u8>> {
    TreeNode::empty().serialize()
}

fn empty_leaf_hash() -> Result<Vec<u8>> {
    Ok(ContentHash::sha256(&empty_leaf()?).to_bytes())
}

fn hello_hash() -> Result<Vec<u8>> {
    Ok(ContentHash::sha256(b"hello").to_bytes())
}

fn single_entry_leaf() -> Result<Vec<u8>> {
    TreeNode::leaf(vec![Entry::new(*b"a", Some(ContentHash::sha256(b"hello")))])?.serialize()
}

fn first_publish() -> Result<Vec<u8>> {
    let empty = ContentHash::sha256(&empty_leaf()?);
    HashCasPair::new(None, Some(empty))?.serialize()
}

fn signing_key_block() -> Result<Vec<u8>> {
    Keypair::from_seed(&SIGNER_SEED).public_key().to_block()
}

fn signing_key_hash() -> Result<Vec<u8>> {
    Ok(Keypair::from_seed(&SIGNER_SEED)
        .public_key_hash(HashAlgorithm::Sha2_256)?
        .hash()
        .to_bytes())
}

fn signed_first_publish() -> Result<Vec<u8>> {
    let keypair = Keypair::from_seed(&SIGNER_SEED);
    let id = keypair.public_key_hash(HashAlgorithm::Sha2_256)?;
    let empty = ContentHash::sha256(&empty_leaf()?);
    HashCasPair::new(None, Some(empty))?.sign(&SigningIdentity::new(id, keypair))
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty leaf",
            expected: "a164446174614180",
            compute: empty_leaf,
        },
        GoldenVector {
            name: "empty leaf hash",
            expected: EMPTY_LEAF_HASH,
            compute: empty_leaf_hash,
        },
        GoldenVector {
            name: "sha2-256 of hello",
            expected: "12202cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
            compute: hello_hash,
        },
        GoldenVector {
            name: "leaf with one entry",
            expected: "a16444617461582a81824161d82a582212202cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
            compute: single_entry_leaf,
        },
        GoldenVector {
            name: "first publish cas pair",
            expected: "82f6d82a582212201b49c7f21836d4448f1942a745ac2eb2f32fe3d6e91e6013bc6f67f33a1a7d30",
            compute: first_publish,
        },
        GoldenVector {
            name: "signing key block",
            expected: "820158202152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12",
            compute: signing_key_block,
        },
        GoldenVector {
            name: "signing key hash",
            expected: "12202a058e4fcaa2739feb98866d62a305c0958a2570758e3d667b139af3fab0bdf1",
            compute: signing_key_hash,
        },
        GoldenVector {
            name: "signed first publish",
            expected: "47cce9b31bd00f1077a095d7f663f447ccf21098475fb95eaab29d6ea3621d0bfcc6fa88c3d8b830b3275fa573c365e03de7a7e8afd5ffbed6a8471121a9a90682f6d82a582212201b49c7f21836d4448f1942a745ac2eb2f32fe3d6e91e6013bc6f67f33a1a7d30",
            compute: signed_first_publish,
        },
    ]
}

/// Run every vector: `(name, matches, actual hex)`.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let actual = match (v.compute)() {
                Ok(bytes) => hex::encode(bytes),
                Err(e) => format!("error: {}", e),
            };
            (v.name.to_string(), actual == v.expected, actual)
        })
        .collect()
}
