//! # veil-crypto
//!
//! Cryptographic primitives for the Veil blockchain:
//! - Fixed-width value types (hashes, keys, key images, commitments)
//! - SHA3 hashing, hash-to-scalar and hash-to-point
//! - Argon2id proof-of-work hashing
//! - One-time key derivation for stealth outputs
//! - Pedersen commitments and amount masking
//! - Linkable ring signatures over the commitment ring
//! - Aggregated range-proof attestations over output commitments
//! - Schnorr signatures and public wallet addresses
//!
//! Everything operates on the Ristretto prime-order group, so any point
//! that decompresses is automatically torsion-free.

mod address;
mod clsag;
mod error;
mod hashing;
mod keys;
mod range_proof;
mod ringct;
mod signature;
mod types;

pub use address::{decode_address, encode_address};
pub use clsag::{check_ring_signature, generate_ring_signature, ClsagSignature};
pub use error::{CryptoError, CryptoResult};
pub use hashing::{argon2id, hash_to_point, hash_to_scalar, random_hash, random_scalar, sha3};
pub use clsag::generate_key_image;
pub use keys::{
    derivation_to_scalar, derive_keypair_from_seed, derive_public_key, generate_key_derivation,
    generate_keypair, secret_key_to_public_key,
};
pub use range_proof::{generate_range_proof, verify_range_proof, RangeProof};
pub use ringct::{
    check_commitments_parity, generate_amount_mask, generate_commitment_blinding_factor,
    generate_pedersen_commitment, generate_pseudo_commitments, toggle_masked_amount, PEDERSEN_H,
};
pub use signature::{check_signature, generate_signature};
pub use types::{Commitment, Hash, KeyImage, PublicKey, SecretKey, Signature};

/// Width in bytes of every fixed-length value type.
pub const KEY_BYTES: usize = 32;

/// Width in bytes of a Schnorr signature (nonce point plus response scalar).
pub const SIGNATURE_BYTES: usize = 64;
