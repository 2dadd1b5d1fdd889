//! Key generation and one-time (stealth) key derivation.

use crate::error::CryptoResult;
use crate::hashing::{hash_to_scalar, random_scalar};
use crate::types::{PublicKey, SecretKey};
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;

/// Generate a fresh random keypair.
pub fn generate_keypair() -> (PublicKey, SecretKey) {
    let secret = SecretKey::from_scalar(random_scalar());
    (secret_key_to_public_key(&secret), secret)
}

/// Derive a deterministic keypair from seed material.
pub fn derive_keypair_from_seed(seed: impl AsRef<[u8]>) -> (PublicKey, SecretKey) {
    let secret = SecretKey::from_scalar(hash_to_scalar(seed));
    (secret_key_to_public_key(&secret), secret)
}

/// Derive the public key for a secret key: `P = xG`.
pub fn secret_key_to_public_key(secret_key: &SecretKey) -> PublicKey {
    let point = secret_key.scalar() * RISTRETTO_BASEPOINT_POINT;
    PublicKey::from_point(&point)
}

/// Compute the shared key derivation `D = xP` between a secret key and a
/// counterparty public key. Used by transaction senders (tx secret key and
/// recipient view key) and recipients (view secret key and tx public key).
pub fn generate_key_derivation(
    public_key: &PublicKey,
    secret_key: &SecretKey,
) -> CryptoResult<PublicKey> {
    let point = public_key.decompress()?;
    Ok(PublicKey::from_point(&(secret_key.scalar() * point)))
}

/// Reduce a key derivation and output index to the per-output scalar
/// `Hs(D ∥ varint(index))`.
pub fn derivation_to_scalar(derivation: &PublicKey, output_index: u64) -> Scalar {
    let mut data = Vec::with_capacity(32 + 10);
    data.extend_from_slice(derivation.as_bytes());

    // Unsigned LEB128, matching the canonical serializer.
    let mut value = output_index;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        data.push(byte);
        if value == 0 {
            break;
        }
    }

    hash_to_scalar(&data)
}

/// Derive the one-time output key `P = sG + B` for a derivation scalar and
/// the recipient's public spend key.
pub fn derive_public_key(
    derivation_scalar: &Scalar,
    public_spend_key: &PublicKey,
) -> CryptoResult<PublicKey> {
    let spend: RistrettoPoint = public_spend_key.decompress()?;
    let point = derivation_scalar * RISTRETTO_BASEPOINT_POINT + spend;
    Ok(PublicKey::from_point(&point))
}
