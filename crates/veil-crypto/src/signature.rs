//! Schnorr signatures over message digests.

use crate::error::{CryptoError, CryptoResult};
use crate::hashing::{hash_to_scalar, random_scalar};
use crate::keys::secret_key_to_public_key;
use crate::types::{Hash, PublicKey, SecretKey, Signature};
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::CompressedRistretto;
use curve25519_dalek::scalar::Scalar;

const DOMAIN: &[u8] = b"veil signature";

fn signature_challenge(digest: &Hash, public_key: &PublicKey, nonce: &[u8; 32]) -> Scalar {
    let mut data = Vec::with_capacity(DOMAIN.len() + 96);
    data.extend_from_slice(DOMAIN);
    data.extend_from_slice(digest.as_bytes());
    data.extend_from_slice(public_key.as_bytes());
    data.extend_from_slice(nonce);
    hash_to_scalar(&data)
}

/// Sign a message digest with the given secret key.
pub fn generate_signature(digest: &Hash, secret_key: &SecretKey) -> Signature {
    let public_key = secret_key_to_public_key(secret_key);

    let nonce_scalar = random_scalar();
    let nonce_point = (nonce_scalar * RISTRETTO_BASEPOINT_POINT).compress().to_bytes();

    let challenge = signature_challenge(digest, &public_key, &nonce_point);
    let response = nonce_scalar + challenge * secret_key.scalar();

    let mut bytes = [0u8; 64];
    bytes[..32].copy_from_slice(&nonce_point);
    bytes[32..].copy_from_slice(&response.to_bytes());
    Signature(bytes)
}

/// Verify a signature over a message digest for the given public key.
pub fn check_signature(digest: &Hash, public_key: &PublicKey, signature: &Signature) -> bool {
    let verify = || -> CryptoResult<bool> {
        let nonce_bytes = signature.nonce_bytes();
        let nonce_point = CompressedRistretto(nonce_bytes)
            .decompress()
            .ok_or(CryptoError::InvalidPoint)?;

        let response = Option::<Scalar>::from(Scalar::from_canonical_bytes(
            signature.response_bytes(),
        ))
        .ok_or(CryptoError::InvalidScalar)?;

        let challenge = signature_challenge(digest, public_key, &nonce_bytes);
        let expected = nonce_point + challenge * public_key.decompress()?;

        Ok(response * RISTRETTO_BASEPOINT_POINT == expected)
    };

    verify().unwrap_or(false)
}
