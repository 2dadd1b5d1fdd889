//! Concise linkable ring signatures.
//!
//! One signature is produced per transaction input. The signature proves
//! that the signer controls one of the ring members without revealing
//! which, and yields a key image that is identical for any two spends of
//! the same output. The ring member commitments are folded into the
//! challenge so the signature also binds the commitment ring.

use crate::error::{CryptoError, CryptoResult};
use crate::hashing::{hash_to_point, random_scalar};
use crate::types::{Commitment, Hash, KeyImage, PublicKey, SecretKey};
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use sha3::{Digest, Sha3_512};

/// Challenge domain separator.
const DOMAIN: &[u8] = b"veil clsag";

/// A ring signature: the closing challenge and one response per member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClsagSignature {
    /// Closing challenge scalar.
    pub challenge: Scalar,
    /// Response scalars, one per ring member.
    pub responses: Vec<Scalar>,
}

impl ClsagSignature {
    /// Quick structural validity: the response count matches the
    /// configured ring size and the challenge is non-zero.
    pub fn check_construction(&self, ring_size: usize) -> bool {
        self.responses.len() == ring_size && self.challenge != Scalar::ZERO
    }
}

/// Compute the key image `I = x·Hp(P)` for a one-time key.
pub fn generate_key_image(secret_key: &SecretKey) -> KeyImage {
    let public_key = crate::keys::secret_key_to_public_key(secret_key);
    let base = hash_to_point(public_key.as_bytes());
    KeyImage::from_point(&(secret_key.scalar() * base))
}

/// Static prefix shared by every challenge in the chain: binds the domain,
/// message digest, full ring, commitment ring, and key image.
fn challenge_prefix(
    digest: &Hash,
    key_image: &KeyImage,
    ring: &[PublicKey],
    commitments: &[Commitment],
) -> Vec<u8> {
    let mut prefix =
        Vec::with_capacity(DOMAIN.len() + 64 + (ring.len() + commitments.len()) * 32);
    prefix.extend_from_slice(DOMAIN);
    prefix.extend_from_slice(digest.as_bytes());
    prefix.extend_from_slice(key_image.as_bytes());
    for member in ring {
        prefix.extend_from_slice(member.as_bytes());
    }
    for commitment in commitments {
        prefix.extend_from_slice(commitment.as_bytes());
    }
    prefix
}

fn challenge(prefix: &[u8], left: &RistrettoPoint, right: &RistrettoPoint) -> Scalar {
    let mut hasher = Sha3_512::new();
    hasher.update(prefix);
    hasher.update(left.compress().as_bytes());
    hasher.update(right.compress().as_bytes());
    let wide: [u8; 64] = hasher.finalize().into();
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Produce a ring signature over `digest` for the ring member at
/// `secret_index` whose one-time secret key is `secret_key`.
pub fn generate_ring_signature(
    digest: &Hash,
    secret_key: &SecretKey,
    secret_index: usize,
    ring: &[PublicKey],
    commitments: &[Commitment],
) -> CryptoResult<(ClsagSignature, KeyImage)> {
    let ring_size = ring.len();

    if ring_size == 0 || secret_index >= ring_size {
        return Err(CryptoError::InvalidRing(format!(
            "secret index {} outside ring of {}",
            secret_index, ring_size
        )));
    }

    if commitments.len() != ring_size {
        return Err(CryptoError::InvalidRing(format!(
            "{} commitments for ring of {}",
            commitments.len(),
            ring_size
        )));
    }

    if crate::keys::secret_key_to_public_key(secret_key) != ring[secret_index] {
        return Err(CryptoError::InvalidRing(
            "secret key does not open the ring member at the secret index".into(),
        ));
    }

    let key_image = generate_key_image(secret_key);
    let key_image_point = key_image.decompress()?;

    let ring_points: Vec<RistrettoPoint> = ring
        .iter()
        .map(|member| member.decompress())
        .collect::<CryptoResult<_>>()?;

    let prefix = challenge_prefix(digest, &key_image, ring, commitments);

    let mut responses = vec![Scalar::ZERO; ring_size];
    let mut challenges = vec![Scalar::ZERO; ring_size];

    // Seed the chain at the secret index with a fresh nonce.
    let alpha = random_scalar();
    let secret_base = hash_to_point(ring[secret_index].as_bytes());

    let next = (secret_index + 1) % ring_size;
    challenges[next] = challenge(
        &prefix,
        &(alpha * RISTRETTO_BASEPOINT_POINT),
        &(alpha * secret_base),
    );

    // Walk the ring with random responses until we close the loop.
    let mut index = next;
    while index != secret_index {
        responses[index] = random_scalar();

        let member_base = hash_to_point(ring[index].as_bytes());
        let left = responses[index] * RISTRETTO_BASEPOINT_POINT + challenges[index] * ring_points[index];
        let right = responses[index] * member_base + challenges[index] * key_image_point;

        let next = (index + 1) % ring_size;
        challenges[next] = challenge(&prefix, &left, &right);

        index = next;
    }

    responses[secret_index] = alpha - challenges[secret_index] * secret_key.scalar();

    Ok((
        ClsagSignature {
            challenge: challenges[0],
            responses,
        },
        key_image,
    ))
}

/// Verify a ring signature over `digest` for the given key image, ring,
/// and commitment ring.
pub fn check_ring_signature(
    digest: &Hash,
    key_image: &KeyImage,
    ring: &[PublicKey],
    signature: &ClsagSignature,
    commitments: &[Commitment],
) -> bool {
    if ring.is_empty()
        || signature.responses.len() != ring.len()
        || commitments.len() != ring.len()
    {
        return false;
    }

    let key_image_point = match key_image.decompress() {
        Ok(point) => point,
        Err(_) => return false,
    };

    let prefix = challenge_prefix(digest, key_image, ring, commitments);

    let mut current = signature.challenge;

    for (index, member) in ring.iter().enumerate() {
        let member_point = match member.decompress() {
            Ok(point) => point,
            Err(_) => return false,
        };

        let member_base = hash_to_point(member.as_bytes());
        let left = signature.responses[index] * RISTRETTO_BASEPOINT_POINT + current * member_point;
        let right = signature.responses[index] * member_base + current * key_image_point;

        current = challenge(&prefix, &left, &right);
    }

    current == signature.challenge
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::sha3;
    use crate::keys::generate_keypair;
    use crate::ringct::generate_pedersen_commitment;

    fn build_ring(size: usize, secret_index: usize) -> (Vec<PublicKey>, Vec<Commitment>, SecretKey) {
        let mut ring = Vec::with_capacity(size);
        let mut commitments = Vec::with_capacity(size);
        let mut secret = None;

        for index in 0..size {
            let (public_key, secret_key) = generate_keypair();
            ring.push(public_key);
            commitments.push(generate_pedersen_commitment(&random_scalar(), 100));
            if index == secret_index {
                secret = Some(secret_key);
            }
        }

        (ring, commitments, secret.unwrap())
    }

    #[test]
    fn test_ring_signature_round_trip() {
        let digest = sha3(b"spend digest");
        let (ring, commitments, secret_key) = build_ring(8, 3);

        let (signature, key_image) =
            generate_ring_signature(&digest, &secret_key, 3, &ring, &commitments).unwrap();

        assert!(signature.check_construction(8));
        assert!(check_ring_signature(
            &digest,
            &key_image,
            &ring,
            &signature,
            &commitments
        ));
    }

    #[test]
    fn test_ring_signature_rejects_wrong_digest() {
        let digest = sha3(b"spend digest");
        let (ring, commitments, secret_key) = build_ring(4, 0);

        let (signature, key_image) =
            generate_ring_signature(&digest, &secret_key, 0, &ring, &commitments).unwrap();

        assert!(!check_ring_signature(
            &sha3(b"other digest"),
            &key_image,
            &ring,
            &signature,
            &commitments
        ));
    }

    #[test]
    fn test_ring_signature_rejects_wrong_key_image() {
        let digest = sha3(b"spend digest");
        let (ring, commitments, secret_key) = build_ring(4, 1);

        let (signature, _) =
            generate_ring_signature(&digest, &secret_key, 1, &ring, &commitments).unwrap();
        let (_, other_secret) = generate_keypair();
        let other_image = generate_key_image(&other_secret);

        assert!(!check_ring_signature(
            &digest,
            &other_image,
            &ring,
            &signature,
            &commitments
        ));
    }

    #[test]
    fn test_key_image_is_deterministic() {
        let (_, secret_key) = generate_keypair();
        assert_eq!(generate_key_image(&secret_key), generate_key_image(&secret_key));
    }

    #[test]
    fn test_sign_rejects_mismatched_secret_index() {
        let digest = sha3(b"spend digest");
        let (ring, commitments, secret_key) = build_ring(4, 1);

        // Wrong index: the secret key does not open ring[0].
        assert!(generate_ring_signature(&digest, &secret_key, 0, &ring, &commitments).is_err());
    }
}
