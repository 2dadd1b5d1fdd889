//! Pedersen commitments, deterministic blinding factors, and amount masks.
//!
//! Commitments are `C = rG + aH` where `H` is a second generator with an
//! unknown discrete log relative to `G`. Amounts therefore ride on the `H`
//! base, and the fee term of the parity check does too.

use crate::error::CryptoResult;
use crate::hashing::{hash_to_point, hash_to_scalar};
use crate::types::Commitment;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use once_cell::sync::Lazy;

/// Second Pedersen generator, derived nothing-up-my-sleeve from the base
/// point encoding.
pub static PEDERSEN_H: Lazy<RistrettoPoint> = Lazy::new(|| {
    let mut data = b"veil pedersen generator H".to_vec();
    data.extend_from_slice(RISTRETTO_BASEPOINT_POINT.compress().as_bytes());
    hash_to_point(&data)
});

/// Commit to an amount: `C = rG + aH`.
pub fn generate_pedersen_commitment(blinding_factor: &Scalar, amount: u64) -> Commitment {
    let point = blinding_factor * RISTRETTO_BASEPOINT_POINT + Scalar::from(amount) * *PEDERSEN_H;
    Commitment::from_point(&point)
}

/// Deterministic commitment blinding factor for a derivation scalar.
pub fn generate_commitment_blinding_factor(derivation_scalar: &Scalar) -> Scalar {
    let mut data = b"veil commitment mask".to_vec();
    data.extend_from_slice(&derivation_scalar.to_bytes());
    hash_to_scalar(&data)
}

/// Deterministic amount mask for a derivation scalar.
pub fn generate_amount_mask(derivation_scalar: &Scalar) -> u64 {
    let mut data = b"veil amount mask".to_vec();
    data.extend_from_slice(&derivation_scalar.to_bytes());
    let digest = crate::hashing::sha3(&data);
    u64::from_le_bytes(digest.as_bytes()[..8].try_into().expect("fixed slice"))
}

/// XOR involution between a masked and an unmasked amount.
pub fn toggle_masked_amount(mask: u64, amount: u64) -> u64 {
    mask ^ amount
}

/// Verify that pseudo commitments balance against output commitments plus
/// the transaction fee: `Σpseudo − Σoutputs − fee·H == 0`.
pub fn check_commitments_parity(
    pseudo_commitments: &[Commitment],
    output_commitments: &[Commitment],
    fee: u64,
) -> CryptoResult<bool> {
    let mut sum = RistrettoPoint::identity();

    for commitment in pseudo_commitments {
        sum += commitment.decompress()?;
    }

    for commitment in output_commitments {
        sum -= commitment.decompress()?;
    }

    sum -= Scalar::from(fee) * *PEDERSEN_H;

    Ok(sum == RistrettoPoint::identity())
}

/// Generate pseudo commitments for the given input amounts such that they
/// balance against the provided output blinding factors and fee. The last
/// pseudo blinding factor absorbs the difference.
pub fn generate_pseudo_commitments(
    input_amounts: &[u64],
    output_blinding_factors: &[Scalar],
) -> (Vec<Commitment>, Vec<Scalar>) {
    let output_sum: Scalar = output_blinding_factors.iter().sum();

    let mut blinding_factors = Vec::with_capacity(input_amounts.len());
    let mut commitments = Vec::with_capacity(input_amounts.len());
    let mut partial_sum = Scalar::ZERO;

    for (index, amount) in input_amounts.iter().enumerate() {
        let blinding_factor = if index + 1 == input_amounts.len() {
            output_sum - partial_sum
        } else {
            let factor = crate::hashing::random_scalar();
            partial_sum += factor;
            factor
        };

        commitments.push(generate_pedersen_commitment(&blinding_factor, *amount));
        blinding_factors.push(blinding_factor);
    }

    (commitments, blinding_factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::random_scalar;

    #[test]
    fn test_commitment_is_binding_to_amount() {
        let blinding = random_scalar();
        assert_ne!(
            generate_pedersen_commitment(&blinding, 100),
            generate_pedersen_commitment(&blinding, 101)
        );
    }

    #[test]
    fn test_toggle_masked_amount_is_involution() {
        let mask = generate_amount_mask(&random_scalar());
        let amount = 122_565u64;
        assert_eq!(
            toggle_masked_amount(mask, toggle_masked_amount(mask, amount)),
            amount
        );
    }

    #[test]
    fn test_commitments_parity() {
        // Inputs worth 1000 paying outputs of 600 and 300 plus a 100 fee.
        let output_blindings = vec![random_scalar(), random_scalar()];
        let outputs = vec![
            generate_pedersen_commitment(&output_blindings[0], 600),
            generate_pedersen_commitment(&output_blindings[1], 300),
        ];

        let (pseudo, _) = generate_pseudo_commitments(&[400, 600], &output_blindings);

        assert!(check_commitments_parity(&pseudo, &outputs, 100).unwrap());
        assert!(!check_commitments_parity(&pseudo, &outputs, 99).unwrap());
    }
}
