//! The deterministic producer/validator election.
//!
//! The frozen seed-to-draw mapping:
//!
//! 1. `seed = SHA3(h_1 ∥ h_2 ∥ … ∥ h_n)` over the previous round's
//!    block hashes, in round order.
//! 2. The seed is interpreted three ways: as a group element (the round
//!    beacon), as a 256-bit big-endian integer (the first draw), and as
//!    an evenness bit (the parity of the byte sum) that decides which
//!    pool receives the first draw.
//! 3. Candidates are ordered by public key and weighted by their total
//!    active stake. Draws happen without replacement: each draw reduces
//!    the current 256-bit value modulo the remaining total weight and
//!    picks the candidate whose cumulative-weight interval contains the
//!    result, then the seed is extended by `seed = SHA3(seed)` for the
//!    next draw.
//! 4. Draws alternate between the producer and validator pools
//!    (evenness picks which goes first), so no candidate can hold a
//!    seat in both pools within one round.
//! 5. The configured permanent candidates are placed into both outputs
//!    first and always consume a seat.

use crate::engine::biguint_to_u128;
use num_bigint::BigUint;
use veil_crypto::{hash_to_point, Hash, PublicKey};
use veil_types::config;

/// The expanded election seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionSeed {
    /// The seed digest interpreted as a group element.
    pub point: PublicKey,
    /// The seed digest as a 256-bit integer.
    pub value: BigUint,
    /// Parity of the seed byte sum; selects the pool of the first draw.
    pub evenness: bool,
}

fn seed_digest(last_round_blocks: &[Hash]) -> Hash {
    let mut data = Vec::with_capacity(last_round_blocks.len() * 32);
    for block_hash in last_round_blocks {
        data.extend_from_slice(block_hash.as_bytes());
    }
    veil_crypto::sha3(&data)
}

/// Expand the previous round's block hashes into the election seed.
pub fn calculate_election_seed(last_round_blocks: &[Hash]) -> ElectionSeed {
    let seed = seed_digest(last_round_blocks);

    let byte_sum: u32 = seed.as_bytes().iter().map(|byte| u32::from(*byte)).sum();

    ElectionSeed {
        point: PublicKey::from_point(&hash_to_point(seed.as_bytes())),
        value: BigUint::from_bytes_be(seed.as_bytes()),
        evenness: byte_sum % 2 == 0,
    }
}

/// Run the election over the given `(candidate, weight)` table.
///
/// Returns `(producers, validators)`; each holds at most `maximum_keys`
/// entries, the permanent candidates appear in both, and no
/// non-permanent candidate appears in both.
pub(crate) fn run(
    last_round_blocks: &[Hash],
    weights: &[(PublicKey, u128)],
    maximum_keys: usize,
) -> (Vec<PublicKey>, Vec<PublicKey>) {
    let permanent = &*config::consensus::PERMANENT_CANDIDATES;

    let mut producers: Vec<PublicKey> = Vec::with_capacity(maximum_keys);
    let mut validators: Vec<PublicKey> = Vec::with_capacity(maximum_keys);

    for candidate in permanent.iter().take(maximum_keys) {
        producers.push(*candidate);
        validators.push(*candidate);
    }

    // Candidate table in key order, zero-weight and permanent entries
    // excluded: they either cannot win a draw or already hold seats.
    let mut pool: Vec<(PublicKey, u128)> = weights
        .iter()
        .filter(|(candidate, weight)| *weight > 0 && !permanent.contains(candidate))
        .copied()
        .collect();
    pool.sort_by(|a, b| a.0.cmp(&b.0));

    let seed = calculate_election_seed(last_round_blocks);
    let mut draw_seed = seed_digest(last_round_blocks);
    let mut draw_value = seed.value;

    // Evenness decides which pool the first draw lands in; afterwards
    // the draws alternate.
    let mut produce_next = seed.evenness;

    while !pool.is_empty() && (producers.len() < maximum_keys || validators.len() < maximum_keys) {
        let total_weight: u128 = pool.iter().map(|(_, weight)| weight).sum();

        let ticket = biguint_to_u128(&(draw_value.clone() % BigUint::from(total_weight)));

        // Find the candidate whose cumulative interval holds the ticket.
        let mut cumulative = 0u128;
        let mut winner = pool.len() - 1;
        for (index, (_, weight)) in pool.iter().enumerate() {
            cumulative += weight;
            if ticket < cumulative {
                winner = index;
                break;
            }
        }

        let (candidate, _) = pool.remove(winner);

        let target = if produce_next {
            &mut producers
        } else {
            &mut validators
        };

        if target.len() < maximum_keys {
            target.push(candidate);
        } else {
            // The preferred pool is full; the seat goes to the other
            // one if it still has room.
            let other = if produce_next {
                &mut validators
            } else {
                &mut producers
            };
            if other.len() < maximum_keys {
                other.push(candidate);
            }
        }

        produce_next = !produce_next;

        // Extend the seed chain for the next draw.
        draw_seed = veil_crypto::sha3(draw_seed.as_bytes());
        draw_value = BigUint::from_bytes_be(draw_seed.as_bytes());
    }

    (producers, validators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use veil_crypto::generate_keypair;

    fn weight_table(count: usize) -> Vec<(PublicKey, u128)> {
        (0..count)
            .map(|index| {
                let (candidate, _) = generate_keypair();
                (candidate, 100 + index as u128)
            })
            .collect()
    }

    fn round_hashes() -> Vec<Hash> {
        (0u8..4)
            .map(|index| veil_crypto::sha3([index]))
            .collect()
    }

    #[test]
    fn test_seed_is_deterministic() {
        let blocks = round_hashes();
        assert_eq!(
            calculate_election_seed(&blocks),
            calculate_election_seed(&blocks)
        );

        let other = vec![veil_crypto::sha3(b"other")];
        assert_ne!(
            calculate_election_seed(&blocks).value,
            calculate_election_seed(&other).value
        );
    }

    #[test]
    fn test_election_is_deterministic() {
        let blocks = round_hashes();
        let table = weight_table(30);

        let first = run(&blocks, &table, 10);
        let second = run(&blocks, &table, 10);

        assert_eq!(first, second);
    }

    #[test]
    fn test_election_respects_bounds_and_disjointness() {
        let blocks = round_hashes();
        let table = weight_table(40);

        let (producers, validators) = run(&blocks, &table, 10);

        assert!(producers.len() <= 10);
        assert!(validators.len() <= 10);

        let permanent: BTreeSet<PublicKey> = config::consensus::PERMANENT_CANDIDATES
            .iter()
            .copied()
            .collect();

        let producer_set: BTreeSet<PublicKey> = producers.iter().copied().collect();
        let validator_set: BTreeSet<PublicKey> = validators.iter().copied().collect();

        // Every overlap is a permanent candidate and every permanent
        // candidate holds a seat in both pools.
        for shared in producer_set.intersection(&validator_set) {
            assert!(permanent.contains(shared));
        }
        for candidate in &permanent {
            assert!(producer_set.contains(candidate));
            assert!(validator_set.contains(candidate));
        }
    }

    #[test]
    fn test_election_with_no_candidates_returns_permanents() {
        let blocks = round_hashes();
        let (producers, validators) = run(&blocks, &[], 10);

        assert_eq!(producers.len(), config::consensus::PERMANENT_CANDIDATES.len());
        assert_eq!(producers, validators);
    }

    #[test]
    fn test_zero_weight_candidates_never_win() {
        let blocks = round_hashes();
        let (idle, _) = generate_keypair();
        let mut table = weight_table(5);
        table.push((idle, 0));

        let (producers, validators) = run(&blocks, &table, 10);
        assert!(!producers.contains(&idle));
        assert!(!validators.contains(&idle));
    }

    #[test]
    fn test_different_rounds_elect_differently() {
        let table = weight_table(60);

        let first = run(&round_hashes(), &table, 10);
        let second = run(&[veil_crypto::sha3(b"round 2")], &table, 10);

        // With 60 candidates two distinct seeds are overwhelmingly
        // unlikely to produce identical results.
        assert_ne!(first, second);
    }
}
