//! The network fee schedule.
//!
//! Fees scale with transaction size in fixed chunks; transactions up to
//! the base chunk size pay the minimum fee. Additional leading zero
//! bits on the transaction proof-of-work hash discount the size fee, so
//! senders can trade CPU work for fees.

use veil_types::config::transaction::fees;

/// The size component of the fee, before any proof-of-work discount.
pub fn calculate_base_transaction_fee(transaction_size: usize) -> u64 {
    let excess = (transaction_size as u64).saturating_sub(fees::BASE_CHUNK_SIZE);
    let chunks = excess.div_ceil(fees::CHUNK_SIZE);
    chunks * fees::CHUNK_FEE
}

/// The required fee for a transaction of the given size whose
/// proof-of-work hash carries `pow_zeros` leading zero bits.
pub fn calculate_transaction_fee(transaction_size: usize, pow_zeros: u32) -> u64 {
    let base = calculate_base_transaction_fee(transaction_size);

    let zeros = pow_zeros.clamp(fees::MINIMUM_POW_ZEROS, fees::MAXIMUM_POW_ZEROS);
    let discount = fees::POW_ZERO_DISCOUNT_MULTIPLIER.powi((zeros - fees::MINIMUM_POW_ZEROS) as i32);

    let discounted = (base as f64 / discount).ceil() as u64;

    discounted.max(fees::MINIMUM_FEE)
}
