//! # veil-staking
//!
//! The staking engine for the Veil blockchain: candidate and stake
//! records over the shared store environment, plus the deterministic
//! election that selects each round's block producers and validators
//! from the previous round's block hashes.

mod election;
mod engine;
mod error;

pub use election::{calculate_election_seed, ElectionSeed};
pub use engine::StakingEngine;
pub use error::{StakingError, StakingResult};
