//! # veil-consensus
//!
//! Transaction validation for the Veil blockchain:
//! - Construction checks, the anti-spam proof-of-work floor, and the
//!   size/PoW fee schedule
//! - Full validation against chain state: range proofs, ring
//!   signatures, the key-image double-spend set, ring-member
//!   resolution, genesis pinning, and staking rules

pub mod fees;
mod validator;

pub use validator::{ConsensusError, ConsensusResult, TransactionValidator};
