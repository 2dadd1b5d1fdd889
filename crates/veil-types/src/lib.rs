//! # veil-types
//!
//! Canonical chain types and the serialization core for the Veil
//! blockchain:
//! - Varint-based writer/reader used by every persisted and wired value
//! - Transaction outputs and staker reward/penalty outputs
//! - The six transaction kinds in committed and uncommitted forms
//! - Blocks with canonical transaction ordering and digest modes
//! - Staking records (candidates and stakes)
//! - Compile-time network configuration
//!
//! All hashes are SHA3-256 over the canonical serialization produced
//! here.

pub mod block;
pub mod config;
mod error;
mod output;
mod serialization;
pub mod staking;
pub mod transaction;

pub use block::{Block, BlockDigestMode};
pub use error::{TransactionError, TypesError, TypesResult};
pub use output::{StakerOutput, TransactionOutput};
pub use serialization::{read_vec, write_vec, Reader, Serializable, Writer};
pub use staking::{Candidate, Stake};
pub use transaction::{
    CommittedSuffix, GenesisTransaction, NormalTransaction, RecallStakeData,
    RecallStakeTransaction, RewardTransaction, StakeData, StakeRefundTransaction,
    StakeTransaction, StakerRewardTransaction, Transaction, TransactionBody, TransactionPrefix,
    TransactionType, UncommittedNormalTransaction, UncommittedRecallStakeTransaction,
    UncommittedStakeTransaction, UncommittedSuffix, UncommittedTransaction,
};
