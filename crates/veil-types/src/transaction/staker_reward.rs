//! The staker reward transaction: per-round reward and penalty
//! bookkeeping for stakers.

use crate::error::TransactionError;
use crate::output::StakerOutput;
use crate::serialization::{read_vec, write_vec, Reader, Serializable, Writer};
use crate::transaction::TransactionType;
use crate::TypesResult;
use veil_crypto::Hash;

/// The reward transaction of every non-genesis block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakerRewardTransaction {
    /// Schema version.
    pub version: u64,
    /// Rewards credited to stakers.
    pub staker_outputs: Vec<StakerOutput>,
    /// Penalties debited from stakers.
    pub staker_penalties: Vec<StakerOutput>,
}

impl StakerRewardTransaction {
    /// Create an empty reward transaction at the current schema version.
    pub fn new() -> Self {
        StakerRewardTransaction {
            version: 1,
            staker_outputs: Vec::new(),
            staker_penalties: Vec::new(),
        }
    }

    /// SHA3 over the canonical serialization.
    pub fn hash(&self) -> Hash {
        self.sha3()
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Structural validity checks.
    pub fn check_construction(&self) -> Result<(), TransactionError> {
        if self.version != 1 {
            return Err(TransactionError::InvalidVersion);
        }

        for output in &self.staker_outputs {
            output.check_construction()?;
        }

        for penalty in &self.staker_penalties {
            penalty.check_construction()?;
        }

        Ok(())
    }
}

impl Serializable for StakerRewardTransaction {
    fn serialize(&self, writer: &mut Writer) {
        writer.varint(TransactionType::StakerReward.tag());
        writer.varint(self.version);
        write_vec(writer, &self.staker_outputs);
        write_vec(writer, &self.staker_penalties);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        let tag = reader.varint()?;
        if tag != TransactionType::StakerReward.tag() {
            return Err(crate::TypesError::UnknownTransactionType(tag));
        }
        Ok(StakerRewardTransaction {
            version: reader.varint()?,
            staker_outputs: read_vec(reader)?,
            staker_penalties: read_vec(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_crypto::sha3;

    fn sample() -> StakerRewardTransaction {
        let mut tx = StakerRewardTransaction::new();
        tx.staker_outputs.push(StakerOutput::new(sha3(b"staker a"), 900));
        tx.staker_outputs.push(StakerOutput::new(sha3(b"staker b"), 100));
        tx.staker_penalties.push(StakerOutput::new(sha3(b"staker c"), 50));
        tx
    }

    #[test]
    fn test_staker_reward_round_trip() {
        let tx = sample();
        let restored = StakerRewardTransaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(tx, restored);
        assert_eq!(tx.hash(), restored.hash());
    }

    #[test]
    fn test_zero_amount_entries_are_rejected() {
        let mut tx = sample();
        tx.staker_penalties.push(StakerOutput::new(sha3(b"staker d"), 0));
        assert_eq!(
            tx.check_construction(),
            Err(TransactionError::StakerRewardAmount)
        );
    }
}
