//! Transaction outputs and staker reward/penalty outputs.

use crate::error::TransactionError;
use crate::serialization::{Reader, Serializable, Writer};
use crate::TypesResult;
use veil_crypto::{Commitment, Hash, PublicKey};

/// A confidential transaction output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOutput {
    /// One-time public key the output is spendable by.
    pub public_ephemeral: PublicKey,
    /// Masked amount.
    pub amount: u64,
    /// Pedersen commitment to the unmasked amount.
    pub commitment: Commitment,
}

impl TransactionOutput {
    /// Create a new output.
    pub fn new(public_ephemeral: PublicKey, amount: u64, commitment: Commitment) -> Self {
        TransactionOutput {
            public_ephemeral,
            amount,
            commitment,
        }
    }

    /// SHA3 over the canonical serialization. This hash keys the global
    /// output index and is what ring participants reference.
    pub fn hash(&self) -> Hash {
        self.sha3()
    }

    /// Quick structural validity checks.
    pub fn check_construction(&self) -> Result<(), TransactionError> {
        if self.public_ephemeral.is_identity() {
            return Err(TransactionError::OutputPublicEphemeral);
        }

        if self.amount == 0 {
            return Err(TransactionError::OutputAmount);
        }

        if self.commitment.is_identity() {
            return Err(TransactionError::OutputCommitment);
        }

        Ok(())
    }
}

impl Serializable for TransactionOutput {
    fn serialize(&self, writer: &mut Writer) {
        writer.key(&self.public_ephemeral);
        writer.varint(self.amount);
        writer.key(&self.commitment);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(TransactionOutput {
            public_ephemeral: reader.key()?,
            amount: reader.varint()?,
            commitment: reader.key()?,
        })
    }
}

impl PartialOrd for TransactionOutput {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransactionOutput {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.hash().cmp(&other.hash())
    }
}

/// A staker reward or penalty entry in a staker reward transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StakerOutput {
    /// The staker the entry applies to.
    pub staker_id: Hash,
    /// Amount in atomic units.
    pub amount: u64,
}

impl StakerOutput {
    /// Create a new staker output.
    pub fn new(staker_id: Hash, amount: u64) -> Self {
        StakerOutput { staker_id, amount }
    }

    /// SHA3 over the canonical serialization.
    pub fn hash(&self) -> Hash {
        self.sha3()
    }

    /// Quick structural validity checks.
    pub fn check_construction(&self) -> Result<(), TransactionError> {
        if self.staker_id.is_zero() {
            return Err(TransactionError::StakerRewardId);
        }

        if self.amount == 0 {
            return Err(TransactionError::StakerRewardAmount);
        }

        Ok(())
    }
}

impl Serializable for StakerOutput {
    fn serialize(&self, writer: &mut Writer) {
        writer.key(&self.staker_id);
        writer.varint(self.amount);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(StakerOutput {
            staker_id: reader.key()?,
            amount: reader.varint()?,
        })
    }
}
