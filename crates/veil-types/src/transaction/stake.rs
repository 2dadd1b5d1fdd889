//! Stake transactions: candidacy proposals (version 1) and votes for an
//! existing candidate (version 2).

use crate::error::TransactionError;
use crate::serialization::{Reader, Serializable, Writer};
use crate::transaction::{
    proof_of_work_hash, transaction_hash, CommittedSuffix, TransactionBody, TransactionPrefix,
    TransactionType, UncommittedSuffix,
};
use crate::TypesResult;
use veil_crypto::{Hash, PublicKey};

/// The stake-specific payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StakeData {
    /// Amount being staked, in atomic units.
    pub stake_amount: u64,
    /// The candidate the stake applies to.
    pub candidate_public_key: PublicKey,
    /// The staker's public view key.
    pub staker_public_view_key: PublicKey,
    /// The staker's public spend key.
    pub staker_public_spend_key: PublicKey,
}

impl Serializable for StakeData {
    fn serialize(&self, writer: &mut Writer) {
        writer.varint(self.stake_amount);
        writer.key(&self.candidate_public_key);
        writer.key(&self.staker_public_view_key);
        writer.key(&self.staker_public_spend_key);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(StakeData {
            stake_amount: reader.varint()?,
            candidate_public_key: reader.key()?,
            staker_public_view_key: reader.key()?,
            staker_public_spend_key: reader.key()?,
        })
    }
}

impl StakeData {
    /// The staker id: SHA3 over view key then spend key.
    pub fn staker_id(&self) -> Hash {
        let mut writer = Writer::with_capacity(64);
        writer.key(&self.staker_public_view_key);
        writer.key(&self.staker_public_spend_key);
        writer.hash()
    }

    fn check_construction(&self) -> Result<(), TransactionError> {
        if self.stake_amount == 0 {
            return Err(TransactionError::StakeNoAmount);
        }

        if self.candidate_public_key.is_identity() {
            return Err(TransactionError::PublicKey);
        }

        if self.staker_public_view_key.is_identity()
            || self.staker_public_spend_key.is_identity()
        {
            return Err(TransactionError::PublicKey);
        }

        // The staker keys double as the refund path; reusing the
        // candidate key for either would tie stakes to the candidate.
        if self.staker_public_view_key == self.candidate_public_key
            || self.staker_public_spend_key == self.candidate_public_key
        {
            return Err(TransactionError::StakingPublicKeysReuse);
        }

        Ok(())
    }
}

fn check_version(version: u64) -> Result<(), TransactionError> {
    // Version 1 stakes for candidacy, version 2 votes for a candidate.
    if version != 1 && version != 2 {
        return Err(TransactionError::InvalidVersion);
    }
    Ok(())
}

/// A committed stake transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakeTransaction {
    /// Common prefix.
    pub prefix: TransactionPrefix,
    /// Common user body.
    pub body: TransactionBody,
    /// Stake payload.
    pub data: StakeData,
    /// Pruned signature suffix.
    pub suffix: CommittedSuffix,
}

impl StakeTransaction {
    /// SHA3 over prefix, body, and stake payload.
    pub fn digest(&self) -> Hash {
        let mut writer = Writer::new();
        self.serialize_digest(&mut writer);
        writer.hash()
    }

    /// The transaction hash, identical to the uncommitted form's.
    pub fn hash(&self) -> Hash {
        transaction_hash(
            self.digest(),
            self.suffix.signature_hash,
            self.suffix.range_proof_hash,
        )
    }

    /// The Argon2id proof-of-work hash.
    pub fn pow_hash(&self) -> Hash {
        proof_of_work_hash(self.digest(), self.suffix.range_proof_hash)
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Structural validity checks.
    pub fn check_construction(&self) -> Result<(), TransactionError> {
        check_version(self.prefix.version)?;

        if self.prefix.public_key.is_identity() {
            return Err(TransactionError::PublicKey);
        }

        self.body.check_construction()?;
        self.data.check_construction()
    }

    fn serialize_digest(&self, writer: &mut Writer) {
        self.prefix
            .serialize_with_tag(TransactionType::Stake, writer);
        writer.key(&self.body);
        writer.key(&self.data);
    }
}

impl Serializable for StakeTransaction {
    fn serialize(&self, writer: &mut Writer) {
        self.serialize_digest(writer);
        writer.key(&self.suffix);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(StakeTransaction {
            prefix: TransactionPrefix::deserialize_with_tag(TransactionType::Stake, reader)?,
            body: reader.key()?,
            data: reader.key()?,
            suffix: reader.key()?,
        })
    }
}

/// An uncommitted stake transaction carrying the full signature suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UncommittedStakeTransaction {
    /// Common prefix.
    pub prefix: TransactionPrefix,
    /// Common user body.
    pub body: TransactionBody,
    /// Stake payload.
    pub data: StakeData,
    /// Full signature suffix.
    pub suffix: UncommittedSuffix,
}

impl UncommittedStakeTransaction {
    /// SHA3 over prefix, body, and stake payload.
    pub fn digest(&self) -> Hash {
        let mut writer = Writer::new();
        self.serialize_digest(&mut writer);
        writer.hash()
    }

    /// The transaction hash, identical to the committed form's.
    pub fn hash(&self) -> Hash {
        transaction_hash(
            self.digest(),
            self.suffix.signature_hash(),
            self.suffix.range_proof_hash(),
        )
    }

    /// The Argon2id proof-of-work hash.
    pub fn pow_hash(&self) -> Hash {
        proof_of_work_hash(self.digest(), self.suffix.range_proof_hash())
    }

    /// Whether the proof-of-work meets the target zero count.
    pub fn pow_verify(&self, zeros: u32) -> bool {
        self.pow_hash().leading_zeros() >= zeros
    }

    /// Mine the body nonce until the proof-of-work target is met.
    pub fn mine(&mut self, zeros: u32) -> bool {
        if self.pow_verify(zeros) {
            return true;
        }

        self.body.nonce = 0;
        while !self.pow_verify(zeros) {
            if self.body.nonce == u64::MAX {
                return false;
            }
            self.body.nonce += 1;
        }
        true
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Structural validity checks.
    pub fn check_construction(&self) -> Result<(), TransactionError> {
        check_version(self.prefix.version)?;

        if self.prefix.public_key.is_identity() {
            return Err(TransactionError::PublicKey);
        }

        self.body.check_construction()?;
        self.data.check_construction()?;
        self.suffix.check_construction(&self.body)
    }

    /// Collapse to the committed form. The transaction hash is preserved.
    pub fn to_committed(&self) -> StakeTransaction {
        StakeTransaction {
            prefix: self.prefix,
            body: self.body.clone(),
            data: self.data,
            suffix: self.suffix.to_committed(),
        }
    }

    fn serialize_digest(&self, writer: &mut Writer) {
        self.prefix
            .serialize_with_tag(TransactionType::Stake, writer);
        writer.key(&self.body);
        writer.key(&self.data);
    }
}

impl Serializable for UncommittedStakeTransaction {
    fn serialize(&self, writer: &mut Writer) {
        self.serialize_digest(writer);
        writer.key(&self.suffix);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(UncommittedStakeTransaction {
            prefix: TransactionPrefix::deserialize_with_tag(TransactionType::Stake, reader)?,
            body: reader.key()?,
            data: reader.key()?,
            suffix: reader.key()?,
        })
    }
}
