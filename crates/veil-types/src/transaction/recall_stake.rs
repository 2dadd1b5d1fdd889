//! Recall stake transactions: a staker asking for their stake back.

use crate::error::TransactionError;
use crate::serialization::{Reader, Serializable, Writer};
use crate::transaction::{
    proof_of_work_hash, transaction_hash, CommittedSuffix, TransactionBody, TransactionPrefix,
    TransactionType, UncommittedSuffix,
};
use crate::TypesResult;
use veil_crypto::{Hash, PublicKey, Signature};

/// The recall-specific payload. The view and spend signatures prove the
/// recall was authorized by the keys the stake was recorded under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecallStakeData {
    /// Amount being recalled, in atomic units.
    pub stake_amount: u64,
    /// The candidate the stake was placed on.
    pub candidate_public_key: PublicKey,
    /// The staker id the stake was recorded under.
    pub staker_id: Hash,
    /// Signature by the staker's view key.
    pub view_signature: Signature,
    /// Signature by the staker's spend key.
    pub spend_signature: Signature,
}

impl Serializable for RecallStakeData {
    fn serialize(&self, writer: &mut Writer) {
        writer.varint(self.stake_amount);
        writer.key(&self.candidate_public_key);
        writer.key(&self.staker_id);
        writer.key(&self.view_signature);
        writer.key(&self.spend_signature);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(RecallStakeData {
            stake_amount: reader.varint()?,
            candidate_public_key: reader.key()?,
            staker_id: reader.key()?,
            view_signature: reader.key()?,
            spend_signature: reader.key()?,
        })
    }
}

impl RecallStakeData {
    /// The digest the staker's view and spend keys sign to authorize the
    /// recall. It binds the amount, the candidate, and the staker id but
    /// not the signatures themselves.
    pub fn authorization_digest(&self) -> Hash {
        let mut writer = Writer::with_capacity(74);
        writer.varint(self.stake_amount);
        writer.key(&self.candidate_public_key);
        writer.key(&self.staker_id);
        writer.hash()
    }

    fn check_construction(&self) -> Result<(), TransactionError> {
        if self.stake_amount == 0 {
            return Err(TransactionError::StakeNoAmount);
        }

        if self.candidate_public_key.is_identity() {
            return Err(TransactionError::PublicKey);
        }

        if self.staker_id.is_zero() {
            return Err(TransactionError::StakerId);
        }

        if self.view_signature.is_zero() {
            return Err(TransactionError::RecallViewSignature);
        }

        if self.spend_signature.is_zero() {
            return Err(TransactionError::RecallSpendSignature);
        }

        Ok(())
    }
}

fn check_version(version: u64) -> Result<(), TransactionError> {
    if version != 1 && version != 2 {
        return Err(TransactionError::InvalidVersion);
    }
    Ok(())
}

/// A committed recall stake transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecallStakeTransaction {
    /// Common prefix.
    pub prefix: TransactionPrefix,
    /// Common user body.
    pub body: TransactionBody,
    /// Recall payload.
    pub data: RecallStakeData,
    /// Pruned signature suffix.
    pub suffix: CommittedSuffix,
}

impl RecallStakeTransaction {
    /// SHA3 over prefix, body, and recall payload.
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
            .serialize_with_tag(TransactionType::RecallStake, writer);
        writer.key(&self.body);
        writer.key(&self.data);
    }
}

impl Serializable for RecallStakeTransaction {
    fn serialize(&self, writer: &mut Writer) {
        self.serialize_digest(writer);
        writer.key(&self.suffix);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(RecallStakeTransaction {
            prefix: TransactionPrefix::deserialize_with_tag(
                TransactionType::RecallStake,
                reader,
            )?,
            body: reader.key()?,
            data: reader.key()?,
            suffix: reader.key()?,
        })
    }
}

/// An uncommitted recall stake transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UncommittedRecallStakeTransaction {
    /// Common prefix.
    pub prefix: TransactionPrefix,
    /// Common user body.
    pub body: TransactionBody,
    /// Recall payload.
    pub data: RecallStakeData,
    /// Full signature suffix.
    pub suffix: UncommittedSuffix,
}

impl UncommittedRecallStakeTransaction {
    /// SHA3 over prefix, body, and recall payload.
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
    pub fn to_committed(&self) -> RecallStakeTransaction {
        RecallStakeTransaction {
            prefix: self.prefix,
            body: self.body.clone(),
            data: self.data,
            suffix: self.suffix.to_committed(),
        }
    }

    fn serialize_digest(&self, writer: &mut Writer) {
        self.prefix
            .serialize_with_tag(TransactionType::RecallStake, writer);
        writer.key(&self.body);
        writer.key(&self.data);
    }
}

impl Serializable for UncommittedRecallStakeTransaction {
    fn serialize(&self, writer: &mut Writer) {
        self.serialize_digest(writer);
        writer.key(&self.suffix);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(UncommittedRecallStakeTransaction {
            prefix: TransactionPrefix::deserialize_with_tag(
                TransactionType::RecallStake,
                reader,
            )?,
            body: reader.key()?,
            data: reader.key()?,
            suffix: reader.key()?,
        })
    }
}
