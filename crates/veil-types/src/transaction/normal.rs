//! Normal (value transfer) transactions in both forms.

use crate::config;
use crate::error::TransactionError;
use crate::serialization::{Reader, Serializable, Writer};
use crate::transaction::{
    proof_of_work_hash, transaction_hash, CommittedSuffix, TransactionBody, TransactionPrefix,
    TransactionType, UncommittedSuffix,
};
use crate::TypesResult;
use veil_crypto::Hash;

fn check_extra(extra: &[u8]) -> Result<(), TransactionError> {
    if extra.len() > config::transaction::MAXIMUM_EXTRA_SIZE {
        return Err(TransactionError::ExtraTooLarge);
    }
    Ok(())
}

/// A committed normal transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalTransaction {
    /// Common prefix.
    pub prefix: TransactionPrefix,
    /// Common user body.
    pub body: TransactionBody,
    /// Free-form extra blob.
    pub extra: Vec<u8>,
    /// Pruned signature suffix.
    pub suffix: CommittedSuffix,
}

impl NormalTransaction {
    /// SHA3 over prefix, body, and extra.
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
        if self.prefix.version != 1 {
            return Err(TransactionError::InvalidVersion);
        }

        if self.prefix.public_key.is_identity() {
            return Err(TransactionError::PublicKey);
        }

        self.body.check_construction()?;
        check_extra(&self.extra)
    }

    fn serialize_digest(&self, writer: &mut Writer) {
        self.prefix
            .serialize_with_tag(TransactionType::Normal, writer);
        writer.key(&self.body);
        writer.byte_block(&self.extra);
    }
}

impl Serializable for NormalTransaction {
    fn serialize(&self, writer: &mut Writer) {
        self.serialize_digest(writer);
        writer.key(&self.suffix);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(NormalTransaction {
            prefix: TransactionPrefix::deserialize_with_tag(TransactionType::Normal, reader)?,
            body: reader.key()?,
            extra: reader.byte_block()?,
            suffix: reader.key()?,
        })
    }
}

/// An uncommitted normal transaction carrying the full signature suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UncommittedNormalTransaction {
    /// Common prefix.
    pub prefix: TransactionPrefix,
    /// Common user body.
    pub body: TransactionBody,
    /// Free-form extra blob.
    pub extra: Vec<u8>,
    /// Full signature suffix.
    pub suffix: UncommittedSuffix,
}

impl UncommittedNormalTransaction {
    /// SHA3 over prefix, body, and extra.
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

    /// Mine the body nonce until the proof-of-work hash carries at least
    /// `zeros` leading zero bits. Returns false if the nonce space is
    /// exhausted.
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
        if self.prefix.version != 1 {
            return Err(TransactionError::InvalidVersion);
        }

        if self.prefix.public_key.is_identity() {
            return Err(TransactionError::PublicKey);
        }

        self.body.check_construction()?;
        check_extra(&self.extra)?;
        self.suffix.check_construction(&self.body)
    }

    /// Collapse to the committed form. The transaction hash is preserved.
    pub fn to_committed(&self) -> NormalTransaction {
        NormalTransaction {
            prefix: self.prefix,
            body: self.body.clone(),
            extra: self.extra.clone(),
            suffix: self.suffix.to_committed(),
        }
    }

    fn serialize_digest(&self, writer: &mut Writer) {
        self.prefix
            .serialize_with_tag(TransactionType::Normal, writer);
        writer.key(&self.body);
        writer.byte_block(&self.extra);
    }
}

impl Serializable for UncommittedNormalTransaction {
    fn serialize(&self, writer: &mut Writer) {
        self.serialize_digest(writer);
        writer.key(&self.suffix);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(UncommittedNormalTransaction {
            prefix: TransactionPrefix::deserialize_with_tag(TransactionType::Normal, reader)?,
            body: reader.key()?,
            extra: reader.byte_block()?,
            suffix: reader.key()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::test_support::build_uncommitted_normal;

    #[test]
    fn test_uncommitted_round_trip() {
        let tx = build_uncommitted_normal(2, 2);
        let restored = UncommittedNormalTransaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(tx, restored);
    }

    #[test]
    fn test_committed_round_trip() {
        let tx = build_uncommitted_normal(2, 2).to_committed();
        let restored = NormalTransaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(tx, restored);
    }

    #[test]
    fn test_construction_check_passes() {
        assert!(build_uncommitted_normal(2, 3).check_construction().is_ok());
    }

    #[test]
    fn test_extra_size_is_capped() {
        let mut tx = build_uncommitted_normal(1, 2);
        tx.extra = vec![0u8; config::transaction::MAXIMUM_EXTRA_SIZE + 1];
        assert_eq!(
            tx.check_construction(),
            Err(TransactionError::ExtraTooLarge)
        );
    }

    #[test]
    fn test_duplicate_key_images_are_rejected() {
        let mut tx = build_uncommitted_normal(2, 2);
        tx.body.key_images[1] = tx.body.key_images[0];
        assert_eq!(
            tx.check_construction(),
            Err(TransactionError::DuplicateKeyImage)
        );
    }

    #[test]
    fn test_missing_fee_is_rejected() {
        let mut tx = build_uncommitted_normal(1, 2);
        tx.body.fee = 0;
        assert_eq!(tx.check_construction(), Err(TransactionError::MissingFee));
    }

    #[test]
    fn test_unbalanced_commitments_are_rejected() {
        let mut tx = build_uncommitted_normal(1, 2);
        tx.body.fee += 1;
        assert_eq!(
            tx.check_construction(),
            Err(TransactionError::CommitmentsDoNotBalance)
        );
    }

    #[test]
    fn test_digest_ignores_suffix() {
        let tx = build_uncommitted_normal(1, 2);
        assert_eq!(tx.digest(), tx.to_committed().digest());
    }
}
