//! Stake refund transactions: the network returning a recalled stake.

use crate::error::TransactionError;
use crate::output::TransactionOutput;
use crate::serialization::{read_vec, write_vec, Reader, Serializable, Writer};
use crate::transaction::{TransactionPrefix, TransactionType};
use crate::TypesResult;
use veil_crypto::{secret_key_to_public_key, Hash, SecretKey};

/// A stake refund. Like the genesis transaction it openly carries its
/// secret key so the single refund output can be audited, and it names
/// the recall transaction it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeRefundTransaction {
    /// Common prefix.
    pub prefix: TransactionPrefix,
    /// The transaction secret key, published by design.
    pub secret_key: SecretKey,
    /// Hash of the recall stake transaction being refunded.
    pub recall_stake_tx: Hash,
    /// Exactly one refund output.
    pub outputs: Vec<TransactionOutput>,
}

impl StakeRefundTransaction {
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
        if self.prefix.version != 1 {
            return Err(TransactionError::InvalidVersion);
        }

        if self.prefix.public_key.is_identity() {
            return Err(TransactionError::PublicKey);
        }

        if self.secret_key.is_zero() {
            return Err(TransactionError::SecretKey);
        }

        if secret_key_to_public_key(&self.secret_key) != self.prefix.public_key {
            return Err(TransactionError::KeypairMismatch);
        }

        if self.recall_stake_tx.is_zero() {
            return Err(TransactionError::RecallStakeTxHash);
        }

        if self.outputs.len() != 1 {
            return Err(TransactionError::InvalidOutputCount);
        }

        for output in &self.outputs {
            output.check_construction()?;
        }

        Ok(())
    }
}

impl Default for StakeRefundTransaction {
    fn default() -> Self {
        StakeRefundTransaction {
            prefix: TransactionPrefix {
                version: 1,
                ..Default::default()
            },
            secret_key: SecretKey::from_bytes_mod_order([0u8; 32]),
            recall_stake_tx: Hash::ZERO,
            outputs: Vec::new(),
        }
    }
}

impl Serializable for StakeRefundTransaction {
    fn serialize(&self, writer: &mut Writer) {
        self.prefix
            .serialize_with_tag(TransactionType::StakeRefund, writer);
        writer.key(&self.secret_key);
        writer.key(&self.recall_stake_tx);
        write_vec(writer, &self.outputs);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(StakeRefundTransaction {
            prefix: TransactionPrefix::deserialize_with_tag(
                TransactionType::StakeRefund,
                reader,
            )?,
            secret_key: reader.key()?,
            recall_stake_tx: reader.key()?,
            outputs: read_vec(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::test_support::build_stake_refund;

    #[test]
    fn test_stake_refund_round_trip() {
        let tx = build_stake_refund();
        let restored = StakeRefundTransaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(tx, restored);
        assert_eq!(tx.hash(), restored.hash());
    }

    #[test]
    fn test_refund_requires_single_output() {
        let mut tx = build_stake_refund();
        tx.outputs.push(tx.outputs[0]);
        assert_eq!(
            tx.check_construction(),
            Err(TransactionError::InvalidOutputCount)
        );
    }

    #[test]
    fn test_refund_requires_recall_reference() {
        let mut tx = build_stake_refund();
        tx.recall_stake_tx = Hash::ZERO;
        assert_eq!(
            tx.check_construction(),
            Err(TransactionError::RecallStakeTxHash)
        );
    }
}
