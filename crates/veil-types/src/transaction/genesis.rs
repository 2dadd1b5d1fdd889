//! The genesis transaction: the one-time mint at block index 0.

use crate::config;
use crate::error::TransactionError;
use crate::output::TransactionOutput;
use crate::serialization::{read_vec, write_vec, Reader, Serializable, Writer};
use crate::transaction::{TransactionPrefix, TransactionType};
use crate::TypesResult;
use veil_crypto::{secret_key_to_public_key, Hash, SecretKey};

/// The genesis transaction. It openly carries its secret key so every
/// node can audit the minted outputs against the configured destination
/// wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisTransaction {
    /// Common prefix.
    pub prefix: TransactionPrefix,
    /// The transaction secret key, published by design.
    pub secret_key: SecretKey,
    /// Exactly `RING_SIZE * 2` outputs so full mixing is possible from
    /// the first spend.
    pub outputs: Vec<TransactionOutput>,
}

impl GenesisTransaction {
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

        if self.outputs.len() != config::transaction::RING_SIZE * 2 {
            return Err(TransactionError::InvalidOutputCount);
        }

        for output in &self.outputs {
            output.check_construction()?;
        }

        Ok(())
    }
}

impl Default for GenesisTransaction {
    fn default() -> Self {
        GenesisTransaction {
            prefix: TransactionPrefix {
                version: 1,
                ..Default::default()
            },
            secret_key: SecretKey::from_bytes_mod_order([0u8; 32]),
            outputs: Vec::new(),
        }
    }
}

impl Serializable for GenesisTransaction {
    fn serialize(&self, writer: &mut Writer) {
        self.prefix
            .serialize_with_tag(TransactionType::Genesis, writer);
        writer.key(&self.secret_key);
        write_vec(writer, &self.outputs);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(GenesisTransaction {
            prefix: TransactionPrefix::deserialize_with_tag(TransactionType::Genesis, reader)?,
            secret_key: reader.key()?,
            outputs: read_vec(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::test_support::build_genesis;

    #[test]
    fn test_genesis_round_trip() {
        let tx = build_genesis();
        let restored = GenesisTransaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(tx, restored);
        assert_eq!(tx.hash(), restored.hash());
    }

    #[test]
    fn test_genesis_construction_check_passes() {
        assert!(build_genesis().check_construction().is_ok());
    }

    #[test]
    fn test_genesis_requires_exact_output_count() {
        let mut tx = build_genesis();
        tx.outputs.pop();
        assert_eq!(
            tx.check_construction(),
            Err(TransactionError::InvalidOutputCount)
        );
    }

    #[test]
    fn test_genesis_requires_matching_keypair() {
        let mut tx = build_genesis();
        let (other_public, _) = veil_crypto::generate_keypair();
        tx.prefix.public_key = other_public;
        assert_eq!(
            tx.check_construction(),
            Err(TransactionError::KeypairMismatch)
        );
    }
}
