//! Blocks: canonical layout, digest modes, and producer/validator
//! signing.
//!
//! Transaction hashes live in an ordered set and validator signatures in
//! an ordered map, so serializing a block is deterministic and the block
//! hash is canonical no matter the insertion order.

use crate::config;
use crate::error::{TypesError, TypesResult};
use crate::serialization::{Reader, Serializable, Writer};
use crate::transaction::RewardTransaction;
use std::collections::{BTreeMap, BTreeSet};
use veil_crypto::{
    check_signature, generate_signature, secret_key_to_public_key, Hash, PublicKey, SecretKey,
    Signature,
};

/// Which slice of the block a digest covers.
///
/// The producer signs the block before any signatures exist; validators
/// sign the block including the producer's signature; the block hash
/// covers everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDigestMode {
    /// The full block.
    Full,
    /// Everything up to (excluding) the producer signature.
    Producer,
    /// Everything up to (excluding) the validator signatures.
    Validator,
}

/// A block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block schema version.
    pub version: u64,
    /// Hash of the previous block.
    pub previous_blockhash: Hash,
    /// Creation timestamp, seconds since the epoch.
    pub timestamp: u64,
    /// Height of the block.
    pub block_index: u64,
    /// The reward transaction: genesis at index 0, staker rewards after.
    pub reward_tx: RewardTransaction,
    /// Hashes of the user transactions contained in the block, ordered.
    pub transactions: BTreeSet<Hash>,
    /// The producer that proposed the block.
    pub producer_public_key: PublicKey,
    /// The producer's signature over the producer digest.
    pub producer_signature: Signature,
    /// Validator co-signatures over the validator digest, ordered by
    /// public key.
    pub validator_signatures: BTreeMap<PublicKey, Signature>,
}

impl Default for Block {
    fn default() -> Self {
        Block {
            version: 1,
            previous_blockhash: Hash::ZERO,
            timestamp: 0,
            block_index: 0,
            reward_tx: RewardTransaction::default(),
            transactions: BTreeSet::new(),
            producer_public_key: PublicKey::default(),
            producer_signature: Signature::default(),
            validator_signatures: BTreeMap::new(),
        }
    }
}

impl Block {
    /// Insert a transaction hash into the block.
    pub fn append_transaction_hash(&mut self, hash: Hash) {
        self.transactions.insert(hash);
    }

    /// Insert a validator signature into the block. An existing
    /// signature for the same key is kept.
    pub fn append_validator_signature(&mut self, public_key: PublicKey, signature: Signature) {
        self.validator_signatures.entry(public_key).or_insert(signature);
    }

    /// The block hash: the full message digest.
    pub fn hash(&self) -> Hash {
        self.message_digest(BlockDigestMode::Full)
    }

    /// Whether this block carries the genesis transaction.
    pub fn is_genesis(&self) -> bool {
        self.reward_tx.is_genesis()
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// SHA3 over the serialization slice selected by `mode`.
    pub fn message_digest(&self, mode: BlockDigestMode) -> Hash {
        let mut writer = Writer::new();
        self.serialize_mode(&mut writer, mode);
        writer.hash()
    }

    fn has_producer(&self) -> bool {
        !self.producer_public_key.is_identity() && !self.producer_signature.is_zero()
    }

    fn serialize_mode(&self, writer: &mut Writer, mode: BlockDigestMode) {
        writer.varint(self.version);
        writer.key(&self.previous_blockhash);
        writer.varint(self.timestamp);
        writer.varint(self.block_index);
        writer.key(&self.reward_tx);

        writer.varint(self.transactions.len() as u64);
        for hash in &self.transactions {
            writer.key(hash);
        }

        if matches!(mode, BlockDigestMode::Producer) {
            return;
        }

        let has_producer = self.has_producer();
        writer.boolean(has_producer);

        if has_producer {
            writer.key(&self.producer_public_key);
            writer.key(&self.producer_signature);
        }

        if matches!(mode, BlockDigestMode::Validator) {
            return;
        }

        writer.varint(self.validator_signatures.len() as u64);
        for (public_key, signature) in &self.validator_signatures {
            writer.key(public_key);
            writer.key(signature);
        }
    }

    /// Sign as the producer: sets and returns the producer key and
    /// signature.
    pub fn producer_sign(&mut self, secret_key: &SecretKey) -> (PublicKey, Signature) {
        self.producer_public_key = secret_key_to_public_key(secret_key);

        let digest = self.message_digest(BlockDigestMode::Producer);
        self.producer_signature = generate_signature(&digest, secret_key);

        (self.producer_public_key, self.producer_signature)
    }

    /// Sign as a validator: appends and returns the validator key and
    /// signature. The producer must have signed first.
    pub fn validator_sign(&mut self, secret_key: &SecretKey) -> (PublicKey, Signature) {
        let public_key = secret_key_to_public_key(secret_key);

        let digest = self.message_digest(BlockDigestMode::Validator);
        let signature = generate_signature(&digest, secret_key);

        self.append_validator_signature(public_key, signature);

        (public_key, signature)
    }

    /// Verify the producer's signature.
    pub fn validate_producer_signature(&self) -> bool {
        check_signature(
            &self.message_digest(BlockDigestMode::Producer),
            &self.producer_public_key,
            &self.producer_signature,
        )
    }

    /// Verify every validator signature. At least one is required.
    pub fn validate_validator_signatures(&self) -> bool {
        if self.validator_signatures.is_empty() {
            return false;
        }

        let digest = self.message_digest(BlockDigestMode::Validator);

        self.validator_signatures
            .iter()
            .all(|(public_key, signature)| check_signature(&digest, public_key, signature))
    }

    /// Quick structural validation. Does not verify that the signers were
    /// the elected producer and validators of the round; that needs the
    /// staking engine.
    pub fn validate_construction(&self) -> bool {
        let reward_populated = match &self.reward_tx {
            RewardTransaction::Genesis(tx) => !tx.outputs.is_empty(),
            RewardTransaction::StakerReward(tx) => !tx.staker_outputs.is_empty(),
        };

        if !reward_populated {
            return false;
        }

        // The producer may not co-validate their own block.
        if self
            .validator_signatures
            .contains_key(&self.producer_public_key)
        {
            return false;
        }

        self.validate_producer_signature() && self.validate_validator_signatures()
    }

    /// Whether the signature count reaches the validator threshold for a
    /// round with `round_validators` elected validators.
    pub fn validator_quorum_met(&self, round_validators: usize) -> bool {
        if round_validators == 0 {
            return false;
        }

        self.validator_signatures.len() * 100
            >= config::consensus::VALIDATOR_THRESHOLD * round_validators
    }
}

impl Serializable for Block {
    fn serialize(&self, writer: &mut Writer) {
        self.serialize_mode(writer, BlockDigestMode::Full);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        let version = reader.varint()?;
        let previous_blockhash = reader.key()?;
        let timestamp = reader.varint()?;
        let block_index = reader.varint()?;
        let reward_tx = reader.key()?;

        let count = reader.varint()?;
        if count > reader.remaining() as u64 {
            return Err(TypesError::ImplausibleCount(count));
        }
        let mut transactions = BTreeSet::new();
        for _ in 0..count {
            transactions.insert(reader.key::<Hash>()?);
        }

        let (producer_public_key, producer_signature) = if reader.boolean()? {
            (reader.key()?, reader.key()?)
        } else {
            (PublicKey::default(), Signature::default())
        };

        let count = reader.varint()?;
        if count > reader.remaining() as u64 {
            return Err(TypesError::ImplausibleCount(count));
        }
        let mut validator_signatures = BTreeMap::new();
        for _ in 0..count {
            let public_key = reader.key::<PublicKey>()?;
            let signature = reader.key::<Signature>()?;
            validator_signatures.insert(public_key, signature);
        }

        Ok(Block {
            version,
            previous_blockhash,
            timestamp,
            block_index,
            reward_tx,
            transactions,
            producer_public_key,
            producer_signature,
            validator_signatures,
        })
    }
}
