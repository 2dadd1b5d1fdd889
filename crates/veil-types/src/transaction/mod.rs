//! The six transaction kinds and their committed/uncommitted forms.
//!
//! Every transaction serializes as a leading varint type tag followed by
//! the variant payload. The user-generated kinds (normal, stake, recall
//! stake) exist in two forms that share one identity:
//!
//! - the **uncommitted** form carries ring participants, ring signatures,
//!   and the range proof;
//! - the **committed** form replaces those with their hashes, shrinking
//!   the transaction once it is included in a block.
//!
//! ```text
//! digest   = SHA3(prefix ∥ body ∥ type data)
//! sig_hash = SHA3(pseudo commitments ∥ ring participants ∥ signatures)
//! rp_hash  = range_proof.hash()
//! tx_hash  = SHA3(digest ∥ sig_hash ∥ rp_hash)
//! pow_seed = SHA3(digest ∥ rp_hash)
//! pow_hash = argon2id(pow_seed)
//! ```
//!
//! Both forms therefore hash to the same `tx_hash`.

mod genesis;
mod normal;
mod recall_stake;
mod stake;
mod stake_refund;
mod staker_reward;

pub use genesis::GenesisTransaction;
pub use normal::{NormalTransaction, UncommittedNormalTransaction};
pub use recall_stake::{RecallStakeData, RecallStakeTransaction, UncommittedRecallStakeTransaction};
pub use stake::{StakeData, StakeTransaction, UncommittedStakeTransaction};
pub use stake_refund::StakeRefundTransaction;
pub use staker_reward::StakerRewardTransaction;

use crate::config;
use crate::error::{TransactionError, TypesError, TypesResult};
use crate::output::TransactionOutput;
use crate::serialization::{read_vec, write_vec, Reader, Serializable, Writer};
use veil_crypto::{ClsagSignature, Commitment, Hash, KeyImage, PublicKey, RangeProof};

/// Transaction type tags. The tag is the first varint of every canonical
/// transaction serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum TransactionType {
    /// The one-time genesis mint.
    Genesis = 0,
    /// Per-round staker reward and penalty bookkeeping.
    StakerReward = 1,
    /// A user value transfer.
    Normal = 2,
    /// A candidacy or vote stake.
    Stake = 3,
    /// A stake recall request.
    RecallStake = 4,
    /// The network-generated refund for a recalled stake.
    StakeRefund = 5,
}

impl TransactionType {
    /// Map a wire tag to a transaction type.
    pub fn from_tag(tag: u64) -> TypesResult<Self> {
        match tag {
            0 => Ok(TransactionType::Genesis),
            1 => Ok(TransactionType::StakerReward),
            2 => Ok(TransactionType::Normal),
            3 => Ok(TransactionType::Stake),
            4 => Ok(TransactionType::RecallStake),
            5 => Ok(TransactionType::StakeRefund),
            other => Err(TypesError::UnknownTransactionType(other)),
        }
    }

    /// The wire tag for this type.
    pub fn tag(&self) -> u64 {
        *self as u64
    }
}

/// Common transaction prefix: version, unlock block, and the transaction
/// public key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionPrefix {
    /// Variant-specific schema version.
    pub version: u64,
    /// First block index at which the outputs become spendable.
    pub unlock_block: u64,
    /// Transaction public key.
    pub public_key: PublicKey,
}

impl TransactionPrefix {
    pub(crate) fn serialize_with_tag(&self, tag: TransactionType, writer: &mut Writer) {
        writer.varint(tag.tag());
        writer.varint(self.version);
        writer.varint(self.unlock_block);
        writer.key(&self.public_key);
    }

    pub(crate) fn deserialize_with_tag(
        expected: TransactionType,
        reader: &mut Reader<'_>,
    ) -> TypesResult<Self> {
        let tag = reader.varint()?;
        if tag != expected.tag() {
            return Err(TypesError::UnknownTransactionType(tag));
        }
        Ok(TransactionPrefix {
            version: reader.varint()?,
            unlock_block: reader.varint()?,
            public_key: reader.key()?,
        })
    }
}

/// Common user transaction body: proof-of-work nonce, fee, input key
/// images, and outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionBody {
    /// Proof-of-work nonce.
    pub nonce: u64,
    /// Network fee in atomic units.
    pub fee: u64,
    /// One key image per spent input.
    pub key_images: Vec<KeyImage>,
    /// Confidential outputs.
    pub outputs: Vec<TransactionOutput>,
}

impl Serializable for TransactionBody {
    fn serialize(&self, writer: &mut Writer) {
        writer.varint(self.nonce);
        writer.varint(self.fee);
        write_vec(writer, &self.key_images);
        write_vec(writer, &self.outputs);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(TransactionBody {
            nonce: reader.varint()?,
            fee: reader.varint()?,
            key_images: read_vec(reader)?,
            outputs: read_vec(reader)?,
        })
    }
}

impl TransactionBody {
    /// Commitments of all outputs, in output order.
    pub fn output_commitments(&self) -> Vec<Commitment> {
        self.outputs.iter().map(|output| output.commitment).collect()
    }

    /// Structural checks shared by every user transaction kind.
    pub(crate) fn check_construction(&self) -> Result<(), TransactionError> {
        if self.fee == 0 {
            return Err(TransactionError::MissingFee);
        }

        if self.key_images.is_empty() || self.key_images.len() > config::transaction::MAXIMUM_INPUTS
        {
            return Err(TransactionError::InvalidInputCount);
        }

        for key_image in &self.key_images {
            if !key_image.check_subgroup() {
                return Err(TransactionError::InvalidKeyImage);
            }
        }

        let mut deduped: Vec<&KeyImage> = self.key_images.iter().collect();
        deduped.sort();
        deduped.dedup();
        if deduped.len() != self.key_images.len() {
            return Err(TransactionError::DuplicateKeyImage);
        }

        if self.outputs.len() < config::transaction::MINIMUM_OUTPUTS
            || self.outputs.len() > config::transaction::MAXIMUM_OUTPUTS
        {
            return Err(TransactionError::InvalidOutputCount);
        }

        for output in &self.outputs {
            output.check_construction()?;
        }

        Ok(())
    }
}

/// The full signature suffix carried by uncommitted user transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UncommittedSuffix {
    /// One pseudo commitment per input.
    pub pseudo_commitments: Vec<Commitment>,
    /// Output hashes of the ring members, shared by every input ring.
    pub ring_participants: Vec<Hash>,
    /// One ring signature per input.
    pub signatures: Vec<ClsagSignature>,
    /// Aggregated range proof over the output commitments.
    pub range_proof: RangeProof,
}

impl Serializable for UncommittedSuffix {
    fn serialize(&self, writer: &mut Writer) {
        write_vec(writer, &self.pseudo_commitments);
        write_vec(writer, &self.ring_participants);
        write_vec(writer, &self.signatures);
        writer.key(&self.range_proof);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(UncommittedSuffix {
            pseudo_commitments: read_vec(reader)?,
            ring_participants: read_vec(reader)?,
            signatures: read_vec(reader)?,
            range_proof: reader.key()?,
        })
    }
}

impl UncommittedSuffix {
    /// SHA3 over pseudo commitments, ring participants, and signatures.
    /// This is the hash the committed form stores verbatim.
    pub fn signature_hash(&self) -> Hash {
        let mut writer = Writer::new();
        write_vec(&mut writer, &self.pseudo_commitments);
        write_vec(&mut writer, &self.ring_participants);
        write_vec(&mut writer, &self.signatures);
        writer.hash()
    }

    /// Hash of the range proof.
    pub fn range_proof_hash(&self) -> Hash {
        self.range_proof.hash()
    }

    /// Collapse to the committed suffix.
    pub fn to_committed(&self) -> CommittedSuffix {
        CommittedSuffix {
            signature_hash: self.signature_hash(),
            range_proof_hash: self.range_proof_hash(),
        }
    }

    /// Structural checks shared by every uncommitted user transaction.
    pub(crate) fn check_construction(
        &self,
        body: &TransactionBody,
    ) -> Result<(), TransactionError> {
        if self.pseudo_commitments.len() != body.key_images.len() {
            return Err(TransactionError::InvalidPseudoCommitmentCount);
        }

        let balanced = veil_crypto::check_commitments_parity(
            &self.pseudo_commitments,
            &body.output_commitments(),
            body.fee,
        )
        .map_err(|_| TransactionError::CommitmentsDoNotBalance)?;

        if !balanced {
            return Err(TransactionError::CommitmentsDoNotBalance);
        }

        if !self.range_proof.check_construction() {
            return Err(TransactionError::InvalidRangeProof);
        }

        if self.signatures.len() != body.key_images.len() {
            return Err(TransactionError::SignatureSizeMismatch);
        }

        for signature in &self.signatures {
            if !signature.check_construction(config::transaction::RING_SIZE) {
                return Err(TransactionError::InvalidSignature);
            }
        }

        Ok(())
    }
}

/// The pruned suffix carried by committed user transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommittedSuffix {
    /// Hash of the pseudo commitments, ring participants, and signatures.
    pub signature_hash: Hash,
    /// Hash of the range proof.
    pub range_proof_hash: Hash,
}

impl Serializable for CommittedSuffix {
    fn serialize(&self, writer: &mut Writer) {
        writer.key(&self.signature_hash);
        writer.key(&self.range_proof_hash);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(CommittedSuffix {
            signature_hash: reader.key()?,
            range_proof_hash: reader.key()?,
        })
    }
}

/// Bind a digest to the signature and range-proof hashes: the shared
/// transaction identity of both forms.
pub(crate) fn transaction_hash(digest: Hash, signature_hash: Hash, range_proof_hash: Hash) -> Hash {
    let mut writer = Writer::with_capacity(96);
    writer.key(&digest);
    writer.key(&signature_hash);
    writer.key(&range_proof_hash);
    writer.hash()
}

/// The Argon2id proof-of-work hash for a digest and range-proof hash.
pub(crate) fn proof_of_work_hash(digest: Hash, range_proof_hash: Hash) -> Hash {
    let mut writer = Writer::with_capacity(64);
    writer.key(&digest);
    writer.key(&range_proof_hash);
    let seed = writer.hash();

    veil_crypto::argon2id(
        &seed,
        config::transaction::pow::ITERATIONS,
        config::transaction::pow::MEMORY_KIB,
        config::transaction::pow::THREADS,
    )
    .expect("static Argon2id parameters are valid")
}

/// A committed transaction: what blocks and storage carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Genesis(GenesisTransaction),
    StakerReward(StakerRewardTransaction),
    Normal(NormalTransaction),
    Stake(StakeTransaction),
    RecallStake(RecallStakeTransaction),
    StakeRefund(StakeRefundTransaction),
}

impl Transaction {
    /// The type tag of the variant.
    pub fn tx_type(&self) -> TransactionType {
        match self {
            Transaction::Genesis(_) => TransactionType::Genesis,
            Transaction::StakerReward(_) => TransactionType::StakerReward,
            Transaction::Normal(_) => TransactionType::Normal,
            Transaction::Stake(_) => TransactionType::Stake,
            Transaction::RecallStake(_) => TransactionType::RecallStake,
            Transaction::StakeRefund(_) => TransactionType::StakeRefund,
        }
    }

    /// The transaction hash.
    pub fn hash(&self) -> Hash {
        match self {
            Transaction::Genesis(tx) => tx.hash(),
            Transaction::StakerReward(tx) => tx.hash(),
            Transaction::Normal(tx) => tx.hash(),
            Transaction::Stake(tx) => tx.hash(),
            Transaction::RecallStake(tx) => tx.hash(),
            Transaction::StakeRefund(tx) => tx.hash(),
        }
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Structural validity of the variant.
    pub fn check_construction(&self) -> Result<(), TransactionError> {
        match self {
            Transaction::Genesis(tx) => tx.check_construction(),
            Transaction::StakerReward(tx) => tx.check_construction(),
            Transaction::Normal(tx) => tx.check_construction(),
            Transaction::Stake(tx) => tx.check_construction(),
            Transaction::RecallStake(tx) => tx.check_construction(),
            Transaction::StakeRefund(tx) => tx.check_construction(),
        }
    }

    /// Key images of the variant, empty for non-user transactions.
    pub fn key_images(&self) -> &[KeyImage] {
        match self {
            Transaction::Normal(tx) => &tx.body.key_images,
            Transaction::Stake(tx) => &tx.body.key_images,
            Transaction::RecallStake(tx) => &tx.body.key_images,
            _ => &[],
        }
    }

    /// Outputs created by the variant, empty for staker rewards.
    pub fn outputs(&self) -> &[TransactionOutput] {
        match self {
            Transaction::Genesis(tx) => &tx.outputs,
            Transaction::Normal(tx) => &tx.body.outputs,
            Transaction::Stake(tx) => &tx.body.outputs,
            Transaction::RecallStake(tx) => &tx.body.outputs,
            Transaction::StakeRefund(tx) => &tx.outputs,
            Transaction::StakerReward(_) => &[],
        }
    }

    /// Unlock block of the created outputs.
    pub fn unlock_block(&self) -> u64 {
        match self {
            Transaction::Genesis(tx) => tx.prefix.unlock_block,
            Transaction::Normal(tx) => tx.prefix.unlock_block,
            Transaction::Stake(tx) => tx.prefix.unlock_block,
            Transaction::RecallStake(tx) => tx.prefix.unlock_block,
            Transaction::StakeRefund(tx) => tx.prefix.unlock_block,
            Transaction::StakerReward(_) => 0,
        }
    }
}

impl Serializable for Transaction {
    fn serialize(&self, writer: &mut Writer) {
        match self {
            Transaction::Genesis(tx) => tx.serialize(writer),
            Transaction::StakerReward(tx) => tx.serialize(writer),
            Transaction::Normal(tx) => tx.serialize(writer),
            Transaction::Stake(tx) => tx.serialize(writer),
            Transaction::RecallStake(tx) => tx.serialize(writer),
            Transaction::StakeRefund(tx) => tx.serialize(writer),
        }
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        match TransactionType::from_tag(reader.peek_varint()?)? {
            TransactionType::Genesis => Ok(Transaction::Genesis(reader.key()?)),
            TransactionType::StakerReward => Ok(Transaction::StakerReward(reader.key()?)),
            TransactionType::Normal => Ok(Transaction::Normal(reader.key()?)),
            TransactionType::Stake => Ok(Transaction::Stake(reader.key()?)),
            TransactionType::RecallStake => Ok(Transaction::RecallStake(reader.key()?)),
            TransactionType::StakeRefund => Ok(Transaction::StakeRefund(reader.key()?)),
        }
    }
}

/// An uncommitted user transaction: what wallets build and relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UncommittedTransaction {
    Normal(UncommittedNormalTransaction),
    Stake(UncommittedStakeTransaction),
    RecallStake(UncommittedRecallStakeTransaction),
}

impl UncommittedTransaction {
    /// The type tag of the variant.
    pub fn tx_type(&self) -> TransactionType {
        match self {
            UncommittedTransaction::Normal(_) => TransactionType::Normal,
            UncommittedTransaction::Stake(_) => TransactionType::Stake,
            UncommittedTransaction::RecallStake(_) => TransactionType::RecallStake,
        }
    }

    /// The transaction hash, identical to the committed form's.
    pub fn hash(&self) -> Hash {
        match self {
            UncommittedTransaction::Normal(tx) => tx.hash(),
            UncommittedTransaction::Stake(tx) => tx.hash(),
            UncommittedTransaction::RecallStake(tx) => tx.hash(),
        }
    }

    /// The digest covering prefix, body, and type data.
    pub fn digest(&self) -> Hash {
        match self {
            UncommittedTransaction::Normal(tx) => tx.digest(),
            UncommittedTransaction::Stake(tx) => tx.digest(),
            UncommittedTransaction::RecallStake(tx) => tx.digest(),
        }
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Network fee carried by the body.
    pub fn fee(&self) -> u64 {
        self.body().fee
    }

    /// The shared user body.
    pub fn body(&self) -> &TransactionBody {
        match self {
            UncommittedTransaction::Normal(tx) => &tx.body,
            UncommittedTransaction::Stake(tx) => &tx.body,
            UncommittedTransaction::RecallStake(tx) => &tx.body,
        }
    }

    /// The full signature suffix.
    pub fn suffix(&self) -> &UncommittedSuffix {
        match self {
            UncommittedTransaction::Normal(tx) => &tx.suffix,
            UncommittedTransaction::Stake(tx) => &tx.suffix,
            UncommittedTransaction::RecallStake(tx) => &tx.suffix,
        }
    }

    /// Structural validity of the variant.
    pub fn check_construction(&self) -> Result<(), TransactionError> {
        match self {
            UncommittedTransaction::Normal(tx) => tx.check_construction(),
            UncommittedTransaction::Stake(tx) => tx.check_construction(),
            UncommittedTransaction::RecallStake(tx) => tx.check_construction(),
        }
    }

    /// The Argon2id proof-of-work hash.
    pub fn pow_hash(&self) -> Hash {
        match self {
            UncommittedTransaction::Normal(tx) => tx.pow_hash(),
            UncommittedTransaction::Stake(tx) => tx.pow_hash(),
            UncommittedTransaction::RecallStake(tx) => tx.pow_hash(),
        }
    }

    /// Collapse to the committed form.
    pub fn to_committed(&self) -> Transaction {
        match self {
            UncommittedTransaction::Normal(tx) => Transaction::Normal(tx.to_committed()),
            UncommittedTransaction::Stake(tx) => Transaction::Stake(tx.to_committed()),
            UncommittedTransaction::RecallStake(tx) => {
                Transaction::RecallStake(tx.to_committed())
            }
        }
    }
}

impl Serializable for UncommittedTransaction {
    fn serialize(&self, writer: &mut Writer) {
        match self {
            UncommittedTransaction::Normal(tx) => tx.serialize(writer),
            UncommittedTransaction::Stake(tx) => tx.serialize(writer),
            UncommittedTransaction::RecallStake(tx) => tx.serialize(writer),
        }
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        match TransactionType::from_tag(reader.peek_varint()?)? {
            TransactionType::Normal => Ok(UncommittedTransaction::Normal(reader.key()?)),
            TransactionType::Stake => Ok(UncommittedTransaction::Stake(reader.key()?)),
            TransactionType::RecallStake => {
                Ok(UncommittedTransaction::RecallStake(reader.key()?))
            }
            other => Err(TypesError::UnknownTransactionType(other.tag())),
        }
    }
}

/// The reward transaction of a block: genesis at index 0, staker rewards
/// everywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardTransaction {
    Genesis(GenesisTransaction),
    StakerReward(StakerRewardTransaction),
}

impl RewardTransaction {
    /// The transaction hash.
    pub fn hash(&self) -> Hash {
        match self {
            RewardTransaction::Genesis(tx) => tx.hash(),
            RewardTransaction::StakerReward(tx) => tx.hash(),
        }
    }

    /// Whether this is the genesis mint.
    pub fn is_genesis(&self) -> bool {
        matches!(self, RewardTransaction::Genesis(_))
    }

    /// The committed transaction equivalent, used on the storage path.
    pub fn to_transaction(&self) -> Transaction {
        match self {
            RewardTransaction::Genesis(tx) => Transaction::Genesis(tx.clone()),
            RewardTransaction::StakerReward(tx) => Transaction::StakerReward(tx.clone()),
        }
    }
}

impl Serializable for RewardTransaction {
    fn serialize(&self, writer: &mut Writer) {
        match self {
            RewardTransaction::Genesis(tx) => tx.serialize(writer),
            RewardTransaction::StakerReward(tx) => tx.serialize(writer),
        }
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        match TransactionType::from_tag(reader.peek_varint()?)? {
            TransactionType::Genesis => Ok(RewardTransaction::Genesis(reader.key()?)),
            TransactionType::StakerReward => Ok(RewardTransaction::StakerReward(reader.key()?)),
            other => Err(TypesError::InvalidRewardTransactionType(other.tag())),
        }
    }
}

impl Default for RewardTransaction {
    /// Defaults to a staker reward: there is only ever one genesis.
    fn default() -> Self {
        RewardTransaction::StakerReward(StakerRewardTransaction::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::test_support::{
        build_uncommitted_normal, build_uncommitted_stake,
    };

    #[test]
    fn test_unknown_tag_is_rejected() {
        let mut writer = Writer::new();
        writer.varint(42);
        assert!(matches!(
            Transaction::from_bytes(writer.as_bytes()),
            Err(TypesError::UnknownTransactionType(42))
        ));
    }

    #[test]
    fn test_committed_and_uncommitted_hashes_match() {
        let tx = build_uncommitted_normal(2, 3);
        let committed = tx.to_committed();
        assert_eq!(
            UncommittedTransaction::Normal(tx).hash(),
            committed.hash()
        );

        let stake = build_uncommitted_stake(1, 100_000);
        assert_eq!(stake.hash(), stake.to_committed().hash());
    }

    #[test]
    fn test_transaction_round_trip_through_committed_sum() {
        let tx = build_uncommitted_normal(1, 2).to_committed();
        let committed = Transaction::Normal(tx);
        let restored = Transaction::from_bytes(&committed.to_bytes()).unwrap();
        assert_eq!(committed, restored);
        assert_eq!(committed.hash(), restored.hash());
    }

    #[test]
    fn test_uncommitted_round_trip() {
        let tx = UncommittedTransaction::Normal(build_uncommitted_normal(2, 2));
        let restored = UncommittedTransaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(tx, restored);
    }

    #[test]
    fn test_reward_transaction_rejects_user_tags() {
        let tx = build_uncommitted_normal(1, 2).to_committed();
        let bytes = Transaction::Normal(tx).to_bytes();
        assert!(matches!(
            RewardTransaction::from_bytes(&bytes),
            Err(TypesError::InvalidRewardTransactionType(2))
        ));
    }
}

#[cfg(test)]
pub(crate) mod test_support;
