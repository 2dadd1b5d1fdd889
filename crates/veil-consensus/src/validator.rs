//! The transaction validator.
//!
//! Stateless apart from read-only handles to blockchain storage and the
//! staking engine. `check` enforces everything a transaction can prove
//! about itself (construction, proof-of-work floor, fee schedule, and
//! for network transactions the configured genesis audit); `validate`
//! additionally enforces everything that needs chain state (range
//! proof, ring signatures, double spends, ring-member resolution,
//! genesis pinning, staking rules, and recall/refund references).

use crate::fees;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;
use veil_crypto::{
    check_ring_signature, check_signature, derivation_to_scalar, derive_public_key,
    generate_amount_mask, generate_commitment_blinding_factor, generate_key_derivation,
    generate_pedersen_commitment, toggle_masked_amount, verify_range_proof,
};
use veil_staking::{StakingEngine, StakingError};
use veil_storage::{BlockchainStorage, StorageError};
use veil_types::transaction::{GenesisTransaction, RecallStakeData, StakeData};
use veil_types::{
    config, Transaction, TransactionBody, TransactionError, UncommittedSuffix,
    UncommittedTransaction,
};

/// Result alias for validation operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// Validation errors.
#[derive(Error, Debug)]
pub enum ConsensusError {
    /// A transaction-level rule failed.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Reading chain state failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A staking rule failed.
    #[error(transparent)]
    Staking(#[from] StakingError),

    /// The configured genesis destination wallet failed to decode.
    #[error(transparent)]
    Address(#[from] veil_crypto::CryptoError),
}

/// The transaction validator.
pub struct TransactionValidator {
    blockchain_storage: Arc<BlockchainStorage>,
    staking_engine: Arc<StakingEngine>,
}

impl TransactionValidator {
    /// Create a validator over the given storage and staking handles.
    pub fn new(
        blockchain_storage: Arc<BlockchainStorage>,
        staking_engine: Arc<StakingEngine>,
    ) -> Self {
        TransactionValidator {
            blockchain_storage,
            staking_engine,
        }
    }

    fn check_pow_and_fee(&self, pow_zeros: u32, fee: u64, size: usize) -> ConsensusResult<()> {
        if pow_zeros < config::transaction::fees::MINIMUM_POW_ZEROS {
            return Err(TransactionError::MinimumPow.into());
        }

        let required = fees::calculate_transaction_fee(size, pow_zeros);
        if fee < required {
            trace!(fee, required, "Transaction fee below requirement");
            return Err(TransactionError::LowFee.into());
        }

        Ok(())
    }

    /// Chain-free checks for an uncommitted transaction: construction,
    /// the proof-of-work floor, and the fee schedule.
    pub fn check_uncommitted(&self, transaction: &UncommittedTransaction) -> ConsensusResult<()> {
        transaction.check_construction()?;

        let pow_zeros = transaction.pow_hash().leading_zeros();
        self.check_pow_and_fee(pow_zeros, transaction.fee(), transaction.size())
    }

    /// Chain-free checks for a committed transaction. User transactions
    /// keep their proof-of-work and fee obligations in committed form;
    /// the genesis transaction is audited against the configured
    /// destination wallet.
    pub fn check(&self, transaction: &Transaction) -> ConsensusResult<()> {
        transaction.check_construction()?;

        match transaction {
            Transaction::Normal(tx) => {
                self.check_pow_and_fee(
                    tx.pow_hash().leading_zeros(),
                    tx.body.fee,
                    tx.size(),
                )
            }
            Transaction::Stake(tx) => {
                self.check_pow_and_fee(
                    tx.pow_hash().leading_zeros(),
                    tx.body.fee,
                    tx.size(),
                )
            }
            Transaction::RecallStake(tx) => {
                self.check_pow_and_fee(
                    tx.pow_hash().leading_zeros(),
                    tx.body.fee,
                    tx.size(),
                )
            }
            Transaction::Genesis(tx) => self.check_genesis(tx),
            Transaction::StakerReward(_) | Transaction::StakeRefund(_) => Ok(()),
        }
    }

    /// Audit the genesis transaction against the configured material:
    /// the published secret key, the destination wallet, and every
    /// derived output key, amount, and commitment.
    fn check_genesis(&self, transaction: &GenesisTransaction) -> ConsensusResult<()> {
        use config::transaction::genesis;

        if transaction.secret_key != *genesis::TX_SECRET_KEY {
            return Err(TransactionError::SecretKey.into());
        }

        let (public_spend, public_view) = veil_crypto::decode_address(
            config::PUBLIC_ADDRESS_PREFIX,
            &genesis::DESTINATION_WALLET,
        )?;

        let derivation = generate_key_derivation(&public_view, &transaction.secret_key)?;

        for (index, output) in transaction.outputs.iter().enumerate() {
            let scalar = derivation_to_scalar(&derivation, index as u64);
            let blinding_factor = generate_commitment_blinding_factor(&scalar);
            let amount_mask = generate_amount_mask(&scalar);

            if derive_public_key(&scalar, &public_spend)? != output.public_ephemeral {
                return Err(TransactionError::OutputPublicEphemeral.into());
            }

            if toggle_masked_amount(amount_mask, output.amount) != genesis::OUTPUT_AMOUNT {
                return Err(TransactionError::OutputAmount.into());
            }

            if generate_pedersen_commitment(&blinding_factor, genesis::OUTPUT_AMOUNT)
                != output.commitment
            {
                return Err(TransactionError::OutputCommitment.into());
            }
        }

        Ok(())
    }

    /// Verify the cryptographic suffix of an uncommitted transaction
    /// against chain state: range proof, double spends, ring-member
    /// resolution, and one ring signature per input.
    fn validate_suffix(
        &self,
        digest: veil_crypto::Hash,
        body: &TransactionBody,
        suffix: &UncommittedSuffix,
    ) -> ConsensusResult<()> {
        if !verify_range_proof(&suffix.range_proof, &body.output_commitments()) {
            return Err(TransactionError::InvalidRangeProof.into());
        }

        if self
            .blockchain_storage
            .any_key_image_exists(&body.key_images)?
        {
            return Err(TransactionError::KeyImageAlreadyExists.into());
        }

        // Resolve the ring members; an unresolvable participant is
        // fatal to the transaction.
        let inputs = self
            .blockchain_storage
            .get_transaction_outputs(&suffix.ring_participants)?;

        let ring: Vec<_> = inputs.iter().map(|(output, _)| output.public_ephemeral).collect();
        let commitments: Vec<_> = inputs.iter().map(|(output, _)| output.commitment).collect();

        for (signature, key_image) in suffix.signatures.iter().zip(body.key_images.iter()) {
            if !check_ring_signature(&digest, key_image, &ring, signature, &commitments) {
                return Err(TransactionError::InvalidRingSignature.into());
            }
        }

        Ok(())
    }

    fn validate_stake_rules(&self, version: u64, data: &StakeData) -> ConsensusResult<()> {
        match version {
            1 => {
                if self.staking_engine.candidate_exists(&data.candidate_public_key)? {
                    return Err(StakingError::CandidateAlreadyExists.into());
                }

                if data.stake_amount != config::consensus::REQUIRED_CANDIDACY_AMOUNT {
                    return Err(StakingError::CandidateAmountInvalid(data.stake_amount).into());
                }
            }
            2 => {
                if !self.staking_engine.candidate_exists(&data.candidate_public_key)? {
                    return Err(StakingError::CandidateNotFound.into());
                }

                if data.stake_amount < config::consensus::MINIMUM_STAKE_AMOUNT {
                    return Err(StakingError::StakeAmount(data.stake_amount).into());
                }
            }
            other => return Err(StakingError::InvalidVersion(other).into()),
        }

        Ok(())
    }

    /// A recall must name a staker with a recorded stake on the
    /// candidate, and its authorization digest must verify against the
    /// view and spend keys the stake was recorded under.
    fn validate_recall_rules(&self, data: &RecallStakeData) -> ConsensusResult<()> {
        let stakes = self.staking_engine.get_staker_stakes(&data.staker_id)?;

        let candidate_stakes = stakes
            .get(&data.candidate_public_key)
            .filter(|stakes| !stakes.is_empty())
            .ok_or(StakingError::StakerNotFound)?;

        let record = &candidate_stakes[0];
        let digest = data.authorization_digest();

        if !check_signature(&digest, &record.public_view_key, &data.view_signature) {
            return Err(TransactionError::RecallViewSignature.into());
        }

        if !check_signature(&digest, &record.public_spend_key, &data.spend_signature) {
            return Err(TransactionError::RecallSpendSignature.into());
        }

        Ok(())
    }

    /// Full validation of an uncommitted transaction against chain
    /// state.
    pub fn validate_uncommitted(
        &self,
        transaction: &UncommittedTransaction,
    ) -> ConsensusResult<()> {
        self.check_uncommitted(transaction)?;

        self.validate_suffix(transaction.digest(), transaction.body(), transaction.suffix())?;

        match transaction {
            UncommittedTransaction::Normal(_) => Ok(()),
            UncommittedTransaction::Stake(tx) => {
                self.validate_stake_rules(tx.prefix.version, &tx.data)
            }
            UncommittedTransaction::RecallStake(tx) => self.validate_recall_rules(&tx.data),
        }
    }

    /// Full validation of a committed transaction against chain state.
    /// The pruned suffix cannot be re-verified; committed validation
    /// covers double spends, genesis pinning, staking rules, and
    /// recall/refund references.
    pub fn validate(&self, transaction: &Transaction) -> ConsensusResult<()> {
        self.check(transaction)?;

        match transaction {
            Transaction::Normal(tx) => {
                if self
                    .blockchain_storage
                    .any_key_image_exists(&tx.body.key_images)?
                {
                    return Err(TransactionError::KeyImageAlreadyExists.into());
                }
                Ok(())
            }
            Transaction::Stake(tx) => {
                if self
                    .blockchain_storage
                    .any_key_image_exists(&tx.body.key_images)?
                {
                    return Err(TransactionError::KeyImageAlreadyExists.into());
                }
                self.validate_stake_rules(tx.prefix.version, &tx.data)
            }
            Transaction::RecallStake(tx) => {
                if self
                    .blockchain_storage
                    .any_key_image_exists(&tx.body.key_images)?
                {
                    return Err(TransactionError::KeyImageAlreadyExists.into());
                }
                self.validate_recall_rules(&tx.data)
            }
            Transaction::Genesis(_) => {
                if self.blockchain_storage.block_index_exists(0)? {
                    return Err(TransactionError::GenesisAlreadyExists.into());
                }
                Ok(())
            }
            Transaction::StakeRefund(tx) => {
                if !self
                    .blockchain_storage
                    .transaction_exists(&tx.recall_stake_tx)?
                {
                    return Err(TransactionError::RecallStakeTxHash.into());
                }
                Ok(())
            }
            Transaction::StakerReward(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::scalar::Scalar;
    use tempfile::TempDir;
    use veil_crypto::{
        generate_key_image, generate_keypair, generate_pedersen_commitment,
        generate_pseudo_commitments, generate_range_proof, generate_signature, random_hash,
        random_scalar, Commitment, Hash, PublicKey, SecretKey,
    };
    use veil_types::{
        Block, RewardTransaction, StakeRefundTransaction, StakerOutput,
        StakerRewardTransaction, TransactionOutput, TransactionPrefix,
        UncommittedNormalTransaction, UncommittedRecallStakeTransaction,
        UncommittedStakeTransaction,
    };

    fn engines() -> (
        TempDir,
        Arc<BlockchainStorage>,
        Arc<StakingEngine>,
        TransactionValidator,
    ) {
        let dir = TempDir::new().unwrap();
        let storage = BlockchainStorage::instance(dir.path()).unwrap();
        let staking = StakingEngine::instance(dir.path()).unwrap();
        let validator = TransactionValidator::new(Arc::clone(&storage), Arc::clone(&staking));
        (dir, storage, staking, validator)
    }

    fn reward_tx() -> RewardTransaction {
        let mut reward = StakerRewardTransaction::new();
        reward
            .staker_outputs
            .push(StakerOutput::new(random_hash(), 1_000));
        RewardTransaction::StakerReward(reward)
    }

    fn sorted(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
        transactions.sort_by_key(|a| a.hash());
        transactions
    }

    fn put_block_with(
        storage: &BlockchainStorage,
        index: u64,
        reward: RewardTransaction,
        transactions: Vec<Transaction>,
    ) -> Block {
        let transactions = sorted(transactions);
        let mut block = Block {
            block_index: index,
            timestamp: 1_000 + index,
            previous_blockhash: veil_crypto::sha3(index.to_be_bytes()),
            reward_tx: reward,
            ..Default::default()
        };
        for transaction in &transactions {
            block.append_transaction_hash(transaction.hash());
        }
        storage.put_block(&block, &transactions).unwrap();
        block
    }

    /// An output in storage whose one-time secret key we control.
    struct OwnedOutput {
        secret: SecretKey,
        output: TransactionOutput,
    }

    /// Seed the chain with `count` spendable outputs at block `index`.
    fn seed_spendable_outputs(
        storage: &BlockchainStorage,
        index: u64,
        count: usize,
    ) -> Vec<OwnedOutput> {
        let mut owned = Vec::with_capacity(count);
        let mut transactions = Vec::with_capacity(count);

        for _ in 0..count {
            let (tx_public, tx_secret) = generate_keypair();
            let (ephemeral_public, ephemeral_secret) = generate_keypair();

            let output = TransactionOutput::new(
                ephemeral_public,
                100_000,
                generate_pedersen_commitment(&random_scalar(), 100_000),
            );

            transactions.push(Transaction::StakeRefund(StakeRefundTransaction {
                prefix: TransactionPrefix {
                    version: 1,
                    unlock_block: 0,
                    public_key: tx_public,
                },
                secret_key: tx_secret,
                recall_stake_tx: random_hash(),
                outputs: vec![output],
            }));

            owned.push(OwnedOutput {
                secret: ephemeral_secret,
                output,
            });
        }

        put_block_with(storage, index, reward_tx(), transactions);
        owned
    }

    /// Build a fully signed spend of `owned[real_index]` over a ring of
    /// every seeded output.
    fn build_spend(
        owned: &[OwnedOutput],
        real_index: usize,
        fee: u64,
    ) -> UncommittedNormalTransaction {
        // The ring is ordered by output hash, mirroring what random
        // output sampling returns.
        let mut ring: Vec<&OwnedOutput> = owned.iter().collect();
        ring.sort_by_key(|entry| entry.output.hash());

        let real_hash = owned[real_index].output.hash();
        let secret_index = ring
            .iter()
            .position(|entry| entry.output.hash() == real_hash)
            .unwrap();
        let secret = &ring[secret_index].secret;

        let ring_participants: Vec<Hash> =
            ring.iter().map(|entry| entry.output.hash()).collect();
        let ring_keys: Vec<PublicKey> =
            ring.iter().map(|entry| entry.output.public_ephemeral).collect();
        let ring_commitments: Vec<Commitment> =
            ring.iter().map(|entry| entry.output.commitment).collect();

        // Two outputs plus the fee, balanced against one pseudo input.
        let amounts = [60_000u64, 40_000 - fee];
        let blindings: Vec<Scalar> = vec![random_scalar(), random_scalar()];
        let (range_proof, commitments) = generate_range_proof(&amounts, &blindings).unwrap();
        let (pseudo_commitments, _) = generate_pseudo_commitments(&[100_000], &blindings);

        let outputs: Vec<TransactionOutput> = commitments
            .iter()
            .zip(amounts.iter())
            .map(|(commitment, amount)| {
                let (public_ephemeral, _) = generate_keypair();
                TransactionOutput::new(public_ephemeral, *amount, *commitment)
            })
            .collect();

        let (tx_public, _) = generate_keypair();
        let mut transaction = UncommittedNormalTransaction {
            prefix: TransactionPrefix {
                version: 1,
                unlock_block: 0,
                public_key: tx_public,
            },
            body: veil_types::TransactionBody {
                nonce: 0,
                fee,
                key_images: vec![generate_key_image(secret)],
                outputs,
            },
            extra: Vec::new(),
            suffix: Default::default(),
        };

        // The digest covers prefix, body, and extra only, so it is
        // final before the suffix is attached.
        let digest = transaction.digest();
        let (signature, key_image) = veil_crypto::generate_ring_signature(
            &digest,
            secret,
            secret_index,
            &ring_keys,
            &ring_commitments,
        )
        .unwrap();
        assert_eq!(key_image, transaction.body.key_images[0]);

        transaction.suffix = veil_types::UncommittedSuffix {
            pseudo_commitments,
            ring_participants,
            signatures: vec![signature],
            range_proof,
        };

        transaction
    }

    /// Grow the fee until it satisfies the schedule at the final size.
    fn build_spend_with_sufficient_fee(
        owned: &[OwnedOutput],
        real_index: usize,
    ) -> UncommittedNormalTransaction {
        let mut fee = 10;
        loop {
            let transaction = build_spend(owned, real_index, fee);
            let required = fees::calculate_transaction_fee(transaction.size(), 1);
            if fee >= required {
                return transaction;
            }
            fee = required;
        }
    }

    fn build_genesis() -> GenesisTransaction {
        use config::transaction::genesis;

        let secret_key = *genesis::TX_SECRET_KEY;
        let derivation =
            generate_key_derivation(&genesis::DESTINATION_VIEW_KEY, &secret_key).unwrap();

        let outputs = (0..config::transaction::RING_SIZE as u64 * 2)
            .map(|index| {
                let scalar = derivation_to_scalar(&derivation, index);
                TransactionOutput::new(
                    derive_public_key(&scalar, &genesis::DESTINATION_SPEND_KEY).unwrap(),
                    toggle_masked_amount(
                        generate_amount_mask(&scalar),
                        genesis::OUTPUT_AMOUNT,
                    ),
                    generate_pedersen_commitment(
                        &generate_commitment_blinding_factor(&scalar),
                        genesis::OUTPUT_AMOUNT,
                    ),
                )
            })
            .collect();

        GenesisTransaction {
            prefix: TransactionPrefix {
                version: 1,
                unlock_block: 0,
                public_key: veil_crypto::secret_key_to_public_key(&secret_key),
            },
            secret_key,
            outputs,
        }
    }

    #[test]
    fn test_genesis_accepts_then_pins() {
        let (_dir, storage, _staking, validator) = engines();

        let genesis = build_genesis();
        let transaction = Transaction::Genesis(genesis.clone());

        validator.check(&transaction).unwrap();
        validator.validate(&transaction).unwrap();

        // A tampered output amount fails the audit.
        let mut tampered = genesis.clone();
        tampered.outputs[0].amount ^= 1;
        assert!(matches!(
            validator.check(&Transaction::Genesis(tampered)),
            Err(ConsensusError::Transaction(TransactionError::OutputAmount))
        ));

        // Once any block sits at index 0, a genesis no longer validates.
        let mut block = Block {
            block_index: 0,
            timestamp: config::transaction::genesis::TIMESTAMP,
            reward_tx: RewardTransaction::Genesis(genesis),
            ..Default::default()
        };
        block.previous_blockhash = Hash::ZERO;
        storage.put_block(&block, &[]).unwrap();

        assert!(matches!(
            validator.validate(&transaction),
            Err(ConsensusError::Transaction(
                TransactionError::GenesisAlreadyExists
            ))
        ));
    }

    #[test]
    fn test_full_spend_validates_and_double_spend_rejects() {
        let (_dir, storage, _staking, validator) = engines();

        let owned = seed_spendable_outputs(&storage, 0, config::transaction::RING_SIZE);

        let mut transaction = build_spend_with_sufficient_fee(&owned, 17);
        assert!(transaction.mine(1));

        validator
            .validate_uncommitted(&UncommittedTransaction::Normal(transaction.clone()))
            .unwrap();

        // Commit the spend, then the same key image must be rejected.
        let committed = transaction.to_committed();
        put_block_with(
            &storage,
            1,
            reward_tx(),
            vec![Transaction::Normal(committed.clone())],
        );

        assert!(matches!(
            validator.validate_uncommitted(&UncommittedTransaction::Normal(transaction)),
            Err(ConsensusError::Transaction(
                TransactionError::KeyImageAlreadyExists
            ))
        ));
        assert!(matches!(
            validator.validate(&Transaction::Normal(committed)),
            Err(ConsensusError::Transaction(
                TransactionError::KeyImageAlreadyExists
            ))
        ));
    }

    #[test]
    fn test_tampered_ring_signature_rejects() {
        let (_dir, storage, _staking, validator) = engines();

        let owned = seed_spendable_outputs(&storage, 0, config::transaction::RING_SIZE);

        let mut transaction = build_spend_with_sufficient_fee(&owned, 3);
        assert!(transaction.mine(1));

        // Swap the key image for one derived from another secret; the
        // ring signature no longer verifies.
        transaction.body.key_images[0] = generate_key_image(&owned[4].secret);

        assert!(matches!(
            validator.validate_uncommitted(&UncommittedTransaction::Normal(transaction)),
            Err(ConsensusError::Transaction(
                TransactionError::InvalidRingSignature
            ))
        ));
    }

    #[test]
    fn test_pow_floor_and_fee_schedule() {
        let (_dir, storage, _staking, validator) = engines();

        let owned = seed_spendable_outputs(&storage, 0, config::transaction::RING_SIZE);

        // A fee far below the size requirement fails even with the
        // proof-of-work floor satisfied.
        let mut cheap = build_spend(&owned, 0, 10);
        assert!(cheap.mine(1));
        assert!(matches!(
            validator.check_uncommitted(&UncommittedTransaction::Normal(cheap.clone())),
            Err(ConsensusError::Transaction(TransactionError::LowFee))
        ));

        // A hash with no leading zeros fails the proof-of-work floor
        // before the fee is considered.
        while cheap.pow_hash().leading_zeros() != 0 {
            cheap.body.nonce += 1;
        }
        assert!(matches!(
            validator.check_uncommitted(&UncommittedTransaction::Normal(cheap)),
            Err(ConsensusError::Transaction(TransactionError::MinimumPow))
        ));
    }

    #[test]
    fn test_unresolvable_ring_participant_is_fatal() {
        let (_dir, storage, _staking, validator) = engines();

        let owned = seed_spendable_outputs(&storage, 0, config::transaction::RING_SIZE);

        let mut transaction = build_spend_with_sufficient_fee(&owned, 9);
        transaction.suffix.ring_participants[0] = random_hash();
        assert!(transaction.mine(1));

        assert!(matches!(
            validator.validate_uncommitted(&UncommittedTransaction::Normal(transaction)),
            Err(ConsensusError::Storage(
                StorageError::TransactionOutputNotFound(_)
            ))
        ));
    }

    fn build_stake(version: u64, amount: u64) -> UncommittedStakeTransaction {
        let (candidate_public_key, _) = generate_keypair();
        let (staker_public_view_key, _) = generate_keypair();
        let (staker_public_spend_key, _) = generate_keypair();

        build_stake_for(
            version,
            amount,
            candidate_public_key,
            staker_public_view_key,
            staker_public_spend_key,
        )
    }

    fn build_stake_for(
        version: u64,
        amount: u64,
        candidate_public_key: PublicKey,
        staker_public_view_key: PublicKey,
        staker_public_spend_key: PublicKey,
    ) -> UncommittedStakeTransaction {
        let fee = 100u64;
        let amounts = [600u64, 300];
        let blindings: Vec<Scalar> = vec![random_scalar(), random_scalar()];
        let (range_proof, commitments) = generate_range_proof(&amounts, &blindings).unwrap();
        let (pseudo_commitments, _) = generate_pseudo_commitments(&[1_000], &blindings);

        let outputs = commitments
            .iter()
            .zip(amounts.iter())
            .map(|(commitment, amount)| {
                let (public_ephemeral, _) = generate_keypair();
                TransactionOutput::new(public_ephemeral, *amount, *commitment)
            })
            .collect();

        let (tx_public, _) = generate_keypair();

        UncommittedStakeTransaction {
            prefix: TransactionPrefix {
                version,
                unlock_block: 0,
                public_key: tx_public,
            },
            body: veil_types::TransactionBody {
                nonce: 0,
                fee,
                key_images: vec![generate_key_image(&generate_keypair().1)],
                outputs,
            },
            data: veil_types::StakeData {
                stake_amount: amount,
                candidate_public_key,
                staker_public_view_key,
                staker_public_spend_key,
            },
            suffix: veil_types::UncommittedSuffix {
                pseudo_commitments,
                ring_participants: (0..4).map(|_| random_hash()).collect(),
                signatures: vec![veil_crypto::ClsagSignature {
                    challenge: random_scalar(),
                    responses: (0..config::transaction::RING_SIZE)
                        .map(|_| random_scalar())
                        .collect(),
                }],
                range_proof,
            },
        }
    }

    #[test]
    fn test_stake_rules_on_committed_transactions() {
        let (_dir, _storage, staking, validator) = engines();

        // A fresh candidacy with the exact required amount validates.
        let mut candidacy = build_stake(1, config::consensus::REQUIRED_CANDIDACY_AMOUNT);
        assert!(candidacy.mine(1));
        let committed = candidacy.to_committed();
        validator.validate(&Transaction::Stake(committed.clone())).unwrap();

        // Register the candidate; the same candidacy now conflicts.
        staking.add_stake(&committed).unwrap();
        assert!(matches!(
            validator.validate(&Transaction::Stake(committed.clone())),
            Err(ConsensusError::Staking(StakingError::CandidateAlreadyExists))
        ));

        // Votes for the registered candidate validate above the
        // minimum and fail below it.
        let mut vote = build_stake(2, config::consensus::MINIMUM_STAKE_AMOUNT);
        vote.data.candidate_public_key = committed.data.candidate_public_key;
        assert!(vote.mine(1));
        validator
            .validate(&Transaction::Stake(vote.to_committed()))
            .unwrap();

        let mut small = build_stake(2, config::consensus::MINIMUM_STAKE_AMOUNT - 1);
        small.data.candidate_public_key = committed.data.candidate_public_key;
        assert!(small.mine(1));
        assert!(matches!(
            validator.validate(&Transaction::Stake(small.to_committed())),
            Err(ConsensusError::Staking(StakingError::StakeAmount(_)))
        ));
    }

    #[test]
    fn test_recall_requires_recorded_stake_and_valid_signatures() {
        let (_dir, storage, staking, validator) = engines();

        let (candidate_public_key, _) = generate_keypair();
        let (view_public, view_secret) = generate_keypair();
        let (spend_public, spend_secret) = generate_keypair();

        let stake = veil_types::Stake::new(candidate_public_key, view_public, spend_public, 5_000);
        staking.record_stake(&stake).unwrap();

        // Build a recall over the recorded stake with real authorization
        // signatures.
        let base = build_stake(1, 5_000);
        let mut recall = UncommittedRecallStakeTransaction {
            prefix: TransactionPrefix {
                version: 1,
                ..base.prefix
            },
            body: base.body.clone(),
            data: veil_types::RecallStakeData {
                stake_amount: 5_000,
                candidate_public_key,
                staker_id: stake.staker_id(),
                view_signature: veil_crypto::Signature::default(),
                spend_signature: veil_crypto::Signature::default(),
            },
            suffix: base.suffix.clone(),
        };

        let digest = recall.data.authorization_digest();
        recall.data.view_signature = generate_signature(&digest, &view_secret);
        recall.data.spend_signature = generate_signature(&digest, &spend_secret);
        assert!(recall.mine(1));

        let committed = recall.to_committed();
        validator
            .validate(&Transaction::RecallStake(committed.clone()))
            .unwrap();

        // A signature from the wrong key is rejected.
        let mut forged = recall.clone();
        forged.data.view_signature = generate_signature(&digest, &spend_secret);
        assert!(forged.mine(1));
        assert!(matches!(
            validator.validate(&Transaction::RecallStake(forged.to_committed())),
            Err(ConsensusError::Transaction(
                TransactionError::RecallViewSignature
            ))
        ));

        // An unknown staker is rejected.
        let mut unknown = recall.clone();
        unknown.data.staker_id = random_hash();
        let digest = unknown.data.authorization_digest();
        unknown.data.view_signature = generate_signature(&digest, &view_secret);
        unknown.data.spend_signature = generate_signature(&digest, &spend_secret);
        assert!(unknown.mine(1));
        assert!(matches!(
            validator.validate(&Transaction::RecallStake(unknown.to_committed())),
            Err(ConsensusError::Staking(StakingError::StakerNotFound))
        ));

        // A stake refund must reference a committed recall transaction.
        let (refund_public, refund_secret) = generate_keypair();
        let (refund_ephemeral, _) = generate_keypair();
        let mut refund = StakeRefundTransaction {
            prefix: TransactionPrefix {
                version: 1,
                unlock_block: 0,
                public_key: refund_public,
            },
            secret_key: refund_secret,
            recall_stake_tx: committed.hash(),
            outputs: vec![TransactionOutput::new(
                refund_ephemeral,
                5_000,
                generate_pedersen_commitment(&random_scalar(), 5_000),
            )],
        };

        assert!(matches!(
            validator.validate(&Transaction::StakeRefund(refund.clone())),
            Err(ConsensusError::Transaction(
                TransactionError::RecallStakeTxHash
            ))
        ));

        put_block_with(
            &storage,
            0,
            reward_tx(),
            vec![Transaction::RecallStake(committed.clone())],
        );
        refund.recall_stake_tx = committed.hash();
        validator
            .validate(&Transaction::StakeRefund(refund))
            .unwrap();
    }
}
