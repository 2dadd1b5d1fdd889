//! The staking engine: candidate and stake records plus the election
//! entry point.
//!
//! Stakes are stored under a composite key `candidate key ∥ staker id`
//! so one prefix scan yields every stake on a candidate in staker
//! order, which keeps the election weights deterministic.

use crate::election;
use crate::error::{StakingError, StakingResult};
use heed::types::Bytes;
use heed::Database;
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};
use veil_crypto::{Hash, PublicKey};
use veil_storage::Store;
use veil_types::{
    config, Candidate, Serializable, Stake, StakeTransaction, StakerRewardTransaction,
};

static INSTANCES: Lazy<Mutex<HashMap<Hash, Weak<StakingEngine>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn stake_key(candidate_key: &PublicKey, staker_id: &Hash) -> [u8; 64] {
    let mut key = [0u8; 64];
    key[..32].copy_from_slice(candidate_key.as_bytes());
    key[32..].copy_from_slice(staker_id.as_bytes());
    key
}

/// The staking engine. A keyed singleton per database path.
pub struct StakingEngine {
    id: Hash,
    store: Arc<Store>,
    candidates: Database<Bytes, Bytes>,
    stakes: Database<Bytes, Bytes>,
    write_mutex: Mutex<()>,
}

impl StakingEngine {
    /// Open (or alias) the engine for the given database path.
    pub fn instance(path: impl AsRef<Path>) -> StakingResult<Arc<Self>> {
        let id = veil_crypto::sha3(path.as_ref().to_string_lossy().as_bytes());

        let mut instances = INSTANCES.lock();

        if let Some(existing) = instances.get(&id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let store = Store::instance(path)?;

        debug!(path = %store.path().display(), "Opening staking engine");

        let engine = Arc::new(StakingEngine {
            id,
            candidates: store.open_database("candidates")?,
            stakes: store.open_database("stakes")?,
            store,
            write_mutex: Mutex::new(()),
        });

        instances.insert(id, Arc::downgrade(&engine));

        Ok(engine)
    }

    /// Whether the candidate is registered.
    pub fn candidate_exists(&self, candidate_key: &PublicKey) -> StakingResult<bool> {
        let rtxn = self.store.read_txn()?;
        Ok(self
            .candidates
            .get(&rtxn, candidate_key.as_bytes())?
            .is_some())
    }

    /// Fetch a candidate record.
    pub fn get_candidate(&self, candidate_key: &PublicKey) -> StakingResult<Candidate> {
        let rtxn = self.store.read_txn()?;
        let value = self
            .candidates
            .get(&rtxn, candidate_key.as_bytes())?
            .ok_or(StakingError::CandidateNotFound)?;
        Ok(Candidate::from_bytes(value)?)
    }

    /// Keys of all registered candidates, in key order.
    pub fn get_candidates(&self) -> StakingResult<Vec<PublicKey>> {
        let rtxn = self.store.read_txn()?;

        let mut keys = Vec::new();
        for entry in self.candidates.iter(&rtxn)? {
            let (key, _) = entry?;
            keys.push(PublicKey::from_slice(key).map_err(veil_types::TypesError::Crypto)?);
        }

        Ok(keys)
    }

    /// Register a candidate.
    pub fn add_candidate(&self, candidate: &Candidate) -> StakingResult<()> {
        let _guard = self.write_mutex.lock();

        if self.candidate_exists(&candidate.public_key)? {
            return Err(StakingError::CandidateAlreadyExists);
        }

        self.store.with_capacity_retry(|| {
            let mut wtxn = self.store.write_txn()?;
            self.candidates.put(
                &mut wtxn,
                candidate.public_key.as_bytes(),
                &candidate.to_bytes(),
            )?;
            wtxn.commit()?;
            Ok(())
        })?;

        trace!(candidate = %candidate.public_key, "Registered candidate");

        Ok(())
    }

    /// Remove a candidate together with every stake placed on it.
    pub fn delete_candidate(&self, candidate_key: &PublicKey) -> StakingResult<()> {
        let _guard = self.write_mutex.lock();

        if !self.candidate_exists(candidate_key)? {
            return Err(StakingError::CandidateNotFound);
        }

        let stake_keys: Vec<Vec<u8>> = {
            let rtxn = self.store.read_txn()?;
            let mut keys = Vec::new();
            for entry in self.stakes.prefix_iter(&rtxn, candidate_key.as_bytes())? {
                let (key, _) = entry?;
                keys.push(key.to_vec());
            }
            keys
        };

        self.store.with_capacity_retry(|| {
            let mut wtxn = self.store.write_txn()?;
            for key in &stake_keys {
                self.stakes.delete(&mut wtxn, key)?;
            }
            self.candidates
                .delete(&mut wtxn, candidate_key.as_bytes())?;
            wtxn.commit()?;
            Ok(())
        })?;

        trace!(candidate = %candidate_key, "Deleted candidate");

        Ok(())
    }

    /// Apply a committed stake transaction.
    ///
    /// Version 1 registers a candidacy and must carry exactly the
    /// required candidacy amount; version 2 votes for an existing
    /// candidate with at least the minimum stake amount.
    pub fn add_stake(&self, transaction: &StakeTransaction) -> StakingResult<()> {
        let data = &transaction.data;

        match transaction.prefix.version {
            1 => {
                if self.candidate_exists(&data.candidate_public_key)? {
                    return Err(StakingError::CandidateAlreadyExists);
                }

                if data.stake_amount != config::consensus::REQUIRED_CANDIDACY_AMOUNT {
                    return Err(StakingError::CandidateAmountInvalid(data.stake_amount));
                }

                self.add_candidate(&Candidate::new(
                    data.candidate_public_key,
                    data.staker_public_view_key,
                    data.staker_public_spend_key,
                    data.stake_amount,
                ))
            }
            2 => {
                if !self.candidate_exists(&data.candidate_public_key)? {
                    return Err(StakingError::CandidateNotFound);
                }

                if data.stake_amount < config::consensus::MINIMUM_STAKE_AMOUNT {
                    return Err(StakingError::StakeAmount(data.stake_amount));
                }

                self.record_stake(&Stake::new(
                    data.candidate_public_key,
                    data.staker_public_view_key,
                    data.staker_public_spend_key,
                    data.stake_amount,
                ))
            }
            other => Err(StakingError::InvalidVersion(other)),
        }
    }

    /// Record a vote stake, accumulating onto any stake the staker
    /// already holds on the candidate.
    pub fn record_stake(&self, stake: &Stake) -> StakingResult<()> {
        let _guard = self.write_mutex.lock();

        let key = stake_key(&stake.candidate_public_key, &stake.staker_id());

        let merged = {
            let rtxn = self.store.read_txn()?;
            match self.stakes.get(&rtxn, &key)? {
                Some(value) => {
                    let mut existing = Stake::from_bytes(value)?;
                    existing.stake = existing.stake.saturating_add(stake.stake);
                    existing
                }
                None => *stake,
            }
        };

        self.store.with_capacity_retry(|| {
            let mut wtxn = self.store.write_txn()?;
            self.stakes.put(&mut wtxn, &key, &merged.to_bytes())?;
            wtxn.commit()?;
            Ok(())
        })?;

        trace!(
            candidate = %stake.candidate_public_key,
            staker = %stake.staker_id(),
            amount = stake.stake,
            "Recorded stake"
        );

        Ok(())
    }

    /// Recall part or all of a staker's stake on a candidate. The stake
    /// record is removed once it reaches zero.
    pub fn recall_stake(
        &self,
        staker_id: &Hash,
        candidate_key: &PublicKey,
        amount: u64,
    ) -> StakingResult<()> {
        let _guard = self.write_mutex.lock();

        let key = stake_key(candidate_key, staker_id);

        let remaining = {
            let rtxn = self.store.read_txn()?;
            let value = self
                .stakes
                .get(&rtxn, &key)?
                .ok_or(StakingError::StakerNotFound)?;
            let existing = Stake::from_bytes(value)?;

            if existing.stake < amount {
                return Err(StakingError::RecallAmount);
            }

            let mut updated = existing;
            updated.stake -= amount;
            updated
        };

        self.store.with_capacity_retry(|| {
            let mut wtxn = self.store.write_txn()?;
            if remaining.stake == 0 {
                self.stakes.delete(&mut wtxn, &key)?;
            } else {
                self.stakes.put(&mut wtxn, &key, &remaining.to_bytes())?;
            }
            wtxn.commit()?;
            Ok(())
        })?;

        trace!(
            candidate = %candidate_key,
            staker = %staker_id,
            amount,
            "Recalled stake"
        );

        Ok(())
    }

    /// All stakes placed on a candidate, in staker-id order.
    pub fn get_candidate_stakes(&self, candidate_key: &PublicKey) -> StakingResult<Vec<Stake>> {
        let rtxn = self.store.read_txn()?;

        let mut stakes = Vec::new();
        for entry in self.stakes.prefix_iter(&rtxn, candidate_key.as_bytes())? {
            let (_, value) = entry?;
            stakes.push(Stake::from_bytes(value)?);
        }

        Ok(stakes)
    }

    /// Total vote weight on a candidate. Unknown candidates tally zero.
    pub fn get_candidate_votes(&self, candidate_key: &PublicKey) -> StakingResult<u64> {
        Ok(self
            .get_candidate_stakes(candidate_key)?
            .iter()
            .map(|stake| stake.stake)
            .sum())
    }

    /// Every stake a staker holds, grouped by candidate.
    pub fn get_staker_stakes(
        &self,
        staker_id: &Hash,
    ) -> StakingResult<BTreeMap<PublicKey, Vec<Stake>>> {
        let rtxn = self.store.read_txn()?;

        let mut grouped: BTreeMap<PublicKey, Vec<Stake>> = BTreeMap::new();
        for entry in self.stakes.iter(&rtxn)? {
            let (_, value) = entry?;
            let stake = Stake::from_bytes(value)?;
            if stake.staker_id() == *staker_id {
                grouped
                    .entry(stake.candidate_public_key)
                    .or_default()
                    .push(stake);
            }
        }

        Ok(grouped)
    }

    /// Apply a staker reward transaction: penalties are debited from the
    /// staker's recorded stakes in candidate-key order until consumed.
    /// Rewards are paid out of band and do not change recorded stakes.
    pub fn process_reward_tx(&self, transaction: &StakerRewardTransaction) -> StakingResult<()> {
        for penalty in &transaction.staker_penalties {
            let mut outstanding = penalty.amount;

            let stakes = self.get_staker_stakes(&penalty.staker_id)?;
            if stakes.is_empty() {
                return Err(StakingError::StakerNotFound);
            }

            for (candidate_key, candidate_stakes) in stakes {
                for stake in candidate_stakes {
                    if outstanding == 0 {
                        break;
                    }

                    let debit = outstanding.min(stake.stake);
                    self.recall_stake(&penalty.staker_id, &candidate_key, debit)?;
                    outstanding -= debit;
                }
            }
        }

        Ok(())
    }

    /// The stake weight of a candidate: the candidacy amount plus all
    /// recorded votes.
    pub fn candidate_weight(&self, candidate_key: &PublicKey) -> StakingResult<u128> {
        let candidate = self.get_candidate(candidate_key)?;
        Ok(candidate.staked_amount as u128 + self.get_candidate_votes(candidate_key)? as u128)
    }

    /// Run the election for the next round.
    ///
    /// The draw is seeded from the previous round's block hashes and is
    /// fully deterministic; see [`crate::election`] for the frozen
    /// seed-to-draw mapping. Returns `(producers, validators)`.
    pub fn run_election(
        &self,
        last_round_blocks: &[Hash],
        maximum_keys: usize,
    ) -> StakingResult<(Vec<PublicKey>, Vec<PublicKey>)> {
        let mut weights: Vec<(PublicKey, u128)> = Vec::new();

        for candidate_key in self.get_candidates()? {
            weights.push((candidate_key, self.candidate_weight(&candidate_key)?));
        }

        Ok(election::run(last_round_blocks, &weights, maximum_keys))
    }
}

impl Drop for StakingEngine {
    fn drop(&mut self) {
        INSTANCES.lock().remove(&self.id);
    }
}

/// Widen a big integer that is known to be below a u128 modulus.
pub(crate) fn biguint_to_u128(value: &BigUint) -> u128 {
    let digits = value.to_u64_digits();
    match digits.len() {
        0 => 0,
        1 => digits[0] as u128,
        _ => (digits[1] as u128) << 64 | digits[0] as u128,
    }
}
