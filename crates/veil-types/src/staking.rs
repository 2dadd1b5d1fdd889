//! Staking records: candidates and the stakes placed on them.

use crate::config;
use crate::serialization::{Reader, Serializable, Writer};
use crate::TypesResult;
use veil_crypto::{Hash, PublicKey};

/// A candidate node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Record schema version.
    pub record_version: u64,
    /// The candidate's public key.
    pub public_key: PublicKey,
    /// Public view key of the staker that proposed the candidacy.
    pub staker_view_key: PublicKey,
    /// Public spend key of the staker that proposed the candidacy.
    pub staker_spend_key: PublicKey,
    /// Amount staked for the candidacy, in atomic units.
    pub staked_amount: u64,
}

impl Candidate {
    /// Create a candidate record at the current schema version.
    pub fn new(
        public_key: PublicKey,
        staker_view_key: PublicKey,
        staker_spend_key: PublicKey,
        staked_amount: u64,
    ) -> Self {
        Candidate {
            record_version: config::staking::CANDIDATE_RECORD_VERSION,
            public_key,
            staker_view_key,
            staker_spend_key,
            staked_amount,
        }
    }

    /// SHA3 over the canonical serialization.
    pub fn hash(&self) -> Hash {
        self.sha3()
    }
}

impl Serializable for Candidate {
    fn serialize(&self, writer: &mut Writer) {
        writer.varint(self.record_version);
        writer.key(&self.public_key);
        writer.key(&self.staker_view_key);
        writer.key(&self.staker_spend_key);
        writer.varint(self.staked_amount);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(Candidate {
            record_version: reader.varint()?,
            public_key: reader.key()?,
            staker_view_key: reader.key()?,
            staker_spend_key: reader.key()?,
            staked_amount: reader.varint()?,
        })
    }
}

/// A stake placed on a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stake {
    /// Record schema version.
    pub record_version: u64,
    /// The candidate the stake applies to.
    pub candidate_public_key: PublicKey,
    /// The staker's public view key.
    pub public_view_key: PublicKey,
    /// The staker's public spend key.
    pub public_spend_key: PublicKey,
    /// Staked amount in atomic units.
    pub stake: u64,
}

impl Stake {
    /// Create a stake record at the current schema version.
    pub fn new(
        candidate_public_key: PublicKey,
        public_view_key: PublicKey,
        public_spend_key: PublicKey,
        stake: u64,
    ) -> Self {
        Stake {
            record_version: config::staking::STAKE_RECORD_VERSION,
            candidate_public_key,
            public_view_key,
            public_spend_key,
            stake,
        }
    }

    /// The staker id: SHA3 over view key then spend key.
    pub fn staker_id(&self) -> Hash {
        let mut writer = Writer::with_capacity(64);
        writer.key(&self.public_view_key);
        writer.key(&self.public_spend_key);
        writer.hash()
    }

    /// SHA3 over the canonical serialization.
    pub fn hash(&self) -> Hash {
        self.sha3()
    }
}

impl Serializable for Stake {
    fn serialize(&self, writer: &mut Writer) {
        writer.varint(self.record_version);
        writer.key(&self.candidate_public_key);
        writer.key(&self.public_view_key);
        writer.key(&self.public_spend_key);
        writer.varint(self.stake);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(Stake {
            record_version: reader.varint()?,
            candidate_public_key: reader.key()?,
            public_view_key: reader.key()?,
            public_spend_key: reader.key()?,
            stake: reader.varint()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_crypto::generate_keypair;

    #[test]
    fn test_candidate_round_trip() {
        let (candidate_key, _) = generate_keypair();
        let (view_key, _) = generate_keypair();
        let (spend_key, _) = generate_keypair();

        let candidate = Candidate::new(candidate_key, view_key, spend_key, 100_000);
        let restored = Candidate::from_bytes(&candidate.to_bytes()).unwrap();
        assert_eq!(candidate, restored);
    }

    #[test]
    fn test_stake_round_trip() {
        let (candidate_key, _) = generate_keypair();
        let (view_key, _) = generate_keypair();
        let (spend_key, _) = generate_keypair();

        let stake = Stake::new(candidate_key, view_key, spend_key, 500);
        let restored = Stake::from_bytes(&stake.to_bytes()).unwrap();
        assert_eq!(stake, restored);
        assert_eq!(stake.staker_id(), restored.staker_id());
    }

    #[test]
    fn test_staker_id_matches_stake_data() {
        use crate::transaction::StakeData;

        let (candidate_key, _) = generate_keypair();
        let (view_key, _) = generate_keypair();
        let (spend_key, _) = generate_keypair();

        let stake = Stake::new(candidate_key, view_key, spend_key, 500);
        let data = StakeData {
            stake_amount: 500,
            candidate_public_key: candidate_key,
            staker_public_view_key: view_key,
            staker_public_spend_key: spend_key,
        };

        assert_eq!(stake.staker_id(), data.staker_id());
    }
}
