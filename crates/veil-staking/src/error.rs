//! Staking error types.

use thiserror::Error;

/// Result alias for staking operations.
pub type StakingResult<T> = Result<T, StakingError>;

/// Staking errors.
#[derive(Error, Debug)]
pub enum StakingError {
    /// The candidate is already registered.
    #[error("Candidate already exists")]
    CandidateAlreadyExists,

    /// The candidate is not registered.
    #[error("Candidate not found")]
    CandidateNotFound,

    /// A candidacy stake did not carry the exact required amount.
    #[error("Candidacy amount invalid: got {0}")]
    CandidateAmountInvalid(u64),

    /// The staker has no recorded stake to operate on.
    #[error("Staker not found")]
    StakerNotFound,

    /// A vote stake was below the minimum stake amount.
    #[error("Stake amount below minimum: got {0}")]
    StakeAmount(u64),

    /// The stake transaction version named no known staking operation.
    #[error("Invalid stake transaction version {0}")]
    InvalidVersion(u64),

    /// The recall asked for more than the staker has on the candidate.
    #[error("Recall amount exceeds recorded stake")]
    RecallAmount,

    /// Underlying storage failure.
    #[error(transparent)]
    Storage(#[from] veil_storage::StorageError),

    /// A stored record failed to deserialize.
    #[error(transparent)]
    Types(#[from] veil_types::TypesError),
}

impl From<heed::Error> for StakingError {
    fn from(error: heed::Error) -> Self {
        StakingError::Storage(veil_storage::StorageError::Store(error))
    }
}
