//! Error types for serialization and transaction construction checks.

use thiserror::Error;

/// Result alias for serialization operations.
pub type TypesResult<T> = Result<T, TypesError>;

/// Serialization and decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// The input ended before the value was fully read.
    #[error("Unexpected end of input at offset {0}")]
    UnexpectedEof(usize),

    /// A varint exceeded 64 bits.
    #[error("Varint overflow at offset {0}")]
    VarintOverflow(usize),

    /// A boolean byte was neither 0 nor 1.
    #[error("Invalid boolean encoding at offset {0}")]
    InvalidBoolean(usize),

    /// An element count implies more data than the input contains.
    #[error("Implausible element count {0}")]
    ImplausibleCount(u64),

    /// A leading type tag did not name a known variant.
    #[error("Unknown transaction type tag {0}")]
    UnknownTransactionType(u64),

    /// A leading type tag did not name a known reward transaction.
    #[error("Invalid reward transaction type tag {0}")]
    InvalidRewardTransactionType(u64),

    /// A leading type tag did not name a known value for the context.
    #[error("Unknown type tag {0}")]
    UnknownTag(u64),

    /// An embedded cryptographic value failed to decode.
    #[error(transparent)]
    Crypto(#[from] veil_crypto::CryptoError),
}

/// Transaction construction-check failures.
///
/// These mirror the flat transaction error taxonomy: every code that the
/// construction and validation paths can produce is one variant here.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Invalid transaction version")]
    InvalidVersion,
    #[error("Key image already exists in the chain")]
    KeyImageAlreadyExists,
    #[error("Duplicate key image within the transaction")]
    DuplicateKeyImage,
    #[error("Key image is not a valid group element")]
    InvalidKeyImage,
    #[error("Transaction proof-of-work below the network minimum")]
    MinimumPow,
    #[error("Transaction fee below the required fee")]
    LowFee,
    #[error("Transaction fee is missing")]
    MissingFee,
    #[error("Extra field exceeds the maximum size")]
    ExtraTooLarge,
    #[error("Secret key does not derive the public key")]
    KeypairMismatch,
    #[error("Invalid or missing public key")]
    PublicKey,
    #[error("Invalid or missing secret key")]
    SecretKey,
    #[error("Stake transaction has no amount")]
    StakeNoAmount,
    #[error("Invalid or missing staker id")]
    StakerId,
    #[error("Invalid or missing recall view signature")]
    RecallViewSignature,
    #[error("Invalid or missing recall spend signature")]
    RecallSpendSignature,
    #[error("Invalid or missing recall stake transaction hash")]
    RecallStakeTxHash,
    #[error("Output public ephemeral is invalid")]
    OutputPublicEphemeral,
    #[error("Output amount is invalid")]
    OutputAmount,
    #[error("Output commitment is invalid")]
    OutputCommitment,
    #[error("Output is locked beyond the current block")]
    OutputLocked,
    #[error("Staker reward amount is invalid")]
    StakerRewardAmount,
    #[error("Staker reward id is invalid")]
    StakerRewardId,
    #[error("Range proof is invalid")]
    InvalidRangeProof,
    #[error("Signature count does not match input count")]
    SignatureSizeMismatch,
    #[error("Ring signature construction is invalid")]
    InvalidSignature,
    #[error("Output count outside the permitted range")]
    InvalidOutputCount,
    #[error("Input count outside the permitted range")]
    InvalidInputCount,
    #[error("Pseudo commitment count does not match input count")]
    InvalidPseudoCommitmentCount,
    #[error("Commitments do not balance")]
    CommitmentsDoNotBalance,
    #[error("Ring signature does not verify")]
    InvalidRingSignature,
    #[error("A genesis transaction already exists")]
    GenesisAlreadyExists,
    #[error("Staking public keys are reused")]
    StakingPublicKeysReuse,
}
