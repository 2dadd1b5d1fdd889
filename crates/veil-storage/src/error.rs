//! Storage error types.
//!
//! Embedded-store return codes are carried 1:1 inside
//! [`StorageError::Store`] so callers can pattern-match the capacity
//! conditions (map full, transaction full, map resized, page full) that
//! the engines retry transparently.

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested block does not exist.
    #[error("Block not found")]
    BlockNotFound,

    /// The requested transaction does not exist.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// The requested transaction output does not exist, or the store
    /// cannot satisfy a sampling request.
    #[error("Transaction output not found: {0}")]
    TransactionOutputNotFound(String),

    /// The store holds no entries.
    #[error("Database is empty")]
    Empty,

    /// A stored transaction carried an unrecognized type tag.
    #[error("Unknown transaction type tag {0}")]
    UnknownTransactionType(u64),

    /// The ordering hash of the block's transaction set did not match
    /// the provided transactions.
    #[error("Block transaction order mismatch")]
    BlockTxnOrder,

    /// The block names a different number of transactions than were
    /// provided.
    #[error("Block transaction count mismatch")]
    BlockTxnMismatch,

    /// A stored value failed to deserialize.
    #[error(transparent)]
    Types(#[from] veil_types::TypesError),

    /// An embedded-store failure, carrying the native return code.
    #[error(transparent)]
    Store(#[from] heed::Error),

    /// Filesystem failure while preparing the environment path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the error is a capacity condition that the environment
    /// can recover from by growing the map and retrying.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            StorageError::Store(heed::Error::Mdb(
                heed::MdbError::MapFull
                    | heed::MdbError::TxnFull
                    | heed::MdbError::MapResized
                    | heed::MdbError::PageFull
            ))
        )
    }
}
