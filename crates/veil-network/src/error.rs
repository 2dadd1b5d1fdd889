//! Network error types.

use thiserror::Error;

/// Result alias for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Network errors.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Binding the server socket failed.
    #[error("Bind failure: {0}")]
    Bind(std::io::Error),

    /// Connecting to a peer failed.
    #[error("Connect failure: {0}")]
    Connect(std::io::Error),

    /// A connection attempt exceeded the configured timeout.
    #[error("Connection attempt timed out")]
    Timeout,

    /// Already connected to the given host and port.
    #[error("Already connected to the specified host and port")]
    DuplicateConnect,

    /// No seed node could be reached and the peer database is empty.
    #[error("Could not connect to any seed nodes: {0}")]
    SeedConnect(String),

    /// A peer could not be added to the peer database.
    #[error("Peer list add failure: {0}")]
    PeerListAdd(String),

    /// The requested peer is not connected.
    #[error("Peer is not connected")]
    PeerNotConnected,

    /// A packet carried an unknown type tag.
    #[error("Unknown network packet type {0}")]
    UnknownPacketType(u64),

    /// A packet failed to deserialize.
    #[error(transparent)]
    Malformed(#[from] veil_types::TypesError),

    /// A transport cryptographic operation failed.
    #[error(transparent)]
    Crypto(#[from] veil_crypto::CryptoError),

    /// A transport frame failed to seal or open.
    #[error("Transport encryption failure")]
    Encryption,

    /// The peer database storage failed.
    #[error(transparent)]
    Storage(#[from] veil_storage::StorageError),

    /// A raw LMDB operation failed.
    #[error(transparent)]
    Store(#[from] heed::Error),

    /// Generic socket I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
