//! Error types for cryptographic operations.

use thiserror::Error;

/// Result alias for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Cryptographic errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A compressed point failed to decompress onto the curve.
    #[error("Invalid point encoding")]
    InvalidPoint,

    /// A scalar encoding was not canonical.
    #[error("Invalid scalar encoding")]
    InvalidScalar,

    /// Input had the wrong length for a fixed-width value.
    #[error("Invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    /// A hexadecimal string could not be parsed.
    #[error("Invalid hexadecimal input")]
    InvalidHex,

    /// Ring signature inputs were inconsistent (ring/commitment sizes).
    #[error("Invalid ring: {0}")]
    InvalidRing(String),

    /// Argon2 parameter or hashing failure.
    #[error("Argon2 failure: {0}")]
    Argon2(String),

    /// Base58 wallet address could not be decoded.
    #[error("Base58 decode failure")]
    Base58Decode,

    /// Wallet address prefix did not match the network prefix.
    #[error("Address prefix mismatch")]
    AddressPrefixMismatch,

    /// Wallet address checksum did not match.
    #[error("Address checksum mismatch")]
    AddressChecksum,
}
