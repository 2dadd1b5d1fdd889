//! Fixed-width value types used across the chain and the wire.
//!
//! All types carry their canonical 32-byte (or 64-byte) encoding and
//! decompress/validate lazily. Ordering is lexicographic over the
//! encoding, which is what the canonical block layout relies on.

use crate::error::{CryptoError, CryptoResult};
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use std::fmt;

/// A 32-byte SHA3-256 digest used as an opaque identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Construct from a byte slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            expected: 32,
            got: bytes.len(),
        })?;
        Ok(Hash(arr))
    }

    /// Parse from a hexadecimal string.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidHex)?;
        Self::from_slice(&bytes)
    }

    /// Raw bytes of the digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Count of zero bits from the most significant bit.
    pub fn leading_zeros(&self) -> u32 {
        let mut zeros = 0;
        for byte in self.0.iter() {
            if *byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros();
                break;
            }
        }
        zeros
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A secret scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretKey(Scalar);

impl SecretKey {
    /// Construct from a canonical 32-byte little-endian scalar encoding.
    pub fn from_bytes(bytes: &[u8; 32]) -> CryptoResult<Self> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(*bytes))
            .map(SecretKey)
            .ok_or(CryptoError::InvalidScalar)
    }

    /// Construct by reducing 32 bytes modulo the group order.
    pub fn from_bytes_mod_order(bytes: [u8; 32]) -> Self {
        SecretKey(Scalar::from_bytes_mod_order(bytes))
    }

    /// Parse from a hexadecimal string, reducing modulo the group order.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidHex)?;
        let got = bytes.len();
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidLength { expected: 32, got })?;
        Ok(Self::from_bytes_mod_order(arr))
    }

    pub(crate) fn from_scalar(scalar: Scalar) -> Self {
        SecretKey(scalar)
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.0
    }

    /// Canonical 32-byte encoding.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Whether the scalar is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == Scalar::ZERO
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.to_bytes()))
    }
}

/// A compressed Ristretto group element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(pub [u8; 32]);

/// A key image: the linkability tag derived from a spent output's key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyImage(pub [u8; 32]);

/// A Pedersen commitment to an amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Commitment(pub [u8; 32]);

macro_rules! point_type {
    ($name:ident) => {
        impl $name {
            /// Construct from a byte slice of exactly 32 bytes.
            pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
                let arr: [u8; 32] =
                    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
                        expected: 32,
                        got: bytes.len(),
                    })?;
                Ok($name(arr))
            }

            /// Parse from a hexadecimal string.
            pub fn from_hex(s: &str) -> CryptoResult<Self> {
                let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidHex)?;
                Self::from_slice(&bytes)
            }

            /// Construct from an uncompressed group element.
            pub fn from_point(point: &RistrettoPoint) -> Self {
                $name(point.compress().to_bytes())
            }

            /// Raw bytes of the compressed encoding.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Decompress onto the curve.
            pub fn decompress(&self) -> CryptoResult<RistrettoPoint> {
                CompressedRistretto(self.0)
                    .decompress()
                    .ok_or(CryptoError::InvalidPoint)
            }

            /// Whether this is the identity element.
            pub fn is_identity(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Whether the encoding is a valid, non-identity group element.
            ///
            /// Ristretto is prime-order, so a successful decompression is
            /// sufficient for subgroup membership.
            pub fn check_subgroup(&self) -> bool {
                !self.is_identity() && self.decompress().is_ok()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

point_type!(PublicKey);
point_type!(KeyImage);
point_type!(Commitment);

/// A 64-byte Schnorr signature: compressed nonce point followed by the
/// response scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature(pub [u8; 64]);

impl Default for Signature {
    fn default() -> Self {
        Signature([0u8; 64])
    }
}

impl Signature {
    /// Construct from a byte slice of exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            expected: 64,
            got: bytes.len(),
        })?;
        Ok(Signature(arr))
    }

    /// Raw bytes of the signature.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Whether the signature is all zeroes (unset).
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 64]
    }

    pub(crate) fn nonce_bytes(&self) -> [u8; 32] {
        self.0[..32].try_into().expect("fixed split")
    }

    pub(crate) fn response_bytes(&self) -> [u8; 32] {
        self.0[32..].try_into().expect("fixed split")
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing;

    #[test]
    fn test_leading_zeros() {
        assert_eq!(Hash::ZERO.leading_zeros(), 256);

        let mut bytes = [0u8; 32];
        bytes[0] = 0x80;
        assert_eq!(Hash(bytes).leading_zeros(), 0);

        bytes[0] = 0x01;
        assert_eq!(Hash(bytes).leading_zeros(), 7);

        bytes[0] = 0x00;
        bytes[1] = 0x10;
        assert_eq!(Hash(bytes).leading_zeros(), 11);
    }

    #[test]
    fn test_hash_ordering_is_lexicographic() {
        let mut low = [0u8; 32];
        let mut high = [0u8; 32];
        low[0] = 1;
        high[0] = 2;
        assert!(Hash(low) < Hash(high));
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = hashing::sha3(b"veil");
        let parsed = Hash::from_hex(&hash.to_string()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_identity_fails_subgroup_check() {
        let identity = PublicKey([0u8; 32]);
        assert!(identity.is_identity());
        assert!(!identity.check_subgroup());
    }

    #[test]
    fn test_valid_point_passes_subgroup_check() {
        let point = hashing::hash_to_point(b"veil test point");
        let key = PublicKey::from_point(&point);
        assert!(!key.is_identity());
        assert!(key.check_subgroup());
    }

    #[test]
    fn test_secret_key_canonical_round_trip() {
        let scalar = hashing::hash_to_scalar(b"veil test scalar");
        let key = SecretKey::from_scalar(scalar);
        let restored = SecretKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(key, restored);
    }
}
