//! SHA3 hashing, domain-separated hash-to-scalar / hash-to-point, and the
//! Argon2id hash used by the per-transaction proof-of-work.

use crate::error::{CryptoError, CryptoResult};
use crate::types::Hash;
use argon2::{Algorithm, Argon2, Params, Version};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::RngCore;
use sha3::{Digest, Sha3_256, Sha3_512};

/// SHA3-256 digest of the input bytes.
pub fn sha3(data: impl AsRef<[u8]>) -> Hash {
    let digest = Sha3_256::digest(data.as_ref());
    Hash(digest.into())
}

/// SHA3-256 digest over the concatenation of several inputs.
pub fn sha3_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}

/// Hash arbitrary input to a scalar via wide reduction of SHA3-512 output.
pub fn hash_to_scalar(data: impl AsRef<[u8]>) -> Scalar {
    let digest = Sha3_512::digest(data.as_ref());
    let wide: [u8; 64] = digest.into();
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Hash arbitrary input to a group element via the uniform-bytes map.
pub fn hash_to_point(data: impl AsRef<[u8]>) -> RistrettoPoint {
    let digest = Sha3_512::digest(data.as_ref());
    let wide: [u8; 64] = digest.into();
    RistrettoPoint::from_uniform_bytes(&wide)
}

/// A uniformly random 32-byte hash.
pub fn random_hash() -> Hash {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    Hash(bytes)
}

/// A uniformly random scalar.
pub fn random_scalar() -> Scalar {
    let mut wide = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Argon2id hash of the seed with the provided parameters.
///
/// The seed doubles as the salt: the proof-of-work input is already a
/// SHA3 digest that commits to the whole transaction.
pub fn argon2id(
    seed: &Hash,
    iterations: u32,
    memory_kib: u32,
    threads: u32,
) -> CryptoResult<Hash> {
    let params = Params::new(memory_kib, iterations, threads, Some(32))
        .map_err(|e| CryptoError::Argon2(e.to_string()))?;

    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon
        .hash_password_into(seed.as_bytes(), seed.as_bytes(), &mut output)
        .map_err(|e| CryptoError::Argon2(e.to_string()))?;

    Ok(Hash(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha3_is_deterministic() {
        assert_eq!(sha3(b"veil"), sha3(b"veil"));
        assert_ne!(sha3(b"veil"), sha3(b"liev"));
    }

    #[test]
    fn test_sha3_concat_matches_single_buffer() {
        let joined = [b"abc".as_ref(), b"def".as_ref()].concat();
        assert_eq!(sha3(&joined), sha3_concat(&[b"abc", b"def"]));
    }

    #[test]
    fn test_hash_to_point_is_valid() {
        let point = hash_to_point(b"domain");
        // Compress/decompress round-trips for any mapped point.
        let compressed = point.compress();
        assert_eq!(compressed.decompress().unwrap(), point);
    }

    #[test]
    fn test_argon2id_deterministic() {
        let seed = sha3(b"pow seed");
        let a = argon2id(&seed, 2, 16, 1).unwrap();
        let b = argon2id(&seed, 2, 16, 1).unwrap();
        assert_eq!(a, b);

        let c = argon2id(&sha3(b"other seed"), 2, 16, 1).unwrap();
        assert_ne!(a, c);
    }
}
