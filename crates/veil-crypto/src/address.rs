//! Public wallet address encoding.
//!
//! An address packs the network prefix (LEB128 varint), the public spend
//! key, the public view key, and a 4-byte SHA3 checksum, base58 encoded.

use crate::error::{CryptoError, CryptoResult};
use crate::hashing::sha3;
use crate::types::PublicKey;

const CHECKSUM_BYTES: usize = 4;

fn write_varint(buffer: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buffer.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(bytes: &[u8]) -> CryptoResult<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (index, byte) in bytes.iter().enumerate() {
        if shift >= 64 {
            return Err(CryptoError::Base58Decode);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, index + 1));
        }
        shift += 7;
    }
    Err(CryptoError::Base58Decode)
}

/// Encode a public address from its spend and view keys.
pub fn encode_address(prefix: u64, public_spend: &PublicKey, public_view: &PublicKey) -> String {
    let mut data = Vec::with_capacity(10 + 64 + CHECKSUM_BYTES);
    write_varint(&mut data, prefix);
    data.extend_from_slice(public_spend.as_bytes());
    data.extend_from_slice(public_view.as_bytes());

    let checksum = sha3(&data);
    data.extend_from_slice(&checksum.as_bytes()[..CHECKSUM_BYTES]);

    bs58::encode(data).into_string()
}

/// Decode a public address into its spend and view keys, verifying the
/// network prefix and checksum.
pub fn decode_address(prefix: u64, address: &str) -> CryptoResult<(PublicKey, PublicKey)> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|_| CryptoError::Base58Decode)?;

    if data.len() < CHECKSUM_BYTES {
        return Err(CryptoError::Base58Decode);
    }

    let (body, checksum) = data.split_at(data.len() - CHECKSUM_BYTES);
    let expected = sha3(body);
    if checksum != &expected.as_bytes()[..CHECKSUM_BYTES] {
        return Err(CryptoError::AddressChecksum);
    }

    let (decoded_prefix, offset) = read_varint(body)?;
    if decoded_prefix != prefix {
        return Err(CryptoError::AddressPrefixMismatch);
    }

    let keys = &body[offset..];
    if keys.len() != 64 {
        return Err(CryptoError::Base58Decode);
    }

    let public_spend = PublicKey::from_slice(&keys[..32])?;
    let public_view = PublicKey::from_slice(&keys[32..])?;

    if !public_spend.check_subgroup() || !public_view.check_subgroup() {
        return Err(CryptoError::InvalidPoint);
    }

    Ok((public_spend, public_view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    const TEST_PREFIX: u64 = 0x1cd5a7;

    #[test]
    fn test_address_round_trip() {
        let (spend, _) = generate_keypair();
        let (view, _) = generate_keypair();

        let address = encode_address(TEST_PREFIX, &spend, &view);
        let (decoded_spend, decoded_view) = decode_address(TEST_PREFIX, &address).unwrap();

        assert_eq!(decoded_spend, spend);
        assert_eq!(decoded_view, view);
    }

    #[test]
    fn test_address_rejects_wrong_prefix() {
        let (spend, _) = generate_keypair();
        let (view, _) = generate_keypair();

        let address = encode_address(TEST_PREFIX, &spend, &view);
        assert_eq!(
            decode_address(TEST_PREFIX + 1, &address),
            Err(CryptoError::AddressPrefixMismatch)
        );
    }

    #[test]
    fn test_address_rejects_corruption() {
        let (spend, _) = generate_keypair();
        let (view, _) = generate_keypair();

        let mut address = encode_address(TEST_PREFIX, &spend, &view);
        // Flip a character somewhere in the key material.
        let replacement = if address.as_bytes()[20] == b'2' { '3' } else { '2' };
        address.replace_range(20..21, &replacement.to_string());

        assert!(decode_address(TEST_PREFIX, &address).is_err());
    }
}
