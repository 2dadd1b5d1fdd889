//! Canonical serialization: LEB128 varints, raw fixed-width values, and
//! length-prefixed collections.
//!
//! Every persisted and wired value in the system is produced by
//! [`Writer`] and parsed by [`Reader`]. Parsing never panics: malformed
//! wire data surfaces as [`TypesError`] so protocol violations cannot
//! unwind worker tasks.

use crate::error::{TypesError, TypesResult};
use curve25519_dalek::scalar::Scalar;
use veil_crypto::{
    ClsagSignature, Commitment, Hash, KeyImage, PublicKey, RangeProof, SecretKey, Signature,
};

/// Canonical byte writer.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Append an unsigned LEB128 varint.
    pub fn varint(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buffer.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Append raw bytes without a length prefix.
    pub fn bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Append a length-prefixed byte block.
    pub fn byte_block(&mut self, bytes: &[u8]) {
        self.varint(bytes.len() as u64);
        self.bytes(bytes);
    }

    /// Append a boolean as a single byte.
    pub fn boolean(&mut self, value: bool) {
        self.buffer.push(u8::from(value));
    }

    /// Append a fixed-width serializable value.
    pub fn key<T: Serializable>(&mut self, value: &T) {
        value.serialize(self);
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Length in bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the writer, returning the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// SHA3-256 over the bytes written so far.
    pub fn hash(&self) -> Hash {
        veil_crypto::sha3(&self.buffer)
    }
}

/// Canonical byte reader over a borrowed slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, offset: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Whether all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Current read offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Consume and return `count` bytes.
    pub fn take(&mut self, count: usize) -> TypesResult<&'a [u8]> {
        if self.remaining() < count {
            return Err(TypesError::UnexpectedEof(self.offset));
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    /// Read an unsigned LEB128 varint.
    pub fn varint(&mut self) -> TypesResult<u64> {
        let (value, consumed) = self.peek_varint_internal()?;
        self.offset += consumed;
        Ok(value)
    }

    /// Read a varint without consuming it. Used to dispatch on leading
    /// type tags.
    pub fn peek_varint(&self) -> TypesResult<u64> {
        Ok(self.peek_varint_internal()?.0)
    }

    fn peek_varint_internal(&self) -> TypesResult<(u64, usize)> {
        let mut value = 0u64;
        let mut shift = 0u32;
        for (index, byte) in self.data[self.offset..].iter().enumerate() {
            if shift >= 64 || (shift == 63 && *byte > 1) {
                return Err(TypesError::VarintOverflow(self.offset));
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok((value, index + 1));
            }
            shift += 7;
        }
        Err(TypesError::UnexpectedEof(self.offset))
    }

    /// Read a boolean byte.
    pub fn boolean(&mut self) -> TypesResult<bool> {
        let offset = self.offset;
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(TypesError::InvalidBoolean(offset)),
        }
    }

    /// Read a fixed-width serializable value.
    pub fn key<T: Serializable>(&mut self) -> TypesResult<T> {
        T::deserialize(self)
    }

    /// Read a length-prefixed byte block.
    pub fn byte_block(&mut self) -> TypesResult<Vec<u8>> {
        let count = self.varint()?;
        if count > self.remaining() as u64 {
            return Err(TypesError::ImplausibleCount(count));
        }
        Ok(self.take(count as usize)?.to_vec())
    }
}

/// A value with a canonical byte encoding.
pub trait Serializable: Sized {
    /// Append the canonical encoding to the writer.
    fn serialize(&self, writer: &mut Writer);

    /// Parse the canonical encoding from the reader.
    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self>;

    /// Canonical encoding as a fresh byte vector.
    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        self.serialize(&mut writer);
        writer.into_bytes()
    }

    /// Parse from a byte slice. Trailing bytes are permitted; callers
    /// that require full consumption check the reader themselves.
    fn from_bytes(bytes: &[u8]) -> TypesResult<Self> {
        let mut reader = Reader::new(bytes);
        Self::deserialize(&mut reader)
    }

    /// SHA3-256 over the canonical encoding.
    fn sha3(&self) -> Hash {
        veil_crypto::sha3(self.to_bytes())
    }
}

/// Write a varint element count followed by each element.
pub fn write_vec<T: Serializable>(writer: &mut Writer, values: &[T]) {
    writer.varint(values.len() as u64);
    for value in values {
        value.serialize(writer);
    }
}

/// Read a varint element count followed by each element.
pub fn read_vec<T: Serializable>(reader: &mut Reader<'_>) -> TypesResult<Vec<T>> {
    let count = reader.varint()?;
    // Every element consumes at least one byte, which bounds hostile
    // counts before any allocation happens.
    if count > reader.remaining() as u64 {
        return Err(TypesError::ImplausibleCount(count));
    }
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        values.push(T::deserialize(reader)?);
    }
    Ok(values)
}

macro_rules! fixed_width {
    ($type:ty, $width:expr) => {
        impl Serializable for $type {
            fn serialize(&self, writer: &mut Writer) {
                writer.bytes(self.as_ref());
            }

            fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
                let bytes = reader.take($width)?;
                Ok(<$type>::from_slice(bytes)?)
            }
        }
    };
}

fixed_width!(Hash, 32);
fixed_width!(PublicKey, 32);
fixed_width!(KeyImage, 32);
fixed_width!(Commitment, 32);
fixed_width!(Signature, 64);

impl Serializable for SecretKey {
    fn serialize(&self, writer: &mut Writer) {
        writer.bytes(&self.to_bytes());
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        let bytes: [u8; 32] = reader
            .take(32)?
            .try_into()
            .expect("take returned exactly 32 bytes");
        Ok(SecretKey::from_bytes(&bytes)?)
    }
}

impl Serializable for Scalar {
    fn serialize(&self, writer: &mut Writer) {
        writer.bytes(&self.to_bytes());
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        let bytes: [u8; 32] = reader
            .take(32)?
            .try_into()
            .expect("take returned exactly 32 bytes");
        Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
            .ok_or(TypesError::Crypto(veil_crypto::CryptoError::InvalidScalar))
    }
}

impl Serializable for ClsagSignature {
    fn serialize(&self, writer: &mut Writer) {
        self.challenge.serialize(writer);
        write_vec(writer, &self.responses);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        let challenge = Scalar::deserialize(reader)?;
        let responses = read_vec(reader)?;
        Ok(ClsagSignature {
            challenge,
            responses,
        })
    }
}

impl Serializable for RangeProof {
    fn serialize(&self, writer: &mut Writer) {
        self.a.serialize(writer);
        self.r1.serialize(writer);
        self.s1.serialize(writer);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        Ok(RangeProof {
            a: PublicKey::deserialize(reader)?,
            r1: Scalar::deserialize(reader)?,
            s1: Scalar::deserialize(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_round_trip() {
        let values = [0u64, 1, 127, 128, 300, 16_383, 16_384, u64::MAX];

        for value in values {
            let mut writer = Writer::new();
            writer.varint(value);
            let mut reader = Reader::new(writer.as_bytes());
            assert_eq!(reader.varint().unwrap(), value);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_varint_known_encodings() {
        let mut writer = Writer::new();
        writer.varint(300);
        assert_eq!(writer.as_bytes(), &[0xac, 0x02]);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut writer = Writer::new();
        writer.varint(42);
        writer.varint(7);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.peek_varint().unwrap(), 42);
        assert_eq!(reader.varint().unwrap(), 42);
        assert_eq!(reader.varint().unwrap(), 7);
    }

    #[test]
    fn test_truncated_input_fails() {
        let mut writer = Writer::new();
        writer.varint(16_384);
        let bytes = writer.as_bytes();

        let mut reader = Reader::new(&bytes[..1]);
        assert!(matches!(
            reader.varint(),
            Err(TypesError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_byte_block_round_trip() {
        let mut writer = Writer::new();
        writer.byte_block(b"payload");

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.byte_block().unwrap(), b"payload");
    }

    #[test]
    fn test_hostile_count_is_rejected() {
        let mut writer = Writer::new();
        writer.varint(u64::MAX);

        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(
            read_vec::<Hash>(&mut reader),
            Err(TypesError::ImplausibleCount(_))
        ));
    }

    #[test]
    fn test_fixed_width_round_trip() {
        let hash = veil_crypto::sha3(b"fixed");
        let mut writer = Writer::new();
        hash.serialize(&mut writer);

        let restored = Hash::from_bytes(writer.as_bytes()).unwrap();
        assert_eq!(hash, restored);
    }

    #[test]
    fn test_boolean_round_trip() {
        let mut writer = Writer::new();
        writer.boolean(true);
        writer.boolean(false);

        let mut reader = Reader::new(writer.as_bytes());
        assert!(reader.boolean().unwrap());
        assert!(!reader.boolean().unwrap());
    }

    #[test]
    fn test_invalid_boolean_is_rejected() {
        let mut reader = Reader::new(&[2u8]);
        assert!(matches!(
            reader.boolean(),
            Err(TypesError::InvalidBoolean(_))
        ));
    }
}
