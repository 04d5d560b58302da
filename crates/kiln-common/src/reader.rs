//! Endian-aware binary reader for zero-copy parsing of byte slices.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! binary data from a byte slice without copying. Unlike most formats, the
//! engine's containers switch byte order mid-file, so the order is a runtime
//! property of the reader rather than a type parameter.

use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use zerocopy::FromBytes;

use crate::{Error, Result};

/// Byte order used for multi-byte reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Endian {
    /// Least significant byte first.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

impl Endian {
    /// Decode the on-disk endianness flag (`0` = little, `1` = big).
    #[inline]
    pub const fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Self::Little),
            1 => Some(Self::Big),
            _ => None,
        }
    }

    /// The on-disk flag value for this byte order.
    #[inline]
    pub const fn flag(self) -> u8 {
        match self {
            Self::Little => 0,
            Self::Big => 1,
        }
    }
}

macro_rules! read_primitive {
    ($(#[$doc:meta] $name:ident, $ty:ty, $width:expr, $method:ident;)*) => {
        $(
            #[$doc]
            #[inline]
            pub fn $name(&mut self) -> Result<$ty> {
                let bytes = self.read_bytes($width)?;
                Ok(match self.endian {
                    Endian::Little => LittleEndian::$method(bytes),
                    Endian::Big => BigEndian::$method(bytes),
                })
            }
        )*
    };
}

/// Cursor over a borrowed buffer with a switchable byte order.
///
/// Every read verifies `position + width <= len` before touching the buffer
/// and fails with [`Error::UnexpectedEof`] carrying the cursor offset.
///
/// # Example
///
/// ```
/// use kiln_common::{BinaryReader, Endian};
///
/// let data = [0x01, 0x02, 0x03, 0x04];
/// let mut reader = BinaryReader::with_endian(&data, Endian::Big);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x01020304);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
    endian: Endian,
}

impl<'a> BinaryReader<'a> {
    /// Little-endian reader at offset 0.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            endian: Endian::Little,
        }
    }

    #[inline]
    pub const fn with_endian(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data,
            position: 0,
            endian,
        }
    }

    /// Reader positioned at `position`, e.g. just past an already-parsed header.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize, endian: Endian) -> Self {
        Self {
            data,
            position,
            endian,
        }
    }

    #[inline]
    pub const fn endian(&self) -> Endian {
        self.endian
    }

    /// Serialized files switch order after the header; later reads use `endian`.
    #[inline]
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Bytes between the cursor and the end of the buffer.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    #[inline]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Move the cursor; out-of-range positions fail on the next read.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Advance the position to the next multiple of `alignment`.
    ///
    /// Alignment is relative to the start of the underlying buffer.
    #[inline]
    pub fn align(&mut self, alignment: usize) {
        self.position = crate::align_up(self.position, alignment);
    }

    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                offset: self.position,
                needed: count,
                available: self.remaining(),
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Borrow `count` bytes and move past them.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| b as i8)
    }

    /// Any non-zero byte is `true`.
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_u8().map(|b| b != 0)
    }

    read_primitive! {
        /// Read a u16 in the reader's byte order.
        read_u16, u16, 2, read_u16;
        /// Read an i16 in the reader's byte order.
        read_i16, i16, 2, read_i16;
        /// Read a u32 in the reader's byte order.
        read_u32, u32, 4, read_u32;
        /// Read an i32 in the reader's byte order.
        read_i32, i32, 4, read_i32;
        /// Read a u64 in the reader's byte order.
        read_u64, u64, 8, read_u64;
        /// Read an i64 in the reader's byte order.
        read_i64, i64, 8, read_i64;
        /// Read an f32 in the reader's byte order.
        read_f32, f32, 4, read_f32;
        /// Read an f64 in the reader's byte order.
        read_f64, f64, 8, read_f64;
    }

    /// Read a signed 32-bit count and reject negative values.
    pub fn read_count(&mut self) -> Result<usize> {
        let offset = self.position;
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| Error::NegativeLength {
            offset,
            value: value as i64,
        })
    }

    /// Read a count-prefixed array of i32 values.
    pub fn read_i32_array(&mut self) -> Result<Vec<i32>> {
        let count = self.read_count()?;
        let mut values = Vec::with_capacity(count.min(self.remaining() / 4));
        for _ in 0..count {
            values.push(self.read_i32()?);
        }
        Ok(values)
    }

    /// Read a null-terminated UTF-8 string.
    pub fn read_cstring(&mut self) -> Result<&'a str> {
        let start = self.position;
        let remaining = self.remaining_bytes();

        let null_pos = memchr::memchr(0, remaining)
            .ok_or(Error::MissingNullTerminator { offset: start })?;

        let string_bytes = &remaining[..null_pos];
        self.position = start + null_pos + 1;

        std::str::from_utf8(string_bytes).map_err(|source| Error::Utf8 {
            offset: start,
            source,
        })
    }

    /// Read an i32 length-prefixed byte run and realign to 4 bytes.
    pub fn read_aligned_bytes(&mut self) -> Result<&'a [u8]> {
        let length = self.read_count()?;
        let bytes = self.read_bytes(length)?;
        self.align(4);
        Ok(bytes)
    }

    /// Read an i32 length-prefixed string and realign to 4 bytes.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected; object
    /// payloads carry arbitrary user text.
    pub fn read_aligned_string(&mut self) -> Result<Cow<'a, str>> {
        self.read_aligned_bytes().map(String::from_utf8_lossy)
    }

    /// Copy a plain byte layout out of the buffer; byte order does not apply.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let offset = self.position;
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            offset,
            needed: size,
            available: bytes.len(),
        })
    }

    /// Create a reader over `len` bytes starting at `offset` of the same buffer.
    ///
    /// The new reader shares this reader's byte order and starts at position 0.
    pub fn sub_reader(&self, offset: usize, len: usize) -> Result<BinaryReader<'a>> {
        let end = offset.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => Ok(BinaryReader::with_endian(&self.data[offset..end], self.endian)),
            None => Err(Error::UnexpectedEof {
                offset,
                needed: len,
                available: self.data.len().saturating_sub(offset),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_default() {
        let data = [0x16, 0x00, 0x00, 0x00, 0xFE, 0xFF];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.endian(), Endian::Little);
        assert_eq!(reader.read_u32().unwrap(), 22);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_big_endian() {
        let data = [0x00, 0x00, 0x00, 0x16, 0x3F, 0x80, 0x00, 0x00];
        let mut reader = BinaryReader::with_endian(&data, Endian::Big);

        assert_eq!(reader.read_u32().unwrap(), 22);
        assert_eq!(reader.read_f32().unwrap(), 1.0);
    }

    #[test]
    fn test_switch_endian_mid_stream() {
        let data = [0x00, 0x01, 0x01, 0x00];
        let mut reader = BinaryReader::with_endian(&data, Endian::Big);

        assert_eq!(reader.read_u16().unwrap(), 1);
        reader.set_endian(Endian::Little);
        assert_eq!(reader.read_u16().unwrap(), 1);
    }

    #[test]
    fn test_cstring_sequence() {
        let data = b"m_Name\0string\0";
        let mut reader = BinaryReader::new(data);

        assert_eq!(reader.read_cstring().unwrap(), "m_Name");
        assert_eq!(reader.read_cstring().unwrap(), "string");
        assert_eq!(reader.position(), data.len());
    }

    #[test]
    fn test_cstring_without_terminator() {
        let mut reader = BinaryReader::new(b"abc");
        assert!(matches!(
            reader.read_cstring(),
            Err(Error::MissingNullTerminator { offset: 0 })
        ));
    }

    #[test]
    fn test_aligned_string_realigns() {
        // len=3 "abc" + 1 pad byte, then sentinel
        let data = [3, 0, 0, 0, b'a', b'b', b'c', 0, 0xEF, 0xBE, 0xAD, 0xDE];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_aligned_string().unwrap(), "abc");
        assert_eq!(reader.position() % 4, 0);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_negative_count() {
        let data = (-1i32).to_le_bytes();
        let mut reader = BinaryReader::new(&data);
        assert!(matches!(
            reader.read_count(),
            Err(Error::NegativeLength { offset: 0, value: -1 })
        ));
    }

    #[test]
    fn test_peek_bytes_keeps_cursor() {
        let data = [0xAA, 0xBB];
        let reader = BinaryReader::new_at(&data, 1, Endian::Big);

        assert_eq!(reader.peek_bytes(1).unwrap(), &[0xBB]);
        assert_eq!(reader.position(), 1);
        assert!(reader.peek_bytes(2).is_err());
    }

    #[test]
    fn test_read_struct_guid() {
        let data = [7u8; 16];
        let mut reader = BinaryReader::with_endian(&data, Endian::Big);
        let guid: crate::Guid = reader.read_struct().unwrap();
        assert_eq!(guid, crate::Guid::from_bytes([7; 16]));
    }

    #[test]
    fn test_eof_error_reports_offset() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = BinaryReader::new_at(&data, 1, Endian::Little);

        match reader.read_u32() {
            Err(Error::UnexpectedEof {
                offset,
                needed,
                available,
            }) => {
                assert_eq!(offset, 1);
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_sub_reader_bounds() {
        let data = [1u8, 2, 3, 4, 5];
        let reader = BinaryReader::with_endian(&data, Endian::Big);

        let mut sub = reader.sub_reader(1, 2).unwrap();
        assert_eq!(sub.endian(), Endian::Big);
        assert_eq!(sub.read_u16().unwrap(), 0x0203);
        assert!(reader.sub_reader(4, 2).is_err());
        assert!(reader.sub_reader(usize::MAX, 2).is_err());
    }
}
