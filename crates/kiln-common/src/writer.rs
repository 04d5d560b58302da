//! Endian-aware binary writer.
//!
//! The counterpart of [`BinaryReader`](crate::BinaryReader); the builders in
//! the bundle and serialized-file crates use it to emit well-formed files.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::Endian;

macro_rules! write_primitive {
    ($($name:ident, $ty:ty, $width:expr, $method:ident;)*) => {
        $(
            #[inline]
            pub fn $name(&mut self, value: $ty) -> &mut Self {
                let mut bytes = [0u8; $width];
                match self.endian {
                    Endian::Little => LittleEndian::$method(&mut bytes, value),
                    Endian::Big => BigEndian::$method(&mut bytes, value),
                }
                self.buf.extend_from_slice(&bytes);
                self
            }
        )*
    };
}

/// Growable byte buffer with a switchable byte order.
#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl BinaryWriter {
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    #[inline]
    pub fn write_i8(&mut self, value: i8) -> &mut Self {
        self.write_u8(value as u8)
    }

    #[inline]
    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(value as u8)
    }

    write_primitive! {
        write_u16, u16, 2, write_u16;
        write_i16, i16, 2, write_i16;
        write_u32, u32, 4, write_u32;
        write_i32, i32, 4, write_i32;
        write_u64, u64, 8, write_u64;
        write_i64, i64, 8, write_i64;
        write_f32, f32, 4, write_f32;
        write_f64, f64, 8, write_f64;
    }

    /// Write a string followed by a null terminator.
    pub fn write_cstring(&mut self, value: &str) -> &mut Self {
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        self
    }

    /// Write an i32 length, the bytes, then zero-pad to 4.
    pub fn write_aligned_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.write_i32(value.len() as i32);
        self.buf.extend_from_slice(value);
        self.align(4)
    }

    pub fn write_aligned_string(&mut self, value: &str) -> &mut Self {
        self.write_aligned_bytes(value.as_bytes())
    }

    /// Zero-pad to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) -> &mut Self {
        let target = crate::align_up(self.buf.len(), alignment);
        self.buf.resize(target, 0);
        self
    }

    /// Zero-pad until the buffer is `len` bytes long.
    pub fn pad_to(&mut self, len: usize) -> &mut Self {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
        self
    }

    /// Overwrite a previously written u32 at `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position + 4` exceeds the bytes written so far.
    pub fn patch_u32(&mut self, position: usize, value: u32) {
        let slot = &mut self.buf[position..position + 4];
        match self.endian {
            Endian::Little => LittleEndian::write_u32(slot, value),
            Endian::Big => BigEndian::write_u32(slot, value),
        }
    }

    /// Overwrite a previously written i64 at `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position + 8` exceeds the bytes written so far.
    pub fn patch_i64(&mut self, position: usize, value: i64) {
        let slot = &mut self.buf[position..position + 8];
        match self.endian {
            Endian::Little => LittleEndian::write_i64(slot, value),
            Endian::Big => BigEndian::write_i64(slot, value),
        }
    }
}
