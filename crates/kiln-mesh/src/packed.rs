//! Bit-packed vectors.
//!
//! Compressed meshes store every attribute as a [`PackedBitVector`]: a run
//! of fixed-width integers packed least-significant-bit first across byte
//! boundaries, optionally rescaled to floats with a `range`/`start` pair.

use kiln_serialized::Value;

use crate::fields::{bytes_of, f32_of, field, u32_of};
use crate::{Error, Result};

/// A bit-packed integer array.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PackedBitVector {
    pub num_items: u32,
    /// Float span covered by the largest packed integer.
    pub range: f32,
    /// Float origin added after scaling.
    pub start: f32,
    pub bit_size: u8,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub data: Vec<u8>,
}

impl PackedBitVector {
    /// Read a vector from its decoded struct.
    ///
    /// Integer-only vectors carry no `m_Range`/`m_Start`; both default to
    /// zero. The payload is checked against the declared item count.
    pub fn from_value(value: &Value<'_>, name: &'static str) -> Result<Self> {
        let optional_f32 = |field_name: &str| match value.get(field_name) {
            Some(_) => f32_of(value, field_name),
            None => Ok(0.0),
        };

        let bit_size = field(value, "m_BitSize")?
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| Error::unexpected("m_BitSize", "bit size"))?;
        if bit_size > 32 {
            return Err(Error::unexpected("m_BitSize", "bit size of at most 32"));
        }

        let vector = Self {
            num_items: u32_of(value, "m_NumItems")?,
            range: optional_f32("m_Range")?,
            start: optional_f32("m_Start")?,
            bit_size,
            data: bytes_of(value, "m_Data")?.into_owned(),
        };

        let needed = vector.bytes_needed(vector.num_items as usize);
        if needed > vector.data.len() {
            return Err(Error::TruncatedPackedVector {
                field: name,
                needed,
                available: vector.data.len(),
            });
        }
        Ok(vector)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.num_items as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    fn bytes_needed(&self, items: usize) -> usize {
        (items * self.bit_size as usize).div_ceil(8)
    }

    /// Unpack every item as an integer.
    pub fn unpack_ints(&self) -> Result<Vec<u32>> {
        self.unpack_ints_range(0, self.len())
    }

    /// Unpack `count` integers starting at item `first`.
    ///
    /// A zero bit size consumes no payload and fills with `start`.
    pub fn unpack_ints_range(&self, first: usize, count: usize) -> Result<Vec<u32>> {
        let bits = self.bit_size as usize;
        if bits == 0 {
            return Ok(vec![self.start as u32; count]);
        }

        let needed = self.bytes_needed(first + count);
        if needed > self.data.len() {
            return Err(Error::TruncatedPackedVector {
                field: "m_Data",
                needed,
                available: self.data.len(),
            });
        }

        let mask = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
        let mut bit_pos = first * bits;
        let mut out = Vec::with_capacity(count);

        for _ in 0..count {
            let mut item = 0u64;
            let mut gathered = 0;
            while gathered < bits {
                let shift = bit_pos % 8;
                let byte = u64::from(self.data[bit_pos / 8]);
                item |= (byte >> shift) << gathered;

                let taken = (bits - gathered).min(8 - shift);
                gathered += taken;
                bit_pos += taken;
            }
            out.push(item as u32 & mask);
        }

        Ok(out)
    }

    /// Unpack every item rescaled to a float.
    pub fn unpack_floats(&self) -> Result<Vec<f32>> {
        self.unpack_floats_range(0, self.len())
    }

    /// Unpack `count` floats starting at item `first`.
    pub fn unpack_floats_range(&self, first: usize, count: usize) -> Result<Vec<f32>> {
        if self.bit_size == 0 {
            return Ok(vec![self.start; count]);
        }
        let scale = self.scale();
        Ok(self
            .unpack_ints_range(first, count)?
            .into_iter()
            .map(|v| v as f32 * scale + self.start)
            .collect())
    }

    fn scale(&self) -> f32 {
        let max = (1u64 << self.bit_size) - 1;
        self.range / max as f32
    }

    /// Pack integers at `bit_size` bits each, dropping higher bits.
    pub fn pack_ints(values: &[u32], bit_size: u8) -> Self {
        let bits = bit_size as usize;
        let mut data = vec![0u8; (values.len() * bits).div_ceil(8)];
        let mut bit_pos = 0;

        for &value in values {
            let mut written = 0;
            while written < bits {
                let shift = bit_pos % 8;
                let taken = (bits - written).min(8 - shift);
                let chunk = (u64::from(value) >> written) & ((1u64 << taken) - 1);
                data[bit_pos / 8] |= (chunk << shift) as u8;
                written += taken;
                bit_pos += taken;
            }
        }

        Self {
            num_items: values.len() as u32,
            range: 0.0,
            start: 0.0,
            bit_size,
            data,
        }
    }

    /// Quantize floats into `[start, start + range]` at `bit_size` bits.
    pub fn pack_floats(values: &[f32], range: f32, start: f32, bit_size: u8) -> Self {
        let max = if bit_size == 0 {
            0.0
        } else {
            ((1u64 << bit_size) - 1) as f32
        };
        let quantized: Vec<u32> = values
            .iter()
            .map(|&v| {
                let t = if range == 0.0 { 0.0 } else { (v - start) / range };
                (t.clamp(0.0, 1.0) * max).round() as u32
            })
            .collect();

        let mut vector = Self::pack_ints(&quantized, bit_size);
        vector.range = range;
        vector.start = start;
        vector
    }
}
