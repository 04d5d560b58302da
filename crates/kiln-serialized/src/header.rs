//! Serialized file header and byte-order detection.
//!
//! The first 16 bytes hold four u32 fields whose byte order is not known up
//! front. [`probe_endianness`] decides it from the version field alone; the
//! rest of the header is then read in that order. The metadata and object
//! data use the separate endianness flag stored in the header.

use kiln_common::{BinaryReader, Endian};
use tracing::trace;

use crate::{Error, Result};

/// Format versions this decoder accepts.
pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u32> = 5..=30;

/// Size of the initial header block (version 9 and later).
pub const HEADER_SIZE: usize = 20;

/// Size of the header including the widened fields of version 22.
pub const HEADER_SIZE_V22: usize = 48;

/// Decide the header byte order from the version field at bytes 8..12.
///
/// Big-endian is tried first; whichever interpretation lands in
/// [`SUPPORTED_VERSIONS`] wins.
pub fn probe_endianness(data: &[u8]) -> Option<Endian> {
    let field: [u8; 4] = data.get(8..12)?.try_into().ok()?;
    if SUPPORTED_VERSIONS.contains(&u32::from_be_bytes(field)) {
        Some(Endian::Big)
    } else if SUPPORTED_VERSIONS.contains(&u32::from_le_bytes(field)) {
        Some(Endian::Little)
    } else {
        None
    }
}

/// Decoded header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SerializedFileHeader {
    pub metadata_size: u32,
    pub file_size: u64,
    pub version: u32,
    pub data_offset: u64,
    /// Byte order of the header fields, from the probe.
    pub header_endian: Endian,
    /// Byte order of metadata and object data, from the flag byte.
    pub endian: Endian,
    pub reserved: [u8; 3],
    /// Trailing reserved field of version 22 headers.
    pub unknown: i64,
    /// Absolute offset where metadata parsing starts.
    pub metadata_offset: usize,
}

impl SerializedFileHeader {
    /// Parse and validate the header against the buffer.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header_endian = probe_endianness(data).ok_or_else(|| Error::UnsupportedVersion {
            version: data
                .get(8..12)
                .and_then(|b| b.try_into().ok())
                .map(u32::from_be_bytes)
                .unwrap_or(0),
        })?;

        if data.len() < 16 {
            return Err(Error::CorruptedHeader {
                offset: 0,
                field: "header",
                detail: format!("{} bytes is shorter than the header", data.len()),
            });
        }

        let mut reader = BinaryReader::with_endian(data, header_endian);
        let mut metadata_size = reader.read_u32()?;
        let mut file_size = reader.read_u32()? as u64;
        let version = reader.read_u32()?;
        let mut data_offset = reader.read_u32()? as u64;

        let mut reserved = [0u8; 3];
        let mut unknown = 0;
        let flag_offset;
        let flag;
        let metadata_offset;

        if version >= 9 {
            flag_offset = reader.position();
            flag = reader.read_u8()?;
            reserved = reader.read_array()?;

            if version >= 22 {
                metadata_size = reader.read_u32()?;
                file_size = read_i64_field(&mut reader, "file_size")?;
                data_offset = read_i64_field(&mut reader, "data_offset")?;
                unknown = reader.read_i64()?;
            }
            metadata_offset = reader.position();
        } else {
            // Metadata trails the data region, led by the flag byte.
            let start = file_size
                .checked_sub(metadata_size as u64)
                .ok_or(Error::TruncatedMetadata {
                    offset: 0,
                    field: "metadata_size",
                    needed: metadata_size as u64,
                    available: file_size,
                })?;
            flag_offset = usize::try_from(start).map_err(|_| Error::CorruptedHeader {
                offset: 4,
                field: "file_size",
                detail: format!("file size {} out of range", file_size),
            })?;
            flag = *data.get(flag_offset).ok_or(Error::CorruptedHeader {
                offset: 4,
                field: "file_size",
                detail: format!("file size {} exceeds {} bytes", file_size, data.len()),
            })?;
            metadata_offset = flag_offset + 1;
        }

        let endian = Endian::from_flag(flag).ok_or(Error::EndiannessMismatch {
            offset: flag_offset,
            value: flag,
        })?;

        if file_size > data.len() as u64 {
            return Err(Error::CorruptedHeader {
                offset: 4,
                field: "file_size",
                detail: format!(
                    "declared file size {} exceeds {} available bytes",
                    file_size,
                    data.len()
                ),
            });
        }
        if data_offset > file_size {
            return Err(Error::CorruptedHeader {
                offset: 12,
                field: "data_offset",
                detail: format!("data offset {} beyond file size {}", data_offset, file_size),
            });
        }

        let metadata_end = if version >= 9 {
            metadata_offset as u64 + metadata_size as u64
        } else {
            // The flag byte is counted in the declared size.
            metadata_offset as u64 + (metadata_size as u64).saturating_sub(1)
        };
        if metadata_end > data.len() as u64 {
            return Err(Error::TruncatedMetadata {
                offset: metadata_offset,
                field: "metadata_size",
                needed: metadata_end - metadata_offset as u64,
                available: data.len().saturating_sub(metadata_offset) as u64,
            });
        }

        trace!(
            version,
            header_endian = ?header_endian,
            endian = ?endian,
            metadata_size,
            file_size,
            data_offset,
            "read serialized file header"
        );

        Ok(Self {
            metadata_size,
            file_size,
            version,
            data_offset,
            header_endian,
            endian,
            reserved,
            unknown,
            metadata_offset,
        })
    }

    /// Where the metadata region ends.
    pub fn metadata_end(&self) -> usize {
        if self.version >= 9 {
            self.metadata_offset + self.metadata_size as usize
        } else {
            self.file_size as usize
        }
    }
}

fn read_i64_field(reader: &mut BinaryReader<'_>, field: &'static str) -> Result<u64> {
    let offset = reader.position();
    let value = reader.read_i64()?;
    u64::try_from(value).map_err(|_| Error::CorruptedHeader {
        offset,
        field,
        detail: format!("negative value {}", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::BinaryWriter;

    fn header_v17(endian: Endian, flag: u8, file_size: u32, data_offset: u32, total: usize) -> Vec<u8> {
        let mut w = BinaryWriter::new(endian);
        w.write_u32(0)
            .write_u32(file_size)
            .write_u32(17)
            .write_u32(data_offset)
            .write_u8(flag)
            .write_bytes(&[0, 0, 0]);
        w.pad_to(total);
        w.into_inner()
    }

    #[test]
    fn test_probe() {
        let be = header_v17(Endian::Big, 0, 64, 32, 64);
        let le = header_v17(Endian::Little, 0, 64, 32, 64);
        assert_eq!(probe_endianness(&be), Some(Endian::Big));
        assert_eq!(probe_endianness(&le), Some(Endian::Little));
        assert_eq!(probe_endianness(&[0u8; 8]), None);
        assert_eq!(probe_endianness(&[0u8; 16]), None);
    }

    #[test]
    fn test_big_endian_header_with_little_endian_data() {
        let bytes = header_v17(Endian::Big, 0, 64, 32, 64);
        let header = SerializedFileHeader::parse(&bytes).unwrap();
        assert_eq!(header.header_endian, Endian::Big);
        assert_eq!(header.endian, Endian::Little);
        assert_eq!(header.metadata_offset, HEADER_SIZE);
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = header_v17(Endian::Big, 0, 64, 32, 64);
        bytes[8..12].copy_from_slice(&99u32.to_be_bytes());
        assert!(matches!(
            SerializedFileHeader::parse(&bytes),
            Err(Error::UnsupportedVersion { version: 99 })
        ));
    }

    #[test]
    fn test_bad_endian_flag() {
        let bytes = header_v17(Endian::Big, 7, 64, 32, 64);
        assert!(matches!(
            SerializedFileHeader::parse(&bytes),
            Err(Error::EndiannessMismatch { offset: 16, value: 7 })
        ));
    }

    #[test]
    fn test_file_size_beyond_buffer() {
        let bytes = header_v17(Endian::Big, 0, 4096, 32, 64);
        assert!(matches!(
            SerializedFileHeader::parse(&bytes),
            Err(Error::CorruptedHeader { field: "file_size", .. })
        ));
    }

    #[test]
    fn test_data_offset_beyond_file() {
        let bytes = header_v17(Endian::Big, 0, 64, 65, 64);
        assert!(matches!(
            SerializedFileHeader::parse(&bytes),
            Err(Error::CorruptedHeader { field: "data_offset", .. })
        ));
    }

    #[test]
    fn test_metadata_overflow() {
        let mut bytes = header_v17(Endian::Big, 0, 64, 32, 64);
        bytes[0..4].copy_from_slice(&1000u32.to_be_bytes());
        assert!(matches!(
            SerializedFileHeader::parse(&bytes),
            Err(Error::TruncatedMetadata { .. })
        ));
    }

    #[test]
    fn test_v22_fields_use_probe_order() {
        let mut w = BinaryWriter::new(Endian::Big);
        w.write_u32(0)
            .write_u32(0)
            .write_u32(22)
            .write_u32(0)
            .write_u8(1)
            .write_bytes(&[0, 0, 0])
            .write_u32(4)
            .write_i64(96)
            .write_i64(64)
            .write_i64(0);
        w.pad_to(96);
        let bytes = w.into_inner();

        let header = SerializedFileHeader::parse(&bytes).unwrap();
        assert_eq!(header.metadata_size, 4);
        assert_eq!(header.file_size, 96);
        assert_eq!(header.data_offset, 64);
        assert_eq!(header.endian, Endian::Big);
        assert_eq!(header.metadata_offset, HEADER_SIZE_V22);
    }

    #[test]
    fn test_pre_v9_flag_trails_data() {
        let mut w = BinaryWriter::new(Endian::Big);
        w.write_u32(5).write_u32(40).write_u32(8).write_u32(16);
        w.pad_to(35);
        w.write_u8(1).write_u32(0xAABBCCDD);
        let bytes = w.into_inner();

        let header = SerializedFileHeader::parse(&bytes).unwrap();
        assert_eq!(header.endian, Endian::Big);
        assert_eq!(header.metadata_offset, 36);
        assert_eq!(header.metadata_end(), 40);
    }
}
