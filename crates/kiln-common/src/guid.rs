//! 16-byte asset GUID as stored in external file references.
//!
//! The engine prints GUIDs as 32 hex digits with the two nibbles of each
//! byte swapped, which is the form found in `.meta` files.

use std::fmt;
use std::str::FromStr;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::Error;

/// A 16-byte GUID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Guid {
    bytes: [u8; 16],
}

impl Guid {
    /// Empty GUID (all zeros).
    pub const EMPTY: Self = Self { bytes: [0; 16] };

    /// Create a GUID from raw on-disk bytes.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes of the GUID.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Check if the GUID is empty (all zeros).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes == [0; 16]
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.bytes {
            write!(f, "{:x}{:x}", byte & 0x0F, byte >> 4)?;
        }
        Ok(())
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(Error::InvalidGuid(format!(
                "expected 32 hex digits, got {}",
                s.len()
            )));
        }

        let nibble = |c: u8| -> Result<u8, Error> {
            (c as char)
                .to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| Error::InvalidGuid(format!("invalid hex digit {:?}", c as char)))
        };

        let mut bytes = [0u8; 16];
        for (i, pair) in s.as_bytes().chunks_exact(2).enumerate() {
            let low = nibble(pair[0])?;
            let high = nibble(pair[1])?;
            bytes[i] = (high << 4) | low;
        }
        Ok(Self { bytes })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Guid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_swaps_nibbles() {
        let mut bytes = [0u8; 16];
        bytes[0] = 0x12;
        bytes[15] = 0xAB;
        let guid = Guid::from_bytes(bytes);
        let text = guid.to_string();

        assert_eq!(text.len(), 32);
        assert!(text.starts_with("21"));
        assert!(text.ends_with("ba"));
    }

    #[test]
    fn test_parse_roundtrip() {
        let text = "0123456789abcdef0123456789abcdef";
        let guid: Guid = text.parse().unwrap();
        assert_eq!(guid.to_string(), text);
        assert_eq!(guid.as_bytes()[0], 0x10);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("abc".parse::<Guid>().is_err());
        assert!("zz23456789abcdef0123456789abcdef".parse::<Guid>().is_err());
    }

    #[test]
    fn test_empty() {
        assert!(Guid::EMPTY.is_empty());
        assert!(Guid::default().is_empty());
    }
}
