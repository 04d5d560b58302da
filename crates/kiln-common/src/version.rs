//! Engine version strings.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A parsed engine version such as `2019.4.31f1` or `5.6.7p3`.
///
/// Ordering compares the numeric components first, then build type and
/// build number. Version gates in the mesh layout only ever look at
/// `major` and `minor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UnityVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Release channel letter (`a`, `b`, `f`, `p`, `x`, `c`) when present.
    pub build_type: Option<char>,
    pub build: u32,
}

impl UnityVersion {
    /// Construct a version from its numeric components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build_type: None,
            build: 0,
        }
    }

    /// Whether this version is at least `major.minor`.
    #[inline]
    pub fn is_at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl FromStr for UnityVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidVersion(s.to_string());

        // Stripped builds write "0.0.0" with trailing text after the build.
        let trimmed = s.split(['\n', ' ']).next().unwrap_or_default();
        let mut parts = trimmed.splitn(3, '.');

        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;

        let mut version = Self::new(major, minor, 0);
        let Some(rest) = parts.next() else {
            return Ok(version);
        };

        let split = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (patch, tail) = rest.split_at(split);
        version.patch = if patch.is_empty() {
            0
        } else {
            patch.parse().map_err(|_| invalid())?
        };

        let mut tail_chars = tail.chars();
        if let Some(kind) = tail_chars.next() {
            version.build_type = Some(kind);
            let digits: String = tail_chars.take_while(|c| c.is_ascii_digit()).collect();
            version.build = digits.parse().unwrap_or(0);
        }
        Ok(version)
    }
}

impl PartialOrd for UnityVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnityVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| self.build_type.cmp(&other.build_type))
            .then_with(|| self.build.cmp(&other.build))
    }
}

impl fmt::Display for UnityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(kind) = self.build_type {
            write!(f, "{}{}", kind, self.build)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let v: UnityVersion = "2019.4.31f1".parse().unwrap();
        assert_eq!(v.major, 2019);
        assert_eq!(v.minor, 4);
        assert_eq!(v.patch, 31);
        assert_eq!(v.build_type, Some('f'));
        assert_eq!(v.build, 1);
        assert_eq!(v.to_string(), "2019.4.31f1");
    }

    #[test]
    fn test_parse_short_forms() {
        let v: UnityVersion = "5.6".parse().unwrap();
        assert_eq!((v.major, v.minor, v.patch), (5, 6, 0));

        let v: UnityVersion = "4.7.2".parse().unwrap();
        assert_eq!(v.build_type, None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<UnityVersion>().is_err());
        assert!("abc.def".parse::<UnityVersion>().is_err());
    }

    #[test]
    fn test_ordering() {
        let a: UnityVersion = "2017.4.0f1".parse().unwrap();
        let b: UnityVersion = "2018.1.0b2".parse().unwrap();
        assert!(a < b);
        assert!(b.is_at_least(2018, 1));
        assert!(!a.is_at_least(2018, 1));
    }
}
