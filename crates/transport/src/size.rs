//! Human-readable byte sizes, as used by route limits.

use crate::error::{Error, ErrorKind, Result};
use exn::OptionExt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const UNITS: [(&str, u64); 4] = [("GB", 1 << 30), ("MB", 1 << 20), ("KB", 1 << 10), ("B", 1)];

/// A byte count that reads and writes as `"4MB"`, `"512KB"` or a bare integer.
///
/// Units are binary: `1KB` is 1024 bytes.
///
/// ```
/// use filedeck_transport::ByteSize;
///
/// let size: ByteSize = "4MB".parse().unwrap();
/// assert_eq!(size.bytes(), 4 * 1024 * 1024);
/// assert_eq!(size.to_string(), "4MB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(u64);
impl ByteSize {
    pub const fn b(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn kb(kb: u64) -> Self {
        Self(kb << 10)
    }

    pub const fn mb(mb: u64) -> Self {
        Self(mb << 20)
    }

    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Largest unit that divides evenly, so the string parses back exactly.
        for (unit, factor) in UNITS {
            if self.0 != 0 && self.0 % factor == 0 {
                return write!(f, "{}{unit}", self.0 / factor);
            }
        }
        write!(f, "{}B", self.0)
    }
}

impl FromStr for ByteSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let split = trimmed.find(|c: char| !c.is_ascii_digit()).unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);
        let value: u64 = digits.parse().map_err(|_| ErrorKind::InvalidSize(s.to_string()))?;
        let unit = unit.trim().to_ascii_uppercase();
        let factor = match unit.as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => 1 << 10,
            "M" | "MB" | "MIB" => 1 << 20,
            "G" | "GB" | "GIB" => 1 << 30,
            _ => exn::bail!(ErrorKind::InvalidSize(s.to_string())),
        };
        value.checked_mul(factor).map(Self).ok_or_raise(|| ErrorKind::InvalidSize(s.to_string()))
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bytes(u64),
            Text(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Bytes(bytes) => Ok(Self(bytes)),
            Repr::Text(text) => text.parse().map_err(|e: Error| serde::de::Error::custom(&*e)),
        }
    }
}
