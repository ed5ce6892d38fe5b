//! Change-detection fingerprints for raw plan text
//!
//! Provides [`Fingerprint`], a 32-bit rolling polynomial hash rendered as an
//! 8-character hex token. It answers one question only: have these bytes
//! changed since they were last seen? It is not an integrity check.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-bit text fingerprint
///
/// Deterministic and order-sensitive. Collisions are tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fingerprint(u32);

impl Fingerprint {
    /// Width of the rendered hex token
    pub const TOKEN_LEN: usize = 8;

    /// Wrap a raw fingerprint value
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Fingerprint arbitrary text
    ///
    /// Folds `h = h * 31 + unit` over the UTF-16 code units of `text` in
    /// wrapping 32-bit signed arithmetic, then takes the magnitude.
    #[must_use]
    pub fn of(text: &str) -> Self {
        let hash = text.encode_utf16().fold(0i32, |hash, unit| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit))
        });
        Self(hash.unsigned_abs())
    }
}

/// Fingerprint raw text and render it as a token
#[inline]
#[must_use]
pub fn fingerprint(text: &str) -> String {
    Fingerprint::of(text).to_string()
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_be_bytes()))
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::TOKEN_LEN {
            return Err(FingerprintError::InvalidLength {
                expected: Self::TOKEN_LEN,
                actual: s.len(),
            });
        }
        let bytes = hex::decode(s)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(&bytes);
        Ok(Self(u32::from_be_bytes(arr)))
    }
}

impl serde::Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors reading a stored fingerprint token
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// Token has the wrong width
    #[error("invalid fingerprint length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Token is not hex
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
