//! Content digests for shard files.
//!
//! Every shard file is addressed by the xxh3-64 digest of its bytes. The manifest
//! records the digest so a store can reject truncated or stale downloads, and the
//! build id folds all shard digests together.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use xxhash_rust::xxh3::{Xxh3, xxh3_64};

/// A 64-bit content digest, rendered as 16 lowercase hex characters.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Digest(u64);

impl Digest {
    /// Digest of a byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        Self(xxh3_64(bytes))
    }

    /// Combined digest over a sequence of digests, in order.
    pub fn combine<'a>(digests: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut hasher = Xxh3::new();
        for digest in digests {
            hasher.update(&digest.0.to_le_bytes());
        }
        Self(hasher.digest())
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the digest as a lowercase hexadecimal string
    pub fn as_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl From<u64> for Digest {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl FromStr for Digest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 16 {
            return Err(ParseDigestError::InvalidLength(s.len()));
        }
        // from_str_radix accepts a leading '+', which is not hex
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseDigestError::InvalidHex);
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseDigestError::InvalidHex)
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for digest parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseDigestError {
    #[error("invalid hexadecimal characters in digest string")]
    InvalidHex,
    #[error("invalid digest length: expected 16 hex characters, got {0}")]
    InvalidLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    #[rstest]
    #[case("123456789abcdef0", 0x1234_5678_9abc_def0)]
    #[case("0000000000000000", 0)]
    #[case("ffffffffffffffff", u64::MAX)]
    #[case("00000000000000ff", 255)]
    fn test_parsing(#[case] digest_str: &str, #[case] expected: u64) {
        let digest: Digest = digest_str.parse().unwrap();
        check!(digest == Digest::from(expected));
        check!(digest.to_string() == digest_str);
    }

    #[rstest]
    #[case("zzzzzzzzzzzzzzzz")]
    #[case("123456789abcdefg")]
    #[case("+23456789abcdef0")]
    fn test_invalid_hex(#[case] input: &str) {
        let_assert!(Err(err) = input.parse::<Digest>());
        check!(err == ParseDigestError::InvalidHex);
    }

    #[rstest]
    #[case("", 0)]
    #[case("abc123", 6)]
    #[case("1234567890abcdef0", 17)]
    fn test_invalid_length(#[case] input: &str, #[case] len: usize) {
        let_assert!(Err(ParseDigestError::InvalidLength(actual_len)) = input.parse::<Digest>());
        check!(actual_len == len);
    }

    #[test]
    fn test_serialization() {
        let digest = Digest::from(255);
        let json = serde_json::to_string(&digest).unwrap();
        check!(json == "\"00000000000000ff\"");

        let back: Digest = serde_json::from_str(&json).unwrap();
        check!(back == digest);
    }

    #[test]
    fn test_content_addressing() {
        check!(Digest::of(b"shard") == Digest::of(b"shard"));
        check!(Digest::of(b"shard") != Digest::of(b"shard "));

        let a = Digest::of(b"a");
        let b = Digest::of(b"b");
        check!(Digest::combine([&a, &b]) == Digest::combine([&a, &b]));
        check!(Digest::combine([&a, &b]) != Digest::combine([&b, &a]));
    }
}
