//! Shard file encodings.

use crate::error::CodecError;
use crate::types::Shard;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// On-disk encoding of shard files. The manifest itself is always JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Plain JSON, readable by browser clients without extra code.
    #[default]
    Json,
    /// Compact postcard encoding for native clients.
    Postcard,
}

impl Codec {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Postcard => "bin",
        }
    }

    /// File name for a shard, derived from its id alone.
    pub fn file_name(self, shard_id: &str) -> String {
        format!("shard_{}.{}", shard_id, self.extension())
    }

    pub fn encode(self, shard: &Shard) -> Result<Vec<u8>, CodecError> {
        Ok(match self {
            Self::Json => serde_json::to_vec(shard)?,
            Self::Postcard => postcard::to_stdvec(shard)?,
        })
    }

    pub fn decode(self, bytes: &[u8]) -> Result<Shard, CodecError> {
        Ok(match self {
            Self::Json => serde_json::from_slice(bytes)?,
            Self::Postcard => postcard::from_bytes(bytes)?,
        })
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Postcard => "postcard",
        })
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "postcard" | "bin" => Ok(Self::Postcard),
            other => Err(format!("unknown codec '{}' (expected json or postcard)", other)),
        }
    }
}
