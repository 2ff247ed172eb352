//! Wire encodings for cache messages
//!
//! Two encodings are supported for every message:
//!
//! - **Binary**: a little-endian `u16` protocol version followed by the
//!   bincode body (fixed-width integers, trailing bytes rejected, bounded
//!   by [`MAX_MESSAGE_BYTES`]).
//! - **Text**: JSON, for debugging and tooling.

use std::fmt;
use std::str::FromStr;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Version written in front of every binary message
pub const PROTOCOL_VERSION: u16 = 1;

/// Upper bound on a binary message body
pub const MAX_MESSAGE_BYTES: u64 = 64 * 1024 * 1024;

const HEADER_LEN: usize = std::mem::size_of::<u16>();

/// Which wire form a payload uses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Binary,
    Text,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Binary => f.write_str("binary"),
            Encoding::Text => f.write_str("text"),
        }
    }
}

impl FromStr for Encoding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(Encoding::Binary),
            "text" | "json" => Ok(Encoding::Text),
            other => Err(CodecError::Text(format!("unknown encoding {other:?}"))),
        }
    }
}

fn binary_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_MESSAGE_BYTES)
        .reject_trailing_bytes()
}

/// Encode and decode a message in either wire form
///
/// Implemented for every serde message type.
pub trait WireMessage: Sized {
    fn to_binary(&self) -> Result<Vec<u8>, CodecError>;
    fn from_binary(bytes: &[u8]) -> Result<Self, CodecError>;
    fn to_text(&self) -> Result<Vec<u8>, CodecError>;
    fn from_text(bytes: &[u8]) -> Result<Self, CodecError>;

    fn encode(&self, encoding: Encoding) -> Result<Vec<u8>, CodecError> {
        match encoding {
            Encoding::Binary => self.to_binary(),
            Encoding::Text => self.to_text(),
        }
    }

    fn decode(encoding: Encoding, bytes: &[u8]) -> Result<Self, CodecError> {
        match encoding {
            Encoding::Binary => Self::from_binary(bytes),
            Encoding::Text => Self::from_text(bytes),
        }
    }
}

impl<T> WireMessage for T
where
    T: Serialize + DeserializeOwned,
{
    fn to_binary(&self) -> Result<Vec<u8>, CodecError> {
        let body = binary_options().serialize(self)?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    fn from_binary(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::EmptyMessage);
        }
        let Some((header, body)) = bytes.split_first_chunk::<HEADER_LEN>() else {
            return Err(CodecError::Truncated);
        };
        let version = u16::from_le_bytes(*header);
        if version != PROTOCOL_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: version,
                expected: PROTOCOL_VERSION,
            });
        }
        Ok(binary_options().deserialize(body)?)
    }

    fn to_text(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn from_text(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::EmptyMessage);
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}
