//! Response messages produced by the cache service

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{ChannelKey, DataPacket};

/// Outcome attached to every response
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnCode {
    /// Served, possibly with an empty result
    #[default]
    Success,
    /// Channel is not cached; the result is empty
    UnknownChannel,
    /// Start time is after end time
    InvalidRange,
    /// Request bytes or fields could not be interpreted
    InvalidMessage,
    /// Service is not in the running state
    NotRunning,
    /// Peer failed the authorization policy
    Unauthorized,
    /// Unexpected failure inside the service
    InternalError,
}

impl ReturnCode {
    /// Numeric code carried by logs and external tooling
    pub fn code(self) -> u8 {
        match self {
            ReturnCode::Success => 0,
            ReturnCode::UnknownChannel => 1,
            ReturnCode::InvalidRange => 2,
            ReturnCode::InvalidMessage => 3,
            ReturnCode::NotRunning => 4,
            ReturnCode::Unauthorized => 5,
            ReturnCode::InternalError => 6,
        }
    }

    /// An unknown channel is an empty success, not a failure
    pub fn is_failure(self) -> bool {
        !matches!(self, ReturnCode::Success | ReturnCode::UnknownChannel)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorResponse {
    pub identifier: u64,
    pub channel: ChannelKey,
    pub packets: Vec<DataPacket>,
    pub return_code: ReturnCode,
}

impl SensorResponse {
    pub fn new(identifier: u64, channel: ChannelKey, packets: Vec<DataPacket>) -> Self {
        Self {
            identifier,
            channel,
            packets,
            return_code: ReturnCode::Success,
        }
    }

    /// Empty response carrying a status
    pub fn with_code(identifier: u64, channel: ChannelKey, return_code: ReturnCode) -> Self {
        Self {
            identifier,
            channel,
            packets: Vec::new(),
            return_code,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataResponse {
    pub identifier: u64,
    pub name: String,
    pub packets: Vec<DataPacket>,
    pub return_code: ReturnCode,
}

impl DataResponse {
    pub fn with_code(identifier: u64, name: impl Into<String>, return_code: ReturnCode) -> Self {
        Self {
            identifier,
            name: name.into(),
            packets: Vec::new(),
            return_code,
        }
    }
}

/// Sub-responses in the same order as the bulk request's sub-requests
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkDataResponse {
    pub identifier: u64,
    pub responses: Vec<SensorResponse>,
    pub return_code: ReturnCode,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelListResponse {
    pub identifier: u64,
    pub channels: Vec<ChannelKey>,
    pub return_code: ReturnCode,
}

/// Sent when a request fails before a typed response can be built
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureResponse {
    pub identifier: u64,
    pub return_code: ReturnCode,
    pub details: String,
}

impl FailureResponse {
    pub fn new(identifier: u64, return_code: ReturnCode, details: impl Into<String>) -> Self {
        Self {
            identifier,
            return_code,
            details: details.into(),
        }
    }
}

/// Every response the service produces
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CacheResponse {
    Sensor(SensorResponse),
    Data(DataResponse),
    Bulk(BulkDataResponse),
    ChannelList(ChannelListResponse),
    Failure(FailureResponse),
}

impl CacheResponse {
    pub fn identifier(&self) -> u64 {
        match self {
            CacheResponse::Sensor(r) => r.identifier,
            CacheResponse::Data(r) => r.identifier,
            CacheResponse::Bulk(r) => r.identifier,
            CacheResponse::ChannelList(r) => r.identifier,
            CacheResponse::Failure(r) => r.identifier,
        }
    }

    pub fn return_code(&self) -> ReturnCode {
        match self {
            CacheResponse::Sensor(r) => r.return_code,
            CacheResponse::Data(r) => r.return_code,
            CacheResponse::Bulk(r) => r.return_code,
            CacheResponse::ChannelList(r) => r.return_code,
            CacheResponse::Failure(r) => r.return_code,
        }
    }

    pub fn failure(identifier: u64, return_code: ReturnCode, details: impl Into<String>) -> Self {
        CacheResponse::Failure(FailureResponse::new(identifier, return_code, details))
    }
}
