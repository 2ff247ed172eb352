//! Request messages accepted by the cache service

use serde::{Deserialize, Serialize};

use crate::domain::ChannelKey;

/// Packets for one channel over `[start_time, end_time]` (µs, inclusive)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRequest {
    /// Caller-chosen identifier echoed in the response
    pub identifier: u64,
    pub channel: ChannelKey,
    pub start_time: i64,
    pub end_time: i64,
}

impl SensorRequest {
    pub fn new(identifier: u64, channel: ChannelKey, start_time: i64, end_time: i64) -> Self {
        Self {
            identifier,
            channel,
            start_time,
            end_time,
        }
    }

    pub fn has_valid_range(&self) -> bool {
        self.start_time <= self.end_time
    }
}

/// Like [`SensorRequest`] but names the channel by its dotted form
/// (`NET.STA.CHA.LOC`)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequest {
    pub identifier: u64,
    pub name: String,
    pub start_time: i64,
    pub end_time: i64,
}

impl DataRequest {
    pub fn new(identifier: u64, name: impl Into<String>, start_time: i64, end_time: i64) -> Self {
        Self {
            identifier,
            name: name.into(),
            start_time,
            end_time,
        }
    }
}

/// A batch of sensor requests answered positionally
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDataRequest {
    pub identifier: u64,
    pub requests: Vec<SensorRequest>,
}

impl BulkDataRequest {
    pub fn new(identifier: u64) -> Self {
        Self {
            identifier,
            requests: Vec::new(),
        }
    }

    pub fn with_request(mut self, request: SensorRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Lists the channels currently cached
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelListRequest {
    pub identifier: u64,
}

/// Every request the service dispatches on
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheRequest {
    Sensor(SensorRequest),
    Data(DataRequest),
    Bulk(BulkDataRequest),
    ChannelList(ChannelListRequest),
}

impl CacheRequest {
    pub fn identifier(&self) -> u64 {
        match self {
            CacheRequest::Sensor(r) => r.identifier,
            CacheRequest::Data(r) => r.identifier,
            CacheRequest::Bulk(r) => r.identifier,
            CacheRequest::ChannelList(r) => r.identifier,
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            CacheRequest::Sensor(_) => "sensor",
            CacheRequest::Data(_) => "data",
            CacheRequest::Bulk(_) => "bulk",
            CacheRequest::ChannelList(_) => "channel_list",
        }
    }
}

impl From<SensorRequest> for CacheRequest {
    fn from(r: SensorRequest) -> Self {
        CacheRequest::Sensor(r)
    }
}

impl From<DataRequest> for CacheRequest {
    fn from(r: DataRequest) -> Self {
        CacheRequest::Data(r)
    }
}

impl From<BulkDataRequest> for CacheRequest {
    fn from(r: BulkDataRequest) -> Self {
        CacheRequest::Bulk(r)
    }
}

impl From<ChannelListRequest> for CacheRequest {
    fn from(r: ChannelListRequest) -> Self {
        CacheRequest::ChannelList(r)
    }
}
