//! Request/response messages and their wire codec

pub mod codec;
pub mod requests;
pub mod responses;

pub use codec::{Encoding, WireMessage, MAX_MESSAGE_BYTES, PROTOCOL_VERSION};
pub use requests::{BulkDataRequest, CacheRequest, ChannelListRequest, DataRequest, SensorRequest};
pub use responses::{
    BulkDataResponse, CacheResponse, ChannelListResponse, DataResponse, FailureResponse,
    ReturnCode, SensorResponse,
};
