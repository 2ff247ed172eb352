//! Data packets: one contiguous run of samples for one channel

use serde::{Deserialize, Serialize};

use super::ChannelKey;
use crate::error::PacketError;

/// Microseconds per second
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Convert epoch seconds to epoch microseconds, rounding to the nearest tick
pub fn seconds_to_micros(seconds: f64) -> i64 {
    (seconds * MICROS_PER_SECOND).round() as i64
}

/// Convert epoch microseconds to epoch seconds
pub fn micros_to_seconds(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}

/// One interval of uniformly sampled time-series data
///
/// Times are microseconds since the UNIX epoch. The end time is derived from
/// the sample count and rate and is never serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PacketFields")]
pub struct DataPacket {
    channel: ChannelKey,
    start_time: i64,
    sampling_rate: f64,
    samples: Vec<f64>,
    #[serde(skip)]
    end_time: i64,
}

/// Unvalidated wire form of a packet
#[derive(Deserialize)]
struct PacketFields {
    channel: ChannelKey,
    start_time: i64,
    sampling_rate: f64,
    samples: Vec<f64>,
}

impl TryFrom<PacketFields> for DataPacket {
    type Error = PacketError;

    fn try_from(fields: PacketFields) -> Result<Self, Self::Error> {
        DataPacket::new(
            fields.channel,
            fields.start_time,
            fields.sampling_rate,
            fields.samples,
        )
    }
}

impl DataPacket {
    /// Create a packet
    ///
    /// Requires at least one sample, a finite positive sampling rate (Hz) and
    /// finite sample values.
    pub fn new(
        channel: ChannelKey,
        start_time: i64,
        sampling_rate: f64,
        samples: Vec<f64>,
    ) -> Result<Self, PacketError> {
        if samples.is_empty() {
            return Err(PacketError::NoSamples);
        }
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(PacketError::InvalidSamplingRate(sampling_rate));
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(PacketError::NonFiniteSample { index });
        }

        let end_time = compute_end_time(start_time, sampling_rate, samples.len())?;

        Ok(Self {
            channel,
            start_time,
            sampling_rate,
            samples,
            end_time,
        })
    }

    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }

    /// Time of the first sample (µs)
    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    /// Time of the last sample (µs)
    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    /// Sampling rate in Hz
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Inclusive overlap of `[start, end]` with `[t0, t1]`
    pub fn overlaps(&self, t0: i64, t1: i64) -> bool {
        self.start_time <= t1 && self.end_time >= t0
    }
}

fn compute_end_time(start_time: i64, sampling_rate: f64, count: usize) -> Result<i64, PacketError> {
    let span = ((count - 1) as f64 / sampling_rate * MICROS_PER_SECOND).round();
    if span >= i64::MAX as f64 {
        return Err(PacketError::TimeOverflow);
    }
    start_time
        .checked_add(span as i64)
        .ok_or(PacketError::TimeOverflow)
}
