//! Cache configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use packet_cache::domain::CacheConfigBuilder;
//!
//! let config = CacheConfigBuilder::new()
//!     .max_channels(500)
//!     .max_packets_per_channel(120)
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};

use super::ChannelKeyRules;
use crate::error::ConfigError;

/// Default packets retained per channel
pub const DEFAULT_MAX_PACKETS_PER_CHANNEL: usize = 300;

/// Default bound on distinct channels
pub const DEFAULT_MAX_CHANNELS: usize = 10_000;

/// What ingest does with a packet that predates a full buffer's window
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TooOldPolicy {
    /// Discard it and report success with a dropped outcome
    #[default]
    Drop,
    /// Discard it and return an error to the ingest caller
    Reject,
}

/// Packet cache configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity of each channel's circular buffer
    pub max_packets_per_channel: usize,
    /// Maximum number of distinct channels held at once
    pub max_channels: usize,
    /// Rules applied to channel keys on ingest and query
    pub channel_rules: ChannelKeyRules,
    /// Handling of packets older than a full buffer's window
    pub too_old_policy: TooOldPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_packets_per_channel: DEFAULT_MAX_PACKETS_PER_CHANNEL,
            max_channels: DEFAULT_MAX_CHANNELS,
            channel_rules: ChannelKeyRules::default(),
            too_old_policy: TooOldPolicy::Drop,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_packets_per_channel == 0 {
            return Err(ConfigError::ZeroPacketCapacity);
        }
        if self.max_channels == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        if !self.channel_rules.is_consistent() {
            return Err(ConfigError::InvalidRules(
                "code length limits must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder-style method to set the per-channel capacity
    pub fn with_max_packets_per_channel(mut self, capacity: usize) -> Self {
        self.max_packets_per_channel = capacity;
        self
    }

    /// Builder-style method to set the channel bound
    pub fn with_max_channels(mut self, max: usize) -> Self {
        self.max_channels = max;
        self
    }

    /// Builder-style method to set the too-old policy
    pub fn with_too_old_policy(mut self, policy: TooOldPolicy) -> Self {
        self.too_old_policy = policy;
        self
    }

    /// Builder-style method to set the channel key rules
    pub fn with_channel_rules(mut self, rules: ChannelKeyRules) -> Self {
        self.channel_rules = rules;
        self
    }
}

/// Builder for [`CacheConfig`] that validates on `build`
#[derive(Default)]
pub struct CacheConfigBuilder {
    max_packets_per_channel: Option<usize>,
    max_channels: Option<usize>,
    channel_rules: Option<ChannelKeyRules>,
    too_old_policy: Option<TooOldPolicy>,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_packets_per_channel(mut self, capacity: usize) -> Self {
        self.max_packets_per_channel = Some(capacity);
        self
    }

    pub fn max_channels(mut self, max: usize) -> Self {
        self.max_channels = Some(max);
        self
    }

    pub fn channel_rules(mut self, rules: ChannelKeyRules) -> Self {
        self.channel_rules = Some(rules);
        self
    }

    pub fn too_old_policy(mut self, policy: TooOldPolicy) -> Self {
        self.too_old_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<CacheConfig, ConfigError> {
        let defaults = CacheConfig::default();
        let config = CacheConfig {
            max_packets_per_channel: self
                .max_packets_per_channel
                .unwrap_or(defaults.max_packets_per_channel),
            max_channels: self.max_channels.unwrap_or(defaults.max_channels),
            channel_rules: self.channel_rules.unwrap_or(defaults.channel_rules),
            too_old_policy: self.too_old_policy.unwrap_or(defaults.too_old_policy),
        };
        config.validate()?;
        Ok(config)
    }
}
