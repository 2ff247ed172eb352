//! # Node Configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment.
//!
//! ```toml
//! [cache]
//! max_packets_per_channel = 300
//! max_channels = 10000
//! too_old_policy = "drop"       # or "reject"
//! allow_empty_location = false
//! max_network_len = 8
//! max_station_len = 16
//! max_channel_len = 8
//! max_location_len = 8
//!
//! [bus]
//! channel_capacity = 1000
//! request_queue_depth = 256
//! request_timeout_ms = 5000
//!
//! [security]
//! allow = ["picker-01"]         # or deny = [...], never both
//!
//! [service]
//! encoding = "binary"           # or "text"
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs};

use packet_cache::{
    AllowAll, AllowList, CacheConfig, DenyList, Encoding, PeerAuthorizer, TooOldPolicy,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming the TOML file.
pub const CONFIG_PATH_ENV: &str = "UMPS_CACHE_CONFIG";
/// Overrides `[cache] max_channels`.
pub const MAX_CHANNELS_ENV: &str = "UMPS_MAX_CHANNELS";
/// Overrides `[cache] max_packets_per_channel`.
pub const MAX_PACKETS_ENV: &str = "UMPS_MAX_PACKETS";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum NodeConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {variable}: {value:?}")]
    Env { variable: String, value: String },

    #[error("Security section lists both allowed and denied peers")]
    ConflictingPeerLists,

    #[error(transparent)]
    Cache(#[from] packet_cache::ConfigError),
}

/// Transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Frames buffered per subscriber before it lags.
    pub channel_capacity: usize,
    /// Requests queued before requestors wait.
    pub request_queue_depth: usize,
    /// How long a client waits for a reply.
    pub request_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: cache_bus::DEFAULT_CHANNEL_CAPACITY,
            request_queue_depth: cache_bus::DEFAULT_REQUEST_QUEUE_DEPTH,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Peer policy. At most one of the lists may be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityConfig {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

impl SecurityConfig {
    /// Build the authorizer the handler consults.
    pub fn authorizer(&self) -> Arc<dyn PeerAuthorizer> {
        if !self.allow.is_empty() {
            Arc::new(AllowList::new(self.allow.iter().cloned()))
        } else if !self.deny.is_empty() {
            Arc::new(DenyList::new(self.deny.iter().cloned()))
        } else {
            Arc::new(AllowAll)
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    pub cache: CacheConfig,
    pub bus: BusConfig,
    pub security: SecurityConfig,
    /// Encoding clients of this node publish and request with.
    pub encoding: Encoding,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    bus: BusSection,
    #[serde(default)]
    security: SecuritySection,
    #[serde(default)]
    service: ServiceSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheSection {
    max_packets_per_channel: Option<usize>,
    max_channels: Option<usize>,
    too_old_policy: Option<TooOldPolicy>,
    allow_empty_location: Option<bool>,
    max_network_len: Option<usize>,
    max_station_len: Option<usize>,
    max_channel_len: Option<usize>,
    max_location_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BusSection {
    channel_capacity: Option<usize>,
    request_queue_depth: Option<usize>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SecuritySection {
    #[serde(default)]
    allow: Vec<String>,
    #[serde(default)]
    deny: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceSection {
    encoding: Option<Encoding>,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NodeConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| NodeConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, NodeConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| NodeConfigError::Parse(e.to_string()))?;

        let defaults = Self::default();

        let mut cache = defaults.cache;
        let section = file.cache;
        if let Some(capacity) = section.max_packets_per_channel {
            cache = cache.with_max_packets_per_channel(capacity);
        }
        if let Some(max) = section.max_channels {
            cache = cache.with_max_channels(max);
        }
        if let Some(policy) = section.too_old_policy {
            cache = cache.with_too_old_policy(policy);
        }
        let rules = &mut cache.channel_rules;
        if let Some(allow) = section.allow_empty_location {
            rules.allow_empty_location = allow;
        }
        if let Some(len) = section.max_network_len {
            rules.max_network_len = len;
        }
        if let Some(len) = section.max_station_len {
            rules.max_station_len = len;
        }
        if let Some(len) = section.max_channel_len {
            rules.max_channel_len = len;
        }
        if let Some(len) = section.max_location_len {
            rules.max_location_len = len;
        }

        let bus = BusConfig {
            channel_capacity: file
                .bus
                .channel_capacity
                .unwrap_or(defaults.bus.channel_capacity),
            request_queue_depth: file
                .bus
                .request_queue_depth
                .unwrap_or(defaults.bus.request_queue_depth),
            request_timeout: file
                .bus
                .request_timeout_ms
                .map_or(defaults.bus.request_timeout, Duration::from_millis),
        };

        let config = Self {
            cache,
            bus,
            security: SecurityConfig {
                allow: file.security.allow,
                deny: file.security.deny,
            },
            encoding: file.service.encoding.unwrap_or(defaults.encoding),
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply `UMPS_MAX_CHANNELS` / `UMPS_MAX_PACKETS` overrides.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, NodeConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(MAX_CHANNELS_ENV) {
            let max = parse_count(MAX_CHANNELS_ENV, &value)?;
            self.cache = self.cache.with_max_channels(max);
        }
        if let Some(value) = lookup(MAX_PACKETS_ENV) {
            let capacity = parse_count(MAX_PACKETS_ENV, &value)?;
            self.cache = self.cache.with_max_packets_per_channel(capacity);
        }
        self.validate()?;
        Ok(self)
    }

    /// Load from `UMPS_CACHE_CONFIG` if set, otherwise start from defaults,
    /// then apply environment overrides.
    pub fn from_env() -> Result<Self, NodeConfigError> {
        let base = match env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                info!(%path, "Loading configuration file");
                Self::load(&path)?
            }
            Err(_) => {
                info!("No configuration file set, using defaults");
                Self::default()
            }
        };
        base.apply_overrides(|key| env::var(key).ok())
    }

    pub fn validate(&self) -> Result<(), NodeConfigError> {
        self.cache.validate()?;
        if !self.security.allow.is_empty() && !self.security.deny.is_empty() {
            return Err(NodeConfigError::ConflictingPeerLists);
        }
        if self.bus.request_timeout.is_zero() {
            warn!("Request timeout is zero; every client request will time out");
        }
        Ok(())
    }
}

fn parse_count(variable: &str, value: &str) -> Result<usize, NodeConfigError> {
    value.trim().parse().map_err(|_| NodeConfigError::Env {
        variable: variable.to_string(),
        value: value.to_string(),
    })
}
