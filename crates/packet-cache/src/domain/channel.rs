//! Channel keys and the rules that govern their codes
//!
//! A channel key names one data stream by its network, station, channel and
//! location codes. Its dotted form `NET.STA.CHA.LOC` is what the text
//! protocol and the logs show, so no code may itself contain a dot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Separator used by the dotted channel name
pub const NAME_SEPARATOR: char = '.';

/// Identifier of one sensor data stream
///
/// Immutable once formed. Ordering is lexicographic over
/// (network, station, channel, location).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    network: String,
    station: String,
    channel: String,
    location_code: String,
}

impl ChannelKey {
    /// Build a key, checking it against the default rules
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        channel: impl Into<String>,
        location_code: impl Into<String>,
    ) -> Result<Self, ChannelError> {
        Self::with_rules(
            network,
            station,
            channel,
            location_code,
            &ChannelKeyRules::default(),
        )
    }

    /// Build a key, checking it against the given rules
    pub fn with_rules(
        network: impl Into<String>,
        station: impl Into<String>,
        channel: impl Into<String>,
        location_code: impl Into<String>,
        rules: &ChannelKeyRules,
    ) -> Result<Self, ChannelError> {
        let key = Self {
            network: network.into(),
            station: station.into(),
            channel: channel.into(),
            location_code: location_code.into(),
        };
        rules.validate(&key)?;
        Ok(key)
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn location_code(&self) -> &str {
        &self.location_code
    }

    /// Parse a dotted name and check it against the given rules
    pub fn parse_with_rules(name: &str, rules: &ChannelKeyRules) -> Result<Self, ChannelError> {
        let key = Self::split_dotted(name)
            .ok_or_else(|| ChannelError::MalformedName(name.to_string()))?;
        rules.validate(&key)?;
        Ok(key)
    }

    /// Split a dotted name into four codes without checking them.
    ///
    /// Lookups use this: a key that breaks the rules is never cached, so it
    /// simply finds nothing.
    pub(crate) fn split_dotted(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split(NAME_SEPARATOR).collect();
        let [network, station, channel, location] = parts.as_slice() else {
            return None;
        };
        Some(Self {
            network: (*network).to_string(),
            station: (*station).to_string(),
            channel: (*channel).to_string(),
            location_code: (*location).to_string(),
        })
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.channel, self.location_code
        )
    }
}

impl FromStr for ChannelKey {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_rules(s, &ChannelKeyRules::default())
    }
}

/// Format rules applied to every channel key entering the cache
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelKeyRules {
    /// Maximum characters in the network code
    pub max_network_len: usize,
    /// Maximum characters in the station code
    pub max_station_len: usize,
    /// Maximum characters in the channel code
    pub max_channel_len: usize,
    /// Maximum characters in the location code
    pub max_location_len: usize,
    /// Accept keys whose location code is empty
    pub allow_empty_location: bool,
}

impl Default for ChannelKeyRules {
    fn default() -> Self {
        Self {
            max_network_len: 8,
            max_station_len: 16,
            max_channel_len: 8,
            max_location_len: 8,
            allow_empty_location: false,
        }
    }
}

impl ChannelKeyRules {
    /// Check every code of a key
    pub fn validate(&self, key: &ChannelKey) -> Result<(), ChannelError> {
        check_code("network", &key.network, self.max_network_len, false)?;
        check_code("station", &key.station, self.max_station_len, false)?;
        check_code("channel", &key.channel, self.max_channel_len, false)?;
        check_code(
            "location",
            &key.location_code,
            self.max_location_len,
            self.allow_empty_location,
        )
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.max_network_len > 0
            && self.max_station_len > 0
            && self.max_channel_len > 0
            && (self.max_location_len > 0 || self.allow_empty_location)
    }
}

fn check_code(
    field: &'static str,
    code: &str,
    max: usize,
    allow_empty: bool,
) -> Result<(), ChannelError> {
    if code.is_empty() {
        return if allow_empty {
            Ok(())
        } else {
            Err(ChannelError::Empty { field })
        };
    }

    let len = code.chars().count();
    if len > max {
        return Err(ChannelError::TooLong { field, len, max });
    }

    if let Some(found) = code
        .chars()
        .find(|c| *c == NAME_SEPARATOR || c.is_whitespace() || c.is_control())
    {
        return Err(ChannelError::IllegalCharacter { field, found });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let key = ChannelKey::new("UU", "FORK", "HHZ", "01").unwrap();
        assert_eq!(key.to_string(), "UU.FORK.HHZ.01");

        let parsed: ChannelKey = "UU.FORK.HHZ.01".parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_parse_wrong_part_count() {
        assert!(matches!(
            "UU.FORK.HHZ".parse::<ChannelKey>(),
            Err(ChannelError::MalformedName(_))
        ));
        assert!(matches!(
            "UU.FORK.HHZ.01.X".parse::<ChannelKey>(),
            Err(ChannelError::MalformedName(_))
        ));
    }

    #[test]
    fn test_empty_codes_rejected() {
        assert_eq!(
            ChannelKey::new("", "FORK", "HHZ", "01"),
            Err(ChannelError::Empty { field: "network" })
        );
        assert_eq!(
            ChannelKey::new("UU", "FORK", "HHZ", ""),
            Err(ChannelError::Empty { field: "location" })
        );
    }

    #[test]
    fn test_empty_location_allowed_by_rules() {
        let rules = ChannelKeyRules {
            allow_empty_location: true,
            ..ChannelKeyRules::default()
        };
        let key = ChannelKey::parse_with_rules("UU.FORK.HHZ.", &rules).unwrap();
        assert_eq!(key.location_code(), "");
    }

    #[test]
    fn test_illegal_characters() {
        assert_eq!(
            ChannelKey::new("U U", "FORK", "HHZ", "01"),
            Err(ChannelError::IllegalCharacter {
                field: "network",
                found: ' '
            })
        );
        assert!(matches!(
            ChannelKey::new("UU", "FO\u{7}RK", "HHZ", "01"),
            Err(ChannelError::IllegalCharacter { field: "station", .. })
        ));
    }

    #[test]
    fn test_too_long() {
        let rules = ChannelKeyRules {
            max_channel_len: 3,
            ..ChannelKeyRules::default()
        };
        assert_eq!(
            ChannelKey::with_rules("UU", "FORK", "HHZZ", "01", &rules),
            Err(ChannelError::TooLong {
                field: "channel",
                len: 4,
                max: 3
            })
        );
    }

    #[test]
    fn test_ordering() {
        let a = ChannelKey::new("UU", "FORK", "HHE", "01").unwrap();
        let b = ChannelKey::new("UU", "FORK", "HHN", "01").unwrap();
        let c = ChannelKey::new("WY", "AAA", "HHE", "01").unwrap();
        assert!(a < b);
        assert!(b < c);
    }
}
