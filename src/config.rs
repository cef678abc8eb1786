//! Table and protocol parameters shared by every hand at a table.

use crate::hand::{Chips, TableStakes};
use crate::session::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed protocol config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid protocol config: {0}")]
    Invalid(&'static str),
}

/// Relative deadlines, in seconds, applied when a sub-protocol is started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub reencryption_secs: u64,
    pub scalar_mul_secs: u64,
    pub action_secs: u64,
    pub showdown_grace_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            reencryption_secs: 30,
            scalar_mul_secs: 30,
            action_secs: 60,
            showdown_grace_secs: 30,
        }
    }
}

impl Timeouts {
    pub fn reencryption_deadline(&self, now: Timestamp) -> Timestamp {
        now.saturating_add(self.reencryption_secs)
    }

    /// The nested scalar multiplication of a dealing ends after its re-encryption window.
    pub fn dealing_scalar_mul_deadline(&self, now: Timestamp) -> Timestamp {
        self.reencryption_deadline(now).saturating_add(self.scalar_mul_secs)
    }

    pub fn scalar_mul_deadline(&self, now: Timestamp) -> Timestamp {
        now.saturating_add(self.scalar_mul_secs)
    }

    pub fn action_deadline(&self, now: Timestamp) -> Timestamp {
        now.saturating_add(self.action_secs)
    }

    pub fn showdown_deadline(&self, now: Timestamp) -> Timestamp {
        now.saturating_add(self.showdown_grace_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub stakes: TableStakes,
    pub timeouts: Timeouts,
    pub starting_chips: Chips,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            stakes: TableStakes::default(),
            timeouts: Timeouts::default(),
            starting_chips: 25_000,
        }
    }
}

impl ProtocolConfig {
    /// Parse a JSON config; missing fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stakes.small_blind == 0 || self.stakes.big_blind < self.stakes.small_blind {
            return Err(ConfigError::Invalid("blinds must satisfy 0 < small_blind <= big_blind"));
        }
        if self.timeouts.reencryption_secs == 0
            || self.timeouts.scalar_mul_secs == 0
            || self.timeouts.action_secs == 0
        {
            return Err(ConfigError::Invalid("sub-protocol timeouts must be positive"));
        }
        if self.starting_chips == 0 {
            return Err(ConfigError::Invalid("starting_chips must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;

    #[test]
    fn defaults_match_the_standard_table() {
        let config = ProtocolConfig::default();
        assert_eq!(config.stakes.small_blind, 125);
        assert_eq!(config.stakes.big_blind, 250);
        assert_eq!(config.starting_chips, 25_000);
        assert!(config.validate().is_ok());
        assert_round_trip_eq(&config);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            ProtocolConfig::from_json_str(r#"{"stakes":{"small_blind":5,"big_blind":10},"timeouts":{"action_secs":15}}"#)
                .unwrap();
        assert_eq!(config.stakes.big_blind, 10);
        assert_eq!(config.timeouts.action_secs, 15);
        assert_eq!(config.timeouts.scalar_mul_secs, 30);
        assert_eq!(config.starting_chips, 25_000);
    }

    #[test]
    fn rejects_inverted_blinds_and_bad_json() {
        assert!(matches!(
            ProtocolConfig::from_json_str(r#"{"stakes":{"small_blind":20,"big_blind":10}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ProtocolConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn dealing_deadlines_are_ordered() {
        let timeouts = Timeouts::default();
        assert!(timeouts.reencryption_deadline(100) < timeouts.dealing_scalar_mul_deadline(100));
    }
}
