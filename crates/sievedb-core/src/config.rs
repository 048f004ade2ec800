//! Module: config
//! Runtime tuning knobs for a database handle. Everything defaults to
//! sane values; a config is optional at open time.

use crate::DEFAULT_EPHEMERAL_TTL_SECS;
use serde::Deserialize;

///
/// ReadConsistency
/// How hydration treats ids whose record hash has gone missing, which
/// can happen when an index points at a row deleted mid-read.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub enum ReadConsistency {
    /// Missing rows are skipped.
    #[default]
    MissingOk,
    /// Missing rows are reported as corruption.
    Strict,
}

///
/// DbConfig
///

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Seconds a composed result set stays alive before the store
    /// reclaims it.
    pub ephemeral_ttl_secs: u64,

    pub read_consistency: ReadConsistency,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            ephemeral_ttl_secs: DEFAULT_EPHEMERAL_TTL_SECS,
            read_consistency: ReadConsistency::default(),
        }
    }
}

impl DbConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_ephemeral_ttl_secs(mut self, secs: u64) -> Self {
        self.ephemeral_ttl_secs = secs;
        self
    }

    #[must_use]
    pub const fn with_read_consistency(mut self, consistency: ReadConsistency) -> Self {
        self.read_consistency = consistency;
        self
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.ephemeral_ttl_secs, 60);
        assert_eq!(config.read_consistency, ReadConsistency::MissingOk);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: DbConfig =
            serde_json::from_str(r#"{ "ephemeral_ttl_secs": 5 }"#).expect("parse");
        assert_eq!(config.ephemeral_ttl_secs, 5);
        assert_eq!(config.read_consistency, ReadConsistency::MissingOk);

        let config: DbConfig =
            serde_json::from_str(r#"{ "read_consistency": "Strict" }"#).expect("parse");
        assert_eq!(config.read_consistency, ReadConsistency::Strict);
    }

    #[test]
    fn test_builder_style() {
        let config = DbConfig::new()
            .with_ephemeral_ttl_secs(120)
            .with_read_consistency(ReadConsistency::Strict);
        assert_eq!(config.ephemeral_ttl_secs, 120);
        assert_eq!(config.read_consistency, ReadConsistency::Strict);
    }
}
