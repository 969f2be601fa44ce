//! Configuration for durations, expiry tiers, and periodic cadences.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the transient-effect services.
///
/// The defaults are the values the services were designed around; hosts
/// embed this struct in their own configuration (it is serde-derived) and
/// override what they need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TidepoolConfig {
    /// Overlay duration used when a caller passes `Duration::ZERO`.
    pub default_overlay_duration: Duration,

    /// Short expiry tier for TTL-eligible proxies: a proxy flagged as
    /// expirable is destroyed once it is at least this old.
    pub short_ttl: Duration,

    /// Long expiry tier: every proxy, eligible or not, is destroyed once it
    /// is at least this old. Safety net against leaked long-lived proxies.
    pub long_ttl: Duration,

    /// Cadence of the periodic sweep task. An expired overlay or proxy can
    /// outlive its deadline by up to one interval; deadlines are never
    /// enforced preemptively.
    pub sweep_interval: Duration,

    /// Cadence of each per-actor region-migration check.
    pub monitor_interval: Duration,
}

impl Default for TidepoolConfig {
    fn default() -> Self {
        Self {
            default_overlay_duration: Duration::from_millis(30_000),
            short_ttl: Duration::from_millis(5_000),
            long_ttl: Duration::from_millis(120_000),
            sweep_interval: Duration::from_millis(1_000),
            monitor_interval: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TidepoolConfig::default();
        assert_eq!(config.default_overlay_duration, Duration::from_secs(30));
        assert_eq!(config.short_ttl, Duration::from_secs(5));
        assert_eq!(config.long_ttl, Duration::from_secs(120));
        assert!(config.sweep_interval <= config.short_ttl);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = TidepoolConfig::default();
        let text = toml::to_string(&config).expect("serialize");
        let decoded: TidepoolConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(config, decoded);
    }

    #[test]
    fn test_partial_override_from_toml() {
        let text = r#"
            default_overlay_duration = { secs = 30, nanos = 0 }
            short_ttl = { secs = 2, nanos = 0 }
            long_ttl = { secs = 120, nanos = 0 }
            sweep_interval = { secs = 1, nanos = 0 }
            monitor_interval = { secs = 0, nanos = 500000000 }
        "#;
        let decoded: TidepoolConfig = toml::from_str(text).expect("deserialize");
        assert_eq!(decoded.short_ttl, Duration::from_secs(2));
        assert_eq!(decoded.monitor_interval, Duration::from_millis(500));
    }
}
