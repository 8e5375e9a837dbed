//! Configuration for the discovery resolver.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Resolver tuning.
///
/// Usually filled in by the bootstrap code from its own property source;
/// it also deserializes from any serde format:
///
/// ```
/// use moonpool_discovery::DiscoveryConfig;
///
/// let config: DiscoveryConfig =
///     serde_json::from_str(r#"{ "timeout_ms": 500, "retry_count": 1 }"#).expect("decode");
/// assert_eq!(config.retry_count, 1);
/// assert_eq!(config.latency_multiplier, 100);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Per-attempt wait before a lookup query is retried.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    /// Retries after the first attempt. Zero sends exactly one query.
    pub retry_count: u32,

    /// Quorum window as a percentage of the observed round-trip time.
    ///
    /// When the first replica-group member answers after `rtt`, the
    /// resolver keeps collecting answers for `rtt * latency_multiplier / 100`
    /// (at least 1ms) before merging them.
    pub latency_multiplier: u32,

    /// Logical domain. Replies tagged with another domain are ignored.
    pub domain_id: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(300),
            retry_count: 3,
            latency_multiplier: 100,
            domain_id: String::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry budget.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the latency multiplier percentage.
    pub fn with_latency_multiplier(mut self, percent: u32) -> Self {
        self.latency_multiplier = percent;
        self
    }

    /// Set the domain id.
    pub fn with_domain_id(mut self, domain_id: impl Into<String>) -> Self {
        self.domain_id = domain_id.into();
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.latency_multiplier == 0 {
            return Err(ConfigError::InvalidLatencyMultiplier(self.latency_multiplier));
        }
        Ok(())
    }

    /// Upper bound on how long a lookup waits before reporting "not found",
    /// excluding quorum windows.
    pub fn max_wait(&self) -> Duration {
        self.timeout.saturating_mul(self.retry_count.saturating_add(1))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
