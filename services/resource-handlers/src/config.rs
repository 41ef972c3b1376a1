//! Handler configuration.
//!
//! Loaded from `SSOA_*` environment variables with defaults, then validated.

use ssoa_reconcile::{
    BackoffBounds, BackoffPolicy, RetryBudget, RetryPolicy, SeededJitter, StabilizationPoller,
    DEFAULT_RETRY_BUDGET, DEFAULT_STABILIZATION_DELAY_SECS,
};

use crate::telemetry::LogFormat;
use crate::HandlerError;

const STABILIZATION_DELAY_RANGE: std::ops::RangeInclusive<u32> = 1..=5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Retryable failures tolerated per stage.
    pub retry_budget: u32,
    /// Delay between stabilization polls, in seconds.
    pub stabilization_delay_secs: u32,
    /// Pins backoff jitter; unset uses the thread RNG.
    pub jitter_seed: Option<u64>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            stabilization_delay_secs: DEFAULT_STABILIZATION_DELAY_SECS,
            jitter_seed: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self, HandlerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HandlerError> {
        let defaults = Self::default();

        let retry_budget = match lookup("SSOA_RETRY_BUDGET") {
            Some(v) => parse_number("SSOA_RETRY_BUDGET", &v)?,
            None => defaults.retry_budget,
        };

        let stabilization_delay_secs = match lookup("SSOA_STABILIZATION_DELAY_SECS") {
            Some(v) => parse_number("SSOA_STABILIZATION_DELAY_SECS", &v)?,
            None => defaults.stabilization_delay_secs,
        };

        let jitter_seed = lookup("SSOA_JITTER_SEED")
            .map(|v| parse_number("SSOA_JITTER_SEED", &v))
            .transpose()?;

        let log_level = lookup("SSOA_LOG_LEVEL").unwrap_or(defaults.log_level);

        let log_format = match lookup("SSOA_LOG_FORMAT") {
            Some(v) => v.parse().map_err(HandlerError::Config)?,
            None => defaults.log_format,
        };

        let config = Self {
            retry_budget,
            stabilization_delay_secs,
            jitter_seed,
            log_level,
            log_format,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HandlerError> {
        if self.retry_budget == 0 {
            return Err(HandlerError::Config(
                "SSOA_RETRY_BUDGET must be at least 1".to_string(),
            ));
        }
        if !STABILIZATION_DELAY_RANGE.contains(&self.stabilization_delay_secs) {
            return Err(HandlerError::Config(format!(
                "SSOA_STABILIZATION_DELAY_SECS must be between {} and {}, got {}",
                STABILIZATION_DELAY_RANGE.start(),
                STABILIZATION_DELAY_RANGE.end(),
                self.stabilization_delay_secs
            )));
        }
        Ok(())
    }

    /// A fresh retry policy for one workflow run.
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = match self.jitter_seed {
            Some(seed) => BackoffPolicy::new(BackoffBounds::default(), SeededJitter::new(seed)),
            None => BackoffPolicy::default(),
        };
        RetryPolicy::new(RetryBudget::new(self.retry_budget), backoff)
    }

    pub fn poller(&self) -> StabilizationPoller {
        StabilizationPoller::new(self.stabilization_delay_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, HandlerError> {
    value
        .trim()
        .parse()
        .map_err(|_| HandlerError::Config(format!("{key} must be a non-negative integer, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn from(vars: &[(&str, &str)]) -> Result<HandlerConfig, HandlerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HandlerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from(&[]).unwrap();
        assert_eq!(config, HandlerConfig::default());
        assert_eq!(config.retry_policy().budget.limit(), 5);
        assert_eq!(config.poller().delay_seconds(), 5);
    }

    #[test]
    fn test_overrides() {
        let config = from(&[
            ("SSOA_RETRY_BUDGET", "3"),
            ("SSOA_STABILIZATION_DELAY_SECS", "1"),
            ("SSOA_JITTER_SEED", "42"),
            ("SSOA_LOG_LEVEL", "debug"),
            ("SSOA_LOG_FORMAT", "pretty"),
        ])
        .unwrap();
        assert_eq!(config.retry_budget, 3);
        assert_eq!(config.stabilization_delay_secs, 1);
        assert_eq!(config.jitter_seed, Some(42));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[rstest]
    #[case("SSOA_RETRY_BUDGET", "0")]
    #[case("SSOA_RETRY_BUDGET", "-1")]
    #[case("SSOA_STABILIZATION_DELAY_SECS", "0")]
    #[case("SSOA_STABILIZATION_DELAY_SECS", "6")]
    #[case("SSOA_LOG_FORMAT", "xml")]
    fn test_rejects_invalid(#[case] key: &str, #[case] value: &str) {
        assert!(matches!(from(&[(key, value)]), Err(HandlerError::Config(_))));
    }
}
