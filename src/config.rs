//! Matcher configuration.
//!
//! [`MatcherConfig`] selects the deduplication strategy and the timings that
//! drive it. It deserialises from any serde format with every field optional,
//! and can be assembled in code through [`MatcherConfigBuilder`].

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// RFC 7252 `EXCHANGE_LIFETIME` in milliseconds.
pub const DEFAULT_EXCHANGE_LIFETIME_MS: u64 = 247_000;
/// Default interval between mark-and-sweep passes in milliseconds.
pub const DEFAULT_MARK_AND_SWEEP_INTERVAL_MS: u64 = 10_000;
/// Default crop-rotation period in milliseconds.
pub const DEFAULT_CROP_ROTATION_PERIOD_MS: u64 = 2_000;

/// Strategy used to recognise retransmitted inbound messages.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeduplicatorKind {
    /// Keep every exchange for its lifetime; sweep expired ones periodically.
    #[default]
    MarkAndSweep,
    /// Rotate between three generations of records each period.
    CropRotation,
    /// Never report duplicates.
    Noop,
}

/// Settings for a [`Matcher`](crate::matcher::Matcher).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use coap_matcher::config::{DeduplicatorKind, MatcherConfig};
///
/// let config = MatcherConfig::builder()
///     .deduplicator(DeduplicatorKind::CropRotation)
///     .crop_rotation_period(Duration::from_secs(1))
///     .use_random_id_start(false)
///     .build()
///     .expect("valid configuration");
/// assert_eq!(config.crop_rotation_period(), Duration::from_secs(1));
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MatcherConfig {
    use_random_id_start: bool,
    deduplicator: DeduplicatorKind,
    exchange_lifetime_ms: u64,
    mark_and_sweep_interval_ms: u64,
    crop_rotation_period_ms: u64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            use_random_id_start: true,
            deduplicator: DeduplicatorKind::default(),
            exchange_lifetime_ms: DEFAULT_EXCHANGE_LIFETIME_MS,
            mark_and_sweep_interval_ms: DEFAULT_MARK_AND_SWEEP_INTERVAL_MS,
            crop_rotation_period_ms: DEFAULT_CROP_ROTATION_PERIOD_MS,
        }
    }
}

impl MatcherConfig {
    /// Start building a configuration from the defaults.
    #[must_use]
    pub fn builder() -> MatcherConfigBuilder { MatcherConfigBuilder::default() }

    /// Whether the first message id is drawn at random.
    #[must_use]
    pub fn use_random_id_start(&self) -> bool { self.use_random_id_start }

    #[must_use]
    pub fn deduplicator(&self) -> DeduplicatorKind { self.deduplicator }

    /// How long an exchange is remembered for duplicate detection.
    #[must_use]
    pub fn exchange_lifetime(&self) -> Duration { Duration::from_millis(self.exchange_lifetime_ms) }

    #[must_use]
    pub fn mark_and_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.mark_and_sweep_interval_ms)
    }

    #[must_use]
    pub fn crop_rotation_period(&self) -> Duration {
        Duration::from_millis(self.crop_rotation_period_ms)
    }

    /// Check the settings that drive periodic work.
    ///
    /// Deserialised configurations bypass the builder, so callers loading
    /// one should validate it before use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroDuration`] for a zero lifetime, interval or
    /// period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("exchange_lifetime", self.exchange_lifetime_ms),
            ("mark_and_sweep_interval", self.mark_and_sweep_interval_ms),
            ("crop_rotation_period", self.crop_rotation_period_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 { u64::try_from(duration.as_millis()).unwrap_or(u64::MAX) }

/// Builder for [`MatcherConfig`].
#[derive(Clone, Debug, Default)]
pub struct MatcherConfigBuilder {
    config: MatcherConfig,
}

impl MatcherConfigBuilder {
    /// Draw the first message id at random instead of starting from zero.
    #[must_use]
    pub fn use_random_id_start(mut self, enabled: bool) -> Self {
        self.config.use_random_id_start = enabled;
        self
    }

    /// Select the deduplication strategy.
    #[must_use]
    pub fn deduplicator(mut self, kind: DeduplicatorKind) -> Self {
        self.config.deduplicator = kind;
        self
    }

    /// Set how long exchanges are remembered for duplicate detection.
    #[must_use]
    pub fn exchange_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.exchange_lifetime_ms = millis(lifetime);
        self
    }

    /// Set the interval between mark-and-sweep passes.
    #[must_use]
    pub fn mark_and_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.mark_and_sweep_interval_ms = millis(interval);
        self
    }

    /// Set the crop-rotation period.
    #[must_use]
    pub fn crop_rotation_period(mut self, period: Duration) -> Self {
        self.config.crop_rotation_period_ms = millis(period);
        self
    }

    /// Validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroDuration`] if any duration rounds down to
    /// zero milliseconds.
    pub fn build(self) -> Result<MatcherConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
