//! Shared utilities for integration tests.
//!
//! Provides an endpoint fixture wired to a [`Recorder`] and a configuration
//! with deterministic message ids.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::sync::Arc;

use coap_matcher::{DeduplicatorKind, Endpoint, MatcherConfig};
use coap_matcher_testing::Recorder;
use rstest::fixture;

/// Configuration whose message ids start at zero.
#[must_use]
pub fn fixed_ids(deduplicator: DeduplicatorKind) -> MatcherConfig {
    MatcherConfig::builder()
        .use_random_id_start(false)
        .deduplicator(deduplicator)
        .build()
        .expect("valid configuration")
}

/// Endpoint recording everything it sends and delivers.
pub struct Harness {
    pub endpoint: Arc<Endpoint>,
    pub recorder: Arc<Recorder>,
}

impl Harness {
    #[must_use]
    pub fn new(config: MatcherConfig) -> Self {
        let recorder = Recorder::new();
        let endpoint = Endpoint::new(config, recorder.outbox(), recorder.deliverer());
        Self { endpoint, recorder }
    }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn harness() -> Harness { Harness::new(fixed_ids(DeduplicatorKind::MarkAndSweep)) }
