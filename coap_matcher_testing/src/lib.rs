//! Utilities for exercising [`coap_matcher`] in integration tests.
//!
//! The [`Recorder`] stands in for both the transport and the application so
//! tests can drive an [`Endpoint`](coap_matcher::Endpoint) and assert on
//! everything it wrote and delivered.
//!
//! ```rust
//! use coap_matcher::{Endpoint, MatcherConfig};
//! use coap_matcher_testing::{Recorder, con_get};
//!
//! let recorder = Recorder::new();
//! let endpoint = Endpoint::new(MatcherConfig::default(), recorder.outbox(), recorder.deliverer());
//! endpoint.receive(con_get(7, &[0x01])).expect("request is keyable");
//! assert_eq!(recorder.delivered_requests().len(), 1);
//! ```

pub mod logging;
pub mod messages;
pub mod metrics;
pub mod recorder;

pub use logging::{LoggerHandle, logger};
pub use messages::{ack_response, con_get, con_response, empty, other_peer, peer, token};
pub use metrics::{Counters, debugging_recorder};
pub use recorder::{Recorder, Sent};
