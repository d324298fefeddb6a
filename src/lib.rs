//! # podlink - wearable pod telemetry decoder
//!
//! A sensor pod streams telemetry over a short-range link in small fragments
//! (~20 characters each). podlink turns that stream into a per-patient time
//! series:
//!
//! - **Reassembly**: fragments are stitched back into messages, whatever the
//!   split, with overflow and retransmission guards.
//! - **Decoding**: fixed-width ASCII packets (Live `L`, Total `T`, Status `S`)
//!   with CRC-8 checksums, and JSON readings, both into typed values.
//! - **Merging**: Live and JSON samples append to a patient's history, Total
//!   counters are folded into the latest sample.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use podlink::config::Config;
//! use podlink::telemetry::{TelemetrySession, TransportCapability};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let mut session = TelemetrySession::new(&config, TransportCapability::Available);
//!     session.connect()?;
//!
//!     for fragment in ["{\"patientId\":\"p2\",", "\"heart\":{\"bpm\":77}}"] {
//!         for event in session.on_fragment(fragment, Utc::now())? {
//!             println!("{:?}", event);
//!         }
//!     }
//!     println!("{:?}", session.patient("p2"));
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`telemetry`] - framer, packet and JSON codecs, sessions
//! - [`patient`] - normalized readings, merge engine, patient registry
//! - [`config`] - TOML configuration
//! - [`metrics`] - per-session decoder counters
//! - [`logutil`] - single-line escaping of raw wire text for logs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ SessionHandle   │ ← any number of fragment producers
//! └─────────────────┘
//!          │ mpsc
//! ┌─────────────────┐
//! │ TelemetrySession│ ← framer + decoder, one task per connection
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ PatientRegistry │ ← merge engine, bounded history
//! └─────────────────┘
//! ```

pub mod config;
pub mod logutil;
pub mod metrics;
pub mod patient;
pub mod telemetry;
