//! # blelog-rs
//!
//! Async Rust core for viewing a BLE peripheral's streaming log output,
//! grouped by the firmware module that produced each line.
//!
//! The peripheral (a smartwatch firmware in the reference deployment) pushes
//! its formatted log text over a single notify characteristic. Notifications
//! are fragmented at the ATT MTU, so this crate's job is to turn that
//! unreliable chunk stream into well-formed, module-tagged lines and to run
//! the connection lifecycle that decides when the stream is valid:
//!
//! ```text
//! Idle → Scanning → Connecting → VerifyingCapability → Streaming → Disconnecting → Idle
//! ```
//!
//! Rendering (device lists, tabs, status bars) is deliberately not part of
//! this crate: a presentation layer calls the intent methods on
//! [`session::SessionController`] and consumes [`types::CoreEvent`]s from the
//! returned channel. The bundled `blelog-rs` binary is one such consumer.
//!
//! ## Quick start
//!
//! ```no_run
//! use blelog_rs::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(BtleTransport::new());
//!     let (controller, mut events) = SessionController::new(transport, SessionConfig::default());
//!
//!     controller.request_scan().await;
//!     let first = controller.discovered().await.into_iter().next();
//!     controller.request_connect(first.as_ref().map(|d| d.address.as_str())).await;
//!
//!     while let Some(event) = events.recv().await {
//!         if let CoreEvent::LineEmitted(line) = event {
//!             println!("[{}] {}", line.module, line.text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error propagation policy
//!
//! Only discovery, connect, capability-missing, and subscribe failures are
//! surfaced (as [`types::CoreEvent::Failure`]). Decode anomalies in the
//! notification stream are replaced inline with U+FFFD and processing
//! continues; unsubscribe/disconnect failures during teardown are swallowed
//! entirely — a disconnect always ends in `Idle`. Nothing retries
//! automatically; a retried action is a fresh user request.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`prelude`] | One-line glob import of the most commonly needed types |
//! | [`session`] | The lifecycle state machine and its intent methods |
//! | [`parse`] | Chunk-to-line reassembly and module classification (pure logic) |
//! | [`transport`] | The transport traits the session core is written against |
//! | [`btle`] | Production transport over btleplug |
//! | [`protocol`] | The fixed GATT identifiers and module-tag sentinels |
//! | [`types`] | Events and data types consumed by a presentation layer |

pub mod btle;
pub mod parse;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Convenience re-exports for downstream crates.
///
/// A single glob import covers the surface needed to scan, connect, and
/// consume module-tagged log lines.
pub mod prelude {
    // ── Controller ────────────────────────────────────────────────────────────
    pub use crate::session::{SessionConfig, SessionController, SessionState};

    // ── Transport ─────────────────────────────────────────────────────────────
    pub use crate::btle::BtleTransport;
    pub use crate::transport::{CharacteristicInfo, Connection, Transport};

    // ── Events and data types ─────────────────────────────────────────────────
    pub use crate::types::{CoreEvent, DiscoveredPeripheral, FailureContext, LogLine};

    // ── Protocol constants ────────────────────────────────────────────────────
    pub use crate::protocol::{AGGREGATE_MODULE, LOG_STREAM_UUID, UNKNOWN_MODULE};
}
