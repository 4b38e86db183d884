//! The transport seam between the session core and a concrete BLE stack.
//!
//! [`crate::session::SessionController`] talks to the radio exclusively
//! through these traits, which keeps the lifecycle logic testable against an
//! in-memory transport. The production implementation over btleplug lives in
//! [`crate::btle`].

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::DiscoveredPeripheral;

/// One entry of a peripheral's GATT table, as reported by enumeration.
///
/// UUIDs are carried as strings because the session layer compares them
/// case-insensitively against its configured target; see
/// [`crate::protocol::uuid_matches`].
#[derive(Debug, Clone)]
pub struct CharacteristicInfo {
    /// The characteristic UUID, in whatever case the platform reports.
    pub uuid: String,
    /// Property names such as `"read"` or `"notify"`. Informational only.
    pub properties: Vec<String>,
}

/// Peripheral discovery and connection establishment.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Scan for nearby peripherals for the full `timeout` and return
    /// everything seen. The returned set fully replaces any earlier one.
    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredPeripheral>>;

    /// Connect to a peripheral previously returned by [`Transport::discover`].
    /// The call must not outlive `timeout`.
    async fn connect(&self, address: &str, timeout: Duration) -> Result<Box<dyn Connection>>;
}

/// An established link to one peripheral.
///
/// Dropping a `Connection` releases whatever the platform releases on drop;
/// callers that care should still call [`Connection::disconnect`].
#[async_trait]
pub trait Connection: Send {
    /// Enumerate the peripheral's GATT characteristics.
    ///
    /// May fail; the session layer treats a failure the same as an empty
    /// table, so implementations need not retry.
    async fn characteristics(&self) -> Result<Vec<CharacteristicInfo>>;

    /// Enable notifications on `uuid` and return the chunk channel.
    ///
    /// Each received notification payload arrives as one `Vec<u8>` on the
    /// receiver, in delivery order. The channel closes when the subscription
    /// ends or the link drops.
    async fn subscribe(&mut self, uuid: &str) -> Result<mpsc::Receiver<Vec<u8>>>;

    /// Disable notifications on `uuid`. Failures are ignored by callers.
    async fn unsubscribe(&mut self, uuid: &str) -> Result<()>;

    /// Tear down the link. Failures are ignored by callers.
    async fn disconnect(&mut self) -> Result<()>;
}
