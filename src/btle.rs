//! btleplug-backed implementation of the [`crate::transport`] traits.
//!
//! This is the only module that touches the OS Bluetooth stack. All the
//! platform workarounds (macOS power-on wait, Linux GATT settle delay, hard
//! connect timeouts) live here so the session layer stays portable.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use btleplug::api::{Central, CharPropFlags, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::protocol::UNNAMED_DEVICE;
use crate::transport::{CharacteristicInfo, Connection, Transport};
use crate::types::DiscoveredPeripheral;

/// BLE transport over the first system Bluetooth adapter.
///
/// The adapter is acquired lazily on first use and cached, so the peripheral
/// set discovered by a scan is still known to the adapter when a later
/// connect names one of its addresses.
pub struct BtleTransport {
    adapter: Mutex<Option<Adapter>>,
}

impl BtleTransport {
    pub fn new() -> Self {
        Self {
            adapter: Mutex::new(None),
        }
    }

    /// Return the cached adapter, acquiring it on first call.
    async fn adapter(&self) -> Result<Adapter> {
        let mut slot = self.adapter.lock().await;
        if let Some(adapter) = slot.as_ref() {
            return Ok(adapter.clone());
        }

        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;

        // ── macOS: wait for the CoreBluetooth manager to reach poweredOn ─────
        // When the binary is freshly launched (or Bluetooth was recently
        // toggled), CBCentralManager starts in an "unknown" state.
        // Scanning before it is ready is a silent no-op, so poll
        // adapter_state() until it reports PoweredOn.
        #[cfg(target_os = "macos")]
        {
            use btleplug::api::CentralState;
            use log::warn;

            let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
            loop {
                match adapter.adapter_state().await {
                    Ok(CentralState::PoweredOn) => {
                        info!("macOS: adapter is PoweredOn");
                        break;
                    }
                    Ok(state) => {
                        if tokio::time::Instant::now() >= deadline {
                            warn!("macOS: adapter still in state {state:?} after 3 s — proceeding anyway");
                            break;
                        }
                        debug!("macOS: adapter state = {state:?}, waiting…");
                    }
                    Err(e) => {
                        warn!("macOS: adapter_state() error: {e}");
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            // Extra safety margin — let the delegate settle.
            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        *slot = Some(adapter.clone());
        Ok(adapter)
    }
}

impl Default for BtleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredPeripheral>> {
        let adapter = self.adapter().await?;

        info!("discover: scanning for {} s …", timeout.as_secs());
        adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(timeout).await;
        adapter.stop_scan().await.ok();

        let mut found = vec![];
        for p in adapter.peripherals().await? {
            if let Ok(Some(props)) = p.properties().await {
                let name = props
                    .local_name
                    .unwrap_or_else(|| UNNAMED_DEVICE.to_owned());
                let address = p.id().to_string();
                debug!("discover: found {name}  id={address}");
                found.push(DiscoveredPeripheral { address, name });
            }
        }
        info!("discover: {} device(s) found", found.len());
        Ok(found)
    }

    async fn connect(&self, address: &str, timeout: Duration) -> Result<Box<dyn Connection>> {
        let adapter = self.adapter().await?;
        let peripheral = adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|p| p.id().to_string() == address)
            .ok_or_else(|| anyhow!("Peripheral {address} is not known to the adapter (scan first)"))?;

        // Hard timeout: BlueZ's org.bluez.Device1.Connect can block forever
        // when the peer is out of range or the stack is in a bad state.
        tokio::time::timeout(timeout, peripheral.connect())
            .await
            .map_err(|_| anyhow!("BLE connect() timed out after {} s", timeout.as_secs()))??;

        // On Linux (bluez-async / D-Bus) the stack signals connection
        // completion before the remote GATT cache is populated; discovering
        // services too quickly returns an empty table. A short pause lets
        // BlueZ finish GATT discovery first.
        #[cfg(target_os = "linux")]
        tokio::time::sleep(Duration::from_millis(600)).await;

        tokio::time::timeout(Duration::from_secs(15), peripheral.discover_services())
            .await
            .map_err(|_| anyhow!("discover_services() timed out after 15 s"))??;
        info!("connected and services discovered: {address}");

        Ok(Box::new(BtleConnection {
            peripheral,
            forward: None,
        }))
    }
}

/// An open btleplug link plus the notification forwarding task, if any.
struct BtleConnection {
    peripheral: Peripheral,
    forward: Option<JoinHandle<()>>,
}

impl BtleConnection {
    fn find_characteristic(&self, uuid: &str) -> Result<btleplug::api::Characteristic> {
        let target: Uuid = uuid
            .parse()
            .map_err(|e| anyhow!("Invalid characteristic UUID {uuid}: {e}"))?;
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == target)
            .ok_or_else(|| anyhow!("Characteristic {uuid} not found"))
    }
}

fn property_names(props: CharPropFlags) -> Vec<String> {
    const NAMES: [(CharPropFlags, &str); 6] = [
        (CharPropFlags::BROADCAST, "broadcast"),
        (CharPropFlags::READ, "read"),
        (CharPropFlags::WRITE_WITHOUT_RESPONSE, "write-without-response"),
        (CharPropFlags::WRITE, "write"),
        (CharPropFlags::NOTIFY, "notify"),
        (CharPropFlags::INDICATE, "indicate"),
    ];
    NAMES
        .iter()
        .filter(|(flag, _)| props.contains(*flag))
        .map(|(_, name)| (*name).to_owned())
        .collect()
}

#[async_trait]
impl Connection for BtleConnection {
    async fn characteristics(&self) -> Result<Vec<CharacteristicInfo>> {
        Ok(self
            .peripheral
            .characteristics()
            .into_iter()
            .map(|c| CharacteristicInfo {
                uuid: c.uuid.to_string(),
                properties: property_names(c.properties),
            })
            .collect())
    }

    async fn subscribe(&mut self, uuid: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        let characteristic = self.find_characteristic(uuid)?;
        self.peripheral.subscribe(&characteristic).await?;

        // The btleplug notification stream carries every subscribed
        // characteristic; filter down to the requested one and forward the
        // payloads over a plain channel.
        let target = characteristic.uuid;
        let mut notifications = self.peripheral.notifications().await?;
        let (tx, rx) = mpsc::channel::<Vec<u8>>(256);

        self.forward = Some(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != target {
                    continue;
                }
                if tx.send(notification.value).await.is_err() {
                    break; // receiver dropped — session torn down
                }
            }
            debug!("notification stream for {target} ended");
        }));

        Ok(rx)
    }

    async fn unsubscribe(&mut self, uuid: &str) -> Result<()> {
        if let Some(forward) = self.forward.take() {
            forward.abort();
        }
        let characteristic = self.find_characteristic(uuid)?;
        self.peripheral.unsubscribe(&characteristic).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(forward) = self.forward.take() {
            forward.abort();
        }
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
