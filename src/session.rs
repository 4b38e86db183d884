//! Connection lifecycle state machine.
//!
//! [`SessionController`] owns all mutable session state — the discovered
//! peripheral set, the single active session, and its reassembly buffer —
//! behind one async mutex, and drives the transport through intent methods
//! (`request_scan`, `request_connect`, `request_disconnect`). Consumers only
//! ever observe it through the [`CoreEvent`] channel; nothing here is exposed
//! for direct external mutation.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::parse::{classify_module, LineAssembler};
use crate::protocol::{
    uuid_matches, AGGREGATE_MODULE, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_SCAN_TIMEOUT_SECS,
    LOG_STREAM_UUID,
};
use crate::transport::{Connection, Transport};
use crate::types::{CoreEvent, DiscoveredPeripheral, FailureContext, LogLine};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Configuration for [`SessionController`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// BLE scan duration in seconds. Default: `5`.
    pub scan_timeout_secs: u64,
    /// Hard timeout on the transport connect call in seconds. Default: `10`.
    pub connect_timeout_secs: u64,
    /// The notification characteristic this controller requires, compared
    /// case-insensitively during capability verification. Fixed configuration;
    /// defaults to [`LOG_STREAM_UUID`].
    pub log_stream_uuid: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            log_stream_uuid: LOG_STREAM_UUID.to_owned(),
        }
    }
}

// ── State machine ─────────────────────────────────────────────────────────────

/// Lifecycle states of the controller.
///
/// The machine is cyclic: every failure or disconnect leads back to `Idle`
/// and the same controller is reused for the next session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No scan or session in progress.
    Idle,
    /// A discovery scan is running.
    Scanning,
    /// A transport connect is in flight.
    Connecting,
    /// Connected; checking the GATT table for the log stream characteristic.
    VerifyingCapability,
    /// Subscribed; notification chunks are flowing.
    Streaming,
    /// Best-effort teardown in progress.
    Disconnecting,
}

/// The single active connection context.
///
/// Created only once a subscription is live; destroyed on any teardown. The
/// reassembly buffer lives and dies with it, so a later session can never
/// see a predecessor's partial line.
struct ActiveSession {
    /// Generation counter distinguishing this session from any later one, so
    /// a stale notification pump can never feed a successor's buffer.
    id: u64,
    address: String,
    connection: Box<dyn Connection>,
    assembler: LineAssembler,
    pump: Option<JoinHandle<()>>,
}

struct Inner {
    state: SessionState,
    discovered: Vec<DiscoveredPeripheral>,
    session: Option<ActiveSession>,
    next_id: u64,
}

/// Queue a status event for delivery once the state lock has been released.
fn status(out: &mut Vec<CoreEvent>, text: impl Into<String>) {
    out.push(CoreEvent::StatusChanged(text.into()));
}

/// Queue a failure event for delivery once the state lock has been released.
fn failure(out: &mut Vec<CoreEvent>, context: FailureContext, message: impl Into<String>) {
    out.push(CoreEvent::Failure {
        context,
        message: message.into(),
    });
}

// ── Controller ────────────────────────────────────────────────────────────────

/// Drives scan / connect / stream / disconnect against a [`Transport`] and
/// emits [`CoreEvent`]s for a presentation layer.
///
/// Lifecycle transitions and buffer mutation run under one mutex, and every
/// event is sent only after that mutex has been released, so a consumer that
/// stops draining can stall event delivery but never a scan, connect, or
/// disconnect. Intent methods never return transport errors — every
/// user-visible failure arrives as [`CoreEvent::Failure`].
pub struct SessionController {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    events: mpsc::Sender<CoreEvent>,
    inner: Arc<Mutex<Inner>>,
}

impl SessionController {
    /// Create a controller and the event channel a presentation adapter
    /// consumes. Starts in [`SessionState::Idle`] with no discovered devices.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<CoreEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let controller = Self {
            config,
            transport,
            events: tx,
            inner: Arc::new(Mutex::new(Inner {
                state: SessionState::Idle,
                discovered: Vec::new(),
                session: None,
                next_id: 0,
            })),
        };
        (controller, rx)
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// The peripheral set from the most recent scan.
    pub async fn discovered(&self) -> Vec<DiscoveredPeripheral> {
        self.inner.lock().await.discovered.clone()
    }

    /// Deliver queued events in order.
    ///
    /// The event channel is bounded, so a send can wait on a slow consumer.
    /// Nothing may hold the `inner` lock across that wait: a consumer that is
    /// itself awaiting an intent method would deadlock the controller. Every
    /// caller therefore drops its guard before flushing.
    async fn flush(&self, queued: Vec<CoreEvent>) {
        for event in queued {
            let _ = self.events.send(event).await;
        }
    }

    // ── Scan ─────────────────────────────────────────────────────────────────

    /// Run a discovery scan.
    ///
    /// The previously discovered set is cleared unconditionally, even when
    /// the scan then fails. The state lock is released for the duration of
    /// the radio scan, so `state()` and `discovered()` stay readable while it
    /// runs. Scanning is not a sustained state: the machine settles back to
    /// `Idle` (or `Streaming` when a live session exists — the scan leaves an
    /// active session untouched).
    pub async fn request_scan(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.state = SessionState::Scanning;
            inner.discovered.clear();
        }
        self.flush(vec![CoreEvent::StatusChanged("Scanning...".to_owned())])
            .await;

        let result = self
            .transport
            .discover(Duration::from_secs(self.config.scan_timeout_secs))
            .await;

        let mut queued = Vec::new();
        {
            let mut inner = self.inner.lock().await;
            let settled = if inner.session.is_some() {
                SessionState::Streaming
            } else {
                SessionState::Idle
            };

            match result {
                Err(e) => {
                    inner.state = settled;
                    status(&mut queued, "Scan failed");
                    failure(&mut queued, FailureContext::Discovery, e.to_string());
                }
                Ok(devices) => {
                    inner.discovered = devices.clone();
                    inner.state = settled;
                    if devices.is_empty() {
                        status(&mut queued, "No devices found");
                    } else {
                        status(&mut queued, format!("Found {} device(s)", devices.len()));
                    }
                    queued.push(CoreEvent::DevicesFound(devices));
                }
            }
        }
        self.flush(queued).await;
    }

    // ── Connect ──────────────────────────────────────────────────────────────

    /// Connect to a previously discovered peripheral and start streaming.
    ///
    /// `address` is the presentation layer's current selection; `None` (or an
    /// address that is not in the current scan results) is rejected with a
    /// validation failure and changes nothing. An existing session is fully
    /// torn down before the new connect begins.
    pub async fn request_connect(&self, address: Option<&str>) {
        let mut queued = Vec::new();
        {
            let mut inner = self.inner.lock().await;
            self.connect_locked(&mut inner, address, &mut queued).await;
        }
        self.flush(queued).await;
    }

    /// The connect sequence proper, run under the state lock. Events are
    /// queued into `out` and delivered by the caller after the guard drops.
    async fn connect_locked(
        &self,
        inner: &mut Inner,
        address: Option<&str>,
        out: &mut Vec<CoreEvent>,
    ) {
        let address = match address {
            Some(a) if inner.discovered.iter().any(|d| d.address == a) => a.to_owned(),
            Some(a) => {
                failure(
                    out,
                    FailureContext::Validation,
                    format!("Device {a} is not in the current scan results."),
                );
                return;
            }
            None => {
                failure(out, FailureContext::Validation, "Please select a device first.");
                return;
            }
        };

        if inner.session.is_some() {
            self.teardown_locked(inner).await;
        }

        inner.state = SessionState::Connecting;
        status(out, format!("Connecting to {address} ..."));

        let connect = self
            .transport
            .connect(&address, Duration::from_secs(self.config.connect_timeout_secs))
            .await;
        let mut connection = match connect {
            Ok(c) => c,
            Err(e) => {
                inner.state = SessionState::Idle;
                status(out, "Connection failed");
                failure(out, FailureContext::Connect, e.to_string());
                return;
            }
        };
        status(out, "Connected");

        // ── Capability verification ──────────────────────────────────────────
        inner.state = SessionState::VerifyingCapability;
        let target = self.config.log_stream_uuid.clone();

        // Enumeration failure is tolerated and treated as an empty table:
        // the decision below is still made on a literal match.
        let characteristics = match connection.characteristics().await {
            Ok(list) => list,
            Err(e) => {
                debug!("characteristics() failed (treated as empty): {e}");
                Vec::new()
            }
        };

        match characteristics
            .iter()
            .find(|c| uuid_matches(&c.uuid, &target))
        {
            Some(c) => {
                info!("found log characteristic {} props={:?}", c.uuid, c.properties);
            }
            None => {
                inner.state = SessionState::Disconnecting;
                if let Err(e) = connection.disconnect().await {
                    debug!("cleanup disconnect failed (ignored): {e}");
                }
                inner.state = SessionState::Idle;
                status(out, "Notify UUID not found");
                failure(
                    out,
                    FailureContext::CapabilityMissing,
                    format!("Notify characteristic not found: {target}"),
                );
                return;
            }
        }

        // ── Subscribe ────────────────────────────────────────────────────────
        status(out, "Enabling notifications...");
        let chunks = match connection.subscribe(&target).await {
            Ok(rx) => rx,
            Err(e) => {
                inner.state = SessionState::Disconnecting;
                if let Err(e) = connection.disconnect().await {
                    debug!("cleanup disconnect failed (ignored): {e}");
                }
                inner.state = SessionState::Idle;
                status(out, "Notify failed");
                failure(
                    out,
                    FailureContext::Subscribe,
                    format!("Could not start notify for {target}: {e}"),
                );
                return;
            }
        };

        let id = inner.next_id;
        inner.next_id += 1;
        let pump = tokio::spawn(Self::pump(
            id,
            chunks,
            Arc::clone(&self.inner),
            self.events.clone(),
        ));
        inner.session = Some(ActiveSession {
            id,
            address,
            connection,
            assembler: LineAssembler::new(),
            pump: Some(pump),
        });
        inner.state = SessionState::Streaming;
        status(out, "Streaming logs");
    }

    // ── Notification pump ────────────────────────────────────────────────────

    /// Feed notification chunks into the session's reassembly buffer and emit
    /// the completed lines.
    ///
    /// Chunks are processed strictly in arrival order: there is one receiver,
    /// and each chunk is fed to the assembler under the controller mutex. The
    /// session id check makes a chunk that raced against a teardown (or
    /// against a newer connect) a no-op instead of a write into the wrong
    /// buffer. The resulting events are sent only after the guard drops, so a
    /// consumer that stops draining parks this task but never blocks a
    /// lifecycle transition; a teardown aborts the task, and lines still
    /// queued here are dropped with it.
    async fn pump(
        id: u64,
        mut chunks: mpsc::Receiver<Vec<u8>>,
        inner: Arc<Mutex<Inner>>,
        events: mpsc::Sender<CoreEvent>,
    ) {
        while let Some(chunk) = chunks.recv().await {
            let mut queued = Vec::new();
            {
                let mut guard = inner.lock().await;
                let Some(session) = guard.session.as_mut().filter(|s| s.id == id) else {
                    break;
                };
                for text in session.assembler.feed(&chunk) {
                    let module = classify_module(&text).to_owned();
                    queued.push(CoreEvent::LineEmitted(LogLine {
                        module,
                        text: text.clone(),
                    }));
                    queued.push(CoreEvent::LineEmitted(LogLine {
                        module: AGGREGATE_MODULE.to_owned(),
                        text,
                    }));
                }
            }
            for event in queued {
                let _ = events.send(event).await;
            }
        }
        debug!("notification pump for session {id} ended");
    }

    // ── Disconnect ───────────────────────────────────────────────────────────

    /// Tear down the active session, if any. Always ends in `Idle`, no matter
    /// how the transport behaves.
    pub async fn request_disconnect(&self) {
        {
            let mut inner = self.inner.lock().await;
            self.teardown_locked(&mut inner).await;
        }
        self.flush(vec![CoreEvent::StatusChanged("Disconnected".to_owned())])
            .await;
    }

    /// Best-effort teardown under the controller lock.
    ///
    /// Order matters: notifications are quiesced (unsubscribe, then pump
    /// abort) before the session — and with it the reassembly buffer — is
    /// dropped, so no feed can land in a buffer a later connect has replaced.
    /// Unsubscribe and disconnect failures are swallowed; they cannot keep
    /// the machine out of `Idle`.
    async fn teardown_locked(&self, inner: &mut Inner) {
        let Some(mut session) = inner.session.take() else {
            inner.state = SessionState::Idle;
            return;
        };

        inner.state = SessionState::Disconnecting;
        info!("tearing down session with {}", session.address);

        if let Err(e) = session
            .connection
            .unsubscribe(&self.config.log_stream_uuid)
            .await
        {
            debug!("unsubscribe failed (ignored): {e}");
        }
        if let Some(pump) = session.pump.take() {
            pump.abort();
        }
        session.assembler.reset();
        if let Err(e) = session.connection.disconnect().await {
            debug!("disconnect failed (ignored): {e}");
        }

        inner.state = SessionState::Idle;
    }
}
