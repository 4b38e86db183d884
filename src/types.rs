/// A peripheral discovered during a BLE scan.
///
/// The discovered set is rebuilt from scratch on every scan; entries from a
/// previous scan are never merged in. Pass the `address` to
/// [`crate::session::SessionController::request_connect`] to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeripheral {
    /// Platform BLE identifier.
    /// • macOS / Windows — a UUID string
    /// • Linux — a Bluetooth MAC address (`AA:BB:CC:DD:EE:FF`)
    pub address: String,
    /// Advertised device name, or [`crate::protocol::UNNAMED_DEVICE`] when the
    /// peripheral advertises none.
    pub name: String,
}

/// One completed, module-tagged line of peripheral log output.
///
/// Immutable once produced. The core keeps no history; consumers that want
/// scrollback must retain these themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// The module tag derived by [`crate::parse::classify_module`], or the
    /// [`crate::protocol::AGGREGATE_MODULE`] tag on the duplicate delivery.
    pub module: String,
    /// The trimmed line text, including its original `module:` prefix.
    pub text: String,
}

/// Which lifecycle operation a user-visible failure belongs to.
///
/// Only these four-plus-one contexts ever surface to the consumer; decode
/// anomalies and teardown errors are tolerated silently (see the crate docs
/// for the full propagation policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureContext {
    /// Transport error while scanning. The scan aborts.
    Discovery,
    /// Connect requested with no usable peripheral selection. No transport
    /// call was made and no state changed.
    Validation,
    /// Transport error while connecting. The half-built session is discarded.
    Connect,
    /// The log stream characteristic is absent from the peripheral's GATT
    /// table. Reported distinctly from [`FailureContext::Connect`]; triggers
    /// teardown.
    CapabilityMissing,
    /// Enabling notifications failed. Triggers teardown.
    Subscribe,
}

impl std::fmt::Display for FailureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureContext::Discovery => "Scan failed",
            FailureContext::Validation => "Select device",
            FailureContext::Connect => "Connection failed",
            FailureContext::CapabilityMissing => "UUID not found",
            FailureContext::Subscribe => "Notify failed",
        };
        f.write_str(s)
    }
}

/// All events emitted by [`crate::session::SessionController`].
///
/// Consumers receive these through the `mpsc::Receiver` returned by
/// [`crate::session::SessionController::new`]. This is the complete contract
/// between the core and a presentation layer; the core is never called back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Human-readable status text for a status bar ("Scanning...",
    /// "Streaming logs", ...).
    StatusChanged(String),
    /// The result of a completed scan. Replaces any previously reported set.
    DevicesFound(Vec<DiscoveredPeripheral>),
    /// One completed log line. Fired once with the line's own module tag and
    /// once more with the `"All"` aggregate tag, in that order.
    LineEmitted(LogLine),
    /// A user-visible failure, suitable for an error dialog.
    Failure {
        /// The operation that failed.
        context: FailureContext,
        /// Transport or validation error text.
        message: String,
    },
}
