//! GATT identifiers, sentinels, and wire-format notes for the BLE log service.
//!
//! All UUIDs belong to the vendor namespace `9f7bXXXX-6c35-4d2c-9c85-4a8c1a2b3c4d`
//! used by the smartwatch firmware's log backend.

// ── Service ──────────────────────────────────────────────────────────────────

/// Primary GATT service UUID exposed by the peripheral's log backend.
///
/// Not required for discovery (the viewer scans for all peripherals and lets
/// the user choose), but documented here because the log stream characteristic
/// lives under it.
pub const LOG_SERVICE_UUID: &str = "9f7b0000-6c35-4d2c-9c85-4a8c1a2b3c4d";

// ── Characteristics ───────────────────────────────────────────────────────────

/// The log stream characteristic (notify + read).
///
/// The peripheral pushes its formatted log output here as UTF-8 text.
/// Notifications are chunked at `ATT_MTU − 3` bytes, so a single log line
/// routinely spans several notifications and a single notification may carry
/// the tail of one line plus the head of the next.
///
/// # Wire format
///
/// ```text
/// <module>: <free text>\r\n
/// ```
///
/// * one line per log message, CRLF-terminated (lone LF and lone CR are also
///   accepted by the reassembler)
/// * `<module>` is the originating firmware module, e.g. `as6221_demo`,
///   `lsm6dso_app`, `max30101_demo`
/// * lines with no colon (such as the firmware's `[DROPPED=n]` overflow
///   markers) carry no module and are grouped under [`UNKNOWN_MODULE`]
///
/// Comparison against this UUID is case-insensitive; see [`uuid_matches`].
pub const LOG_STREAM_UUID: &str = "9f7b0001-6c35-4d2c-9c85-4a8c1a2b3c4d";

/// Case-insensitive UUID comparison.
///
/// GATT UUIDs are hex strings and platforms disagree about their case
/// (CoreBluetooth reports uppercase, BlueZ lowercase), so every comparison
/// against [`LOG_STREAM_UUID`] must go through this helper.
pub fn uuid_matches(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

// ── Module tags ───────────────────────────────────────────────────────────────

/// Tag assigned to lines that carry no `module:` prefix.
pub const UNKNOWN_MODULE: &str = "Unknown";

/// Aggregate tag: every completed line is re-emitted once under this tag so a
/// consumer can maintain an "everything" view without merging per-module ones.
pub const AGGREGATE_MODULE: &str = "All";

/// Display name used for peripherals that advertise no local name.
pub const UNNAMED_DEVICE: &str = "(Unknown)";

// ── Timeouts ──────────────────────────────────────────────────────────────────

/// BLE scan duration in seconds. The scan runs for the full duration so that
/// multiple peripherals in range can all be discovered before it returns.
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 5;

/// Hard timeout on the transport connect call. A BLE connection normally
/// completes in under 2 s; stacks that block forever (out-of-range peer, bad
/// adapter state) are cut off here.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_match_is_case_insensitive() {
        assert!(uuid_matches(LOG_STREAM_UUID, &LOG_STREAM_UUID.to_uppercase()));
        assert!(uuid_matches(&LOG_STREAM_UUID.to_uppercase(), LOG_STREAM_UUID));
        assert!(!uuid_matches(LOG_STREAM_UUID, LOG_SERVICE_UUID));
    }
}
