//! Port traits — the hexagonal boundary between domain logic and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SmokerService (domain)
//! ```
//!
//! Driven adapters (sensor hub, relay lines, HTTP sync client, event sinks,
//! clocks) implement these traits.  The
//! [`SmokerService`](super::service::SmokerService) consumes them via
//! generics, so the domain core never touches hardware or sockets directly.

use crate::error::SyncError;
use crate::fsm::context::ControlState;
use crate::relays::Relay;
use crate::sensors::Reading;
use crate::sync::{HeartbeatReply, ProgramDoc};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain temperatures.
pub trait SensorPort {
    /// Read the grill-chamber RTD.
    fn read_grill(&mut self) -> Reading;

    /// Read the food-probe thermocouple.
    fn read_probe(&mut self) -> Reading;

    /// Whether the probe produced a usable value on its last read.
    fn probe_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the three relay lines.  The domain owns the
/// commanded state ([`RelayBank`](crate::relays::RelayBank)); this port
/// only moves levels onto the wires.
pub trait RelayPort {
    /// Drive a relay line (active high).
    fn apply(&mut self, relay: Relay, on: bool);

    /// Read the line level back for verification.
    fn level(&self, relay: Relay) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Sync port (driven adapter: domain ↔ remote coordination service)
// ───────────────────────────────────────────────────────────────

/// The remote coordination service, at its wire boundary.
///
/// Every method returns `Err(SyncError)` only for transport-level failure
/// (connect/send/receive).  A reachable service answering with a non-2xx
/// status is reported in-band (`Ok(false)` / `Ok(None)`): the caller's
/// policy differs — transport failures are fatal everywhere but the
/// heartbeat, while status errors are logged and ridden out.
pub trait SyncPort {
    /// POST the boot announcement.  `Ok(true)` once the service
    /// acknowledges.
    fn post_boot(&mut self, state: &ControlState) -> Result<bool, SyncError>;

    /// POST the periodic heartbeat; the reply may carry program/state
    /// updates.  `Ok(None)` for a non-2xx answer.
    fn post_heartbeat(&mut self, state: &ControlState)
        -> Result<Option<HeartbeatReply>, SyncError>;

    /// PUT the full control state (complete replacement).
    fn put_state(&mut self, state: &ControlState) -> Result<bool, SyncError>;

    /// PATCH specific state keys.
    fn patch_state(&mut self, patch: &serde_json::Value) -> Result<bool, SyncError>;

    /// GET the pending program id, if the service holds one.
    fn fetch_program_id(&mut self) -> Result<Option<String>, SyncError>;

    /// GET a program's steps by id.  `Ok(None)` when the id is unknown.
    fn fetch_program(&mut self, id: &str) -> Result<Option<ProgramDoc>, SyncError>;

    /// DELETE the remote-side program.
    fn delete_program(&mut self) -> Result<bool, SyncError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, future
/// display, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source.  Every duty-cycle, PID, and timeout decision in
/// the core is computed from this clock, which is what makes the whole
/// control path simulatable in tests.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch (boot).  Monotonic.
    fn now_ms(&self) -> u64;
}
