//! Shared mutable context threaded through every mode handler.
//!
//! `SmokerContext` is the single struct that mode handlers read from and
//! write to: control state, relay bank, duty cycle, PID, configuration,
//! and timing.  Handlers are plain functions over this blackboard; all
//! I/O (relay lines, sync calls) happens afterwards when the service
//! flushes the commanded state and drains the side-effect flags.

use serde::{Deserialize, Serialize};

use super::Mode;
use crate::config::SmokerConfig;
use crate::control::pid::PidController;
use crate::relays::{DutyCycle, RelayBank};

// ---------------------------------------------------------------------------
// Control state (mirrors the sync service's state document)
// ---------------------------------------------------------------------------

/// Current and target temperatures (°F).  `None` = no reading / no target.
/// Inbound documents may be sparse, so every field defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Temperatures {
    #[serde(rename = "grillCurrent")]
    pub grill_current: Option<i32>,
    #[serde(rename = "grillTarget")]
    pub grill_target: Option<i32>,
    #[serde(rename = "probeCurrent")]
    pub probe_current: Option<i32>,
    #[serde(rename = "probeTarget")]
    pub probe_target: Option<i32>,
}

/// The authoritative controller state, pushed to the sync service on every
/// transition and heartbeat.
///
/// Invariant: `temps.grill_target` is present whenever
/// [`Mode::requires_target`] holds for `mode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub mode: Mode,
    /// Sync-service connectivity, as of the last exchange.
    pub online: bool,
    /// Program control engaged.
    pub power: bool,
    #[serde(rename = "probeConnected")]
    pub probe_connected: bool,
    pub temps: Temperatures,
}

impl ControlState {
    /// Boot defaults: Idle, offline, no program, no readings.
    pub fn new() -> Self {
        Self {
            mode: Mode::Idle,
            online: false,
            power: false,
            probe_connected: false,
            temps: Temperatures::default(),
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Side effects requested by mode handlers
// ---------------------------------------------------------------------------

/// I/O the mode handlers request; the service drains these after every
/// machine call, in declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SideEffects {
    /// Drop the sequencer's program.
    pub clear_program: bool,
    /// DELETE the remote-side program.
    pub delete_program: bool,
    /// PUT the full control state to the sync service.
    pub push_state: bool,
    /// PATCH cleared mode + targets (Off entry).
    pub patch_off: bool,
    /// Terminate the process after the patch (Off entry).
    pub exit: bool,
}

// ---------------------------------------------------------------------------
// SmokerContext
// ---------------------------------------------------------------------------

/// The shared context passed to every mode handler function.
pub struct SmokerContext {
    /// Authoritative controller state.
    pub state: ControlState,
    /// Relay levels + toggle clocks.  Flushed to GPIO by the service.
    pub relays: RelayBank,
    /// Active auger duty cycle.
    pub duty: DutyCycle,
    /// Grill-temperature PID.  Reset on Start entry and target changes.
    pub pid: PidController,
    /// Tunable parameters.
    pub config: SmokerConfig,

    // -- Timing (stamped by the service each tick) --
    /// Monotonic milliseconds.
    pub now_ms: u64,
    /// Program clock: restarted whenever a step is applied, Shutdown is
    /// entered, or program control is suspended.  Times both step Time
    /// triggers and the Shutdown run-down.
    pub program_clock_ms: u64,
    /// When the PID last produced a duty update (Hold gate).
    pub last_pid_update_ms: Option<u64>,

    // -- Derived sensor data --
    /// Mean of the recent grill readings; the PID's input.
    pub grill_avg: Option<f32>,

    // -- Requested I/O --
    pub effects: SideEffects,
}

impl SmokerContext {
    /// Create a context with boot defaults.
    pub fn new(config: SmokerConfig, now_ms: u64) -> Self {
        let pid = PidController::new(
            config.proportional_band,
            config.integral_time_secs,
            config.derivative_time_secs,
            now_ms,
        );
        let duty = DutyCycle::hold(config.pid_update_period_secs);
        Self {
            state: ControlState::new(),
            relays: RelayBank::new(now_ms),
            duty,
            pid,
            config,
            now_ms,
            program_clock_ms: now_ms,
            last_pid_update_ms: None,
            grill_avg: None,
            effects: SideEffects::default(),
        }
    }

    /// Seconds since the program clock was last restarted.
    pub fn secs_since_program_clock(&self) -> f32 {
        self.now_ms.saturating_sub(self.program_clock_ms) as f32 / 1000.0
    }

    /// Restart the program clock at the current tick.
    pub fn restart_program_clock(&mut self) {
        self.program_clock_ms = self.now_ms;
    }
}
