//! Outbound application events.
//!
//! The [`SmokerService`](super::service::SmokerService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them — the default adapter writes them to
//! the serial log.

use crate::fsm::Mode;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The controller changed modes.
    ModeChanged { from: Mode, to: Mode },

    /// A new cook program was accepted.
    ProgramLoaded { id: String, steps: usize },

    /// The sequencer moved to the step at `index`.
    ProgramAdvanced { index: usize },

    /// A program was refused or aborted.
    ProgramRejected { reason: &'static str },

    /// Program control was suspended by the remote service (steps kept).
    ProgramSuspended,

    /// The igniter safety rule forced a shutdown.
    SafetyShutdown,

    /// Sync-service connectivity changed.
    Connectivity { online: bool },

    /// Periodic snapshot, emitted on each successful heartbeat.
    Telemetry(TelemetryData),
}

/// A point-in-time snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryData {
    pub mode: Mode,
    pub grill_current: Option<i32>,
    pub grill_target: Option<i32>,
    pub probe_current: Option<i32>,
    pub probe_target: Option<i32>,
    /// Active auger duty fraction.
    pub duty_u: f32,
    pub auger_on: bool,
    pub fan_on: bool,
    pub igniter_on: bool,
    pub power: bool,
    pub online: bool,
}
