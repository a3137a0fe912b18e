//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC in production).  A future display or
//! notification adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | mode={} | grill={}/{}F | probe={}/{}F | u={:.3} | \
                     auger={} fan={} igniter={} | power={} online={}",
                    t.mode,
                    fmt_temp(t.grill_current),
                    fmt_temp(t.grill_target),
                    fmt_temp(t.probe_current),
                    fmt_temp(t.probe_target),
                    t.duty_u,
                    onoff(t.auger_on),
                    onoff(t.fan_on),
                    onoff(t.igniter_on),
                    t.power,
                    t.online,
                );
            }
            AppEvent::ModeChanged { from, to } => {
                info!("EVENT | mode {from} -> {to}");
            }
            AppEvent::ProgramLoaded { id, steps } => {
                info!("EVENT | program '{id}' loaded ({steps} steps)");
            }
            AppEvent::ProgramAdvanced { index } => {
                info!("EVENT | program advanced to step {index}");
            }
            AppEvent::ProgramRejected { reason } => {
                warn!("EVENT | program rejected: {reason}");
            }
            AppEvent::ProgramSuspended => {
                info!("EVENT | program control suspended");
            }
            AppEvent::SafetyShutdown => {
                warn!("EVENT | safety shutdown forced");
            }
            AppEvent::Connectivity { online } => {
                info!("EVENT | sync service {}", if *online { "online" } else { "offline" });
            }
        }
    }
}

fn fmt_temp(value: Option<i32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn onoff(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "off"
    }
}
