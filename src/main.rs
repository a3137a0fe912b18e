//! EmberPit Firmware — Main Entry Point
//!
//! Hexagonal architecture with a fixed-period blocking control loop.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                   │
//! │                                                              │
//! │  HardwareAdapter      EspSyncClient    LogEventSink          │
//! │  (Sensor+RelayPort)   (SyncPort)       (EventSink)           │
//! │  MonotonicClock       SyncSettings     Watchdog              │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ──────────────────     │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │             SmokerService (pure logic)                 │  │
//! │  │  mode machine · PID · duty cycle · program sequencer   │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop order is fixed and strictly sequential: read sensors →
//! program limits → heartbeat → mode actions → blocking sleep.  Fatal
//! errors (boot/program/state sync transport failures, program index
//! corruption) propagate out of `main` and exit the process; the Off mode
//! exits cleanly after clearing remote-side targets.
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{bail, Result};
use log::{error, info};

use emberpit::adapters::hardware::{build_sensor_hub, HardwareAdapter};
use emberpit::adapters::log_sink::LogEventSink;
use emberpit::adapters::settings::{SyncSettings, DEFAULT_SETTINGS_PATH};
use emberpit::adapters::time::MonotonicClock;
use emberpit::app::service::{SmokerService, TickOutcome};
use emberpit::config::SmokerConfig;
use emberpit::drivers::hw_init;
use emberpit::drivers::watchdog::Watchdog;
use emberpit::sync::http::EspSyncClient;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  EmberPit v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Sync credentials (malformed file is fatal) ─────────
    let settings = SyncSettings::load(DEFAULT_SETTINGS_PATH)?;

    // ── 3. Hardware ───────────────────────────────────────────
    if let Err(e) = hw_init::init_relay_lines() {
        bail!("relay line init failed: {e}");
    }
    let hub = build_sensor_hub()?;
    let mut hw = HardwareAdapter::new(hub);
    let watchdog = Watchdog::new();

    // ── 4. Adapters + service ─────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut sync = EspSyncClient::new(&settings);

    let config = SmokerConfig::default();
    let tick = Duration::from_millis(u64::from(config.tick_interval_ms));
    let boot_retry = Duration::from_secs_f32(config.boot_retry_period_secs);
    let mut service = SmokerService::new(config, MonotonicClock::new());

    service.startup_read(&mut hw);

    // ── 5. Boot handshake (repeat until acknowledged) ─────────
    while !service.post_boot(&mut sync)? {
        std::thread::sleep(boot_retry);
    }

    // ── 6. Pending program query ──────────────────────────────
    service.load_pending_program(&mut sync, &mut sink)?;

    info!("system ready, entering control loop ({} ms tick)", tick.as_millis());

    // ── 7. Control loop ───────────────────────────────────────
    loop {
        match service.tick(&mut hw, &mut sync, &mut sink) {
            Ok(TickOutcome::Continue) => {
                watchdog.feed();
                std::thread::sleep(tick);
            }
            Ok(TickOutcome::PowerOff) => {
                info!("mode Off: remote targets cleared, exiting");
                return Ok(());
            }
            Err(e) => {
                error!("fatal: {e}");
                bail!("control loop aborted: {e}");
            }
        }
    }
}
