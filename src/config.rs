//! System configuration parameters
//!
//! All tunable parameters for the EmberPit controller.  Defaults match the
//! production tuning; a deployment can override them via the settings file.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokerConfig {
    // --- PID tuning (standard-form, °F) ---
    /// Proportional band (°F).  Full output swing across PB around target.
    pub proportional_band: f32,
    /// Integral time (seconds).
    pub integral_time_secs: f32,
    /// Derivative time (seconds).
    pub derivative_time_secs: f32,
    /// Seconds between PID output updates while in Hold mode.
    pub pid_update_period_secs: f32,

    // --- Smoke mode ---
    /// Pause setting (0–9).  Lower = longer auger pauses = more smoke.
    pub p_setting: u8,

    // --- Igniter ---
    /// Grill temperature (°F) below which the igniter engages and above
    /// which it disengages.
    pub igniter_threshold_f: i32,
    /// Maximum continuous igniter on-time (seconds) before a forced
    /// safety shutdown.
    pub igniter_timeout_secs: f32,

    // --- Shutdown ---
    /// Fan run-on time (seconds) after entering Shutdown before the
    /// controller powers off.
    pub shutdown_timeout_secs: f32,

    // --- Timing ---
    /// Main control loop interval (milliseconds).
    pub tick_interval_ms: u32,
    /// Seconds between sensor reads / heartbeat posts.
    pub heartbeat_period_secs: f32,
    /// Seconds between boot-announcement retries during startup.
    pub boot_retry_period_secs: f32,
}

impl Default for SmokerConfig {
    fn default() -> Self {
        Self {
            // PID — PB 60 / Ti 180 / Td 45 holds ±5 °F on the reference pit
            proportional_band: 60.0,
            integral_time_secs: 180.0,
            derivative_time_secs: 45.0,
            pid_update_period_secs: 20.0,

            // Smoke
            p_setting: 2,

            // Igniter
            igniter_threshold_f: 100,
            igniter_timeout_secs: 15.0 * 60.0,

            // Shutdown
            shutdown_timeout_secs: 10.0 * 60.0,

            // Timing
            tick_interval_ms: 250,
            heartbeat_period_secs: 10.0,
            boot_retry_period_secs: 10.0,
        }
    }
}
