//! Proportional-band PID controller for grill temperature.
//!
//! Standard-form tuning: the gains derive from (proportional band,
//! integral time, derivative time) as
//!
//! ```text
//!   Kp = -1 / PB      Ki = Kp / Ti      Kd = Kp * Td
//! ```
//!
//! The sign convention is deliberate: error = measured − target, so a
//! positive error (running hot) must *decrease* the auger duty fraction.
//! The proportional term is offset by 0.5 so the output sits mid-range
//! when the pit is on target and saturates at the proportional-band
//! edges.  The derivative acts on the measurement, not the error, so a
//! target change cannot kick the output.

use log::debug;

/// Duty-fraction floor applied by the caller — keeps a maintenance fire lit.
pub const U_MIN: f32 = 0.15;
/// Duty-fraction ceiling applied by the caller.
pub const U_MAX: f32 = 1.0;

/// PID controller state.  Owned by the mode machine context; fully reset on
/// Start-mode entry, incrementally updated once per Hold-mode cycle.
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    target: f32,
    error: f32,
    /// Accumulated error·dt, clamped to ±`integral_max` (anti-windup).
    integral: f32,
    integral_max: f32,
    derivative: f32,
    previous_temp: f32,
    last_update_ms: u64,
}

impl PidController {
    /// Build a controller from standard-form tuning parameters.
    pub fn new(pb: f32, ti: f32, td: f32, now_ms: u64) -> Self {
        let kp = -1.0 / pb;
        let ki = kp / ti;
        let kd = kp * td;
        debug!("PID gains: PB={pb} Ti={ti} Td={td} -> Kp={kp} Ki={ki} Kd={kd}");
        Self {
            kp,
            ki,
            kd,
            target: 0.0,
            error: 0.0,
            integral: 0.0,
            integral_max: (0.5 / ki).abs(),
            derivative: 0.0,
            previous_temp: 0.0,
            last_update_ms: now_ms,
        }
    }

    /// Compute a new duty fraction from the measured temperature.
    ///
    /// Called once per control cycle (20 s in Hold mode).  The caller clamps
    /// the result to [`U_MIN`, `U_MAX`] before use.
    pub fn update(&mut self, current_temp: f32, now_ms: u64) -> f32 {
        let error = current_temp - self.target;

        // P: 1.0 at PB/2 under target, 0.0 at PB/2 over target
        let p = self.kp * error + 0.5;

        let elapsed_secs = now_ms.saturating_sub(self.last_update_ms) as f32 / 1000.0;
        if elapsed_secs > 0.0 {
            self.integral = (self.integral + error * elapsed_secs)
                .clamp(-self.integral_max, self.integral_max);
            // Derivative on measurement, not on error
            self.derivative = (current_temp - self.previous_temp) / elapsed_secs;
        } else {
            self.derivative = 0.0;
        }

        let i = self.ki * self.integral;
        let d = self.kd * self.derivative;
        let u = p + i + d;

        self.error = error;
        self.previous_temp = current_temp;
        self.last_update_ms = now_ms;

        debug!(
            "PID: target={} current={current_temp} errors=({error}, {}, {}) \
             terms=({p}, {i}, {d}) u={u}",
            self.target, self.integral, self.derivative,
        );

        u
    }

    /// Change the setpoint, zeroing the accumulated error/integral/derivative
    /// and restamping the update clock.
    ///
    /// Required whenever a program step or remote command changes the grill
    /// target — carrying a stale integral against a new setpoint injects a
    /// correction for an error that no longer exists.
    pub fn set_target(&mut self, target_temp: f32, now_ms: u64) {
        self.target = target_temp;
        self.error = 0.0;
        self.integral = 0.0;
        self.derivative = 0.0;
        self.last_update_ms = now_ms;
        log::info!("PID target: {target_temp}");
    }

    /// Full reset for Start-mode entry: explicit field reassignment, with the
    /// previous-temperature seed set to the target so the first Hold-mode
    /// update produces no derivative term.
    pub fn reset(&mut self, target_temp: f32, now_ms: u64) {
        self.set_target(target_temp, now_ms);
        self.previous_temp = target_temp;
    }

    /// Current setpoint.
    pub fn target(&self) -> f32 {
        self.target
    }

    /// (Kp, Ki, Kd).
    pub fn gains(&self) -> (f32, f32, f32) {
        (self.kp, self.ki, self.kd)
    }

    /// Accumulated integral (error·seconds) — exposed for tests and
    /// telemetry.
    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Anti-windup clamp bound.
    pub fn integral_bound(&self) -> f32 {
        self.integral_max
    }
}
