//! Relay bank and auger duty-cycle scheduler.
//!
//! [`RelayBank`] is the single owner of commanded relay state.  Each relay
//! records the timestamp of its last actual level change; that timestamp —
//! not wall-clock ticks — is the sole timing reference for duty cycling, so
//! a no-op set must never touch it.
//!
//! The bank is pure bookkeeping: the service flushes the commanded levels to
//! the GPIO lines through [`RelayPort`](crate::app::ports::RelayPort) after
//! every tick.

use log::debug;

// ═══════════════════════════════════════════════════════════════
//  Relay identity
// ═══════════════════════════════════════════════════════════════

/// The three switched loads on the controller board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Relay {
    /// Pellet auger motor.
    Auger = 0,
    /// Combustion fan.
    Fan = 1,
    /// Hot-rod igniter.
    Igniter = 2,
}

impl Relay {
    /// Total number of relays — sizes the bank array.
    pub const COUNT: usize = 3;

    /// Human-readable name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Auger => "auger",
            Self::Fan => "fan",
            Self::Igniter => "igniter",
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Duty cycle
// ═══════════════════════════════════════════════════════════════

/// One auger duty cycle: a period and the fraction of it spent energised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyCycle {
    /// Full cycle period (seconds).
    pub cycle_secs: f32,
    /// Fraction of the cycle the auger runs.  1.0 = continuous.
    pub u: f32,
}

impl DutyCycle {
    /// Start-mode feed: fixed 15 s on / 45 s off.
    pub fn start() -> Self {
        Self {
            cycle_secs: 60.0,
            u: 15.0 / 60.0,
        }
    }

    /// Hold-mode cycle: the PID update period, starting at the maintenance
    /// floor until the first PID output lands.
    pub fn hold(pid_update_period_secs: f32) -> Self {
        Self {
            cycle_secs: pid_update_period_secs,
            u: crate::control::pid::U_MIN,
        }
    }

    /// Smoke-mode pause cycle from the P-setting (0–9, lower = more smoke):
    /// 15 s on, 45 + 10·p s off.
    pub fn pause_cycle(p_setting: u8) -> Self {
        let on = 15.0;
        let off = 45.0 + f32::from(p_setting) * 10.0;
        Self {
            cycle_secs: on + off,
            u: on / (on + off),
        }
    }

    /// Seconds of the cycle spent on.
    pub fn on_secs(&self) -> f32 {
        self.cycle_secs * self.u
    }

    /// Seconds of the cycle spent off.
    pub fn off_secs(&self) -> f32 {
        self.cycle_secs * (1.0 - self.u)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Relay bank
// ═══════════════════════════════════════════════════════════════

/// Commanded state of one relay.
#[derive(Debug, Clone, Copy)]
struct RelayState {
    on: bool,
    last_toggled_ms: u64,
}

/// Tracks commanded state and last-toggle time for all three relays.
pub struct RelayBank {
    states: [RelayState; Relay::COUNT],
}

impl RelayBank {
    /// All relays off; toggle clocks seeded with the boot timestamp.
    pub fn new(now_ms: u64) -> Self {
        Self {
            states: [RelayState {
                on: false,
                last_toggled_ms: now_ms,
            }; Relay::COUNT],
        }
    }

    /// Command a relay level.  A no-op when the relay is already at
    /// `desired`; otherwise records the toggle timestamp.
    pub fn set(&mut self, relay: Relay, desired: bool, now_ms: u64) {
        let state = &mut self.states[relay as usize];
        if state.on != desired {
            debug!("{} {} -> {}", relay.name(), state.on, desired);
            state.on = desired;
            state.last_toggled_ms = now_ms;
        }
    }

    /// Commanded level of a relay.
    pub fn is_on(&self, relay: Relay) -> bool {
        self.states[relay as usize].on
    }

    /// Seconds since the relay last changed level.
    pub fn secs_since_toggle(&self, relay: Relay, now_ms: u64) -> f32 {
        now_ms.saturating_sub(self.states[relay as usize].last_toggled_ms) as f32 / 1000.0
    }

    /// Advance the auger duty cycle by one tick.
    ///
    /// On-phase ends after `cycle·u` seconds (unless u = 1.0, which means
    /// continuous feed); off-phase ends after `cycle·(1−u)` seconds.
    pub fn manage_auger(&mut self, duty: &DutyCycle, now_ms: u64) {
        let since = self.secs_since_toggle(Relay::Auger, now_ms);
        if self.is_on(Relay::Auger) && since > duty.on_secs() && duty.u < 1.0 {
            self.set(Relay::Auger, false, now_ms);
        } else if !self.is_on(Relay::Auger) && since > duty.off_secs() {
            self.set(Relay::Auger, true, now_ms);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const TICK_MS: u64 = 250;

    /// Drive `manage_auger` tick by tick, recording toggle times in ms.
    fn run_cycle(duty: DutyCycle, start_on: bool, ticks: u64) -> Vec<(u64, bool)> {
        let mut bank = RelayBank::new(0);
        bank.set(Relay::Auger, start_on, 0);
        let mut toggles = Vec::new();
        let mut was_on = bank.is_on(Relay::Auger);
        for i in 1..=ticks {
            let now = i * TICK_MS;
            bank.manage_auger(&duty, now);
            let on = bank.is_on(Relay::Auger);
            if on != was_on {
                toggles.push((now, on));
                was_on = on;
            }
        }
        toggles
    }

    #[test]
    fn noop_set_leaves_toggle_clock_alone() {
        let mut bank = RelayBank::new(0);
        bank.set(Relay::Fan, true, 1_000);
        bank.set(Relay::Fan, true, 50_000);
        assert!((bank.secs_since_toggle(Relay::Fan, 51_000) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn toggle_restamps_clock() {
        let mut bank = RelayBank::new(0);
        bank.set(Relay::Fan, true, 1_000);
        bank.set(Relay::Fan, false, 30_000);
        assert!((bank.secs_since_toggle(Relay::Fan, 31_000) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn half_duty_toggles_every_ten_seconds() {
        let duty = DutyCycle {
            cycle_secs: 20.0,
            u: 0.5,
        };
        // 60 s starting from the on phase: each half-period is ~10 s ± 1 tick
        let toggles = run_cycle(duty, true, 60_000 / TICK_MS);
        assert!(toggles.len() >= 5);
        let mut previous_ms = 0;
        for (i, (at_ms, on)) in toggles.iter().enumerate() {
            let interval = at_ms - previous_ms;
            assert!(
                interval.abs_diff(10_000) <= TICK_MS,
                "toggle {i}: interval {interval}ms, expected ~10000ms"
            );
            assert_eq!(*on, i % 2 == 1);
            previous_ms = *at_ms;
        }
    }

    #[test]
    fn maintenance_duty_is_three_on_seventeen_off() {
        let duty = DutyCycle {
            cycle_secs: 20.0,
            u: crate::control::pid::U_MIN,
        };
        assert!((duty.on_secs() - 3.0).abs() < 1e-3);
        assert!((duty.off_secs() - 17.0).abs() < 1e-3);

        let toggles = run_cycle(duty, true, 40_000 / TICK_MS);
        // off after ~3 s, back on ~17 s later
        assert!(toggles[0].0.abs_diff(3_000) <= TICK_MS);
        assert!(!toggles[0].1);
        assert!((toggles[1].0 - toggles[0].0).abs_diff(17_000) <= TICK_MS);
        assert!(toggles[1].1);
    }

    #[test]
    fn continuous_duty_never_times_out() {
        let duty = DutyCycle {
            cycle_secs: 20.0,
            u: 1.0,
        };
        let toggles = run_cycle(duty, true, 120_000 / TICK_MS);
        assert!(toggles.is_empty(), "u=1.0 must hold the auger on: {toggles:?}");
    }

    #[test]
    fn start_cycle_is_fifteen_on_forty_five_off() {
        let duty = DutyCycle::start();
        assert!((duty.cycle_secs - 60.0).abs() < 1e-3);
        assert!((duty.u - 0.25).abs() < 1e-3);
    }

    #[test]
    fn pause_cycle_follows_p_setting() {
        for p in 0u8..=9 {
            let duty = DutyCycle::pause_cycle(p);
            assert!((duty.on_secs() - 15.0).abs() < 1e-2, "p={p}");
            assert!((duty.off_secs() - (45.0 + f32::from(p) * 10.0)).abs() < 1e-2, "p={p}");
        }
        // Default p=2: 15 on / 65 off
        let duty = DutyCycle::pause_cycle(2);
        assert!((duty.cycle_secs - 80.0).abs() < 1e-3);
    }
}
