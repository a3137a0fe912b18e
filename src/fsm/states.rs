//! Concrete mode handler functions and table builder.
//!
//! Entry actions mirror the transition table in the service manual: which
//! relays energise, which duty cycle applies, what gets cleared.  Update
//! handlers run the per-tick rules — igniter safety, auger duty cycling,
//! and (in Hold / Keep Warm) the PID update gate.

use log::{error, info, warn};

use super::context::SmokerContext;
use super::{Mode, ModeDescriptor};
use crate::control::pid::{U_MAX, U_MIN};
use crate::error::SafetyFault;
use crate::relays::{DutyCycle, Relay};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static mode table.  Called once at startup.
pub fn build_mode_table() -> [ModeDescriptor; Mode::COUNT] {
    [
        // Index 0 — Idle
        ModeDescriptor {
            id: Mode::Idle,
            name: "Idle",
            on_enter: None,
            on_update: no_op_update,
        },
        // Index 1 — Start
        ModeDescriptor {
            id: Mode::Start,
            name: "Start",
            on_enter: Some(start_enter),
            on_update: burning_update,
        },
        // Index 2 — Smoke
        ModeDescriptor {
            id: Mode::Smoke,
            name: "Smoke",
            on_enter: Some(smoke_enter),
            on_update: burning_update,
        },
        // Index 3 — Hold
        ModeDescriptor {
            id: Mode::Hold,
            name: "Hold",
            on_enter: Some(hold_enter),
            on_update: hold_update,
        },
        // Index 4 — Keep Warm (legacy alias, behaves like Hold)
        ModeDescriptor {
            id: Mode::KeepWarm,
            name: "Keep Warm",
            on_enter: Some(hold_enter),
            on_update: hold_update,
        },
        // Index 5 — Shutdown
        ModeDescriptor {
            id: Mode::Shutdown,
            name: "Shutdown",
            on_enter: Some(shutdown_enter),
            on_update: shutdown_update,
        },
        // Index 6 — Off
        ModeDescriptor {
            id: Mode::Off,
            name: "Off",
            on_enter: Some(off_enter),
            on_update: no_op_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Entry actions
// ═══════════════════════════════════════════════════════════════════════════

fn start_enter(ctx: &mut SmokerContext) {
    ctx.state.power = true;
    ctx.relays.set(Relay::Fan, true, ctx.now_ms);
    ctx.relays.set(Relay::Auger, true, ctx.now_ms);
    ctx.relays.set(Relay::Igniter, true, ctx.now_ms);
    // Fixed lighting feed: 15 s on / 45 s off
    ctx.duty = DutyCycle::start();
    match ctx.state.temps.grill_target {
        Some(target) => ctx.pid.reset(target as f32, ctx.now_ms),
        None => warn!("START: no grill target set, PID reset deferred"),
    }
    info!("START: igniter lit, fixed feed engaged");
}

fn smoke_enter(ctx: &mut SmokerContext) {
    ctx.relays.set(Relay::Fan, true, ctx.now_ms);
    ctx.relays.set(Relay::Auger, true, ctx.now_ms);
    let p = ctx.config.p_setting;
    ctx.duty = DutyCycle::pause_cycle(p);
    info!(
        "SMOKE: p-setting {} -> {}s on / {}s off",
        p,
        ctx.duty.on_secs(),
        ctx.duty.off_secs()
    );
}

/// Shared by Hold and Keep Warm.
fn hold_enter(ctx: &mut SmokerContext) {
    ctx.relays.set(Relay::Fan, true, ctx.now_ms);
    ctx.relays.set(Relay::Auger, true, ctx.now_ms);
    // Maintenance feed until the first PID output lands
    ctx.duty = DutyCycle::hold(ctx.config.pid_update_period_secs);
    match ctx.state.temps.grill_target {
        Some(target) => info!("HOLD: {target}F under PID control"),
        None => info!("HOLD: no target set"),
    }
}

fn shutdown_enter(ctx: &mut SmokerContext) {
    ctx.state.power = false;
    ctx.restart_program_clock();
    ctx.relays.set(Relay::Fan, true, ctx.now_ms);
    ctx.relays.set(Relay::Auger, false, ctx.now_ms);
    ctx.relays.set(Relay::Igniter, false, ctx.now_ms);
    ctx.state.temps.grill_target = None;
    ctx.effects.clear_program = true;
    ctx.effects.delete_program = true;
    info!(
        "SHUTDOWN: fire out, fan run-on for {}s",
        ctx.config.shutdown_timeout_secs
    );
}

fn off_enter(ctx: &mut SmokerContext) {
    ctx.effects.patch_off = true;
    ctx.effects.exit = true;
    info!("OFF: clearing remote targets and powering down");
}

// ═══════════════════════════════════════════════════════════════════════════
//  Per-tick update handlers
// ═══════════════════════════════════════════════════════════════════════════

fn no_op_update(_ctx: &mut SmokerContext) -> Option<Mode> {
    None
}

/// Start and Smoke: igniter safety rule, then auger duty cycling.
fn burning_update(ctx: &mut SmokerContext) -> Option<Mode> {
    if let Some(next) = manage_igniter(ctx) {
        return Some(next);
    }
    ctx.relays.manage_auger(&ctx.duty, ctx.now_ms);
    None
}

/// Hold and Keep Warm: the burning rules plus the PID update gate.
fn hold_update(ctx: &mut SmokerContext) -> Option<Mode> {
    if let Some(next) = manage_igniter(ctx) {
        return Some(next);
    }
    ctx.relays.manage_auger(&ctx.duty, ctx.now_ms);
    update_duty_from_pid(ctx);
    None
}

fn shutdown_update(ctx: &mut SmokerContext) -> Option<Mode> {
    if ctx.secs_since_program_clock() > ctx.config.shutdown_timeout_secs {
        info!("shutdown timer expired, powering off");
        return Some(Mode::Off);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared rules
// ═══════════════════════════════════════════════════════════════════════════

/// Igniter safety rule, evaluated every tick while burning.
///
/// An igniter energised past the hard time limit is a safety fault: force
/// it off and shut the pit down — no retry.  Otherwise the igniter follows
/// the low-temperature threshold: on below it, off above it.  Threshold
/// comparison uses the most recent grill reading; with no reading, do
/// nothing this tick.
fn manage_igniter(ctx: &mut SmokerContext) -> Option<Mode> {
    let now = ctx.now_ms;
    let on = ctx.relays.is_on(Relay::Igniter);

    if on && ctx.relays.secs_since_toggle(Relay::Igniter, now) > ctx.config.igniter_timeout_secs {
        error!(
            "{}: igniter on for more than {}s, forcing shutdown",
            SafetyFault::IgniterOverrun,
            ctx.config.igniter_timeout_secs
        );
        ctx.relays.set(Relay::Igniter, false, now);
        return Some(Mode::Shutdown);
    }

    let threshold = ctx.config.igniter_threshold_f;
    match ctx.state.temps.grill_current {
        Some(grill) if !on && grill < threshold => {
            info!("enabling igniter: grill {grill}F < {threshold}F");
            ctx.relays.set(Relay::Igniter, true, now);
        }
        Some(grill) if on && grill > threshold => {
            info!("disabling igniter: grill {grill}F > {threshold}F");
            ctx.relays.set(Relay::Igniter, false, now);
        }
        _ => {}
    }
    None
}

/// Hold-mode PID gate: recompute the duty fraction once per update period
/// from the averaged grill temperature.
fn update_duty_from_pid(ctx: &mut SmokerContext) {
    let due = ctx.last_pid_update_ms.map_or(true, |last| {
        ctx.now_ms.saturating_sub(last) as f32 / 1000.0 > ctx.config.pid_update_period_secs
    });
    if !due {
        return;
    }
    let Some(average) = ctx.grill_avg else {
        return;
    };
    let u = ctx.pid.update(average, ctx.now_ms).clamp(U_MIN, U_MAX);
    log::debug!("updated u: {u}");
    ctx.duty.u = u;
    ctx.last_pid_update_ms = Some(ctx.now_ms);
}
