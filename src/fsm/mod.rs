//! Table-driven mode state machine.
//!
//! Classic embedded FSM pattern: each mode is a table row of plain `fn`
//! pointers — no closures, no dynamic dispatch.
//!
//! ```text
//!                    ┌──────[program step / remote]──────┐
//!                    ▼                                   │
//!  IDLE ──▶ START ──▶ SMOKE ◀──▶ HOLD (≈ KEEP WARM) ─────┤
//!    │         │         │          │                    │
//!    │   [igniter overrun / last step done / remote]     │
//!    │         ▼         ▼          ▼                    │
//!    └──────▶ SHUTDOWN (fan run-on) ◀────────────────────┘
//!                    │
//!              [10 min elapsed]
//!                    ▼
//!                   OFF (process exit)
//! ```
//!
//! Each tick the engine calls `on_update` for the current mode; a returned
//! `Some(next)` triggers the transition (entry actions, then a full state
//! push to the sync service).  External commands — program steps, remote
//! state updates — transition through [`ModeMachine::set_mode`], which runs
//! the same entry path.  All handlers receive `&mut SmokerContext`, the
//! blackboard holding control state, relay bank, PID, and timers.

pub mod context;
pub mod states;

use context::SmokerContext;
use log::info;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Operating modes.  Serialized names are the sync-service wire names.
/// Must stay in sync with the table built in [`states::build_mode_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    /// Initial mode after boot: everything off, waiting for a program.
    Idle = 0,
    /// Lighting the fire: igniter + fixed feed until the pit warms.
    Start = 1,
    /// Low-and-slow feed from the pause setting; maximum smoke.
    Smoke = 2,
    /// Closed-loop temperature hold under PID control.
    Hold = 3,
    /// Legacy alias for Hold kept for wire compatibility.
    #[serde(rename = "Keep Warm")]
    KeepWarm = 4,
    /// Fire out, fan running down the pit.
    Shutdown = 5,
    /// Terminal: clears remote targets, then the process exits.
    Off = 6,
}

impl Mode {
    /// Total number of modes — used to size the table array.
    pub const COUNT: usize = 7;

    /// Convert a `usize` index back to `Mode`.  Panics on out-of-range in
    /// debug builds; returns `Shutdown` in release (safe fallback).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Start,
            2 => Self::Smoke,
            3 => Self::Hold,
            4 => Self::KeepWarm,
            5 => Self::Shutdown,
            6 => Self::Off,
            _ => {
                debug_assert!(false, "invalid mode index: {idx}");
                Self::Shutdown
            }
        }
    }

    /// Wire / log name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Start => "Start",
            Self::Smoke => "Smoke",
            Self::Hold => "Hold",
            Self::KeepWarm => "Keep Warm",
            Self::Shutdown => "Shutdown",
            Self::Off => "Off",
        }
    }

    /// Modes that must carry a grill target.
    pub fn requires_target(self) -> bool {
        !matches!(self, Self::Idle | Self::Off | Self::Shutdown)
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for mode entry actions.  Runs exactly once per transition.
pub type ModeActionFn = fn(&mut SmokerContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type ModeUpdateFn = fn(&mut SmokerContext) -> Option<Mode>;

// ---------------------------------------------------------------------------
// Mode descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single mode.  Stored in a fixed-size array —
/// no heap, no `dyn`.
pub struct ModeDescriptor {
    pub id: Mode,
    pub name: &'static str,
    pub on_enter: Option<ModeActionFn>,
    pub on_update: ModeUpdateFn,
}

// ---------------------------------------------------------------------------
// Mode machine engine
// ---------------------------------------------------------------------------

/// The mode state machine engine.
///
/// Owns the mode table; the mutable [`SmokerContext`] is threaded through
/// every handler call by the service.
pub struct ModeMachine {
    /// Fixed-size table indexed by `Mode as usize`.
    table: [ModeDescriptor; Mode::COUNT],
    /// Index of the currently active mode.
    current: usize,
}

impl ModeMachine {
    /// Construct a machine with the given table, starting in `initial`
    /// without running entry actions (Idle has none).
    pub fn new(table: [ModeDescriptor; Mode::COUNT], initial: Mode) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// The current mode.
    pub fn current_mode(&self) -> Mode {
        Mode::from_index(self.current)
    }

    /// Advance by one tick: run the current mode's `on_update`, and execute
    /// any transition it requests.
    pub fn tick(&mut self, ctx: &mut SmokerContext) {
        if let Some(next) = (self.table[self.current].on_update)(ctx) {
            self.transition(next, ctx);
        }
    }

    /// Transition on external command (program step, remote update).
    ///
    /// Runs unconditionally — re-entering the current mode re-applies its
    /// entry actions, which is what re-applying a program step relies on.
    pub fn set_mode(&mut self, next: Mode, ctx: &mut SmokerContext) {
        self.transition(next, ctx);
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: Mode, ctx: &mut SmokerContext) {
        let next_idx = next as usize;
        info!(
            "mode: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        self.current = next_idx;
        ctx.state.mode = next;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }

        // Every transition pushes the full state to the sync service —
        // except Off, whose entry schedules a patch and process exit instead.
        if !ctx.effects.exit {
            ctx.effects.push_state = true;
        }
    }
}
