//! Smoker service — the hexagonal core.
//!
//! [`SmokerService`] owns the mode machine, program sequencer, and shared
//! context, and sequences one control tick:
//!
//! ```text
//!   read sensors ─▶ program limits ─▶ heartbeat ─▶ mode actions ─▶ flush
//! ```
//!
//! strictly in that order, synchronously, once per 250 ms tick.  All I/O
//! flows through port traits injected at call sites, making the entire
//! service testable with mock adapters.
//!
//! ```text
//!   SensorPort ──▶ ┌─────────────────────────────┐ ──▶ EventSink
//!                  │        SmokerService        │
//!    RelayPort ◀── │  modes · PID · sequencer    │ ◀─▶ SyncPort
//!                  └─────────────────────────────┘
//! ```

use heapless::HistoryBuffer;
use log::{error, info, warn};
use serde_json::json;

use crate::config::SmokerConfig;
use crate::error::{Error, Result};
use crate::fsm::context::{ControlState, SmokerContext};
use crate::fsm::states::build_mode_table;
use crate::fsm::{Mode, ModeMachine};
use crate::program::{AdvanceOutcome, ProgramSequencer, Trigger};
use crate::relays::Relay;
use crate::sync::{ProgramDoc, StateUpdateDoc};

use super::events::{AppEvent, TelemetryData};
use super::ports::{Clock, EventSink, RelayPort, SensorPort, SyncPort};

/// Readings averaged for the PID input (one per heartbeat period ≈ a
/// one-minute window).
const GRILL_HISTORY_LEN: usize = 6;

/// What the supervising loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sleep until the next tick.
    Continue,
    /// Off was entered and the remote targets are cleared: exit cleanly.
    PowerOff,
}

// ───────────────────────────────────────────────────────────────
// SmokerService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct SmokerService<C: Clock> {
    machine: ModeMachine,
    ctx: SmokerContext,
    sequencer: ProgramSequencer,
    clock: C,
    /// Recent grill readings; their mean feeds the PID.
    history: HistoryBuffer<i32, GRILL_HISTORY_LEN>,
    last_heartbeat_ms: Option<u64>,
}

impl<C: Clock> SmokerService<C> {
    /// Construct the service with boot defaults (Idle, everything off).
    pub fn new(config: SmokerConfig, clock: C) -> Self {
        let now_ms = clock.now_ms();
        Self {
            machine: ModeMachine::new(build_mode_table(), Mode::Idle),
            ctx: SmokerContext::new(config, now_ms),
            sequencer: ProgramSequencer::new(),
            clock,
            history: HistoryBuffer::new(),
            last_heartbeat_ms: None,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// The authoritative controller state.
    pub fn state(&self) -> &ControlState {
        &self.ctx.state
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.ctx.state.mode
    }

    /// Active auger duty fraction.
    pub fn duty_u(&self) -> f32 {
        self.ctx.duty.u
    }

    /// Commanded level of a relay.
    pub fn relay_on(&self, relay: Relay) -> bool {
        self.ctx.relays.is_on(relay)
    }

    /// Whether a program is installed.
    pub fn program_loaded(&self) -> bool {
        self.sequencer.is_loaded()
    }

    /// Mean of the recent grill readings (the PID input).
    pub fn grill_average(&self) -> Option<f32> {
        self.ctx.grill_avg
    }

    // ── Startup ───────────────────────────────────────────────

    /// First sensor acquisition: seeds the grill reading and latches the
    /// probe-connected flag before the boot announcement goes out.
    pub fn startup_read(&mut self, hw: &mut impl SensorPort) {
        self.ctx.now_ms = self.clock.now_ms();
        let grill = hw.read_grill();
        self.ctx.state.temps.grill_current = grill.fahrenheit;
        if let Some(f) = grill.fahrenheit {
            self.history.write(f);
        }
        self.update_grill_average();
        let probe = hw.read_probe();
        self.ctx.state.temps.probe_current = probe.fahrenheit;
        self.ctx.state.probe_connected = hw.probe_connected();
        info!(
            "startup: grill {:?}F, probe {:?}F (probe connected: {})",
            self.ctx.state.temps.grill_current,
            self.ctx.state.temps.probe_current,
            self.ctx.state.probe_connected
        );
    }

    /// One boot-announcement attempt.  `Ok(true)` once the sync service
    /// acknowledges; the supervising loop retries on `Ok(false)`.
    /// Transport failure here is fatal — the controller cannot establish
    /// authoritative state.
    pub fn post_boot(&mut self, sync: &mut impl SyncPort) -> Result<bool> {
        self.ctx.state.online = true;
        match sync.post_boot(&self.ctx.state) {
            Err(e) => {
                error!("boot announcement failed: {e}");
                Err(e.into())
            }
            Ok(true) => {
                info!("boot acknowledged by sync service");
                Ok(true)
            }
            Ok(false) => {
                error!("sync service offline, will retry boot");
                self.ctx.state.online = false;
                Ok(false)
            }
        }
    }

    /// Startup program query: if the service holds a pending program,
    /// install it at step 0 (it is applied only once power is commanded).
    pub fn load_pending_program(
        &mut self,
        sync: &mut impl SyncPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let Some(id) = sync.fetch_program_id().map_err(Error::from)? else {
            info!("no pending program");
            return Ok(());
        };
        info!("found pending program '{id}'");
        match sync.fetch_program(&id).map_err(Error::from)? {
            Some(program) => {
                sink.emit(&AppEvent::ProgramLoaded {
                    id: program.id.clone(),
                    steps: program.steps.len(),
                });
                self.sequencer.load(program.id, program.steps, 0);
            }
            None => error!("no program found for id '{id}'"),
        }
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`RelayPort`] — this avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + RelayPort),
        sync: &mut impl SyncPort,
        sink: &mut impl EventSink,
    ) -> Result<TickOutcome> {
        self.ctx.now_ms = self.clock.now_ms();

        // 1. Sensors (gated to the heartbeat period)
        self.read_sensors(hw);

        // 2. Program step limits (may advance the sequencer)
        self.monitor_limits(sync, sink)?;

        // 3. Heartbeat exchange (may alter mode/targets/program)
        self.heartbeat(sync, sink)?;

        // 4. Mode actions (igniter safety, auger duty, PID gate)
        let before = self.machine.current_mode();
        self.machine.tick(&mut self.ctx);
        let after = self.machine.current_mode();
        if after != before {
            // The only self-transitions are the igniter overrun (-> Shutdown)
            // and the shutdown timer (-> Off).
            if after == Mode::Shutdown {
                sink.emit(&AppEvent::SafetyShutdown);
            }
            sink.emit(&AppEvent::ModeChanged {
                from: before,
                to: after,
            });
        }

        // 5. Move commanded levels onto the wires
        self.flush_relays(hw);

        // 6. Requested sync I/O, then the exit decision
        self.drain_effects(sync)
    }

    // ── Sensor acquisition ────────────────────────────────────

    /// Read both sensors when no grill reading exists yet or a heartbeat
    /// period has elapsed — not every tick.
    fn read_sensors(&mut self, hw: &mut impl SensorPort) {
        let due = self.ctx.state.temps.grill_current.is_none()
            || self.heartbeat_due();
        if !due {
            return;
        }

        let grill = hw.read_grill();
        self.ctx.state.temps.grill_current = grill.fahrenheit;
        if let Some(f) = grill.fahrenheit {
            self.history.write(f);
        } else {
            warn!("grill reading absent (faults {})", grill.faults);
        }
        self.update_grill_average();

        let probe = hw.read_probe();
        self.ctx.state.temps.probe_current = probe.fahrenheit;
        self.ctx.state.probe_connected = hw.probe_connected();
    }

    fn update_grill_average(&mut self) {
        let len = self.history.len();
        if len > 0 {
            let sum: i32 = self.history.oldest_ordered().copied().sum();
            self.ctx.grill_avg = Some(sum as f32 / len as f32);
        }
    }

    // ── Program limit monitoring ──────────────────────────────

    /// While power is on and a program is active, check the current step's
    /// completion trigger and advance on fire.
    fn monitor_limits(&mut self, sync: &mut impl SyncPort, sink: &mut impl EventSink) -> Result<()> {
        if !(self.ctx.state.power && self.sequencer.is_loaded()) {
            return Ok(());
        }
        let elapsed = self.ctx.secs_since_program_clock();
        let probe = self.ctx.state.temps.probe_current;
        if self.sequencer.limit_reached(elapsed, probe) {
            self.advance_program(sync, sink)?;
        }
        Ok(())
    }

    fn advance_program(&mut self, sync: &mut impl SyncPort, sink: &mut impl EventSink) -> Result<()> {
        match self.sequencer.advance() {
            AdvanceOutcome::Next => {
                if let Some(index) = self.sequencer.index() {
                    sink.emit(&AppEvent::ProgramAdvanced { index });
                }
                self.apply_current_step(sync, sink)
            }
            AdvanceOutcome::Finished => {
                self.set_mode(Mode::Shutdown, sink);
                Ok(())
            }
            AdvanceOutcome::Invalid => {
                error!("invalid program index, exiting");
                Err(Error::Internal("program index out of range"))
            }
        }
    }

    /// Push the current step's targets into the control state and PID, then
    /// transition to the step's mode and restart the program clock.
    fn apply_current_step(&mut self, sync: &mut impl SyncPort, sink: &mut impl EventSink) -> Result<()> {
        let Some(step) = self.sequencer.current().cloned() else {
            // Power was dropped or the steps vanished underneath us; prefer
            // a safe shutdown over running without program control.
            warn!("no program step to apply, disabling program control");
            self.ctx.state.power = false;
            self.sequencer.clear();
            self.ctx.state.temps.probe_target = None;
            if !matches!(self.ctx.state.mode, Mode::Shutdown | Mode::Off) {
                self.set_mode(Mode::Shutdown, sink);
            }
            self.ctx.restart_program_clock();
            return Ok(());
        };

        // A probe-triggered step cannot complete without a probe reading.
        if step.trigger == Trigger::Temp && !self.ctx.state.probe_connected {
            info!("no probe connected, rejecting program with temp limit");
            sink.emit(&AppEvent::ProgramRejected {
                reason: "temp-triggered step without probe",
            });
            self.ctx.state.power = false;
            self.sequencer.clear();
            self.ctx.state.temps.probe_target = None;
            self.ctx.restart_program_clock();
            return self.patch_power_off(sync);
        }

        info!(
            "applying step {:?}: {} at {}F ({:?} limit {})",
            self.sequencer.index(),
            step.mode,
            step.target_grill,
            step.trigger,
            step.limit
        );
        self.ctx.state.temps.grill_target = Some(step.target_grill);
        self.ctx.state.temps.probe_target = match step.trigger {
            Trigger::Temp => Some(step.limit as i32),
            Trigger::Time => None,
        };
        self.ctx.pid.set_target(step.target_grill as f32, self.ctx.now_ms);
        self.set_mode(step.mode, sink);
        self.ctx.restart_program_clock();
        Ok(())
    }

    // ── Heartbeat ─────────────────────────────────────────────

    fn heartbeat_due(&self) -> bool {
        self.last_heartbeat_ms.map_or(true, |last| {
            self.ctx.now_ms.saturating_sub(last) as f32 / 1000.0
                > self.ctx.config.heartbeat_period_secs
        })
    }

    /// Post the periodic heartbeat and apply whatever the service sent
    /// back.  Transport failure is the one *transient* sync error: mark
    /// offline and retry next period.
    fn heartbeat(&mut self, sync: &mut impl SyncPort, sink: &mut impl EventSink) -> Result<()> {
        if !self.heartbeat_due() {
            return Ok(());
        }
        self.last_heartbeat_ms = Some(self.ctx.now_ms);

        match sync.post_heartbeat(&self.ctx.state) {
            Err(e) => {
                error!("heartbeat failed: {e}");
                self.set_online(false, sink);
                Ok(())
            }
            Ok(None) => {
                error!("sync service rejected heartbeat");
                Ok(())
            }
            Ok(Some(reply)) => {
                self.set_online(true, sink);
                sink.emit(&AppEvent::Telemetry(self.telemetry()));
                if let Some(program) = reply.program {
                    self.handle_program_update(program, sync, sink)?;
                }
                if let Some(state) = reply.state {
                    self.handle_state_update(state, sync, sink)?;
                }
                Ok(())
            }
        }
    }

    fn set_online(&mut self, online: bool, sink: &mut impl EventSink) {
        if self.ctx.state.online != online {
            self.ctx.state.online = online;
            sink.emit(&AppEvent::Connectivity { online });
        }
    }

    // ── Heartbeat reply handlers ──────────────────────────────

    /// A pushed program replaces the current one unless the id matches.
    /// When the pit is already burning and the new program leads with a
    /// Start step, begin at step 1 instead.
    fn handle_program_update(
        &mut self,
        program: ProgramDoc,
        sync: &mut impl SyncPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        if self.sequencer.id() == Some(program.id.as_str()) {
            info!("new program matches existing program, ignoring");
            return Ok(());
        }
        info!("program update: '{}' ({} steps)", program.id, program.steps.len());

        let warmed_up = self.ctx.state.power
            && matches!(self.ctx.state.mode, Mode::Smoke | Mode::Hold);
        let leads_with_start = program.steps.first().map(|s| s.mode) == Some(Mode::Start);
        let start_index = if warmed_up && leads_with_start && program.steps.len() > 1 {
            info!("skipping Start step, pit is already warmed up");
            1
        } else {
            0
        };

        sink.emit(&AppEvent::ProgramLoaded {
            id: program.id.clone(),
            steps: program.steps.len(),
        });
        self.sequencer.load(program.id, program.steps, start_index);

        if self.ctx.state.power {
            self.apply_current_step(sync, sink)?;
        }
        Ok(())
    }

    /// Evaluate a remote state document field by field, conservatively
    /// rejecting inconsistent pieces (a null target for an active mode)
    /// rather than acting on them.
    fn handle_state_update(
        &mut self,
        update: StateUpdateDoc,
        sync: &mut impl SyncPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        info!("state update from sync service: {update:?}");

        if update.mode != self.ctx.state.mode {
            info!("mode {} -> {} (remote)", self.ctx.state.mode, update.mode);
            match update.temps.grill_target {
                Some(target) => {
                    self.ctx.state.temps.grill_target = Some(target);
                    self.ctx.pid.set_target(target as f32, self.ctx.now_ms);
                    self.set_mode(update.mode, sink);
                }
                None if update.mode.requires_target()
                    && self.ctx.state.temps.grill_target.is_none() =>
                {
                    error!(
                        "invalid grillTarget (none) for mode {}, rejecting mode change",
                        update.mode
                    );
                }
                None => self.set_mode(update.mode, sink),
            }
        }

        if update.temps.grill_target != self.ctx.state.temps.grill_target {
            match update.temps.grill_target {
                Some(target) => {
                    info!(
                        "grillTarget {:?} -> {target}",
                        self.ctx.state.temps.grill_target
                    );
                    self.ctx.state.temps.grill_target = Some(target);
                    self.ctx.pid.set_target(target as f32, self.ctx.now_ms);
                }
                None if self.ctx.state.mode.requires_target() => {
                    error!(
                        "invalid grillTarget (none) for mode {}, keeping current target",
                        self.ctx.state.mode
                    );
                }
                None => self.ctx.state.temps.grill_target = None,
            }
        }

        if update.temps.probe_target != self.ctx.state.temps.probe_target {
            info!(
                "probeTarget {:?} -> {:?}",
                self.ctx.state.temps.probe_target, update.temps.probe_target
            );
            self.ctx.state.temps.probe_target = update.temps.probe_target;
        }

        if update.power != self.ctx.state.power {
            info!("power {} -> {}", self.ctx.state.power, update.power);
            if update.power && !self.sequencer.is_loaded() {
                info!("no program exists, rejecting program control");
                sink.emit(&AppEvent::ProgramRejected {
                    reason: "power on without a program",
                });
                self.ctx.state.power = false;
                self.patch_power_off(sync)?;
            } else if !update.power && update.mode == Mode::Off {
                info!("program stopped and mode Off, shutting down smoker");
                self.ctx.state.power = false;
                self.ctx.effects.exit = true;
            } else if !update.power {
                info!("suspending program control");
                sink.emit(&AppEvent::ProgramSuspended);
                self.ctx.state.power = false;
                self.ctx.restart_program_clock();
            } else {
                self.ctx.state.power = true;
                self.apply_current_step(sync, sink)?;
            }
        }
        Ok(())
    }

    // ── Mode + I/O plumbing ───────────────────────────────────

    fn set_mode(&mut self, mode: Mode, sink: &mut impl EventSink) {
        let from = self.machine.current_mode();
        self.machine.set_mode(mode, &mut self.ctx);
        sink.emit(&AppEvent::ModeChanged { from, to: mode });
    }

    /// PATCH `{"power": false}` after rejecting program control.
    fn patch_power_off(&mut self, sync: &mut impl SyncPort) -> Result<()> {
        match sync.patch_state(&json!({ "power": false })) {
            Err(e) => {
                error!("failed to patch state: {e}");
                Err(e.into())
            }
            Ok(false) => {
                error!("sync service rejected power patch");
                Ok(())
            }
            Ok(true) => Ok(()),
        }
    }

    /// Move commanded relay levels onto the wires, verifying read-back.
    fn flush_relays(&self, hw: &mut impl RelayPort) {
        for relay in [Relay::Auger, Relay::Fan, Relay::Igniter] {
            let on = self.ctx.relays.is_on(relay);
            hw.apply(relay, on);
            if hw.level(relay) != on {
                error!("{} line readback mismatch (commanded {on})", relay.name());
            }
        }
    }

    /// Drain the side effects the mode handlers requested, in order:
    /// local program clear, remote program delete, full state push, the
    /// Off-mode patch, and finally the exit decision.
    fn drain_effects(&mut self, sync: &mut impl SyncPort) -> Result<TickOutcome> {
        let effects = core::mem::take(&mut self.ctx.effects);

        if effects.clear_program {
            self.sequencer.clear();
        }

        if effects.delete_program {
            match sync.delete_program() {
                Err(e) => {
                    error!("failed to delete program: {e}");
                    return Err(e.into());
                }
                Ok(false) => error!("sync service rejected program delete"),
                Ok(true) => info!("remote program deleted"),
            }
        }

        if effects.push_state {
            match sync.put_state(&self.ctx.state) {
                Err(e) => {
                    error!("failed to push state: {e}");
                    return Err(e.into());
                }
                Ok(false) => error!("sync service rejected state push"),
                Ok(true) => {}
            }
        }

        if effects.patch_off {
            let patch = json!({
                "mode": "Off",
                "temps": { "grillTarget": null, "probeTarget": null },
            });
            match sync.patch_state(&patch) {
                Err(e) => {
                    error!("failed to patch state: {e}");
                    return Err(e.into());
                }
                Ok(false) => error!("sync service rejected Off patch"),
                Ok(true) => {}
            }
        }

        if effects.exit {
            info!("restarting smoker...");
            return Ok(TickOutcome::PowerOff);
        }
        Ok(TickOutcome::Continue)
    }

    fn telemetry(&self) -> TelemetryData {
        TelemetryData {
            mode: self.ctx.state.mode,
            grill_current: self.ctx.state.temps.grill_current,
            grill_target: self.ctx.state.temps.grill_target,
            probe_current: self.ctx.state.temps.probe_current,
            probe_target: self.ctx.state.temps.probe_target,
            duty_u: self.ctx.duty.u,
            auger_on: self.ctx.relays.is_on(Relay::Auger),
            fan_on: self.ctx.relays.is_on(Relay::Fan),
            igniter_on: self.ctx.relays.is_on(Relay::Igniter),
            power: self.ctx.state.power,
            online: self.ctx.state.online,
        }
    }
}
