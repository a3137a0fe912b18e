//! Integration tests: SmokerService → mode machine → relays/sync.
//!
//! Everything runs against mock ports and a hand-cranked clock, driving
//! whole cook flows through the real per-tick orchestration.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use emberpit::app::events::AppEvent;
use emberpit::app::ports::{Clock, EventSink, RelayPort, SensorPort, SyncPort};
use emberpit::app::service::{SmokerService, TickOutcome};
use emberpit::config::SmokerConfig;
use emberpit::fsm::context::Temperatures;
use emberpit::fsm::Mode;
use emberpit::program::{ProgramStep, Trigger};
use emberpit::relays::Relay;
use emberpit::sensors::{FaultFlags, Reading};
use emberpit::sync::{HeartbeatReply, ProgramDoc, StateUpdateDoc};
use emberpit::{Error, SyncError};

// ── Mock implementations ──────────────────────────────────────

#[derive(Clone)]
struct FakeClock(Rc<Cell<u64>>);

impl FakeClock {
    fn new() -> Self {
        Self(Rc::new(Cell::new(0)))
    }

    fn advance_secs(&self, secs: f64) {
        self.0.set(self.0.get() + (secs * 1000.0) as u64);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

struct MockHw {
    grill: Option<i32>,
    probe: Option<i32>,
    probe_connected: bool,
    levels: [bool; Relay::COUNT],
}

impl MockHw {
    fn new() -> Self {
        Self {
            grill: Some(70),
            probe: None,
            probe_connected: false,
            levels: [false; Relay::COUNT],
        }
    }
}

impl SensorPort for MockHw {
    fn read_grill(&mut self) -> Reading {
        match self.grill {
            Some(f) => Reading::ok(f),
            None => Reading::absent(FaultFlags::NONE),
        }
    }

    fn read_probe(&mut self) -> Reading {
        match self.probe {
            Some(f) => Reading::ok(f),
            None => Reading::absent(FaultFlags::NONE),
        }
    }

    fn probe_connected(&self) -> bool {
        self.probe_connected
    }
}

impl RelayPort for MockHw {
    fn apply(&mut self, relay: Relay, on: bool) {
        self.levels[relay as usize] = on;
    }

    fn level(&self, relay: Relay) -> bool {
        self.levels[relay as usize]
    }
}

fn empty_reply() -> HeartbeatReply {
    HeartbeatReply {
        program: None,
        state: None,
    }
}

struct MockSync {
    boot_ok: bool,
    replies: VecDeque<Result<Option<HeartbeatReply>, SyncError>>,
    put_result: Result<bool, SyncError>,
    pending_id: Option<String>,
    pending_steps: Vec<ProgramStep>,
    boots: usize,
    heartbeats: usize,
    puts: usize,
    deletes: usize,
    patches: Vec<serde_json::Value>,
}

impl MockSync {
    fn new() -> Self {
        Self {
            boot_ok: true,
            replies: VecDeque::new(),
            put_result: Ok(true),
            pending_id: None,
            pending_steps: Vec::new(),
            boots: 0,
            heartbeats: 0,
            puts: 0,
            deletes: 0,
            patches: Vec::new(),
        }
    }

    fn queue_state(&mut self, state: StateUpdateDoc) {
        self.replies.push_back(Ok(Some(HeartbeatReply {
            program: None,
            state: Some(state),
        })));
    }

    fn queue_program(&mut self, program: ProgramDoc) {
        self.replies.push_back(Ok(Some(HeartbeatReply {
            program: Some(program),
            state: None,
        })));
    }
}

impl SyncPort for MockSync {
    fn post_boot(
        &mut self,
        _state: &emberpit::fsm::context::ControlState,
    ) -> Result<bool, SyncError> {
        self.boots += 1;
        Ok(self.boot_ok)
    }

    fn post_heartbeat(
        &mut self,
        _state: &emberpit::fsm::context::ControlState,
    ) -> Result<Option<HeartbeatReply>, SyncError> {
        self.heartbeats += 1;
        self.replies.pop_front().unwrap_or(Ok(Some(empty_reply())))
    }

    fn put_state(
        &mut self,
        _state: &emberpit::fsm::context::ControlState,
    ) -> Result<bool, SyncError> {
        self.puts += 1;
        self.put_result
    }

    fn patch_state(&mut self, patch: &serde_json::Value) -> Result<bool, SyncError> {
        self.patches.push(patch.clone());
        Ok(true)
    }

    fn fetch_program_id(&mut self) -> Result<Option<String>, SyncError> {
        Ok(self.pending_id.clone())
    }

    fn fetch_program(&mut self, id: &str) -> Result<Option<ProgramDoc>, SyncError> {
        Ok(Some(ProgramDoc {
            id: id.to_string(),
            steps: self.pending_steps.clone(),
        }))
    }

    fn delete_program(&mut self) -> Result<bool, SyncError> {
        self.deletes += 1;
        Ok(true)
    }
}

struct RecordingSink {
    events: Vec<AppEvent>,
}

impl RecordingSink {
    fn new() -> Self {
        Self { events: Vec::new() }
    }

    fn saw(&self, predicate: impl Fn(&AppEvent) -> bool) -> bool {
        self.events.iter().any(predicate)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn step(mode: Mode, target: i32, trigger: Trigger, limit: i64) -> ProgramStep {
    ProgramStep {
        mode,
        target_grill: target,
        trigger,
        limit,
    }
}

fn power_on() -> StateUpdateDoc {
    StateUpdateDoc {
        mode: Mode::Idle,
        power: true,
        temps: Temperatures::default(),
    }
}

struct Harness {
    service: SmokerService<FakeClock>,
    clock: FakeClock,
    hw: MockHw,
    sync: MockSync,
    sink: RecordingSink,
}

impl Harness {
    fn new() -> Self {
        let clock = FakeClock::new();
        Self {
            service: SmokerService::new(SmokerConfig::default(), clock.clone()),
            clock,
            hw: MockHw::new(),
            sync: MockSync::new(),
            sink: RecordingSink::new(),
        }
    }

    fn tick(&mut self) -> Result<TickOutcome, Error> {
        self.service
            .tick(&mut self.hw, &mut self.sync, &mut self.sink)
    }

    /// Advance the clock past the heartbeat gate and run one tick.
    fn tick_after_secs(&mut self, secs: f64) -> Result<TickOutcome, Error> {
        self.clock.advance_secs(secs);
        self.tick()
    }

    /// Boot, load the pending program, and return ready for ticking.
    fn boot(&mut self) {
        self.service.startup_read(&mut self.hw);
        assert!(self.service.post_boot(&mut self.sync).unwrap());
        assert_eq!(self.sync.boots, 1);
        self.service
            .load_pending_program(&mut self.sync, &mut self.sink)
            .unwrap();
    }
}

// ── Scenarios ─────────────────────────────────────────────────

#[test]
fn full_cook_program_runs_to_power_off() {
    let mut h = Harness::new();
    h.hw.probe_connected = true;
    h.hw.probe = Some(60);
    h.sync.pending_id = Some("brisket".into());
    h.sync.pending_steps = vec![
        step(Mode::Start, 225, Trigger::Time, 60),
        step(Mode::Hold, 225, Trigger::Temp, 165),
    ];

    h.boot();
    assert!(h.service.program_loaded());
    assert_eq!(h.service.mode(), Mode::Idle);
    assert!(!h.service.state().power);

    // Remote powers on program control: step 0 (Start) applies.
    h.sync.queue_state(power_on());
    h.tick().unwrap();
    assert_eq!(h.service.mode(), Mode::Start);
    assert!(h.service.state().power);
    assert_eq!(h.service.state().temps.grill_target, Some(225));
    assert!(h.service.relay_on(Relay::Fan));
    assert!(h.service.relay_on(Relay::Auger));
    assert!(h.service.relay_on(Relay::Igniter));
    // Entry actions pushed the full state
    assert!(h.sync.puts >= 1);
    // Relay levels reached the wires
    assert!(h.hw.level(Relay::Fan));

    // 61 s later the Time trigger fires: step 1 (Hold) applies.
    h.tick_after_secs(61.0).unwrap();
    assert_eq!(h.service.mode(), Mode::Hold);
    assert_eq!(h.service.state().temps.probe_target, Some(165));
    assert!((0.15..=1.0).contains(&h.service.duty_u()));
    assert!(h
        .sink
        .saw(|e| matches!(e, AppEvent::ProgramAdvanced { index: 1 })));

    // Probe passes the limit: last step done, Shutdown.
    h.hw.probe = Some(170);
    h.tick_after_secs(11.0).unwrap();
    assert_eq!(h.service.mode(), Mode::Shutdown);
    assert!(h.service.relay_on(Relay::Fan));
    assert!(!h.service.relay_on(Relay::Auger));
    assert!(!h.service.relay_on(Relay::Igniter));
    assert!(!h.service.program_loaded());
    assert_eq!(h.sync.deletes, 1);
    assert_eq!(h.service.state().temps.grill_target, None);

    // Fan run-on expires: Off, remote targets patched, clean exit.
    let outcome = h.tick_after_secs(601.0).unwrap();
    assert_eq!(outcome, TickOutcome::PowerOff);
    assert_eq!(h.service.mode(), Mode::Off);
    let patch = h.sync.patches.last().unwrap();
    assert_eq!(patch["mode"], "Off");
    assert!(patch["temps"]["grillTarget"].is_null());
}

#[test]
fn heartbeat_transport_failure_is_transient() {
    let mut h = Harness::new();
    h.boot();
    assert!(h.service.state().online);

    h.sync.replies.push_back(Err(SyncError::new("heartbeat")));
    let outcome = h.tick().unwrap();
    assert_eq!(outcome, TickOutcome::Continue);
    assert!(!h.service.state().online);
    assert!(h
        .sink
        .saw(|e| matches!(e, AppEvent::Connectivity { online: false })));

    // Next heartbeat succeeds and recovers connectivity.
    h.tick_after_secs(11.0).unwrap();
    assert_eq!(h.sync.heartbeats, 2);
    assert!(h.service.state().online);
    assert!(h
        .sink
        .saw(|e| matches!(e, AppEvent::Connectivity { online: true })));
}

#[test]
fn put_state_transport_failure_is_fatal() {
    let mut h = Harness::new();
    h.boot();

    // A remote mode change forces a full state push, which fails.
    h.sync.put_result = Err(SyncError::new("put-state"));
    h.sync.queue_state(StateUpdateDoc {
        mode: Mode::Hold,
        power: false,
        temps: Temperatures {
            grill_target: Some(250),
            ..Default::default()
        },
    });
    let err = h.tick().unwrap_err();
    assert!(matches!(err, Error::Sync(_)));
}

#[test]
fn temp_step_without_probe_rejects_program() {
    let mut h = Harness::new();
    h.hw.probe_connected = false;
    h.sync.pending_id = Some("ribs".into());
    h.sync.pending_steps = vec![step(Mode::Hold, 225, Trigger::Temp, 190)];

    h.boot();
    h.sync.queue_state(power_on());
    h.tick().unwrap();

    assert!(!h.service.state().power);
    assert!(!h.service.program_loaded());
    assert_eq!(h.service.mode(), Mode::Idle);
    assert!(h.sync.patches.iter().any(|p| p["power"] == false));
    assert!(h
        .sink
        .saw(|e| matches!(e, AppEvent::ProgramRejected { .. })));
}

#[test]
fn power_on_without_program_is_rejected() {
    let mut h = Harness::new();
    h.boot();
    assert!(!h.service.program_loaded());

    h.sync.queue_state(power_on());
    h.tick().unwrap();

    assert!(!h.service.state().power);
    assert!(h.sync.patches.iter().any(|p| p["power"] == false));
}

#[test]
fn suspending_power_keeps_steps() {
    let mut h = Harness::new();
    h.sync.pending_id = Some("pork".into());
    h.sync.pending_steps = vec![step(Mode::Start, 225, Trigger::Time, 600)];
    h.boot();

    h.sync.queue_state(power_on());
    h.tick().unwrap();
    assert_eq!(h.service.mode(), Mode::Start);

    h.sync.queue_state(StateUpdateDoc {
        mode: Mode::Start,
        power: false,
        temps: Temperatures {
            grill_target: Some(225),
            ..Default::default()
        },
    });
    h.tick_after_secs(11.0).unwrap();

    assert!(!h.service.state().power);
    assert!(h.service.program_loaded());
    assert!(h.sink.saw(|e| matches!(e, AppEvent::ProgramSuspended)));

    // Suspended: the Time trigger no longer advances the program.
    h.tick_after_secs(700.0).unwrap();
    assert_eq!(h.service.mode(), Mode::Start);
}

#[test]
fn null_grill_target_for_active_mode_is_rejected() {
    let mut h = Harness::new();
    h.boot();

    h.sync.queue_state(StateUpdateDoc {
        mode: Mode::Hold,
        power: false,
        temps: Temperatures::default(),
    });
    h.tick().unwrap();

    // No target to adopt and none held: the mode change is refused.
    assert_eq!(h.service.mode(), Mode::Idle);
    assert_eq!(h.service.state().temps.grill_target, None);
}

#[test]
fn new_program_skips_start_step_when_already_burning() {
    let mut h = Harness::new();
    h.sync.pending_id = Some("warmup".into());
    h.sync.pending_steps = vec![step(Mode::Smoke, 180, Trigger::Time, 7200)];
    h.boot();
    h.sync.queue_state(power_on());
    h.tick().unwrap();
    assert_eq!(h.service.mode(), Mode::Smoke);

    // A new program arrives leading with Start: index 0 is skipped.
    h.sync.queue_program(ProgramDoc {
        id: "dinner".into(),
        steps: vec![
            step(Mode::Start, 225, Trigger::Time, 600),
            step(Mode::Hold, 275, Trigger::Time, 3600),
        ],
    });
    h.tick_after_secs(11.0).unwrap();

    assert_eq!(h.service.mode(), Mode::Hold);
    assert_eq!(h.service.state().temps.grill_target, Some(275));
}

#[test]
fn identical_program_id_is_ignored() {
    let mut h = Harness::new();
    h.sync.pending_id = Some("same".into());
    h.sync.pending_steps = vec![
        step(Mode::Start, 225, Trigger::Time, 600),
        step(Mode::Hold, 225, Trigger::Time, 3600),
    ];
    h.boot();
    h.sync.queue_state(power_on());
    h.tick().unwrap();
    assert_eq!(h.service.mode(), Mode::Start);

    // Same id pushed again: nothing restarts.
    h.sync.queue_program(ProgramDoc {
        id: "same".into(),
        steps: vec![step(Mode::Hold, 300, Trigger::Time, 60)],
    });
    h.tick_after_secs(11.0).unwrap();
    assert_eq!(h.service.mode(), Mode::Start);
    assert_eq!(h.service.state().temps.grill_target, Some(225));
}

#[test]
fn igniter_overrun_shuts_down_through_service() {
    let mut h = Harness::new();
    h.hw.grill = Some(80); // pit never lights, igniter stays engaged
    h.sync.pending_id = Some("cold".into());
    h.sync.pending_steps = vec![step(Mode::Start, 225, Trigger::Time, 100_000)];
    h.boot();
    h.sync.queue_state(power_on());
    h.tick().unwrap();
    assert!(h.service.relay_on(Relay::Igniter));

    let outcome = h.tick_after_secs(15.0 * 60.0 + 1.0).unwrap();
    assert_eq!(outcome, TickOutcome::Continue);
    assert_eq!(h.service.mode(), Mode::Shutdown);
    assert!(!h.service.relay_on(Relay::Igniter));
    assert!(!h.hw.level(Relay::Igniter));
    assert!(h.sink.saw(|e| matches!(e, AppEvent::SafetyShutdown)));
    assert_eq!(h.sync.deletes, 1);
}

#[test]
fn grill_average_covers_the_last_six_readings() {
    let mut h = Harness::new();
    h.hw.grill = Some(100);
    h.boot(); // seeds the history with 100

    // Seven more reads at the heartbeat cadence; only the last six count.
    for i in 1..=7 {
        h.hw.grill = Some(100 + i * 10);
        h.tick_after_secs(11.0).unwrap();
    }
    // Window is now [120, 130, 140, 150, 160, 170] -> mean 145
    let avg = h.service.grill_average().unwrap();
    assert!((avg - 145.0).abs() < 1e-3, "got {avg}");
    assert_eq!(h.service.state().temps.grill_current, Some(170));
}

#[test]
fn absent_grill_reading_keeps_prior_average() {
    let mut h = Harness::new();
    h.hw.grill = Some(200);
    h.boot();
    let before = h.service.grill_average().unwrap();

    // Sensor fault: reading goes absent, the loop keeps running on the
    // prior average and the state reports no current temperature.
    h.hw.grill = None;
    h.tick_after_secs(11.0).unwrap();
    assert_eq!(h.service.state().temps.grill_current, None);
    assert_eq!(h.service.grill_average(), Some(before));
}

#[test]
fn remote_off_with_power_down_exits() {
    let mut h = Harness::new();
    h.boot();

    h.sync.queue_state(StateUpdateDoc {
        mode: Mode::Off,
        power: false,
        temps: Temperatures::default(),
    });
    // Off needs no target: the mode change lands, patches the cleared
    // targets, and requests the clean exit.
    let outcome = h.tick().unwrap();
    assert_eq!(outcome, TickOutcome::PowerOff);
    assert_eq!(h.service.mode(), Mode::Off);
    assert!(h.sync.patches.iter().any(|p| p["mode"] == "Off"));
}
