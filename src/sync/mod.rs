//! Sync-service wire documents.
//!
//! JSON bodies exchanged with the remote coordination service.  Field names
//! and mode strings are fixed by the service's schema; temperatures always
//! nest under `temps`.
//!
//! Outbound state appears in two framings: the boot/heartbeat body strips
//! null temperature entries, while the full-replacement PUT serializes them
//! explicitly (the service treats a PUT as the complete document).

#[cfg(target_os = "espidf")]
pub mod http;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::fsm::context::ControlState;
use crate::program::ProgramStep;

// ───────────────────────────────────────────────────────────────
// Outbound
// ───────────────────────────────────────────────────────────────

/// Boot/heartbeat body: the control state with null temps dropped.
pub fn state_body_stripped(state: &ControlState) -> Value {
    let mut temps = Map::new();
    let pairs = [
        ("grillCurrent", state.temps.grill_current),
        ("grillTarget", state.temps.grill_target),
        ("probeCurrent", state.temps.probe_current),
        ("probeTarget", state.temps.probe_target),
    ];
    for (key, value) in pairs {
        if let Some(v) = value {
            temps.insert(key.into(), v.into());
        }
    }

    let mut body = Map::new();
    body.insert("mode".into(), Value::String(state.mode.name().into()));
    body.insert("online".into(), state.online.into());
    body.insert("power".into(), state.power.into());
    body.insert("probeConnected".into(), state.probe_connected.into());
    body.insert("temps".into(), Value::Object(temps));
    Value::Object(body)
}

// ───────────────────────────────────────────────────────────────
// Inbound
// ───────────────────────────────────────────────────────────────

/// A program document as delivered by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProgramDoc {
    pub id: String,
    pub steps: Vec<ProgramStep>,
}

/// Remote state update carried in a heartbeat reply.  Temperatures default
/// to empty so a sparse document still parses.
#[derive(Debug, Clone, Deserialize)]
pub struct StateUpdateDoc {
    pub mode: crate::fsm::Mode,
    pub power: bool,
    #[serde(default)]
    pub temps: crate::fsm::context::Temperatures,
}

/// Heartbeat response body: either field may be populated when the service
/// has a pending interrupt for the controller.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatReply {
    #[serde(default)]
    pub program: Option<ProgramDoc>,
    #[serde(default)]
    pub state: Option<StateUpdateDoc>,
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::context::ControlState;
    use crate::fsm::Mode;

    #[test]
    fn stripped_body_omits_null_temps() {
        let mut state = ControlState::new();
        state.temps.grill_current = Some(205);
        let body = state_body_stripped(&state);
        let temps = body["temps"].as_object().unwrap();
        assert_eq!(temps["grillCurrent"], 205);
        assert!(!temps.contains_key("grillTarget"));
        assert!(!temps.contains_key("probeCurrent"));
        assert_eq!(body["mode"], "Idle");
        assert_eq!(body["power"], false);
    }

    #[test]
    fn put_body_serializes_explicit_nulls() {
        let state = ControlState::new();
        let value = serde_json::to_value(&state).unwrap();
        assert!(value["temps"]["grillTarget"].is_null());
        assert!(value["temps"]["probeCurrent"].is_null());
        assert_eq!(value["probeConnected"], false);
    }

    #[test]
    fn heartbeat_reply_with_both_nulls() {
        let reply: HeartbeatReply =
            serde_json::from_str(r#"{"program": null, "state": null}"#).unwrap();
        assert!(reply.program.is_none());
        assert!(reply.state.is_none());
    }

    #[test]
    fn heartbeat_reply_with_program() {
        let json = r#"{
            "program": {
                "id": "brisket-14h",
                "steps": [
                    {"mode":"Start","targetGrill":225,"trigger":"Time","limit":600},
                    {"mode":"Hold","targetGrill":225,"trigger":"Temp","limit":203}
                ]
            },
            "state": null
        }"#;
        let reply: HeartbeatReply = serde_json::from_str(json).unwrap();
        let program = reply.program.unwrap();
        assert_eq!(program.id, "brisket-14h");
        assert_eq!(program.steps.len(), 2);
        assert_eq!(program.steps[1].mode, Mode::Hold);
        assert_eq!(program.steps[1].limit, 203);
    }

    #[test]
    fn state_update_parses_keep_warm_and_sparse_temps() {
        let json = r#"{"mode":"Keep Warm","power":false}"#;
        let update: StateUpdateDoc = serde_json::from_str(json).unwrap();
        assert_eq!(update.mode, Mode::KeepWarm);
        assert_eq!(update.temps.grill_target, None);

        let json = r#"{"mode":"Hold","power":true,"temps":{"grillTarget":275,"probeTarget":null}}"#;
        let update: StateUpdateDoc = serde_json::from_str(json).unwrap();
        assert_eq!(update.temps.grill_target, Some(275));
        assert_eq!(update.temps.probe_target, None);
    }
}
