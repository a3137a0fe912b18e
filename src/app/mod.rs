//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the EmberPit controller:
//! mode orchestration, program sequencing, heartbeat handling, and the
//! per-tick control cycle.  All interaction with hardware and the sync
//! service happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals or a network.

pub mod events;
pub mod ports;
pub mod service;
