//! Unified error types for the EmberPit firmware.
//!
//! Fault classification is kept separate from reaction policy: subsystems
//! return these types and the supervising loop in `main()` decides whether
//! to retry, degrade to offline operation, or terminate.  All variants are
//! `Copy` so they pass through the control loop without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned out-of-range data.
    Sensor(SensorError),
    /// A sync exchange with the remote service failed at the transport
    /// level.  Fatal for every operation except the heartbeat.
    Sync(SyncError),
    /// A safety interlock was violated.
    Safety(SafetyFault),
    /// The settings file is missing or malformed.
    Settings(&'static str),
    /// Internal consistency violation (programming error, not an external
    /// condition).  Always fatal.
    Internal(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Sync(e) => write!(f, "sync: {e}"),
            Self::Safety(e) => write!(f, "safety: {e}"),
            Self::Settings(msg) => write!(f, "settings: {msg}"),
            Self::Internal(msg) => write!(f, "internal: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// SPI transfer returned an error or the wrong number of bytes.
    SpiTransfer,
    /// Thermocouple voltage outside the supported linearization ranges.
    VoltageOutOfRange,
    /// RTD resistance outside the domain of the inverse Callendar–Van Dusen
    /// relation (negative discriminant).
    ResistanceOutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpiTransfer => write!(f, "SPI transfer failed"),
            Self::VoltageOutOfRange => write!(f, "thermocouple voltage out of range"),
            Self::ResistanceOutOfRange => write!(f, "RTD resistance out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Transport-level failure of one remote-service exchange.  The carried
/// operation name identifies which call failed; response-status problems are
/// reported in-band by [`SyncPort`](crate::app::ports::SyncPort) methods and
/// never surface as a `SyncError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncError {
    /// Which exchange failed ("boot", "heartbeat", "put-state", ...).
    pub op: &'static str,
}

impl SyncError {
    pub const fn new(op: &'static str) -> Self {
        Self { op }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} request failed", self.op)
    }
}

impl From<SyncError> for Error {
    fn from(e: SyncError) -> Self {
        Self::Sync(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Safety faults force an actuator-off + mode transition, never just a log
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyFault {
    /// Igniter energised beyond the hard time limit.
    IgniterOverrun,
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IgniterOverrun => write!(f, "igniter overrun"),
        }
    }
}

impl From<SafetyFault> for Error {
    fn from(e: SafetyFault) -> Self {
        Self::Safety(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
