#![allow(dead_code)] // SPI routing constants document the esp adapter's typed pin wiring

//! GPIO / peripheral pin assignments for the EmberPit controller board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Relay outputs (active HIGH, opto-isolated SSR board)
// ---------------------------------------------------------------------------

/// Digital output: pellet auger motor relay.
pub const AUGER_GPIO: i32 = 16;
/// Digital output: combustion fan relay.
pub const FAN_GPIO: i32 = 17;
/// Digital output: hot-rod igniter relay.
pub const IGNITER_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// SPI2 bus — temperature converters
// ---------------------------------------------------------------------------

/// SPI clock.
pub const SPI_SCLK_GPIO: i32 = 12;
/// SPI MOSI (MAX31865 is written to; MAX31855 ignores it).
pub const SPI_MOSI_GPIO: i32 = 11;
/// SPI MISO.
pub const SPI_MISO_GPIO: i32 = 13;
/// Chip select: MAX31865 RTD converter (grill chamber PT1000).
pub const CS_GRILL_GPIO: i32 = 10;
/// Chip select: MAX31855 thermocouple converter (food probe, K-type).
pub const CS_PROBE_GPIO: i32 = 9;

/// SPI clock rate (Hz).  Both converters are specified to 5 MHz; run well
/// below that for long cable runs to the pit.
pub const SPI_BAUDRATE_HZ: u32 = 500_000;
