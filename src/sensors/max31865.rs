//! MAX31865 RTD converter (grill chamber, PT1000).
//!
//! Register-based SPI device: one configuration write at start-up, then a
//! two-register temperature read per acquisition plus a fault-status
//! register read whenever the conversion flags a fault.
//!
//! The ratiometric ADC result converts to resistance against the 4.3 kΩ
//! reference, then to temperature through the inverse Callendar–Van Dusen
//! relation.  A conversion whose discriminant goes negative (detached or
//! shorted element driving the ADC to a rail) is an absent reading — zero
//! degrees is a real temperature and is never fabricated.

use embedded_hal::spi::SpiDevice;
use log::error;

use super::{celsius_to_fahrenheit, FaultFlags, Reading, SensorFault, TempSensor};
use crate::error::SensorError;

// ── Registers ─────────────────────────────────────────────────

/// Configuration register, write address (read address | 0x80).
const REG_CONFIG_WRITE: u8 = 0x80;
/// RTD resistance result, MSB.
const REG_RTD_MSB: u8 = 0x01;
/// RTD resistance result, LSB (bit 0 = fault summary).
const REG_RTD_LSB: u8 = 0x02;
/// Fault status register.
const REG_FAULT_STATUS: u8 = 0x07;

/// V_bias on, auto conversion, 2-wire, clear faults, 60 Hz rejection.
const CONFIG: u8 = 0b1100_0010;

// ── Callendar–Van Dusen constants (IEC 60751) ─────────────────

const CVD_A: f64 = 3.9083E-3;
const CVD_B: f64 = -5.775E-7;

/// Nominal element resistance at 0 °C (PT1000).
const R_NOMINAL: f64 = 1000.0;
/// Reference resistor on the board (Ω).
const R_REFERENCE: f64 = 4300.0;

/// ADC counts → measured resistance (Ω).
pub(crate) fn resistance_from_counts(counts: u16) -> f64 {
    f64::from(counts) * R_REFERENCE / f64::from(1u32 << 15)
}

/// Inverse Callendar–Van Dusen for t ≥ 0 °C.  `None` when the measured
/// resistance is outside the relation's domain.
pub(crate) fn celsius_from_resistance(r: f64) -> Option<f64> {
    let discriminant = CVD_A * CVD_A - 4.0 * CVD_B * (1.0 - r / R_NOMINAL);
    if discriminant < 0.0 {
        return None;
    }
    Some((-CVD_A + discriminant.sqrt()) / (2.0 * CVD_B))
}

/// MAX31865 driver.  Generic over the SPI device so host tests can feed
/// canned register contents.
pub struct Max31865<SPI> {
    spi: SPI,
    connected: bool,
}

impl<SPI: SpiDevice> Max31865<SPI> {
    /// Configure the converter for continuous conversion.  The first
    /// conversion needs ~250 ms after V_bias comes up.
    pub fn new(spi: SPI) -> Result<Self, SensorError> {
        let mut this = Self {
            spi,
            connected: false,
        };
        this.spi
            .write(&[REG_CONFIG_WRITE, CONFIG])
            .map_err(|_| SensorError::SpiTransfer)?;
        std::thread::sleep(std::time::Duration::from_millis(250));
        Ok(this)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut frame = [0u8; 2];
        self.spi
            .transfer(&mut frame, &[reg, 0x00])
            .map_err(|_| SensorError::SpiTransfer)?;
        Ok(frame[1])
    }

    /// Raw 15-bit conversion result plus the LSB fault summary bit.
    fn read_counts(&mut self) -> Result<(u16, bool), SensorError> {
        let msb = self.read_register(REG_RTD_MSB)?;
        let lsb = self.read_register(REG_RTD_LSB)?;
        let fault = lsb & 0x01 != 0;
        let counts = ((u16::from(msb) << 8) | u16::from(lsb)) >> 1;
        Ok((counts, fault))
    }

    /// Read and decode the fault status register, logging each cause.
    fn read_fault_status(&mut self) -> FaultFlags {
        let status = match self.read_register(REG_FAULT_STATUS) {
            Ok(s) => s,
            Err(e) => {
                error!("MAX31865: fault status read failed: {e}");
                return FaultFlags::NONE.with(SensorFault::Fault);
            }
        };

        let mut flags = FaultFlags::NONE;
        if status & 0b1000_0000 != 0 {
            error!("MAX31865 fault: RTD high threshold");
            flags.set(SensorFault::Fault);
        }
        if status & 0b0100_0000 != 0 {
            error!("MAX31865 fault: RTD low threshold");
            flags.set(SensorFault::Fault);
        }
        if status & 0b0010_0000 != 0 {
            error!("MAX31865 fault: REFIN- > 0.85 x V_bias");
            flags.set(SensorFault::Fault);
        }
        if status & 0b0001_0000 != 0 {
            error!("MAX31865 fault: REFIN- < 0.85 x V_bias (FORCE- open)");
            flags.set(SensorFault::OpenCircuit);
        }
        if status & 0b0000_1000 != 0 {
            error!("MAX31865 fault: RTDIN- < 0.85 x V_bias (FORCE- open)");
            flags.set(SensorFault::OpenCircuit);
        }
        if status & 0b0000_0100 != 0 {
            error!("MAX31865 fault: over/undervoltage");
            flags.set(SensorFault::ShortToSupply);
        }
        flags
    }
}

impl<SPI: SpiDevice> TempSensor for Max31865<SPI> {
    fn read(&mut self) -> Reading {
        let (counts, fault) = match self.read_counts() {
            Ok(result) => result,
            Err(e) => {
                error!("MAX31865: {e}");
                self.connected = false;
                return Reading::absent(FaultFlags::NONE);
            }
        };

        if fault {
            let flags = self.read_fault_status();
            self.connected = false;
            return Reading::absent(flags);
        }

        let resistance = resistance_from_counts(counts);
        match celsius_from_resistance(resistance) {
            Some(celsius) => {
                self.connected = true;
                let fahrenheit = celsius_to_fahrenheit(celsius);
                log::info!("MAX31865: {fahrenheit}F");
                Reading::ok(fahrenheit)
            }
            None => {
                error!(
                    "MAX31865: {}",
                    SensorError::ResistanceOutOfRange
                );
                self.connected = false;
                Reading::absent(FaultFlags::NONE)
            }
        }
    }

    fn connected(&self) -> bool {
        self.connected
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_resistance_reads_zero_celsius() {
        // PT1000 at 0 °C: counts = 32768 * 1000 / 4300 ≈ 7620
        let r = resistance_from_counts(7620);
        assert!((r - 999.93).abs() < 0.1);
        let t = celsius_from_resistance(1000.0).unwrap();
        assert!(t.abs() < 1e-6);
    }

    #[test]
    fn boiling_point_resistance() {
        // PT1000 at 100 °C: R = 1000 * (1 + A*100 + B*10000) ≈ 1385.05 Ω
        let t = celsius_from_resistance(1385.055).unwrap();
        assert!((t - 100.0).abs() < 0.01, "got {t}");
    }

    #[test]
    fn pit_temperature_resistance() {
        // 107.2 °C (≈225 °F): R = 1000 * (1 + A*t + B*t^2)
        let t_in = 107.2;
        let r = R_NOMINAL * (1.0 + CVD_A * t_in + CVD_B * t_in * t_in);
        let t = celsius_from_resistance(r).unwrap();
        assert!((t - t_in).abs() < 0.01);
    }

    #[test]
    fn rail_high_resistance_is_out_of_domain() {
        // Detached element: ADC pinned near full scale, R far above any
        // temperature the relation covers
        assert!(celsius_from_resistance(8000.0).is_none());
    }
}
