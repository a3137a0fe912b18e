//! MAX31855 K-type thermocouple converter (food probe).
//!
//! One SPI transaction reads the whole 32-bit conversion frame:
//!
//! ```text
//!  D31..D18  thermocouple temperature, signed 14-bit, 0.25 °C/LSB
//!  D16       fault summary
//!  D15..D4   cold-junction temperature, signed 12-bit, 0.0625 °C/LSB
//!  D2        short to VCC          D1  short to GND          D0  open circuit
//! ```
//!
//! The chip's on-die compensation assumes a linear thermoelectric response,
//! which a K-type junction does not have over pit temperatures.  The driver
//! therefore undoes the linear compensation and reapplies the NIST ITS-90
//! correction: convert both temperatures back to junction voltage, add the
//! cold-junction voltage from the reference polynomial, and run the summed
//! voltage through the inverse polynomial for the matching range.

use embedded_hal::spi::SpiDevice;
use log::error;

use super::{celsius_to_fahrenheit, FaultFlags, Reading, SensorFault, TempSensor};
use crate::error::SensorError;

/// Average K-type sensitivity used by the MAX31855's linear compensation
/// (mV/°C).
const K_TYPE_SENSITIVITY_MV: f64 = 0.041276;

/// NIST type-K reference-function coefficients, 0 °C – 1372 °C, for the
/// cold-junction voltage (t in °C, result in mV).
const CJ_COEFFS: [f64; 10] = [
    -0.176_004_136_860E-01,
    0.389_212_049_750E-01,
    0.185_587_700_320E-04,
    -0.994_575_928_740E-07,
    0.318_409_457_190E-09,
    -0.560_728_448_890E-12,
    0.560_750_590_590E-15,
    -0.320_207_200_030E-18,
    0.971_511_471_520E-22,
    -0.121_047_212_750E-25,
];
/// Exponential term of the reference function: a0·exp(a1·(t − a2)²).
const CJ_EXP: (f64, f64, f64) = (0.118_597_600_000E+00, -0.118_343_200_000E-03, 0.126_968_600_000E+03);

/// Inverse-function coefficients, −5.891 mV ≤ v < 0 mV (−200 °C – 0 °C).
const INV_NEG: [f64; 10] = [
    0.0,
    2.517_346_2E+01,
    -1.166_287_8E+00,
    -1.083_363_8E+00,
    -8.977_354_0E-01,
    -3.734_237_7E-01,
    -8.663_264_3E-02,
    -1.045_059_8E-02,
    -5.192_057_7E-04,
    0.0,
];
/// Inverse-function coefficients, 0 mV ≤ v < 20.644 mV (0 °C – 500 °C).
const INV_MID: [f64; 10] = [
    0.0,
    2.508_355E+01,
    7.860_106E-02,
    -2.503_131E-01,
    8.315_270E-02,
    -1.228_034E-02,
    9.804_036E-04,
    -4.413_030E-05,
    1.057_734E-06,
    -1.052_755E-08,
];
/// Inverse-function coefficients, 20.644 mV ≤ v < 54.886 mV (500 °C – 1372 °C).
const INV_HIGH: [f64; 10] = [
    -1.318_058E+02,
    4.830_222E+01,
    -1.646_031E+00,
    5.464_731E-02,
    -9.650_715E-04,
    8.802_193E-06,
    -3.110_810E-08,
    0.0,
    0.0,
    0.0,
];

/// Horner evaluation of a power-series polynomial.
fn poly(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Decode the frame's fault bits.
pub(crate) fn decode_faults(word: u32) -> FaultFlags {
    let mut flags = FaultFlags::NONE;
    if word & (1 << 0) != 0 {
        flags.set(SensorFault::OpenCircuit);
    }
    if word & (1 << 1) != 0 {
        flags.set(SensorFault::ShortToGround);
    }
    if word & (1 << 2) != 0 {
        flags.set(SensorFault::ShortToSupply);
    }
    if word & (1 << 16) != 0 {
        flags.set(SensorFault::Fault);
    }
    flags
}

/// Cold-junction (on-die) temperature in °C.
pub(crate) fn cold_junction_celsius(word: u32) -> f64 {
    // Signed 12-bit field in D15..D4
    let mut counts = i32::try_from((word >> 4) & 0xFFF).unwrap_or(0);
    if counts & 0x800 != 0 {
        counts -= 4096;
    }
    f64::from(counts) * 0.0625
}

/// Linearly-compensated thermocouple temperature in °C, as the chip
/// reports it.
pub(crate) fn thermocouple_celsius(word: u32) -> f64 {
    // Arithmetic shift of the top 14 bits handles the sign for free.
    let counts = (word as i32) >> 18;
    f64::from(counts) * 0.25
}

/// NIST-corrected thermocouple temperature in °C.
pub(crate) fn linearized_celsius(word: u32) -> Result<f64, SensorError> {
    let cj = cold_junction_celsius(word);
    // Undo the chip's linear compensation to recover junction voltage (mV)
    let v_tc = (thermocouple_celsius(word) - cj) * K_TYPE_SENSITIVITY_MV;
    // Reference-polynomial voltage of the cold junction (mV)
    let (a0, a1, a2) = CJ_EXP;
    let v_cj = poly(&CJ_COEFFS, cj) + a0 * (a1 * (cj - a2) * (cj - a2)).exp();
    let v_sum = v_tc + v_cj;

    let coeffs = if v_tc < 0.0 {
        &INV_NEG
    } else if v_tc < 20.644 {
        &INV_MID
    } else if v_tc < 54.886 {
        &INV_HIGH
    } else {
        return Err(SensorError::VoltageOutOfRange);
    };
    Ok(poly(coeffs, v_sum))
}

/// MAX31855 driver.  Generic over the SPI device so host tests can feed
/// canned frames.
pub struct Max31855<SPI> {
    spi: SPI,
    connected: bool,
}

impl<SPI: SpiDevice> Max31855<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            connected: false,
        }
    }

    /// One 32-bit frame off the bus.
    fn read_word(&mut self) -> Result<u32, SensorError> {
        let mut frame = [0u8; 4];
        self.spi
            .read(&mut frame)
            .map_err(|_| SensorError::SpiTransfer)?;
        Ok(u32::from_be_bytes(frame))
    }
}

impl<SPI: SpiDevice> TempSensor for Max31855<SPI> {
    fn read(&mut self) -> Reading {
        let word = match self.read_word() {
            Ok(word) => word,
            Err(e) => {
                error!("MAX31855: {e}");
                self.connected = false;
                return Reading::absent(FaultFlags::NONE);
            }
        };

        let faults = decode_faults(word);
        if faults.any() {
            error!("MAX31855: fault flags {faults}");
            self.connected = false;
            return Reading::absent(faults);
        }

        match linearized_celsius(word) {
            Ok(celsius) => {
                self.connected = true;
                let fahrenheit = celsius_to_fahrenheit(celsius);
                log::info!("MAX31855: {fahrenheit}F");
                Reading::ok(fahrenheit)
            }
            Err(e) => {
                error!("MAX31855: {e}");
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
