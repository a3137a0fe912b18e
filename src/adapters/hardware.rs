//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! The relay lines go through the raw GPIO helpers in
//! [`hw_init`](crate::drivers::hw_init); the two temperature converters
//! share the SPI2 bus as esp-idf-hal devices (one chip-select each) and
//! plug into the [`SensorHub`] as `embedded_hal::spi::SpiDevice`s.  This
//! is the only module in the system that touches actual hardware.

use crate::app::ports::{RelayPort, SensorPort};
use crate::drivers::hw_init;
use crate::pins;
use crate::relays::Relay;
use crate::sensors::{Reading, SensorHub, TempSensor};

// ── Relay lines ───────────────────────────────────────────────

/// [`RelayPort`] over the three GPIO relay lines.
pub struct GpioRelays;

impl GpioRelays {
    pub fn new() -> Self {
        Self
    }

    fn pin(relay: Relay) -> i32 {
        match relay {
            Relay::Auger => pins::AUGER_GPIO,
            Relay::Fan => pins::FAN_GPIO,
            Relay::Igniter => pins::IGNITER_GPIO,
        }
    }
}

impl Default for GpioRelays {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayPort for GpioRelays {
    fn apply(&mut self, relay: Relay, on: bool) {
        hw_init::gpio_write(Self::pin(relay), on);
    }

    fn level(&self, relay: Relay) -> bool {
        hw_init::gpio_read(Self::pin(relay))
    }
}

// ── Combined adapter ──────────────────────────────────────────

/// Concrete adapter that combines all hardware behind the port traits.
/// The service takes it as `impl SensorPort + RelayPort` — one object, no
/// double mutable borrow.
pub struct HardwareAdapter<G: TempSensor, P: TempSensor> {
    hub: SensorHub<G, P>,
    relays: GpioRelays,
}

impl<G: TempSensor, P: TempSensor> HardwareAdapter<G, P> {
    pub fn new(hub: SensorHub<G, P>) -> Self {
        Self {
            hub,
            relays: GpioRelays::new(),
        }
    }
}

impl<G: TempSensor, P: TempSensor> SensorPort for HardwareAdapter<G, P> {
    fn read_grill(&mut self) -> Reading {
        self.hub.read_grill()
    }

    fn read_probe(&mut self) -> Reading {
        self.hub.read_probe()
    }

    fn probe_connected(&self) -> bool {
        self.hub.probe_connected()
    }
}

impl<G: TempSensor, P: TempSensor> RelayPort for HardwareAdapter<G, P> {
    fn apply(&mut self, relay: Relay, on: bool) {
        self.relays.apply(relay, on);
    }

    fn level(&self, relay: Relay) -> bool {
        self.relays.level(relay)
    }
}

// ── SPI sensor construction (ESP-IDF only) ────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use std::rc::Rc;

    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::prelude::*;
    use esp_idf_hal::spi::{config, SpiDeviceDriver, SpiDriver, SpiDriverConfig};

    use crate::error::{Error, SensorError};
    use crate::pins;
    use crate::sensors::max31855::Max31855;
    use crate::sensors::max31865::Max31865;
    use crate::sensors::SensorHub;

    /// One chip-select device on the shared SPI2 bus.
    pub type BusDevice = SpiDeviceDriver<'static, Rc<SpiDriver<'static>>>;
    pub type GrillSensor = Max31865<BusDevice>;
    pub type ProbeSensor = Max31855<BusDevice>;

    /// Claim the peripherals and build the sensor hub.
    ///
    /// Pin routing matches `pins.rs`: SCLK=12, MOSI=11, MISO=13,
    /// CS grill=10, CS probe=9.
    pub fn build_sensor_hub() -> Result<SensorHub<GrillSensor, ProbeSensor>, Error> {
        let peripherals =
            Peripherals::take().map_err(|_| Error::Internal("peripherals already taken"))?;
        let p = peripherals.pins;

        let bus = SpiDriver::new(
            peripherals.spi2,
            p.gpio12,
            p.gpio11,
            Some(p.gpio13),
            &SpiDriverConfig::new(),
        )
        .map_err(|_| Error::Sensor(SensorError::SpiTransfer))?;
        let bus = Rc::new(bus);

        // Both converters run SPI mode 1
        let spi_config = config::Config::new()
            .baudrate(pins::SPI_BAUDRATE_HZ.Hz())
            .data_mode(embedded_hal::spi::MODE_1);

        let grill_device = SpiDeviceDriver::new(Rc::clone(&bus), Some(p.gpio10), &spi_config)
            .map_err(|_| Error::Sensor(SensorError::SpiTransfer))?;
        let probe_device = SpiDeviceDriver::new(bus, Some(p.gpio9), &spi_config)
            .map_err(|_| Error::Sensor(SensorError::SpiTransfer))?;

        let grill = Max31865::new(grill_device)?;
        let probe = Max31855::new(probe_device);
        Ok(SensorHub::new(grill, probe))
    }
}

#[cfg(target_os = "espidf")]
pub use esp::{build_sensor_hub, BusDevice, GrillSensor, ProbeSensor};
