//! One-shot hardware peripheral initialization.
//!
//! Configures the relay GPIO lines using raw ESP-IDF sys calls.  Called
//! once from `main()` before the control loop starts.  The SPI bus and
//! converter chip-selects are owned by the hardware adapter (esp-idf-hal
//! drivers); only the plain digital lines live here.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

// ── Relay outputs ─────────────────────────────────────────────

/// Configure the three relay lines as input/output (output with read-back)
/// and drive them low.
#[cfg(target_os = "espidf")]
pub fn init_relay_lines() -> Result<(), HwInitError> {
    let relay_pins = [pins::AUGER_GPIO, pins::FAN_GPIO, pins::IGNITER_GPIO];

    for &pin in &relay_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            // INPUT_OUTPUT so the commanded level reads back for verification
            mode: gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: called once from the single-threaded init path.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        // SAFETY: pin was just configured as an output.
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: relay lines configured (all off)");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_relay_lines() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): relay line init skipped");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_relay_lines(). Main-loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    false
}
