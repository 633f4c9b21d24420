#![cfg_attr(not(any(test, feature = "std")), no_std)]
//! # DRV8353RS Gate Driver and Motor Sensing
//!
//! This crate provides a bisync-based driver for the DRV8353RS three-phase gate driver IC
//! together with the sensing pieces that depend on it: a hall-edge speed estimator and a
//! calibration engine that turns raw ADC counts into volts and amps.
//!
//! ## Features
//!
//! *   **Bit-exact SPI framing:** 16-bit frames packed and decoded in [`frame`].
//! *   **Verified configuration:** [`Drv8353::configure`] writes the current-sense amplifier
//!     gain and reads it back. A mismatch latches the driver into a halted state.
//! *   **Unified Async/Blocking Support:** `Drv8353` and `Drv8353Async` are generated from one
//!     source via [`bisync`](https://docs.rs/bisync).
//! *   **Interrupt-safe speed sampling:** [`rpm::EdgeCounter`] is shared with the hall
//!     interrupt; [`rpm::SpeedSampler`] turns it into RPM on the main context.
//! *   **Sense calibration with interlock policy:** [`sense::SenseMonitor`] refuses to pass
//!     implausible phase currents downstream.
//! *   **`defmt` and `log` Integration:** Optional support for logging and debugging.
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! # use embedded_hal::spi::SpiDevice;
//! # use embedded_hal::delay::DelayNs;
//! # use drv8353_dd::Drv8353;
//! # fn demo<S: SpiDevice, D: DelayNs>(spi_device: S, mut delay: D) -> Result<(), drv8353_dd::DrvError<S::Error>> {
//! let mut drv = Drv8353::new(spi_device);
//!
//! // Gain verification failure is terminal: stop driving the motor.
//! drv.configure(&mut delay)?;
//!
//! let status = drv.read_status()?;
//! if status.fault_any() {
//!     // Handle fault
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Warning!
//!
//! ***Caution!*** This chip controls power FETs that can handle high voltages and currents.
//! Incorrect configuration can potentially damage FETs, motors, or other components.
//! Proceed with care and always consult the DRV8353RS datasheet.

#[macro_use]
pub(crate) mod fmt;

pub mod actuator;
pub mod frame;
pub mod ladder;
pub mod rpm;
pub mod sense;

use thiserror::Error;

pub use frame::{CsaGain, Register};

/// Gain written and verified by [`Drv8353::configure`].
pub const CONFIGURED_CSA_GAIN: CsaGain = CsaGain::V20;

#[derive(Debug, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrvError<SpiErr> {
    #[error("SPI error")]
    Spi(SpiErr),
    #[error("CSA gain readback mismatch: expected {expected:#b}, got {actual:#b} (register {readback:#x})")]
    GainMismatch {
        expected: u16,
        actual: u16,
        readback: u16,
    },
    #[error("driver halted after failed configuration")]
    Halted,
}

/// Snapshot of the two status words returned by a status poll.
///
/// `spi_ok` only says the bus transfers completed, not that the device is fault-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverStatus {
    spi_ok: bool,
    raw_status1: u16,
    raw_status2: u16,
    fault_any: bool,
}

impl DriverStatus {
    /// Bits of either status word that indicate a fault.
    pub const FAULT_MASK: u16 = 0x0FFF;

    pub const fn from_words(raw_status1: u16, raw_status2: u16) -> Self {
        Self {
            spi_ok: true,
            raw_status1,
            raw_status2,
            fault_any: (raw_status1 | raw_status2) & Self::FAULT_MASK != 0,
        }
    }

    pub const fn bus_failure() -> Self {
        Self {
            spi_ok: false,
            raw_status1: 0,
            raw_status2: 0,
            fault_any: false,
        }
    }

    pub const fn spi_ok(&self) -> bool {
        self.spi_ok
    }

    pub const fn raw_status1(&self) -> u16 {
        self.raw_status1
    }

    pub const fn raw_status2(&self) -> u16 {
        self.raw_status2
    }

    pub const fn fault_any(&self) -> bool {
        self.fault_any
    }
}

#[path = "."]
mod asynchronous {
    use bisync::asynchronous::*;
    use embedded_hal_async::delay::DelayNs;
    use embedded_hal_async::spi::SpiDevice;
    mod driver;
    pub use driver::*;
}
pub use asynchronous::Drv8353 as Drv8353Async;

#[path = "."]
mod blocking {
    use bisync::synchronous::*;
    use embedded_hal::delay::DelayNs;
    use embedded_hal::spi::SpiDevice;
    #[allow(clippy::duplicate_mod)]
    mod driver;
    pub use driver::*;
}
pub use blocking::Drv8353;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_any_uses_lower_twelve_bits_of_both_words() {
        assert!(!DriverStatus::from_words(0x0000, 0x0000).fault_any());
        assert!(DriverStatus::from_words(0x0400, 0x0000).fault_any());
        assert!(DriverStatus::from_words(0x0000, 0x0001).fault_any());
        assert!(!DriverStatus::from_words(0xF000, 0xF000).fault_any());
    }

    #[test]
    fn bus_failure_is_not_ok() {
        let status = DriverStatus::bus_failure();
        assert!(!status.spi_ok());
        assert!(!status.fault_any());
    }
}
