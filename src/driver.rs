use super::{DelayNs, SpiDevice, bisync};
use crate::frame::{self, CsaGain, Register};
use crate::{CONFIGURED_CSA_GAIN, DriverStatus, DrvError};

/// DRV8353RS register interface.
///
/// Every bus access is a single `SpiDevice` transaction carrying one 16-bit frame,
/// MSB first, so chip-select framing stays atomic with respect to other devices
/// sharing the bus.
pub struct Drv8353<SpiBus> {
    spi: SpiBus,
    halted: bool,
}

impl<SpiBus, E> Drv8353<SpiBus>
where
    SpiBus: SpiDevice<Error = E>,
    E: core::fmt::Debug,
{
    pub fn new(spi: SpiBus) -> Self {
        Self { spi, halted: false }
    }

    /// True once configuration has failed. A halted driver refuses all bus traffic
    /// and the caller must stop relying on current sensing and actuation.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Give back the underlying SPI device.
    pub fn release(self) -> SpiBus {
        self.spi
    }

    fn ensure_running(&self) -> Result<(), DrvError<E>> {
        if self.halted {
            return Err(DrvError::Halted);
        }
        Ok(())
    }

    #[bisync]
    async fn xfer16(&mut self, word: u16) -> Result<u16, DrvError<E>> {
        let tx = word.to_be_bytes();
        let mut rx = [0u8; 2];
        self.spi
            .transfer(&mut rx, &tx)
            .await
            .map_err(DrvError::Spi)?;
        Ok(u16::from_be_bytes(rx))
    }

    /// Raw 16-bit transfer, for diagnostics.
    #[bisync]
    pub async fn transfer(&mut self, word: u16) -> Result<u16, DrvError<E>> {
        self.ensure_running()?;
        self.xfer16(word).await
    }

    /// Write the 11-bit `data` to register `address`. Nothing is read back.
    #[bisync]
    pub async fn write_register(&mut self, address: u8, data: u16) -> Result<(), DrvError<E>> {
        self.ensure_running()?;
        self.xfer16(frame::write_frame(address, data)).await?;
        Ok(())
    }

    /// Send a read frame for `address` and return the 11-bit data field of the response.
    ///
    /// The response is whatever the device shifts out during this frame; with this IC
    /// that reflects the register addressed by the previous transaction. This is kept
    /// as-is rather than hidden behind a second transfer.
    #[bisync]
    pub async fn read_register(&mut self, address: u8) -> Result<u16, DrvError<E>> {
        self.ensure_running()?;
        let response = self.xfer16(frame::read_frame(address)).await?;
        Ok(frame::data_of(response))
    }

    /// Program the CSA control register (20 V/V, all amplifiers on) and verify the gain.
    ///
    /// A readback whose gain field differs is fatal: the driver latches halted and
    /// returns [`DrvError::GainMismatch`]. A bus error during the sequence also leaves
    /// the gain unverified and halts the driver. Gate drive settings stay at their
    /// power-on defaults.
    #[bisync]
    pub async fn configure<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), DrvError<E>> {
        self.ensure_running()?;
        let result = self.configure_csa(delay).await;
        if result.is_err() {
            self.halted = true;
        }
        result
    }

    #[bisync]
    async fn configure_csa<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), DrvError<E>> {
        let address = Register::CsaControl.address();
        let word = frame::csa_control_word(CONFIGURED_CSA_GAIN);
        self.xfer16(frame::write_frame(address, word)).await?;

        delay.delay_ms(1).await;

        let readback = frame::data_of(self.xfer16(frame::read_frame(address)).await?);
        let actual = CsaGain::field_of(readback);
        let expected = CONFIGURED_CSA_GAIN.code();
        if actual != expected {
            error!(
                "DRV8353 CSA gain verification failed: expected {:#b}, got {:#b} (register {:#x})",
                expected,
                actual,
                readback
            );
            error!("Halting: motor current readings would be wrong. Check the SPI wiring");
            return Err(DrvError::GainMismatch {
                expected,
                actual,
                readback,
            });
        }

        info!("DRV8353 CSA gain verified: {} V/V", CONFIGURED_CSA_GAIN.volts_per_volt());
        Ok(())
    }

    /// Clock out two no-op frames and capture both status words.
    ///
    /// A bus error is reported through [`DriverStatus::spi_ok`] rather than as an `Err`.
    #[bisync]
    pub async fn read_status(&mut self) -> Result<DriverStatus, DrvError<E>> {
        self.ensure_running()?;
        let words = match self.xfer16(frame::NOP).await {
            Ok(status1) => match self.xfer16(frame::NOP).await {
                Ok(status2) => Some((status1, status2)),
                Err(_) => None,
            },
            Err(_) => None,
        };

        match words {
            Some((status1, status2)) => {
                let status = DriverStatus::from_words(status1, status2);
                if status.fault_any() {
                    debug!("DRV8353 status: {:#x} {:#x}", status1, status2);
                }
                Ok(status)
            }
            None => {
                warn!("DRV8353 status poll failed on the bus");
                Ok(DriverStatus::bus_failure())
            }
        }
    }

    /// Raw word returned for a no-op frame.
    #[bisync]
    pub async fn read_id(&mut self) -> Result<u16, DrvError<E>> {
        self.transfer(frame::NOP).await
    }
}
