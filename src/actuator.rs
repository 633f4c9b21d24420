//! Feed actuator (DRV8873 in PH/EN mode).

use embedded_hal::digital::{OutputPin, PinState};
use thiserror::Error;

#[derive(Debug, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorError<EnErr, PhErr> {
    #[error("enable pin error")]
    Enable(EnErr),
    #[error("phase pin error")]
    Phase(PhErr),
}

/// Two-pin forward/off control. Both pins follow the same level.
pub struct Actuator<EN, PH> {
    enable: EN,
    phase: PH,
}

impl<EN, PH> Actuator<EN, PH>
where
    EN: OutputPin,
    PH: OutputPin,
{
    /// Takes the pins and drives both low.
    pub fn new(mut enable: EN, mut phase: PH) -> Result<Self, ActuatorError<EN::Error, PH::Error>> {
        enable.set_low().map_err(ActuatorError::Enable)?;
        phase.set_low().map_err(ActuatorError::Phase)?;
        Ok(Self { enable, phase })
    }

    pub fn apply_forward(&mut self, forward: bool) -> Result<(), ActuatorError<EN::Error, PH::Error>> {
        let level = PinState::from(forward);
        self.enable.set_state(level).map_err(ActuatorError::Enable)?;
        self.phase.set_state(level).map_err(ActuatorError::Phase)
    }

    pub fn release(self) -> (EN, PH) {
        (self.enable, self.phase)
    }
}
