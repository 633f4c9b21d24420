//! Resistor-ladder control input.
//!
//! The ladder voltage (see [`SenseConfig::ladder_volts`](crate::sense::SenseConfig::ladder_volts))
//! falls into one of three command bands. Anything below the low fault threshold is a
//! shorted input; anything outside the bands otherwise is treated as open.

/// Below this the input is shorted to ground [V].
pub const FAULT_LOW_VOLTS: f32 = 0.20;
pub const START_VOLTS: (f32, f32) = (0.75, 1.00);
pub const IDLE_VOLTS: (f32, f32) = (1.55, 2.10);
/// Upper bound allows VCC plus margin.
pub const STOP_VOLTS: (f32, f32) = (2.60, 3.35);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LadderState {
    FaultLow,
    Start,
    Idle,
    Stop,
    FaultHigh,
}

impl LadderState {
    pub fn classify(volts: f32) -> Self {
        let within = |(min, max): (f32, f32)| volts >= min && volts <= max;
        if volts < FAULT_LOW_VOLTS {
            Self::FaultLow
        } else if within(START_VOLTS) {
            Self::Start
        } else if within(IDLE_VOLTS) {
            Self::Idle
        } else if within(STOP_VOLTS) {
            Self::Stop
        } else {
            Self::FaultHigh
        }
    }

    pub fn is_fault(self) -> bool {
        matches!(self, Self::FaultLow | Self::FaultHigh)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Idle => "IDLE",
            Self::Stop => "STOP",
            Self::FaultLow => "FAULT_LOW",
            Self::FaultHigh => "FAULT_HIGH",
        }
    }
}
