//! 16-bit SPI frame codec for the DRV8353RS.
//!
//! ```text
//!  15   14..11   10..0
//! R/W  address   data
//! ```
//!
//! Bit 15 is `1` for a read and `0` for a write. Address and data are
//! masked to their field widths before packing.

/// Bit 15: read (1) / write (0).
pub const READ_FLAG: u16 = 0x8000;
/// 4-bit register address field.
pub const ADDRESS_MASK: u16 = 0x0F;
pub const ADDRESS_SHIFT: u16 = 11;
/// 11-bit data field.
pub const DATA_MASK: u16 = 0x07FF;
/// Frame clocked out when only the response is of interest.
pub const NOP: u16 = 0x0000;

/// Register addresses touched by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    FaultStatus1 = 0x0,
    VgsStatus2 = 0x1,
    DriverControl = 0x2,
    GateDriveHs = 0x3,
    GateDriveLs = 0x4,
    OcpControl = 0x5,
    CsaControl = 0x6,
}

impl Register {
    pub const fn address(self) -> u8 {
        self as u8
    }
}

impl From<Register> for u8 {
    fn from(reg: Register) -> Self {
        reg.address()
    }
}

/// Packs a write frame. Out-of-range bits of `address` and `data` are dropped.
pub const fn write_frame(address: u8, data: u16) -> u16 {
    ((address as u16 & ADDRESS_MASK) << ADDRESS_SHIFT) | (data & DATA_MASK)
}

/// Packs a read frame. The data field is left zero.
pub const fn read_frame(address: u8) -> u16 {
    READ_FLAG | ((address as u16 & ADDRESS_MASK) << ADDRESS_SHIFT)
}

/// Extracts the address field of a frame.
pub const fn address_of(frame: u16) -> u8 {
    ((frame >> ADDRESS_SHIFT) & ADDRESS_MASK) as u8
}

/// Extracts the 11-bit data field, discarding everything above it.
pub const fn data_of(frame: u16) -> u16 {
    frame & DATA_MASK
}

pub const fn is_read(frame: u16) -> bool {
    frame & READ_FLAG != 0
}

/// Current-sense amplifier gain, as encoded in `CSA_GAIN` (CSA control bits 7:6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CsaGain {
    V5 = 0b00,
    V10 = 0b01,
    V20 = 0b10,
    V40 = 0b11,
}

impl CsaGain {
    pub const SHIFT: u16 = 6;
    pub const MASK: u16 = 0b11;

    pub const fn code(self) -> u16 {
        self as u16
    }

    pub const fn from_code(code: u16) -> Self {
        match code & Self::MASK {
            0b00 => Self::V5,
            0b01 => Self::V10,
            0b10 => Self::V20,
            _ => Self::V40,
        }
    }

    /// Gain field of a CSA control register value.
    pub const fn field_of(value: u16) -> u16 {
        (value >> Self::SHIFT) & Self::MASK
    }

    pub const fn volts_per_volt(self) -> f32 {
        match self {
            Self::V5 => 5.0,
            Self::V10 => 10.0,
            Self::V20 => 20.0,
            Self::V40 => 40.0,
        }
    }
}

/// All three phase amplifiers on (CSA control bits 5:3).
pub const CSA_ENABLE_ALL: u16 = 0b111 << 3;

/// CSA control register value for `gain` with every amplifier enabled.
pub const fn csa_control_word(gain: CsaGain) -> u16 {
    (gain.code() << CsaGain::SHIFT) | CSA_ENABLE_ALL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_frame_layout() {
        let frame = write_frame(0x6, 0x123);
        assert_eq!(frame, 0b0_0110_001_0010_0011);
        assert!(!is_read(frame));
        assert_eq!(address_of(frame), 0x6);
        assert_eq!(data_of(frame), 0x123);
    }

    #[test]
    fn write_frame_masks_fields() {
        // Address bit 4 and data bits above 10 must not leak into other fields.
        let frame = write_frame(0x16, 0xFFFF);
        assert!(!is_read(frame));
        assert_eq!(address_of(frame), 0x6);
        assert_eq!(data_of(frame), DATA_MASK);
    }

    #[test]
    fn read_frame_layout() {
        let frame = read_frame(Register::CsaControl.address());
        assert_eq!(frame, 0xB000);
        assert!(is_read(frame));
        assert_eq!(data_of(frame), 0);
    }

    #[test]
    fn response_decoding_drops_upper_bits() {
        assert_eq!(data_of(0xF8B8), 0x0B8);
    }

    #[test]
    fn csa_word_for_20x() {
        let word = csa_control_word(CsaGain::V20);
        assert_eq!(word, 0x0B8);
        assert_eq!(CsaGain::field_of(word), 0b10);
        assert_eq!(CsaGain::from_code(CsaGain::field_of(word)), CsaGain::V20);
    }
}
