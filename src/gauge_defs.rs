//! Low-level definitions for the BQ27427 fuel gauge.

use bitflags::bitflags;

/// Commands (i.e *registers*) of the gauge. Standard commands return a
/// little-endian 16-bit value.
pub mod commands {
    #![allow(dead_code)]
    pub const CONTROL: u8 = 0x00;
    pub const TEMPERATURE: u8 = 0x02;
    pub const VOLTAGE: u8 = 0x04;
    pub const FLAGS: u8 = 0x06;
    pub const REMAINING_CAPACITY: u8 = 0x0C;
    pub const FULL_CHARGE_CAPACITY: u8 = 0x0E;
    pub const AVERAGE_CURRENT: u8 = 0x10;
    pub const AVERAGE_POWER: u8 = 0x18;
    pub const STATE_OF_CHARGE: u8 = 0x1C;

    // Extended, i.e direct memory access
    pub const DATA_CLASS: u8 = 0x3E;
    pub const DATA_BLOCK: u8 = 0x3F;
    pub const BLOCK_DATA: u8 = 0x40;
    pub const BLOCK_DATA_CHECKSUM: u8 = 0x60;
    pub const BLOCK_DATA_CONTROL: u8 = 0x61;
}

/// Issuing a Control() command requires a subsequent 2-byte subcommand.
pub mod control_subcommands {
    #![allow(dead_code)]
    pub const CONTROL_STATUS: u16 = 0x0000;
    pub const DEVICE_TYPE: u16 = 0x0001;
    pub const CHEM_ID: u16 = 0x0008;
    pub const SET_CFGUPDATE: u16 = 0x0013;
    pub const SEALED: u16 = 0x0020;
    pub const CHEM_A: u16 = 0x0030;
    pub const CHEM_B: u16 = 0x0031;
    pub const CHEM_C: u16 = 0x0032;
    pub const RESET: u16 = 0x0041;
    pub const SOFT_RESET: u16 = 0x0042;
    /// Sent twice in a row
    pub const UNSEAL: u16 = 0x8000;
}

/// All memory locations are divided into subclasses
pub mod memory_subclass {
    #![allow(dead_code)]
    pub const DISCHARGE: u8 = 49;
    pub const REGISTERS: u8 = 64;
    pub const STATE: u8 = 82;
    pub const CC_CAL: u8 = 105;
}

/// Size of one data memory block.
pub const MEMBLOCK_SIZE: usize = 32;

/// Settle time after selecting a data memory block.
pub const MEMBLOCK_SETTLE_MS: u32 = 50;

/// Settle time after entering configuration update mode.
pub const CFGUPDATE_SETTLE_MS: u32 = 1100;

/// Address of a value inside the gauge data memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryLocation {
    /// Data class (subclass id)
    pub class: u8,
    /// 32-byte block index within the class
    pub block: u8,
    /// Byte offset within the block
    pub offset: u8,
}

impl MemoryLocation {
    pub const fn new(class: u8, block: u8, offset: u8) -> Self {
        Self {
            class,
            block,
            offset,
        }
    }

    /// Register holding the first byte of this location once the block is selected.
    pub(crate) const fn register(&self) -> u8 {
        commands::BLOCK_DATA + self.offset
    }
}

/// Fixed data memory locations of the configuration fields. Multi-byte
/// values are big-endian.
pub mod memory_fields {
    use super::{memory_subclass, MemoryLocation};

    /// State of charge 1 set threshold, 1 byte (%)
    pub const SOC1_SET: MemoryLocation = MemoryLocation::new(memory_subclass::DISCHARGE, 0, 0);
    /// State of charge 1 clear threshold, 1 byte (%)
    pub const SOC1_CLEAR: MemoryLocation = MemoryLocation::new(memory_subclass::DISCHARGE, 0, 1);
    /// Final state of charge set threshold, 1 byte (%)
    pub const SOCF_SET: MemoryLocation = MemoryLocation::new(memory_subclass::DISCHARGE, 0, 2);
    /// Final state of charge clear threshold, 1 byte (%)
    pub const SOCF_CLEAR: MemoryLocation = MemoryLocation::new(memory_subclass::DISCHARGE, 0, 3);
    /// Operation configuration register, 2 bytes
    pub const OP_CONFIG: MemoryLocation = MemoryLocation::new(memory_subclass::REGISTERS, 0, 0);
    /// Design capacity, 2 bytes (mAh)
    pub const DESIGN_CAPACITY: MemoryLocation = MemoryLocation::new(memory_subclass::STATE, 0, 6);
    /// Design energy, 2 bytes (mWh)
    pub const DESIGN_ENERGY: MemoryLocation = MemoryLocation::new(memory_subclass::STATE, 0, 8);
    /// Most significant byte of the CC gain, 1 byte
    pub const CC_GAIN_SIGN: MemoryLocation = MemoryLocation::new(memory_subclass::CC_CAL, 0, 5);
}

bitflags! {
    /// Contents of the flags register, returned by the "Flags" command
    pub struct StatusFlags: u16 {
        const OT = 1 << 15;
        const UT = 1 << 14;
        const FC = 1 << 9;
        const CHG = 1 << 8;
        const OCVTAKEN = 1 << 7;
        const DOD_CORRECT = 1 << 6;
        const ITPOR = 1 << 5;
        const CFGUPMODE = 1 << 4;
        const BAT_DET = 1 << 3;
        const SOC1 = 1 << 2;
        const SOCF = 1 << 1;
        const DSG = 1 << 0;
    }
}

impl From<u16> for StatusFlags {
    fn from(value: u16) -> Self {
        StatusFlags::from_bits_truncate(value)
    }
}

bitflags! {
    /// Response of the CONTROL_STATUS subcommand
    pub struct ControlStatus: u16 {
        const SHUTDOWNEN = 1 << 15;
        const WDRESET = 1 << 14;
        const SS = 1 << 13;
        const CALMODE = 1 << 12;
        const CCA = 1 << 11;
        const BCA = 1 << 10;
        const QMAX_UP = 1 << 9;
        const RES_UP = 1 << 8;
        const INITCOMP = 1 << 7;
        const HIBERNATE = 1 << 6;
        const SLEEP = 1 << 4;
        const LDMD = 1 << 3;
        const RUP_DIS = 1 << 2;
        const VOK = 1 << 1;
    }
}

impl From<u16> for ControlStatus {
    fn from(value: u16) -> Self {
        ControlStatus::from_bits_truncate(value)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StatusFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "StatusFlags({=u16:#x})", self.bits());
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ControlStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ControlStatus({=u16:#x})", self.bits());
    }
}

/// Battery chemistry profile. B4200 should be suited for the most hobby-grade cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChemId {
    /// 4.35 V profile
    A4350,
    /// 4.2 V profile
    B4200,
    /// 4.4 V profile
    C4400,
    /// Code reported by the gauge that matches no profile
    Unknown(u16),
}

impl From<u16> for ChemId {
    fn from(code: u16) -> Self {
        match code {
            0x3230 => Self::A4350,
            0x1202 => Self::B4200,
            0x3142 => Self::C4400,
            other => Self::Unknown(other),
        }
    }
}

impl ChemId {
    /// Code reported by the CHEM_ID subcommand.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            ChemId::A4350 => 0x3230,
            ChemId::B4200 => 0x1202,
            ChemId::C4400 => 0x3142,
            ChemId::Unknown(code) => *code,
        }
    }

    /// Subcommand selecting this profile, `None` for unknown codes.
    #[must_use]
    pub fn subcommand(&self) -> Option<u16> {
        match self {
            ChemId::A4350 => Some(control_subcommands::CHEM_A),
            ChemId::B4200 => Some(control_subcommands::CHEM_B),
            ChemId::C4400 => Some(control_subcommands::CHEM_C),
            ChemId::Unknown(_) => None,
        }
    }
}

/// Voltage in volts from a millivolt reading.
#[must_use]
pub fn voltage_from_raw(raw: u16) -> f32 {
    f32::from(raw) / 1000.0
}

/// Current (A) or power (W) from a signed milli-unit reading.
#[must_use]
pub fn signed_from_raw(raw: u16) -> f32 {
    // two's-complement register
    f32::from(raw as i16) / 1000.0
}

/// Temperature in degrees Celsius from a 0.1 K reading.
#[must_use]
pub fn temperature_from_raw(raw: u16) -> f32 {
    f32::from(raw) / 10.0 - 273.15
}
