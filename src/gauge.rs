//! Blocking driver for the BQ27427 fuel gauge.
//!
//! The protocol is wacky - see the datasheet for the details. Long story
//! short the chip does not like long transactions, so writing a control
//! subcommand and reading its response are two different transfers.
//!
//! # Example
//!
//! ```rust,ignore
//! use powerboard::gauge::{Bq27427, GaugeConfig, DEFAULT_ADDRESS};
//! use powerboard::gauge_defs::ChemId;
//!
//! let mut gauge = Bq27427::new(i2c, delay, DEFAULT_ADDRESS);
//! gauge.configure(&GaugeConfig::new(ChemId::B4200, 3000, 11100))?;
//! let soc = gauge.state_of_charge()?;
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::fmt::*;
use crate::gauge_defs::{
    commands, control_subcommands, memory_fields, signed_from_raw, temperature_from_raw,
    voltage_from_raw, ChemId, ControlStatus, StatusFlags, CFGUPDATE_SETTLE_MS,
};

/// Fixed I2C address of the BQ27427 fuel gauge.
pub const DEFAULT_ADDRESS: u8 = 0x55;

/// Sign bit of the CC gain most significant byte.
pub(crate) const CC_GAIN_SIGN_BIT: u8 = 1 << 7;

/// Gauge error type
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GaugeError<E> {
    /// I2C bus error
    I2c(E),
    /// The chemistry code matches none of the selectable profiles
    UnknownChemistry(u16),
    /// Data memory access crosses the end of a 32-byte block
    OutOfBlock,
}

impl<E> From<E> for GaugeError<E> {
    fn from(e: E) -> Self {
        Self::I2c(e)
    }
}

/// State of charge interrupt thresholds, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocThresholds {
    pub soc1_set: u8,
    pub soc1_clear: u8,
    pub socf_set: u8,
    pub socf_clear: u8,
}

impl From<[u8; 4]> for SocThresholds {
    fn from(raw: [u8; 4]) -> Self {
        Self {
            soc1_set: raw[0],
            soc1_clear: raw[1],
            socf_set: raw[2],
            socf_clear: raw[3],
        }
    }
}

impl From<&SocThresholds> for [u8; 4] {
    fn from(t: &SocThresholds) -> [u8; 4] {
        [t.soc1_set, t.soc1_clear, t.socf_set, t.socf_clear]
    }
}

/// Battery parameters applied by [`Bq27427::configure`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GaugeConfig {
    /// Chemistry profile
    pub chem_id: ChemId,
    /// Design capacity in mAh
    pub design_capacity: u16,
    /// Design energy in mWh
    pub design_energy: u16,
    /// Interrupt thresholds, left untouched when `None`
    pub soc_thresholds: Option<SocThresholds>,
    /// Raw OpConfig register, left untouched when `None`
    pub op_config: Option<u16>,
}

impl GaugeConfig {
    pub fn new(chem_id: ChemId, design_capacity: u16, design_energy: u16) -> Self {
        Self {
            chem_id,
            design_capacity,
            design_energy,
            soc_thresholds: None,
            op_config: None,
        }
    }
}

/// BQ27427 fuel gauge driver.
pub struct Bq27427<I, D> {
    pub(crate) i2c: I,
    pub(crate) delay: D,
    pub(crate) addr: u8,
}

impl<I, D, E> Bq27427<I, D>
where
    I: I2c<Error = E>,
    D: DelayNs,
{
    /// Creates the driver instance
    pub fn new(i2c: I, delay: D, addr: u8) -> Self {
        Self { i2c, delay, addr }
    }

    /// Releases the bus and the delay provider.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    fn read_control(&mut self, subcommand: u16) -> Result<u16, GaugeError<E>> {
        let mut response = [0, 0];

        self.write_control(subcommand)?;
        self.i2c
            .write_read(self.addr, &[commands::CONTROL], &mut response)?;

        Ok(u16::from_le_bytes(response))
    }

    fn write_control(&mut self, subcommand: u16) -> Result<(), GaugeError<E>> {
        let [lo, hi] = subcommand.to_le_bytes();
        self.i2c.write(self.addr, &[commands::CONTROL, lo, hi])?;
        Ok(())
    }

    fn read_command(&mut self, command: u8) -> Result<u16, GaugeError<E>> {
        let mut response = [0, 0];

        self.i2c.write_read(self.addr, &[command], &mut response)?;

        Ok(u16::from_le_bytes(response))
    }

    pub(crate) fn write_command(&mut self, command: u8, data: u8) -> Result<(), GaugeError<E>> {
        self.i2c.write(self.addr, &[command, data])?;
        Ok(())
    }

    /// Reads the battery voltage in volts
    pub fn voltage(&mut self) -> Result<f32, GaugeError<E>> {
        Ok(voltage_from_raw(self.read_command(commands::VOLTAGE)?))
    }

    /// Reads the average current in amperes, negative while discharging
    pub fn average_current(&mut self) -> Result<f32, GaugeError<E>> {
        Ok(signed_from_raw(self.read_command(commands::AVERAGE_CURRENT)?))
    }

    /// Reads the average power in watts, negative while discharging
    pub fn average_power(&mut self) -> Result<f32, GaugeError<E>> {
        Ok(signed_from_raw(self.read_command(commands::AVERAGE_POWER)?))
    }

    /// Reads the temperature sensor in degrees Celsius
    pub fn temperature(&mut self) -> Result<f32, GaugeError<E>> {
        Ok(temperature_from_raw(self.read_command(commands::TEMPERATURE)?))
    }

    /// Reads the state of charge in percent
    pub fn state_of_charge(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_command(commands::STATE_OF_CHARGE)
    }

    /// Reads the remaining capacity in mAh
    pub fn remaining_capacity(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_command(commands::REMAINING_CAPACITY)
    }

    /// Reads the full charge capacity in mAh
    pub fn full_charge_capacity(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_command(commands::FULL_CHARGE_CAPACITY)
    }

    /// Reads the contents of the Flags register
    pub fn flags(&mut self) -> Result<StatusFlags, GaugeError<E>> {
        Ok(StatusFlags::from(self.read_command(commands::FLAGS)?))
    }

    /// Reads the CONTROL_STATUS word
    pub fn control_status(&mut self) -> Result<ControlStatus, GaugeError<E>> {
        Ok(ControlStatus::from(
            self.read_control(control_subcommands::CONTROL_STATUS)?,
        ))
    }

    /// Reads the device type (0x0427 for the BQ27427)
    pub fn device_type(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_control(control_subcommands::DEVICE_TYPE)
    }

    pub fn chem_id(&mut self) -> Result<ChemId, GaugeError<E>> {
        Ok(ChemId::from(self.read_control(control_subcommands::CHEM_ID)?))
    }

    /// Selects a chemistry profile. The gauge must be in configuration update mode.
    ///
    /// # Errors
    ///
    /// Returns [`GaugeError::UnknownChemistry`] for [`ChemId::Unknown`]
    /// without touching the bus.
    pub fn set_chem_id(&mut self, id: ChemId) -> Result<(), GaugeError<E>> {
        let Some(subcommand) = id.subcommand() else {
            return Err(GaugeError::UnknownChemistry(id.code()));
        };
        info!("selecting chemistry subcommand {}", subcommand);
        self.write_control(subcommand)
    }

    /// Unseals the gauge (two unseal subcommands back to back)
    pub fn unseal(&mut self) -> Result<(), GaugeError<E>> {
        info!("unsealing...");
        self.write_control(control_subcommands::UNSEAL)?;
        self.write_control(control_subcommands::UNSEAL)
    }

    pub fn seal(&mut self) -> Result<(), GaugeError<E>> {
        info!("sealing...");
        self.write_control(control_subcommands::SEALED)
    }

    /// Moves the chip to CFGUPDATE mode and waits for it to settle
    pub fn enter_config_mode(&mut self) -> Result<(), GaugeError<E>> {
        info!("entering cfgupdate mode...");
        self.write_control(control_subcommands::SET_CFGUPDATE)?;
        self.delay.delay_ms(CFGUPDATE_SETTLE_MS);
        Ok(())
    }

    /// Partial reset, exits CFGUPDATE mode. Memory is not cleared. The gauge
    /// is sealed again afterwards.
    pub fn soft_reset(&mut self) -> Result<(), GaugeError<E>> {
        info!("performing soft reset...");
        self.write_control(control_subcommands::SOFT_RESET)?;
        self.seal()
    }

    /// Hard resets the chip. Re-initializes the memory with default values,
    /// so further configuration is required.
    pub fn hard_reset(&mut self) -> Result<(), GaugeError<E>> {
        info!("performing hard reset...");
        self.write_control(control_subcommands::RESET)
    }

    /// Reads the programmed design capacity in mAh
    pub fn design_capacity(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_memory_u16(&memory_fields::DESIGN_CAPACITY)
    }

    pub fn set_design_capacity(&mut self, capacity: u16) -> Result<(), GaugeError<E>> {
        self.write_memory_u16(&memory_fields::DESIGN_CAPACITY, capacity)
    }

    /// Reads the programmed design energy in mWh
    pub fn design_energy(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_memory_u16(&memory_fields::DESIGN_ENERGY)
    }

    pub fn set_design_energy(&mut self, energy: u16) -> Result<(), GaugeError<E>> {
        self.write_memory_u16(&memory_fields::DESIGN_ENERGY, energy)
    }

    pub fn soc_thresholds(&mut self) -> Result<SocThresholds, GaugeError<E>> {
        let mut raw = [0u8; 4];
        self.read_memory(&memory_fields::SOC1_SET, &mut raw)?;
        Ok(raw.into())
    }

    /// Writes all four thresholds, they are adjacent in the Discharge block
    pub fn set_soc_thresholds(&mut self, thresholds: &SocThresholds) -> Result<(), GaugeError<E>> {
        let raw: [u8; 4] = thresholds.into();
        self.write_memory(&memory_fields::SOC1_SET, &raw)
    }

    pub fn op_config(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_memory_u16(&memory_fields::OP_CONFIG)
    }

    pub fn set_op_config(&mut self, op_config: u16) -> Result<(), GaugeError<E>> {
        self.write_memory_u16(&memory_fields::OP_CONFIG, op_config)
    }

    /// Clears a negative sign on the CC gain. Some BQ27427 parts ship with
    /// it set, which makes the state of charge misbehave.
    ///
    /// Returns whether the fix was applied.
    pub fn fix_calibration_sign(&mut self) -> Result<bool, GaugeError<E>> {
        let sign_byte = self.read_memory_u8(&memory_fields::CC_GAIN_SIGN)?;
        debug!("CC gain sign byte is {}", sign_byte);

        if sign_byte & CC_GAIN_SIGN_BIT == 0 {
            return Ok(false);
        }

        info!("applying the CC gain fix");
        self.write_memory(
            &memory_fields::CC_GAIN_SIGN,
            &[sign_byte & !CC_GAIN_SIGN_BIT],
        )?;
        Ok(true)
    }

    /// Programs the battery parameters.
    ///
    /// Unseals, enters configuration update mode, selects the chemistry,
    /// writes each field through its own data memory transaction, applies
    /// the CC gain fix and finally soft resets (which seals the gauge).
    /// The first failure aborts the sequence, the gauge may be left unsealed
    /// and in configuration update mode in that case.
    pub fn configure(&mut self, config: &GaugeConfig) -> Result<(), GaugeError<E>> {
        if let ChemId::Unknown(code) = config.chem_id {
            return Err(GaugeError::UnknownChemistry(code));
        }

        self.unseal()?;
        self.enter_config_mode()?;
        self.set_chem_id(config.chem_id)?;
        self.set_design_capacity(config.design_capacity)?;
        self.set_design_energy(config.design_energy)?;
        if let Some(thresholds) = &config.soc_thresholds {
            self.set_soc_thresholds(thresholds)?;
        }
        if let Some(op_config) = config.op_config {
            self.set_op_config(op_config)?;
        }
        self.fix_calibration_sign()?;
        self.soft_reset()?;

        info!("gauge configured");
        Ok(())
    }
}
