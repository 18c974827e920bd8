//! Async implementation of the MCP7940 and BQ27427 drivers.
//!
//! This module provides async interfaces to both devices using
//! `embedded-hal-async` traits. It is only available when the `async` feature
//! is enabled. Register codecs, error types and checksum helpers are shared
//! with the blocking drivers.
//!
//! # Example
//!
//! ```rust,ignore
//! use powerboard::asynch::{Bq27427, Mcp7940};
//!
//! let mut rtc = Mcp7940::new(i2c, powerboard::rtc::DEFAULT_ADDRESS);
//! let now = rtc.datetime().await?;
//!
//! let mut gauge = Bq27427::new(i2c2, delay, powerboard::gauge::DEFAULT_ADDRESS);
//! let soc = gauge.state_of_charge().await?;
//! ```

use byteorder::{BigEndian, ByteOrder};
use chrono::NaiveDateTime;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use paste::paste;

use crate::alarm::{validate_wake_time, AlarmError, AlarmSpec, RtcAlarm};
use crate::datetime::RtcDateTime;
use crate::fmt::*;
use crate::gauge::{GaugeConfig, GaugeError, SocThresholds, CC_GAIN_SIGN_BIT};
use crate::gauge_defs::{
    commands, control_subcommands, memory_fields, signed_from_raw, temperature_from_raw,
    voltage_from_raw, ChemId, ControlStatus, MemoryLocation, StatusFlags, CFGUPDATE_SETTLE_MS,
    MEMBLOCK_SETTLE_MS, MEMBLOCK_SIZE,
};
use crate::memory::{check_range, updated_checksum};
use crate::rtc::RtcError;
use crate::{AlarmWeekday, Control, RegAddr, Weekday};

/// MCP7940 Real-Time Clock async driver.
pub struct Mcp7940<I2C: I2c> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Mcp7940<I2C> {
    /// Creates a new async driver instance.
    ///
    /// # Arguments
    /// * `i2c` - The async I2C bus implementation
    /// * `address` - The I2C address of the device (typically 0x6F)
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Releases the I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    async fn read_raw_datetime(&mut self) -> Result<RtcDateTime, RtcError<I2C::Error>> {
        let mut data = [0; 7];
        self.i2c
            .write_read(self.address, &[RegAddr::Seconds as u8], &mut data)
            .await?;
        Ok(data.into())
    }

    async fn write_raw_datetime(
        &mut self,
        datetime: &RtcDateTime,
    ) -> Result<(), RtcError<I2C::Error>> {
        let data: [u8; 7] = datetime.into();
        self.i2c
            .write(
                self.address,
                &[
                    RegAddr::Seconds as u8,
                    data[0],
                    data[1],
                    data[2],
                    data[3],
                    data[4],
                    data[5],
                    data[6],
                ],
            )
            .await?;
        Ok(())
    }

    async fn read_raw_alarm(&mut self) -> Result<RtcAlarm, RtcError<I2C::Error>> {
        let mut data = [0; 6];
        self.i2c
            .write_read(self.address, &[RegAddr::Alarm0Seconds as u8], &mut data)
            .await?;
        Ok(data.into())
    }

    async fn write_raw_alarm(&mut self, alarm: &RtcAlarm) -> Result<(), RtcError<I2C::Error>> {
        let data: [u8; 6] = alarm.into();
        self.i2c
            .write(
                self.address,
                &[
                    RegAddr::Alarm0Seconds as u8,
                    data[0],
                    data[1],
                    data[2],
                    data[3],
                    data[4],
                    data[5],
                ],
            )
            .await?;
        Ok(())
    }

    /// Gets the current date and time from the device.
    pub async fn datetime(&mut self) -> Result<NaiveDateTime, RtcError<I2C::Error>> {
        let raw = self.read_raw_datetime().await?;
        raw.into_datetime().map_err(RtcError::DateTime)
    }

    /// Sets the date and time and starts the oscillator.
    pub async fn set_datetime(
        &mut self,
        datetime: &NaiveDateTime,
    ) -> Result<(), RtcError<I2C::Error>> {
        let raw = RtcDateTime::from_datetime(datetime).map_err(RtcError::DateTime)?;
        self.write_raw_datetime(&raw).await
    }

    /// Whether the oscillator is running (OSCRUN).
    pub async fn oscillator_running(&mut self) -> Result<bool, RtcError<I2C::Error>> {
        Ok(self.weekday().await?.oscillator_running())
    }

    /// Reads alarm 0, resolving its year against the current device time.
    pub async fn alarm(&mut self) -> Result<AlarmSpec, RtcError<I2C::Error>> {
        let now = self.datetime().await?;
        let raw = self.read_raw_alarm().await?;
        let control = self.control().await?;
        let mut spec = raw.to_spec(&now).map_err(RtcError::Alarm)?;
        spec.armed = control.alarm0_enable();
        Ok(spec)
    }

    /// Programs alarm 0 and sets its enable bit to `spec.armed`.
    pub async fn set_alarm(&mut self, spec: &AlarmSpec) -> Result<(), RtcError<I2C::Error>> {
        let wake_at = spec
            .wake_at
            .ok_or(RtcError::Alarm(AlarmError::InvalidAlarm("alarm has no wake time")))?;
        let now = self.datetime().await?;
        validate_wake_time(&wake_at, &now).map_err(RtcError::Alarm)?;

        let raw = RtcAlarm::from_spec(spec).map_err(RtcError::Alarm)?;
        self.write_raw_alarm(&raw).await?;

        let mut control = self.control().await?;
        control.set_alarm0_enable(spec.armed);
        self.set_control(control).await?;
        info!("alarm 0 programmed, armed={}", spec.armed);
        Ok(())
    }

    /// Disarms alarm 0 and clears its interrupt flag.
    pub async fn clear_alarm(&mut self) -> Result<(), RtcError<I2C::Error>> {
        let mut control = self.control().await?;
        control.set_alarm0_enable(false);
        self.set_control(control).await?;

        let mut weekday = self.alarm0_weekday().await?;
        weekday.set_fired(false);
        self.set_alarm0_weekday(weekday).await?;
        info!("alarm 0 cleared");
        Ok(())
    }

    /// Whether the alarm 0 interrupt flag is latched.
    pub async fn alarm_fired(&mut self) -> Result<bool, RtcError<I2C::Error>> {
        Ok(self.alarm0_weekday().await?.fired())
    }
}

// Register access implementations
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        impl<I2C: I2c> Mcp7940<I2C> {
            $(
                paste! {
                    #[doc = concat!("Gets the value of the ", stringify!($name), " register.")]
                    pub async fn $name(&mut self) -> Result<$typ, RtcError<I2C::Error>> {
                        let mut data = [0];
                        self.i2c
                            .write_read(self.address, &[$regaddr as u8], &mut data)
                            .await?;
                        Ok(<$typ>::from(data[0]))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                    pub async fn [<set_ $name>](&mut self, value: $typ) -> Result<(), RtcError<I2C::Error>> {
                        self.i2c.write(
                            self.address,
                            &[$regaddr as u8, value.into()],
                        ).await?;
                        Ok(())
                    }
                }
            )+
        }
    }
}

impl_register_access!(
    (weekday, RegAddr::Weekday, Weekday),
    (control, RegAddr::Control, Control),
    (alarm0_weekday, RegAddr::Alarm0Weekday, AlarmWeekday)
);

/// BQ27427 fuel gauge async driver.
///
/// Settle delays suspend only the calling task.
pub struct Bq27427<I, D> {
    i2c: I,
    delay: D,
    addr: u8,
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

    async fn read_control(&mut self, subcommand: u16) -> Result<u16, GaugeError<E>> {
        let mut response = [0, 0];

        self.write_control(subcommand).await?;
        self.i2c
            .write_read(self.addr, &[commands::CONTROL], &mut response)
            .await?;

        Ok(u16::from_le_bytes(response))
    }

    async fn write_control(&mut self, subcommand: u16) -> Result<(), GaugeError<E>> {
        let [lo, hi] = subcommand.to_le_bytes();
        self.i2c
            .write(self.addr, &[commands::CONTROL, lo, hi])
            .await?;
        Ok(())
    }

    async fn read_command(&mut self, command: u8) -> Result<u16, GaugeError<E>> {
        let mut response = [0, 0];

        self.i2c
            .write_read(self.addr, &[command], &mut response)
            .await?;

        Ok(u16::from_le_bytes(response))
    }

    async fn write_command(&mut self, command: u8, data: u8) -> Result<(), GaugeError<E>> {
        self.i2c.write(self.addr, &[command, data]).await?;
        Ok(())
    }

    /// Reads the battery voltage in volts
    pub async fn voltage(&mut self) -> Result<f32, GaugeError<E>> {
        Ok(voltage_from_raw(self.read_command(commands::VOLTAGE).await?))
    }

    /// Reads the average current in amperes
    pub async fn average_current(&mut self) -> Result<f32, GaugeError<E>> {
        Ok(signed_from_raw(
            self.read_command(commands::AVERAGE_CURRENT).await?,
        ))
    }

    /// Reads the average power in watts
    pub async fn average_power(&mut self) -> Result<f32, GaugeError<E>> {
        Ok(signed_from_raw(
            self.read_command(commands::AVERAGE_POWER).await?,
        ))
    }

    /// Reads the temperature sensor in degrees Celsius
    pub async fn temperature(&mut self) -> Result<f32, GaugeError<E>> {
        Ok(temperature_from_raw(
            self.read_command(commands::TEMPERATURE).await?,
        ))
    }

    pub async fn state_of_charge(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_command(commands::STATE_OF_CHARGE).await
    }

    pub async fn remaining_capacity(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_command(commands::REMAINING_CAPACITY).await
    }

    pub async fn full_charge_capacity(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_command(commands::FULL_CHARGE_CAPACITY).await
    }

    /// Reads the contents of the Flags register
    pub async fn flags(&mut self) -> Result<StatusFlags, GaugeError<E>> {
        Ok(StatusFlags::from(self.read_command(commands::FLAGS).await?))
    }

    pub async fn control_status(&mut self) -> Result<ControlStatus, GaugeError<E>> {
        Ok(ControlStatus::from(
            self.read_control(control_subcommands::CONTROL_STATUS)
                .await?,
        ))
    }

    pub async fn device_type(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_control(control_subcommands::DEVICE_TYPE).await
    }

    pub async fn chem_id(&mut self) -> Result<ChemId, GaugeError<E>> {
        Ok(ChemId::from(
            self.read_control(control_subcommands::CHEM_ID).await?,
        ))
    }

    /// Selects a chemistry profile. The gauge must be in configuration update mode.
    pub async fn set_chem_id(&mut self, id: ChemId) -> Result<(), GaugeError<E>> {
        let Some(subcommand) = id.subcommand() else {
            return Err(GaugeError::UnknownChemistry(id.code()));
        };
        info!("selecting chemistry subcommand {}", subcommand);
        self.write_control(subcommand).await
    }

    pub async fn unseal(&mut self) -> Result<(), GaugeError<E>> {
        info!("unsealing...");
        self.write_control(control_subcommands::UNSEAL).await?;
        self.write_control(control_subcommands::UNSEAL).await
    }

    pub async fn seal(&mut self) -> Result<(), GaugeError<E>> {
        info!("sealing...");
        self.write_control(control_subcommands::SEALED).await
    }

    /// Moves the chip to CFGUPDATE mode and waits for it to settle
    pub async fn enter_config_mode(&mut self) -> Result<(), GaugeError<E>> {
        info!("entering cfgupdate mode...");
        self.write_control(control_subcommands::SET_CFGUPDATE)
            .await?;
        self.delay.delay_ms(CFGUPDATE_SETTLE_MS).await;
        Ok(())
    }

    /// Partial reset followed by sealing the gauge
    pub async fn soft_reset(&mut self) -> Result<(), GaugeError<E>> {
        info!("performing soft reset...");
        self.write_control(control_subcommands::SOFT_RESET).await?;
        self.seal().await
    }

    pub async fn hard_reset(&mut self) -> Result<(), GaugeError<E>> {
        info!("performing hard reset...");
        self.write_control(control_subcommands::RESET).await
    }

    async fn memblock_prepare_op(&mut self, class: u8, block: u8) -> Result<(), GaugeError<E>> {
        self.write_command(commands::BLOCK_DATA_CONTROL, 0).await?;
        self.write_command(commands::DATA_CLASS, class).await?;
        self.write_command(commands::DATA_BLOCK, block).await?;

        self.delay.delay_ms(MEMBLOCK_SETTLE_MS).await;

        Ok(())
    }

    async fn read_checksum(&mut self) -> Result<u8, GaugeError<E>> {
        let mut checksum = [0];

        self.i2c
            .write_read(self.addr, &[commands::BLOCK_DATA_CHECKSUM], &mut checksum)
            .await?;

        Ok(checksum[0])
    }

    /// Reads `buffer.len()` bytes of data memory at `location`.
    pub async fn read_memory(
        &mut self,
        location: &MemoryLocation,
        buffer: &mut [u8],
    ) -> Result<(), GaugeError<E>> {
        check_range(location, buffer.len())?;
        self.memblock_prepare_op(location.class, location.block)
            .await?;
        self.i2c
            .write_read(self.addr, &[location.register()], buffer)
            .await?;
        Ok(())
    }

    /// Writes `data` to data memory at `location` and updates the block checksum.
    pub async fn write_memory(
        &mut self,
        location: &MemoryLocation,
        data: &[u8],
    ) -> Result<(), GaugeError<E>> {
        check_range(location, data.len())?;
        let len = data.len();

        self.memblock_prepare_op(location.class, location.block)
            .await?;

        let checksum = self.read_checksum().await?;
        let mut old = [0u8; MEMBLOCK_SIZE];
        self.i2c
            .write_read(self.addr, &[location.register()], &mut old[..len])
            .await?;

        let mut request = [0u8; MEMBLOCK_SIZE + 1];
        request[0] = location.register();
        request[1..=len].copy_from_slice(data);
        self.i2c.write(self.addr, &request[..=len]).await?;

        let new_checksum = updated_checksum(checksum, &old[..len], data);
        debug!(
            "memory {}/{}@{}: checksum {} -> {}",
            location.class, location.block, location.offset, checksum, new_checksum
        );
        self.i2c
            .write(self.addr, &[commands::BLOCK_DATA_CHECKSUM, new_checksum])
            .await?;

        Ok(())
    }

    async fn read_memory_u16(&mut self, location: &MemoryLocation) -> Result<u16, GaugeError<E>> {
        let mut buffer = [0u8; 2];
        self.read_memory(location, &mut buffer).await?;
        Ok(BigEndian::read_u16(&buffer))
    }

    async fn write_memory_u16(
        &mut self,
        location: &MemoryLocation,
        value: u16,
    ) -> Result<(), GaugeError<E>> {
        let mut buffer = [0u8; 2];
        BigEndian::write_u16(&mut buffer, value);
        self.write_memory(location, &buffer).await
    }

    pub async fn design_capacity(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_memory_u16(&memory_fields::DESIGN_CAPACITY).await
    }

    pub async fn set_design_capacity(&mut self, capacity: u16) -> Result<(), GaugeError<E>> {
        self.write_memory_u16(&memory_fields::DESIGN_CAPACITY, capacity)
            .await
    }

    pub async fn design_energy(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_memory_u16(&memory_fields::DESIGN_ENERGY).await
    }

    pub async fn set_design_energy(&mut self, energy: u16) -> Result<(), GaugeError<E>> {
        self.write_memory_u16(&memory_fields::DESIGN_ENERGY, energy)
            .await
    }

    pub async fn soc_thresholds(&mut self) -> Result<SocThresholds, GaugeError<E>> {
        let mut raw = [0u8; 4];
        self.read_memory(&memory_fields::SOC1_SET, &mut raw).await?;
        Ok(raw.into())
    }

    pub async fn set_soc_thresholds(
        &mut self,
        thresholds: &SocThresholds,
    ) -> Result<(), GaugeError<E>> {
        let raw: [u8; 4] = thresholds.into();
        self.write_memory(&memory_fields::SOC1_SET, &raw).await
    }

    pub async fn op_config(&mut self) -> Result<u16, GaugeError<E>> {
        self.read_memory_u16(&memory_fields::OP_CONFIG).await
    }

    pub async fn set_op_config(&mut self, op_config: u16) -> Result<(), GaugeError<E>> {
        self.write_memory_u16(&memory_fields::OP_CONFIG, op_config)
            .await
    }

    /// Clears a negative sign on the CC gain, returns whether it was set.
    pub async fn fix_calibration_sign(&mut self) -> Result<bool, GaugeError<E>> {
        let mut sign_byte = [0u8; 1];
        self.read_memory(&memory_fields::CC_GAIN_SIGN, &mut sign_byte)
            .await?;
        debug!("CC gain sign byte is {}", sign_byte[0]);

        if sign_byte[0] & CC_GAIN_SIGN_BIT == 0 {
            return Ok(false);
        }

        info!("applying the CC gain fix");
        self.write_memory(
            &memory_fields::CC_GAIN_SIGN,
            &[sign_byte[0] & !CC_GAIN_SIGN_BIT],
        )
        .await?;
        Ok(true)
    }

    /// Programs the battery parameters, see the blocking
    /// [`crate::gauge::Bq27427::configure`].
    pub async fn configure(&mut self, config: &GaugeConfig) -> Result<(), GaugeError<E>> {
        if let ChemId::Unknown(code) = config.chem_id {
            return Err(GaugeError::UnknownChemistry(code));
        }

        self.unseal().await?;
        self.enter_config_mode().await?;
        self.set_chem_id(config.chem_id).await?;
        self.set_design_capacity(config.design_capacity).await?;
        self.set_design_energy(config.design_energy).await?;
        if let Some(thresholds) = &config.soc_thresholds {
            self.set_soc_thresholds(thresholds).await?;
        }
        if let Some(op_config) = config.op_config {
            self.set_op_config(op_config).await?;
        }
        self.fix_calibration_sign().await?;
        self.soft_reset().await?;

        info!("gauge configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;
    use crate::{DateTimeError, Polarity};
    use alloc::vec;
    use alloc::vec::Vec;
    use chrono::{Duration, NaiveDate};
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const RTC_ADDRESS: u8 = 0x6F;
    const GAUGE_ADDRESS: u8 = 0x55;

    // 2024-03-14 15:30:00, Thursday
    const NOW_REGISTERS: [u8; 7] = [0x80, 0x30, 0x15, 0x0C, 0x14, 0x23, 0x24];

    #[derive(Default)]
    struct RecordingDelay {
        ms: Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, _ns: u32) {}

        async fn delay_ms(&mut self, ms: u32) {
            self.ms.push(ms);
        }
    }

    async fn setup_mock(expectations: &[I2cTrans]) -> I2cMock {
        I2cMock::new(expectations)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    fn read_now() -> I2cTrans {
        I2cTrans::write_read(
            RTC_ADDRESS,
            vec![RegAddr::Seconds as u8],
            NOW_REGISTERS.to_vec(),
        )
    }

    fn control(subcommand: u16) -> I2cTrans {
        let [lo, hi] = subcommand.to_le_bytes();
        I2cTrans::write(GAUGE_ADDRESS, vec![0x00, lo, hi])
    }

    fn select(class: u8, block: u8) -> Vec<I2cTrans> {
        vec![
            I2cTrans::write(GAUGE_ADDRESS, vec![0x61, 0x00]),
            I2cTrans::write(GAUGE_ADDRESS, vec![0x3E, class]),
            I2cTrans::write(GAUGE_ADDRESS, vec![0x3F, block]),
        ]
    }

    #[tokio::test]
    async fn test_async_read_datetime() {
        let mock = setup_mock(&[read_now()]).await;
        let mut dev = Mcp7940::new(mock, RTC_ADDRESS);
        assert_eq!(dev.datetime().await.unwrap(), now());
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_set_datetime() {
        let mut expected = vec![RegAddr::Seconds as u8];
        expected.extend_from_slice(&NOW_REGISTERS);
        let mock = setup_mock(&[I2cTrans::write(RTC_ADDRESS, expected)]).await;
        let mut dev = Mcp7940::new(mock, RTC_ADDRESS);
        dev.set_datetime(&now()).await.unwrap();
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_datetime_not_started() {
        let mut registers = NOW_REGISTERS;
        registers[0] = 0x00;
        let mock = setup_mock(&[I2cTrans::write_read(
            RTC_ADDRESS,
            vec![RegAddr::Seconds as u8],
            registers.to_vec(),
        )])
        .await;
        let mut dev = Mcp7940::new(mock, RTC_ADDRESS);
        assert_eq!(
            dev.datetime().await.unwrap_err(),
            RtcError::DateTime(DateTimeError::RtcNotStarted)
        );
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_alarm_round_trip() {
        let spec = AlarmSpec::new(now() + Duration::hours(3), Polarity::Low);
        let image = [0x00, 0x30, 0x18, 0x74, 0x14, 0x03];
        let mut write_alarm = vec![RegAddr::Alarm0Seconds as u8];
        write_alarm.extend_from_slice(&image);

        let mock = setup_mock(&[
            read_now(),
            I2cTrans::write(RTC_ADDRESS, write_alarm),
            I2cTrans::write_read(RTC_ADDRESS, vec![RegAddr::Control as u8], vec![0x00]),
            I2cTrans::write(RTC_ADDRESS, vec![RegAddr::Control as u8, 0x10]),
            read_now(),
            I2cTrans::write_read(
                RTC_ADDRESS,
                vec![RegAddr::Alarm0Seconds as u8],
                image.to_vec(),
            ),
            I2cTrans::write_read(RTC_ADDRESS, vec![RegAddr::Control as u8], vec![0x10]),
        ])
        .await;
        let mut dev = Mcp7940::new(mock, RTC_ADDRESS);

        dev.set_alarm(&spec).await.unwrap();
        assert_eq!(dev.alarm().await.unwrap(), spec);
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_clear_alarm() {
        let mock = setup_mock(&[
            I2cTrans::write_read(RTC_ADDRESS, vec![RegAddr::Control as u8], vec![0x90]),
            I2cTrans::write(RTC_ADDRESS, vec![RegAddr::Control as u8, 0x80]),
            I2cTrans::write_read(RTC_ADDRESS, vec![RegAddr::Alarm0Weekday as u8], vec![0xFC]),
            I2cTrans::write(RTC_ADDRESS, vec![RegAddr::Alarm0Weekday as u8, 0xF4]),
            I2cTrans::write_read(RTC_ADDRESS, vec![RegAddr::Alarm0Weekday as u8], vec![0xF4]),
        ])
        .await;
        let mut dev = Mcp7940::new(mock, RTC_ADDRESS);

        dev.clear_alarm().await.unwrap();
        assert!(!dev.alarm_fired().await.unwrap());
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_set_alarm_rejects_far_wake_time() {
        let mock = setup_mock(&[read_now()]).await;
        let mut dev = Mcp7940::new(mock, RTC_ADDRESS);
        let spec = AlarmSpec::new(now() + Duration::days(365), Polarity::High);
        assert!(matches!(
            dev.set_alarm(&spec).await,
            Err(RtcError::Alarm(AlarmError::InvalidAlarm(_)))
        ));
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_gauge_measurements() {
        let mock = setup_mock(&[
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x1C], vec![0x55, 0x00]),
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x06], vec![0x01, 0x00]),
            control(0x0008),
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x00], vec![0x30, 0x32]),
        ])
        .await;
        let mut dev = Bq27427::new(mock, RecordingDelay::default(), GAUGE_ADDRESS);

        assert_eq!(dev.state_of_charge().await.unwrap(), 85);
        assert_eq!(dev.flags().await.unwrap(), StatusFlags::DSG);
        assert_eq!(dev.chem_id().await.unwrap(), ChemId::A4350);
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_write_memory_sequence() {
        let mut expectations = select(82, 0);
        expectations.extend([
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x60], vec![0x5A]),
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x46], vec![0x03, 0xE8]),
            I2cTrans::write(GAUGE_ADDRESS, vec![0x46, 0x0B, 0xB8]),
            I2cTrans::write(GAUGE_ADDRESS, vec![0x60, 0x82]),
        ]);
        let mock = setup_mock(&expectations).await;
        let mut dev = Bq27427::new(mock, RecordingDelay::default(), GAUGE_ADDRESS);

        dev.set_design_capacity(3000).await.unwrap();
        assert_eq!(dev.delay.ms, vec![50]);
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_design_capacity() {
        let mut expectations = select(82, 0);
        expectations.push(I2cTrans::write_read(
            GAUGE_ADDRESS,
            vec![0x46],
            vec![0x0B, 0xB8],
        ));
        let mock = setup_mock(&expectations).await;
        let mut dev = Bq27427::new(mock, RecordingDelay::default(), GAUGE_ADDRESS);

        assert_eq!(dev.design_capacity().await.unwrap(), 3000);
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_enter_config_mode_and_reset() {
        let mock = setup_mock(&[
            control(0x8000),
            control(0x8000),
            control(0x0013),
            control(0x0042),
            control(0x0020),
        ])
        .await;
        let mut dev = Bq27427::new(mock, RecordingDelay::default(), GAUGE_ADDRESS);

        dev.unseal().await.unwrap();
        dev.enter_config_mode().await.unwrap();
        dev.soft_reset().await.unwrap();
        assert_eq!(dev.delay.ms, vec![1100]);
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_configure_with_calibration_fix() {
        let mut expectations = vec![control(0x8000), control(0x8000), control(0x0013), control(0x0031)];
        expectations.extend(select(82, 0));
        expectations.extend([
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x60], vec![0x5A]),
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x46], vec![0x03, 0xE8]),
            I2cTrans::write(GAUGE_ADDRESS, vec![0x46, 0x0B, 0xB8]),
            I2cTrans::write(GAUGE_ADDRESS, vec![0x60, 0x82]),
        ]);
        expectations.extend(select(82, 0));
        expectations.extend([
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x60], vec![0x82]),
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x48], vec![0x0E, 0x74]),
            I2cTrans::write(GAUGE_ADDRESS, vec![0x48, 0x2B, 0x5C]),
            I2cTrans::write(GAUGE_ADDRESS, vec![0x60, 0x7D]),
        ]);
        expectations.extend(select(105, 0));
        expectations.push(I2cTrans::write_read(GAUGE_ADDRESS, vec![0x45], vec![0x81]));
        expectations.extend(select(105, 0));
        expectations.extend([
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x60], vec![0x10]),
            I2cTrans::write_read(GAUGE_ADDRESS, vec![0x45], vec![0x81]),
            I2cTrans::write(GAUGE_ADDRESS, vec![0x45, 0x01]),
            I2cTrans::write(GAUGE_ADDRESS, vec![0x60, 0x90]),
        ]);
        expectations.extend([control(0x0042), control(0x0020)]);

        let mock = setup_mock(&expectations).await;
        let mut dev = Bq27427::new(mock, RecordingDelay::default(), GAUGE_ADDRESS);

        dev.configure(&GaugeConfig::new(ChemId::B4200, 3000, 11100))
            .await
            .unwrap();
        assert_eq!(dev.delay.ms, vec![1100, 50, 50, 50, 50]);
        dev.i2c.done();
    }

    #[tokio::test]
    async fn test_async_memory_bus_error() {
        let mock = setup_mock(&[
            I2cTrans::write(GAUGE_ADDRESS, vec![0x61, 0x00]).with_error(ErrorKind::Other)
        ])
        .await;
        let mut dev = Bq27427::new(mock, RecordingDelay::default(), GAUGE_ADDRESS);

        assert_eq!(
            dev.design_energy().await.unwrap_err(),
            GaugeError::I2c(ErrorKind::Other)
        );
        assert!(dev.delay.ms.is_empty());
        dev.i2c.done();
    }
}
