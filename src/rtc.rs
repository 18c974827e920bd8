//! Blocking driver for the MCP7940 real-time clock.
//!
//! The driver keeps no copy of device state: every call re-reads the
//! registers it needs. Alarm reads and writes always fetch the current device
//! time first, it is the reference for year resolution and for the wake time
//! guard.
//!
//! # Example
//!
//! ```rust,ignore
//! use powerboard::{rtc::Mcp7940, AlarmSpec, Polarity};
//!
//! let mut rtc = Mcp7940::new(i2c, powerboard::rtc::DEFAULT_ADDRESS);
//! let now = rtc.datetime()?;
//! rtc.set_alarm(&AlarmSpec::new(now + chrono::Duration::hours(3), Polarity::Low))?;
//! ```

use chrono::NaiveDateTime;
use embedded_hal::i2c::I2c;
use paste::paste;

use crate::alarm::{validate_wake_time, AlarmError, AlarmSpec, RtcAlarm};
use crate::datetime::{DateTimeError, RtcDateTime};
use crate::fmt::*;
use crate::{AlarmWeekday, Control, RegAddr, Weekday};

/// Fixed I2C address of the MCP7940 RTC block.
pub const DEFAULT_ADDRESS: u8 = 0x6F;

/// Errors returned by the RTC drivers.
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcError<I2CE> {
    /// I2C bus error
    I2c(I2CE),
    /// Clock register conversion error
    DateTime(DateTimeError),
    /// Alarm configuration error
    Alarm(AlarmError),
}

impl<I2CE> From<I2CE> for RtcError<I2CE> {
    fn from(e: I2CE) -> Self {
        RtcError::I2c(e)
    }
}

/// MCP7940 Real-Time Clock driver.
pub struct Mcp7940<I2C: I2c> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Mcp7940<I2C> {
    /// Creates a new driver instance.
    ///
    /// # Arguments
    /// * `i2c` - The I2C bus implementation
    /// * `address` - The I2C address of the device (normally [`DEFAULT_ADDRESS`])
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Releases the I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_raw_datetime(&mut self) -> Result<RtcDateTime, RtcError<I2C::Error>> {
        let mut data = [0; 7];
        self.i2c
            .write_read(self.address, &[RegAddr::Seconds as u8], &mut data)?;
        Ok(data.into())
    }

    fn write_raw_datetime(&mut self, datetime: &RtcDateTime) -> Result<(), RtcError<I2C::Error>> {
        let data: [u8; 7] = datetime.into();
        self.i2c.write(
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
        )?;
        Ok(())
    }

    fn read_raw_alarm(&mut self) -> Result<RtcAlarm, RtcError<I2C::Error>> {
        let mut data = [0; 6];
        self.i2c
            .write_read(self.address, &[RegAddr::Alarm0Seconds as u8], &mut data)?;
        Ok(data.into())
    }

    fn write_raw_alarm(&mut self, alarm: &RtcAlarm) -> Result<(), RtcError<I2C::Error>> {
        let data: [u8; 6] = alarm.into();
        self.i2c.write(
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
        )?;
        Ok(())
    }

    /// Gets the current date and time from the device.
    ///
    /// # Errors
    ///
    /// Returns [`RtcError::DateTime`] if the clock was never started or holds
    /// an invalid date.
    pub fn datetime(&mut self) -> Result<NaiveDateTime, RtcError<I2C::Error>> {
        let raw = self.read_raw_datetime()?;
        raw.into_datetime().map_err(RtcError::DateTime)
    }

    /// Sets the date and time and starts the oscillator.
    ///
    /// # Errors
    ///
    /// Returns [`RtcError::DateTime`] unless the year is 2001-2099.
    pub fn set_datetime(&mut self, datetime: &NaiveDateTime) -> Result<(), RtcError<I2C::Error>> {
        let raw = RtcDateTime::from_datetime(datetime).map_err(RtcError::DateTime)?;
        self.write_raw_datetime(&raw)
    }

    /// Whether the oscillator is running (OSCRUN).
    pub fn oscillator_running(&mut self) -> Result<bool, RtcError<I2C::Error>> {
        Ok(self.weekday()?.oscillator_running())
    }

    /// Reads alarm 0.
    ///
    /// The wake time year is resolved against the current device time and
    /// `armed` comes from the alarm 0 enable bit of the control register.
    pub fn alarm(&mut self) -> Result<AlarmSpec, RtcError<I2C::Error>> {
        let now = self.datetime()?;
        let raw = self.read_raw_alarm()?;
        let control = self.control()?;
        let mut spec = raw.to_spec(&now).map_err(RtcError::Alarm)?;
        spec.armed = control.alarm0_enable();
        Ok(spec)
    }

    /// Programs alarm 0 and sets its enable bit to `spec.armed`.
    ///
    /// # Errors
    ///
    /// Returns [`RtcError::Alarm`] if the wake time is missing, not after the
    /// current device time, or 365 days or more ahead. Nothing is written in
    /// that case.
    pub fn set_alarm(&mut self, spec: &AlarmSpec) -> Result<(), RtcError<I2C::Error>> {
        let wake_at = spec
            .wake_at
            .ok_or(RtcError::Alarm(AlarmError::InvalidAlarm("alarm has no wake time")))?;
        let now = self.datetime()?;
        validate_wake_time(&wake_at, &now).map_err(RtcError::Alarm)?;

        let raw = RtcAlarm::from_spec(spec).map_err(RtcError::Alarm)?;
        self.write_raw_alarm(&raw)?;

        let mut control = self.control()?;
        control.set_alarm0_enable(spec.armed);
        self.set_control(control)?;
        info!("alarm 0 programmed, armed={}", spec.armed);
        Ok(())
    }

    /// Disarms alarm 0 and clears its interrupt flag.
    pub fn clear_alarm(&mut self) -> Result<(), RtcError<I2C::Error>> {
        let mut control = self.control()?;
        control.set_alarm0_enable(false);
        self.set_control(control)?;

        let mut weekday = self.alarm0_weekday()?;
        weekday.set_fired(false);
        self.set_alarm0_weekday(weekday)?;
        info!("alarm 0 cleared");
        Ok(())
    }

    /// Whether the alarm 0 interrupt flag is latched.
    pub fn alarm_fired(&mut self) -> Result<bool, RtcError<I2C::Error>> {
        Ok(self.alarm0_weekday()?.fired())
    }
}

// Single register access
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        impl<I2C: I2c> Mcp7940<I2C> {
            $(
                paste! {
                    #[doc = concat!("Gets the value of the ", stringify!($name), " register.")]
                    pub fn $name(&mut self) -> Result<$typ, RtcError<I2C::Error>> {
                        let mut data = [0];
                        self.i2c
                            .write_read(self.address, &[$regaddr as u8], &mut data)?;
                        Ok(<$typ>::from(data[0]))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                    pub fn [<set_ $name>](&mut self, value: $typ) -> Result<(), RtcError<I2C::Error>> {
                        self.i2c.write(
                            self.address,
                            &[$regaddr as u8, value.into()],
                        )?;
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
