//! `DateTime` conversion and register utilities for the MCP7940 RTC.
//!
//! This module provides the internal representation and conversion logic for
//! the MCP7940's seven timekeeping registers. It enables validated conversion
//! between the BCD-encoded register image and chrono's `NaiveDateTime`.
//!
//! # Register Model
//!
//! The MCP7940 stores date and time in 7 consecutive registers:
//! - Seconds (with the ST oscillator start bit), Minutes, Hours
//! - Weekday (with OSCRUN, PWRFAIL and VBATEN), Date, Month (with LPYR), Year
//!
//! Encoding always sets ST and VBATEN and derives the weekday and leap year
//! bits from the date. Decoding ignores the weekday register and the leap year
//! bit entirely: both are recomputed from the date when needed.
//!
//! # Error Handling
//!
//! Conversion errors are reported via [`DateTimeError`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::bcd::{self, BcdError};
use crate::fmt::*;
use crate::{Date, Hours, Minutes, Month, Seconds, Weekday, Year};

/// Errors that can occur during MCP7940 date/time conversion or validation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DateTimeError {
    /// The oscillator start bit is clear, the clock has never been set
    RtcNotStarted,
    /// A register holds an invalid BCD digit or the fields do not form a date
    InvalidFormat,
    /// The date/time cannot be stored (year must be 2001-2099)
    InvalidDatetime,
}

impl From<BcdError> for DateTimeError {
    fn from(e: BcdError) -> Self {
        match e {
            BcdError::InvalidDigit(_) => DateTimeError::InvalidFormat,
            BcdError::OutOfRange(_) => DateTimeError::InvalidDatetime,
        }
    }
}

/// Register image of the MCP7940 clock.
///
/// Each field is a strongly-typed bitfield wrapper for one register.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RtcDateTime {
    seconds: Seconds,
    minutes: Minutes,
    hours: Hours,
    weekday: Weekday,
    date: Date,
    month: Month,
    year: Year,
}

/// Day of week as stored by the device, 1 (Monday) to 7 (Sunday).
pub(crate) fn weekday_of(date: &impl Datelike) -> u8 {
    // number_from_monday is always 1-7
    date.weekday().number_from_monday() as u8
}

/// Gregorian leap year rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Converts a chrono calendar component to a BCD byte.
pub(crate) fn to_bcd(value: u32) -> Result<u8, DateTimeError> {
    let value = u8::try_from(value).map_err(|_| DateTimeError::InvalidDatetime)?;
    Ok(bcd::encode(value)?)
}

impl RtcDateTime {
    /// Encodes a date/time into the register image.
    ///
    /// # Errors
    ///
    /// Returns [`DateTimeError::InvalidDatetime`] unless `2000 < year < 2100`.
    pub fn from_datetime(datetime: &NaiveDateTime) -> Result<Self, DateTimeError> {
        let year = datetime.year();
        if year <= 2000 || year >= 2100 {
            error!("year {} is out of range, must be 2001-2099", year);
            return Err(DateTimeError::InvalidDatetime);
        }

        let mut seconds = Seconds::default();
        seconds.set_start_oscillator(true);
        seconds.set_seconds(to_bcd(datetime.second())?);

        let mut minutes = Minutes::default();
        minutes.set_minutes(to_bcd(datetime.minute())?);

        let mut hours = Hours::default();
        hours.set_hours(to_bcd(datetime.hour())?);

        let mut weekday = Weekday::default();
        weekday.set_battery_enable(true);
        weekday.set_weekday(weekday_of(datetime));

        let mut date = Date::default();
        date.set_date(to_bcd(datetime.day())?);

        let mut month = Month::default();
        month.set_leap_year(is_leap_year(year));
        month.set_month(to_bcd(datetime.month())?);

        let mut year_reg = Year::default();
        year_reg.set_year(to_bcd((year - 2000).unsigned_abs())?);

        let raw = RtcDateTime {
            seconds,
            minutes,
            hours,
            weekday,
            date,
            month,
            year: year_reg,
        };

        debug!("raw={:?}", <[u8; 7]>::from(&raw));

        Ok(raw)
    }

    /// Decodes the register image into a date/time.
    ///
    /// # Errors
    ///
    /// Returns [`DateTimeError::RtcNotStarted`] if the oscillator start bit is
    /// clear, [`DateTimeError::InvalidFormat`] for invalid BCD digits or a
    /// date that does not exist.
    pub fn into_datetime(self) -> Result<NaiveDateTime, DateTimeError> {
        if !self.seconds.start_oscillator() {
            return Err(DateTimeError::RtcNotStarted);
        }

        let seconds = bcd::decode(self.seconds.seconds())?;
        let minutes = bcd::decode(self.minutes.minutes())?;
        let hours = bcd::decode(self.hours.hours())?;
        let date = bcd::decode(self.date.date())?;
        let month = bcd::decode(self.month.month())?;
        let year = 2000 + i32::from(bcd::decode(self.year.year())?);

        debug!(
            "decoded {}-{}-{} {}:{}:{}",
            year, month, date, hours, minutes, seconds
        );

        NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(date))
            .and_then(|d| d.and_hms_opt(u32::from(hours), u32::from(minutes), u32::from(seconds)))
            .ok_or(DateTimeError::InvalidFormat)
    }

    /// Gets the weekday register as written by the last encode.
    #[must_use]
    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    /// Gets the month register, including the leap year bit.
    #[must_use]
    pub fn month(&self) -> Month {
        self.month
    }
}

impl From<[u8; 7]> for RtcDateTime {
    fn from(data: [u8; 7]) -> Self {
        RtcDateTime {
            seconds: Seconds(data[0]),
            minutes: Minutes(data[1]),
            hours: Hours(data[2]),
            weekday: Weekday(data[3]),
            date: Date(data[4]),
            month: Month(data[5]),
            year: Year(data[6]),
        }
    }
}

impl From<&RtcDateTime> for [u8; 7] {
    fn from(dt: &RtcDateTime) -> [u8; 7] {
        [
            dt.seconds.0,
            dt.minutes.0,
            dt.hours.0,
            dt.weekday.0,
            dt.date.0,
            dt.month.0,
            dt.year.0,
        ]
    }
}
