//! Alarm configuration utilities for the MCP7940 RTC.
//!
//! Alarm 0 is programmed with a full wake-up time: seconds, minutes, hours,
//! date and month must all match (mask `0b111`). The alarm registers have no
//! year, so decoding needs a reference time (the current device time) to pick
//! the year of the next occurrence.
//!
//! # Year resolution
//!
//! Given a reference time in year `Y`, the candidates `Y` and `Y + 1` are
//! built from the stored fields, invalid dates (February 29th of a common
//! year, for instance) are dropped, and the earliest candidate strictly after
//! the reference wins. Because [`validate_wake_time`] only accepts wake times
//! less than 365 days ahead, an alarm armed by this driver always resolves.
//! Anything else decodes to a spec without a wake time.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::bcd::{self, BcdError};
use crate::datetime::{to_bcd, weekday_of, DateTimeError};
use crate::fmt::*;
use crate::{AlarmMonth, AlarmSeconds, AlarmWeekday, Date, Hours, Minutes, Polarity, ALARM_MATCH_ALL};

/// Maximum distance between the current time and an armed wake time, exclusive.
pub const MAX_ALARM_DAYS: i64 = 365;

/// Error type for alarm configuration operations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmError {
    /// The alarm cannot be armed (no wake time, not in the future, too far ahead)
    InvalidAlarm(&'static str),
    /// `DateTime` conversion error
    DateTime(DateTimeError),
}

impl From<DateTimeError> for AlarmError {
    fn from(e: DateTimeError) -> Self {
        AlarmError::DateTime(e)
    }
}

impl From<BcdError> for AlarmError {
    fn from(e: BcdError) -> Self {
        AlarmError::DateTime(e.into())
    }
}

/// A wake-up alarm as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmSpec {
    /// Wake-up time, `None` when the stored alarm has no future occurrence
    pub wake_at: Option<NaiveDateTime>,
    /// Level driven on the MFP pin when the alarm fires
    pub polarity: Polarity,
    /// Whether the alarm is enabled in the control register
    pub armed: bool,
    /// Interrupt flag latched by the device, read-only
    pub fired: bool,
}

impl AlarmSpec {
    /// Creates an armed alarm that has not fired yet.
    #[must_use]
    pub fn new(wake_at: NaiveDateTime, polarity: Polarity) -> Self {
        Self {
            wake_at: Some(wake_at),
            polarity,
            armed: true,
            fired: false,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AlarmSpec {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "AlarmSpec {{ wake_at: {}, polarity: {}, armed: {}, fired: {} }}",
            defmt::Debug2Format(&self.wake_at),
            self.polarity,
            self.armed,
            self.fired
        );
    }
}

/// Checks that a wake time can be armed at `now`.
///
/// # Errors
///
/// Returns [`AlarmError::InvalidAlarm`] unless `wake_at` is strictly after
/// `now` and less than [`MAX_ALARM_DAYS`] days ahead.
pub fn validate_wake_time(wake_at: &NaiveDateTime, now: &NaiveDateTime) -> Result<(), AlarmError> {
    if wake_at <= now {
        return Err(AlarmError::InvalidAlarm("wake time must be in the future"));
    }
    if *wake_at - *now >= Duration::days(MAX_ALARM_DAYS) {
        return Err(AlarmError::InvalidAlarm(
            "wake time must be less than 365 days ahead",
        ));
    }
    Ok(())
}

/// Picks the year for a year-less alarm time.
///
/// Returns the earliest valid date in the reference year or the next one
/// that is strictly after `reference`, or `None` if neither qualifies.
#[must_use]
pub fn resolve_year(
    reference: &NaiveDateTime,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<NaiveDateTime> {
    let year = reference.year();
    [year, year + 1]
        .into_iter()
        .filter_map(|candidate| {
            NaiveDate::from_ymd_opt(candidate, month, day)
                .and_then(|d| d.and_hms_opt(hour, minute, second))
        })
        .filter(|candidate| candidate > reference)
        .min()
}

/// Register image of MCP7940 alarm 0.
///
/// This struct models the 6 alarm registers, using strongly-typed bitfield
/// wrappers for each field.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RtcAlarm {
    seconds: AlarmSeconds,
    minutes: Minutes,
    hours: Hours,
    weekday: AlarmWeekday,
    date: Date,
    month: AlarmMonth,
}

impl RtcAlarm {
    /// Encodes an alarm spec into the register image.
    ///
    /// The match mask is always full-match and the interrupt flag is written
    /// as 0. Arming is a separate control register write and `spec.armed` is
    /// not part of the image.
    ///
    /// # Errors
    ///
    /// Returns [`AlarmError::InvalidAlarm`] when the spec has no wake time.
    pub fn from_spec(spec: &AlarmSpec) -> Result<Self, AlarmError> {
        let wake_at = spec
            .wake_at
            .ok_or(AlarmError::InvalidAlarm("alarm has no wake time"))?;

        let mut seconds = AlarmSeconds::default();
        seconds.set_seconds(to_bcd(wake_at.second())?);

        let mut minutes = Minutes::default();
        minutes.set_minutes(to_bcd(wake_at.minute())?);

        let mut hours = Hours::default();
        hours.set_hours(to_bcd(wake_at.hour())?);

        let mut weekday = AlarmWeekday::default();
        weekday.set_polarity(spec.polarity);
        weekday.set_match_mask(ALARM_MATCH_ALL);
        weekday.set_fired(false);
        weekday.set_weekday(weekday_of(&wake_at));

        let mut date = Date::default();
        date.set_date(to_bcd(wake_at.day())?);

        let mut month = AlarmMonth::default();
        month.set_month(to_bcd(wake_at.month())?);

        let alarm = Self {
            seconds,
            minutes,
            hours,
            weekday,
            date,
            month,
        };
        debug!("alarm raw={:?}", <[u8; 6]>::from(&alarm));
        Ok(alarm)
    }

    /// Decodes the register image into an alarm spec.
    ///
    /// `reference` is the current device time, used to resolve the year. The
    /// returned spec is never `armed`: the enable bit lives in the control
    /// register and is filled in by the driver.
    ///
    /// # Errors
    ///
    /// Returns an error if a register holds invalid BCD digits.
    pub fn to_spec(&self, reference: &NaiveDateTime) -> Result<AlarmSpec, AlarmError> {
        let second = bcd::decode(self.seconds.seconds())?;
        let minute = bcd::decode(self.minutes.minutes())?;
        let hour = bcd::decode(self.hours.hours())?;
        let day = bcd::decode(self.date.date())?;
        let month = bcd::decode(self.month.month())?;

        let wake_at = resolve_year(
            reference,
            u32::from(month),
            u32::from(day),
            u32::from(hour),
            u32::from(minute),
            u32::from(second),
        );
        if wake_at.is_none() {
            warn!(
                "alarm {}-{} {}:{}:{} has no future occurrence",
                month, day, hour, minute, second
            );
        }

        Ok(AlarmSpec {
            wake_at,
            polarity: self.weekday.polarity(),
            armed: false,
            fired: self.weekday.fired(),
        })
    }

    /// Whether the interrupt flag is latched.
    #[must_use]
    pub fn fired(&self) -> bool {
        self.weekday.fired()
    }

    /// Gets the alarm weekday register (polarity, mask, flag, weekday).
    #[must_use]
    pub fn weekday(&self) -> AlarmWeekday {
        self.weekday
    }
}

impl From<[u8; 6]> for RtcAlarm {
    fn from(data: [u8; 6]) -> Self {
        RtcAlarm {
            seconds: AlarmSeconds(data[0]),
            minutes: Minutes(data[1]),
            hours: Hours(data[2]),
            weekday: AlarmWeekday(data[3]),
            date: Date(data[4]),
            month: AlarmMonth(data[5]),
        }
    }
}

impl From<&RtcAlarm> for [u8; 6] {
    fn from(alarm: &RtcAlarm) -> [u8; 6] {
        [
            alarm.seconds.0,
            alarm.minutes.0,
            alarm.hours.0,
            alarm.weekday.0,
            alarm.date.0,
            alarm.month.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_encode_register_image() {
        // Thursday
        let spec = AlarmSpec::new(datetime(2024, 3, 14, 18, 30, 15), Polarity::Low);
        let alarm = RtcAlarm::from_spec(&spec).unwrap();
        let image: [u8; 6] = (&alarm).into();
        assert_eq!(image, [0x15, 0x30, 0x18, 0x74, 0x14, 0x03]);

        let spec = AlarmSpec::new(datetime(2024, 3, 14, 18, 30, 15), Polarity::High);
        let image: [u8; 6] = (&RtcAlarm::from_spec(&spec).unwrap()).into();
        assert_eq!(image[3], 0xF4);
    }

    #[test]
    fn test_encode_clears_fired_flag() {
        let spec = AlarmSpec {
            wake_at: Some(datetime(2024, 3, 14, 18, 30, 15)),
            polarity: Polarity::Low,
            armed: true,
            fired: true,
        };
        let alarm = RtcAlarm::from_spec(&spec).unwrap();
        assert!(!alarm.fired());
        assert_eq!(alarm.weekday().match_mask(), ALARM_MATCH_ALL);
    }

    #[test]
    fn test_encode_without_wake_time() {
        let spec = AlarmSpec {
            wake_at: None,
            polarity: Polarity::Low,
            armed: true,
            fired: false,
        };
        assert!(matches!(
            RtcAlarm::from_spec(&spec),
            Err(AlarmError::InvalidAlarm(_))
        ));
    }

    #[test]
    fn test_decode_same_year() {
        let now = datetime(2024, 3, 14, 15, 30, 0);
        let alarm = RtcAlarm::from([0x15, 0x30, 0x18, 0x74, 0x14, 0x03]);
        let spec = alarm.to_spec(&now).unwrap();
        assert_eq!(spec.wake_at, Some(datetime(2024, 3, 14, 18, 30, 15)));
        assert_eq!(spec.polarity, Polarity::Low);
        assert!(!spec.fired);
        assert!(!spec.armed);
    }

    #[test]
    fn test_decode_fired_and_polarity() {
        let now = datetime(2024, 3, 14, 19, 0, 0);
        let alarm = RtcAlarm::from([0x15, 0x30, 0x18, 0xFC, 0x14, 0x03]);
        let spec = alarm.to_spec(&now).unwrap();
        assert!(spec.fired);
        assert_eq!(spec.polarity, Polarity::High);
        // Already passed this year, so the next occurrence is in 2025
        assert_eq!(spec.wake_at, Some(datetime(2025, 3, 14, 18, 30, 15)));
    }

    #[test]
    fn test_decode_ignores_mask_and_weekday() {
        let now = datetime(2024, 3, 14, 15, 30, 0);
        let alarm = RtcAlarm::from([0x15, 0x30, 0x18, 0x01, 0x14, 0x03]);
        let spec = alarm.to_spec(&now).unwrap();
        assert_eq!(spec.wake_at, Some(datetime(2024, 3, 14, 18, 30, 15)));
    }

    #[test]
    fn test_resolve_year_rollover() {
        let now = datetime(2024, 12, 31, 22, 0, 0);
        assert_eq!(
            resolve_year(&now, 1, 1, 1, 0, 0),
            Some(datetime(2025, 1, 1, 1, 0, 0))
        );
    }

    #[test]
    fn test_resolve_year_equal_to_reference() {
        let now = datetime(2024, 6, 1, 12, 0, 0);
        assert_eq!(
            resolve_year(&now, 6, 1, 12, 0, 0),
            Some(datetime(2025, 6, 1, 12, 0, 0))
        );
    }

    #[test]
    fn test_resolve_year_leap_day() {
        let now = datetime(2023, 3, 1, 0, 0, 0);
        assert_eq!(
            resolve_year(&now, 2, 29, 6, 0, 0),
            Some(datetime(2024, 2, 29, 6, 0, 0))
        );

        // 2024-02-29 already passed and 2025 has no leap day
        let now = datetime(2024, 3, 1, 0, 0, 0);
        assert_eq!(resolve_year(&now, 2, 29, 6, 0, 0), None);
    }

    #[test]
    fn test_decode_without_future_occurrence() {
        let now = datetime(2024, 3, 1, 0, 0, 0);
        let alarm = RtcAlarm::from([0x00, 0x00, 0x06, 0x74, 0x29, 0x02]);
        let spec = alarm.to_spec(&now).unwrap();
        assert_eq!(spec.wake_at, None);
    }

    #[test]
    fn test_decode_impossible_fields() {
        let now = datetime(2024, 3, 1, 0, 0, 0);
        // Month 13
        let alarm = RtcAlarm::from([0x00, 0x00, 0x06, 0x74, 0x01, 0x13]);
        assert_eq!(alarm.to_spec(&now).unwrap().wake_at, None);
    }

    #[test]
    fn test_decode_invalid_bcd() {
        let now = datetime(2024, 3, 1, 0, 0, 0);
        let alarm = RtcAlarm::from([0x0A, 0x00, 0x06, 0x74, 0x01, 0x03]);
        assert_eq!(
            alarm.to_spec(&now).unwrap_err(),
            AlarmError::DateTime(DateTimeError::InvalidFormat)
        );
    }

    #[test]
    fn test_three_hours_ahead_round_trip() {
        let now = datetime(2024, 7, 20, 22, 15, 30);
        let spec = AlarmSpec::new(now + Duration::hours(3), Polarity::Low);
        validate_wake_time(&spec.wake_at.unwrap(), &now).unwrap();

        let image: [u8; 6] = (&RtcAlarm::from_spec(&spec).unwrap()).into();
        let mut decoded = RtcAlarm::from(image).to_spec(&now).unwrap();
        decoded.armed = true;
        assert_eq!(decoded, spec);
    }

    #[test]
    fn test_validate_wake_time() {
        let now = datetime(2024, 7, 20, 12, 0, 0);

        assert!(validate_wake_time(&(now + Duration::seconds(1)), &now).is_ok());
        assert!(validate_wake_time(&(now + Duration::hours(3)), &now).is_ok());
        assert!(validate_wake_time(
            &(now + Duration::days(365) - Duration::seconds(1)),
            &now
        )
        .is_ok());

        for wake_at in [
            now,
            now - Duration::seconds(1),
            now + Duration::days(365),
            now + Duration::days(400),
        ] {
            assert!(matches!(
                validate_wake_time(&wake_at, &now),
                Err(AlarmError::InvalidAlarm(_))
            ));
        }
    }

    #[test]
    fn test_validated_alarm_always_resolves() {
        let now = datetime(2023, 3, 2, 0, 0, 0);
        // Every day of the following 364 days, the last one is 2024-02-29
        for offset in 1..MAX_ALARM_DAYS {
            let wake_at = now + Duration::days(offset);
            validate_wake_time(&wake_at, &now).unwrap();
            let spec = AlarmSpec::new(wake_at, Polarity::High);
            let image: [u8; 6] = (&RtcAlarm::from_spec(&spec).unwrap()).into();
            assert_eq!(
                RtcAlarm::from(image).to_spec(&now).unwrap().wake_at,
                Some(wake_at)
            );
        }
    }

    #[test]
    fn test_error_conversions() {
        assert_eq!(
            AlarmError::from(DateTimeError::RtcNotStarted),
            AlarmError::DateTime(DateTimeError::RtcNotStarted)
        );
        assert_eq!(
            AlarmError::from(BcdError::InvalidDigit(0xFF)),
            AlarmError::DateTime(DateTimeError::InvalidFormat)
        );
    }
}
