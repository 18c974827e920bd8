//! Register definitions and bitfield structures for the MCP7940 RTC.
//!
//! This module contains the register addresses and bitfield layouts of the
//! timekeeping, control and alarm 0 registers. Calendar fields are kept as
//! whole BCD bytes and converted with [`crate::bcd`].

use bitfield::bitfield;

/// Register addresses for the MCP7940 RTC.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Seconds register with oscillator start bit
    Seconds = 0x00,
    /// Minutes register (0-59)
    Minutes = 0x01,
    /// Hours register (0-23 in 24-hour mode)
    Hours = 0x02,
    /// Weekday register with oscillator status and battery enable bits
    Weekday = 0x03,
    /// Date register (1-31)
    Date = 0x04,
    /// Month register with leap year bit
    Month = 0x05,
    /// Year register (0-99)
    Year = 0x06,
    /// Control register (output, square wave and alarm enables)
    Control = 0x07,
    /// Oscillator digital trim register
    OscTrim = 0x08,
    /// Alarm 0 seconds register
    Alarm0Seconds = 0x0A,
    /// Alarm 0 minutes register
    Alarm0Minutes = 0x0B,
    /// Alarm 0 hours register
    Alarm0Hours = 0x0C,
    /// Alarm 0 weekday register with polarity, mask and interrupt flag
    Alarm0Weekday = 0x0D,
    /// Alarm 0 date register
    Alarm0Date = 0x0E,
    /// Alarm 0 month register
    Alarm0Month = 0x0F,
}

/// Asserted level of the MFP pin when an alarm fires.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Pin is driven low on match
    Low = 0,
    /// Pin is driven high on match
    High = 1,
}
impl From<u8> for Polarity {
    /// Creates a `Polarity` from the ALMPOL bit.
    fn from(v: u8) -> Self {
        if v == 0 {
            Polarity::Low
        } else {
            Polarity::High
        }
    }
}
impl From<Polarity> for u8 {
    /// Converts a `Polarity` to its raw bit value.
    fn from(v: Polarity) -> Self {
        v as u8
    }
}

/// Square wave output frequency options.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SquareWaveFrequency {
    /// 1 Hz square wave output
    Hz1 = 0b00,
    /// 4.096 kHz square wave output
    Hz4096 = 0b01,
    /// 8.192 kHz square wave output
    Hz8192 = 0b10,
    /// 32.768 kHz square wave output
    Hz32768 = 0b11,
}
impl From<u8> for SquareWaveFrequency {
    /// Creates a `SquareWaveFrequency` from the two SQWFS bits.
    fn from(v: u8) -> Self {
        match v & 0b11 {
            0b00 => SquareWaveFrequency::Hz1,
            0b01 => SquareWaveFrequency::Hz4096,
            0b10 => SquareWaveFrequency::Hz8192,
            _ => SquareWaveFrequency::Hz32768,
        }
    }
}
impl From<SquareWaveFrequency> for u8 {
    /// Converts a `SquareWaveFrequency` to its raw register value.
    fn from(v: SquareWaveFrequency) -> Self {
        v as u8
    }
}

/// Alarm mask value that matches seconds, minutes, hours, weekday, date and month.
pub const ALARM_MATCH_ALL: u8 = 0b111;

// This macro generates the From<u8> and Into<u8> implementations for the
// register type
macro_rules! from_register_u8 {
    ($typ:ty) => {
        impl From<u8> for $typ {
            fn from(v: u8) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u8 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Seconds register: BCD seconds plus the ST oscillator start bit.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Seconds(u8);
    impl Debug;
    /// Oscillator start (ST) bit, 1 = oscillator enabled
    pub start_oscillator, set_start_oscillator: 7;
    /// BCD seconds (0-59)
    pub seconds, set_seconds: 6, 0;
}
from_register_u8!(Seconds);

bitfield! {
    /// Minutes register, shared by the clock and the alarm.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Minutes(u8);
    impl Debug;
    /// BCD minutes (0-59)
    pub minutes, set_minutes: 6, 0;
}
from_register_u8!(Minutes);

bitfield! {
    /// Hours register, shared by the clock and the alarm.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Hours(u8);
    impl Debug;
    /// 12/24 hour select, the driver always writes 24-hour mode
    pub twelve_hour, set_twelve_hour: 6;
    /// BCD hours (0-23)
    pub hours, set_hours: 5, 0;
}
from_register_u8!(Hours);

bitfield! {
    /// Weekday register with oscillator status and battery switchover control.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Weekday(u8);
    impl Debug;
    /// Oscillator running status (read-only)
    pub oscillator_running, _: 5;
    /// Primary power failure latch
    pub power_failed, set_power_failed: 4;
    /// Battery backup supply enable (VBATEN)
    pub battery_enable, set_battery_enable: 3;
    /// Day of week (1-7, Monday = 1)
    pub weekday, set_weekday: 2, 0;
}
from_register_u8!(Weekday);

bitfield! {
    /// Date register, shared by the clock and the alarm.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Date(u8);
    impl Debug;
    /// BCD day of month (1-31)
    pub date, set_date: 5, 0;
}
from_register_u8!(Date);

bitfield! {
    /// Month register with the leap year indicator.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Month(u8);
    impl Debug;
    /// Leap year indicator (LPYR)
    pub leap_year, set_leap_year: 5;
    /// BCD month (1-12)
    pub month, set_month: 4, 0;
}
from_register_u8!(Month);

bitfield! {
    /// Year register, two BCD digits counted from 2000.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Year(u8);
    impl Debug;
    /// BCD year offset (0-99)
    pub year, set_year: 7, 0;
}
from_register_u8!(Year);

bitfield! {
    /// Control register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Control(u8);
    impl Debug;
    /// Logic level of the MFP pin when alarms and square wave are disabled
    pub out, set_out: 7;
    /// Square wave output enable
    pub square_wave_enable, set_square_wave_enable: 6;
    /// Alarm 1 enable
    pub alarm1_enable, set_alarm1_enable: 5;
    /// Alarm 0 enable
    pub alarm0_enable, set_alarm0_enable: 4;
    /// External 32.768 kHz clock input instead of a crystal
    pub external_oscillator, set_external_oscillator: 3;
    /// Coarse trim mode
    pub coarse_trim, set_coarse_trim: 2;
    /// Square wave output frequency
    pub from into SquareWaveFrequency, square_wave_frequency, set_square_wave_frequency: 1, 0;
}
from_register_u8!(Control);

#[cfg(feature = "defmt")]
impl defmt::Format for Control {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Control(out: {}, sqw: {}, alm0: {}, alm1: {}, extosc: {}, freq: {})",
            self.out(),
            self.square_wave_enable(),
            self.alarm0_enable(),
            self.alarm1_enable(),
            self.external_oscillator(),
            self.square_wave_frequency()
        );
    }
}

bitfield! {
    /// Alarm seconds register.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct AlarmSeconds(u8);
    impl Debug;
    /// BCD seconds (0-59)
    pub seconds, set_seconds: 6, 0;
}
from_register_u8!(AlarmSeconds);

bitfield! {
    /// Alarm weekday register with polarity, match mask and interrupt flag.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct AlarmWeekday(u8);
    impl Debug;
    /// Alarm output polarity (ALMPOL)
    pub from into Polarity, polarity, set_polarity: 7, 7;
    /// Alarm match mask (ALMxMSK)
    pub match_mask, set_match_mask: 6, 4;
    /// Alarm interrupt flag (ALMxIF), latched by the device on match
    pub fired, set_fired: 3;
    /// Day of week (1-7, Monday = 1)
    pub weekday, set_weekday: 2, 0;
}
from_register_u8!(AlarmWeekday);

#[cfg(feature = "defmt")]
impl defmt::Format for AlarmWeekday {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "AlarmWeekday(pol: {}, mask: {=u8:b}, fired: {}, wday: {})",
            self.polarity(),
            self.match_mask(),
            self.fired(),
            self.weekday()
        );
    }
}

bitfield! {
    /// Alarm month register.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct AlarmMonth(u8);
    impl Debug;
    /// BCD month (1-12)
    pub month, set_month: 4, 0;
}
from_register_u8!(AlarmMonth);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_conversions() {
        assert_eq!(Polarity::from(0), Polarity::Low);
        assert_eq!(Polarity::from(1), Polarity::High);
        assert_eq!(u8::from(Polarity::Low), 0);
        assert_eq!(u8::from(Polarity::High), 1);
    }

    #[test]
    fn test_square_wave_frequency_conversions() {
        assert_eq!(SquareWaveFrequency::from(0b00), SquareWaveFrequency::Hz1);
        assert_eq!(SquareWaveFrequency::from(0b01), SquareWaveFrequency::Hz4096);
        assert_eq!(SquareWaveFrequency::from(0b10), SquareWaveFrequency::Hz8192);
        assert_eq!(SquareWaveFrequency::from(0b11), SquareWaveFrequency::Hz32768);
        assert_eq!(u8::from(SquareWaveFrequency::Hz8192), 0b10);
    }

    #[test]
    fn test_seconds_register() {
        let seconds = Seconds::from(0xD9); // ST set, 59 seconds
        assert!(seconds.start_oscillator());
        assert_eq!(seconds.seconds(), 0x59);
        assert_eq!(u8::from(seconds), 0xD9);

        let mut seconds = Seconds::default();
        seconds.set_seconds(0x30);
        assert!(!seconds.start_oscillator());
        seconds.set_start_oscillator(true);
        assert_eq!(seconds.0, 0xB0);
    }

    #[test]
    fn test_hours_register_ignores_format_bit() {
        let hours = Hours::from(0x23);
        assert!(!hours.twelve_hour());
        assert_eq!(hours.hours(), 0x23);

        let hours = Hours::from(0x52); // 12-hour flag with 0x12
        assert!(hours.twelve_hour());
        assert_eq!(hours.hours(), 0x12);
    }

    #[test]
    fn test_weekday_register() {
        let weekday = Weekday::from(0b0011_1101);
        assert!(weekday.oscillator_running());
        assert!(weekday.power_failed());
        assert!(weekday.battery_enable());
        assert_eq!(weekday.weekday(), 5);

        let mut weekday = Weekday::default();
        weekday.set_battery_enable(true);
        weekday.set_weekday(7);
        assert_eq!(u8::from(weekday), 0b0000_1111);
    }

    #[test]
    fn test_month_register_leap_year() {
        let month = Month::from(0x22);
        assert!(month.leap_year());
        assert_eq!(month.month(), 0x02);

        let month = Month::from(0x12);
        assert!(!month.leap_year());
        assert_eq!(month.month(), 0x12);
    }

    #[test]
    fn test_control_register() {
        let control = Control::from(0b1001_0011);
        assert!(control.out());
        assert!(!control.square_wave_enable());
        assert!(!control.alarm1_enable());
        assert!(control.alarm0_enable());
        assert!(!control.external_oscillator());
        assert_eq!(
            control.square_wave_frequency(),
            SquareWaveFrequency::Hz32768
        );

        let mut control = Control::default();
        control.set_alarm0_enable(true);
        assert_eq!(u8::from(control), 0b0001_0000);
    }

    #[test]
    fn test_alarm_weekday_register() {
        let alarm = AlarmWeekday::from(0b1111_1011);
        assert_eq!(alarm.polarity(), Polarity::High);
        assert_eq!(alarm.match_mask(), ALARM_MATCH_ALL);
        assert!(alarm.fired());
        assert_eq!(alarm.weekday(), 3);

        let mut alarm = AlarmWeekday::default();
        alarm.set_polarity(Polarity::Low);
        alarm.set_match_mask(ALARM_MATCH_ALL);
        alarm.set_weekday(2);
        assert_eq!(u8::from(alarm), 0b0111_0010);
    }

    #[test]
    fn test_alarm_month_masks_upper_bits() {
        let month = AlarmMonth::from(0xF2);
        assert_eq!(month.month(), 0x12);
    }

    #[test]
    fn test_register_addresses() {
        assert_eq!(RegAddr::Seconds as u8, 0x00);
        assert_eq!(RegAddr::Year as u8, 0x06);
        assert_eq!(RegAddr::Control as u8, 0x07);
        assert_eq!(RegAddr::Alarm0Seconds as u8, 0x0A);
        assert_eq!(RegAddr::Alarm0Weekday as u8, 0x0D);
        assert_eq!(RegAddr::Alarm0Month as u8, 0x0F);
    }
}
