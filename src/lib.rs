//! Platform-agnostic drivers for the power-management board peripherals: the
//! MCP7940 battery-backed real-time clock and the BQ27427 battery fuel gauge.
//!
//! Both drivers are built on `embedded-hal` 1.0 traits. Async versions are
//! available in [`asynch`] with the `async` feature.
//!
//! # Features
//!
//! - `async`: async drivers using `embedded-hal-async`
//! - `log`: logging through the `log` crate
//! - `defmt`: logging and `defmt::Format` implementations through `defmt`
//!
//! # Real-time clock
//!
//! [`rtc::Mcp7940`] reads and sets the calendar time and programs alarm 0
//! as a one-shot wake-up. The alarm registers carry no year, reads resolve
//! it against the current device time (see [`alarm`]).
//!
//! ```rust,ignore
//! use powerboard::{rtc, AlarmSpec, Mcp7940, Polarity};
//!
//! let mut rtc = Mcp7940::new(i2c, rtc::DEFAULT_ADDRESS);
//! let now = rtc.datetime()?;
//! rtc.set_alarm(&AlarmSpec::new(now + chrono::Duration::hours(3), Polarity::Low))?;
//! ```
//!
//! # Fuel gauge
//!
//! [`gauge::Bq27427`] reads the standard measurements, runs control
//! subcommands and edits the checksummed data memory (see [`memory`]).
//!
//! ```rust,ignore
//! use powerboard::{gauge, Bq27427, ChemId, GaugeConfig};
//!
//! let mut gauge = Bq27427::new(i2c, delay, gauge::DEFAULT_ADDRESS);
//! gauge.configure(&GaugeConfig::new(ChemId::B4200, 3000, 11100))?;
//! let volts = gauge.voltage()?;
//! ```

#![no_std]

// Must come first so the logging macros are in scope for the other modules
mod fmt;

pub mod alarm;
#[cfg(feature = "async")]
pub mod asynch;
pub mod bcd;
pub mod datetime;
pub mod gauge;
pub mod gauge_defs;
pub mod memory;
mod registers;
pub mod rtc;

pub use alarm::{AlarmError, AlarmSpec, RtcAlarm};
pub use bcd::BcdError;
pub use datetime::{DateTimeError, RtcDateTime};
pub use gauge::{Bq27427, GaugeConfig, GaugeError, SocThresholds};
pub use gauge_defs::{ChemId, ControlStatus, MemoryLocation, StatusFlags};
pub use registers::*;
pub use rtc::{Mcp7940, RtcError};
