//! Logging shim: forwards to `defmt` or `log` when the matching feature is
//! enabled and expands to nothing otherwise.

#![macro_use]
#![allow(unused_macros, unused_imports)]

cfg_if::cfg_if! {
    if #[cfg(feature = "defmt")] {
        pub(crate) use defmt::{debug, error, info, warn};
    } else if #[cfg(feature = "log")] {
        pub(crate) use log::{debug, error, info, warn};
    }
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        $( let _ = &$arg; )*
    }};
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        $( let _ = &$arg; )*
    }};
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        $( let _ = &$arg; )*
    }};
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! error {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        $( let _ = &$arg; )*
    }};
}
