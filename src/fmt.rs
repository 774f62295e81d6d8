//! Crate-internal logging macros.
//!
//! Forwards to `log` (feature `log`) or `defmt` (feature `defmt-0-3`). With
//! neither enabled the arguments are borrowed and discarded so call sites
//! compile identically on every feature set.
#![allow(unused_macros)]

#[cfg(all(feature = "log", feature = "defmt-0-3"))]
compile_error!("You may not enable both `log` and `defmt-0-3` features.");

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::trace!($s $(, $x)*);
            #[cfg(feature = "defmt-0-3")]
            ::defmt::trace!($s $(, $x)*);
            $(
                #[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
                let _ = &$x;
            )*
        }
    };
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::debug!($s $(, $x)*);
            #[cfg(feature = "defmt-0-3")]
            ::defmt::debug!($s $(, $x)*);
            $(
                #[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
                let _ = &$x;
            )*
        }
    };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::info!($s $(, $x)*);
            #[cfg(feature = "defmt-0-3")]
            ::defmt::info!($s $(, $x)*);
            $(
                #[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
                let _ = &$x;
            )*
        }
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::warn!($s $(, $x)*);
            #[cfg(feature = "defmt-0-3")]
            ::defmt::warn!($s $(, $x)*);
            $(
                #[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
                let _ = &$x;
            )*
        }
    };
}
