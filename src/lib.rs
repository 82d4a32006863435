//! aeroscan - pluggable custom scan providers for AeroDB
//!
//! - `custom_scan`: provider registry and scan lifecycle contract
//! - `providers`: built-in `values_scan` and `series_scan`
//! - `observability`: structured logging, events, counters
//! - `cli`: the `aeroscan` binary

pub mod cli;
pub mod custom_scan;
pub mod observability;
pub mod providers;
