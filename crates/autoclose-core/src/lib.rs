//! Core of AutoClose: closes idle support threads after a period of
//! inactivity, warning before it does and starting over on new activity.
//!
//! This crate is framework-agnostic. The ticket system and the messenger live
//! behind ports (traits) implemented in adapter crates.

pub mod activity;
pub mod command;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod lifecycle;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod store;
pub mod sweep;
pub mod tickets;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
