//! Core domain + application logic for the printer monitor.
//!
//! This crate is intentionally hardware- and messenger-agnostic. The webcam and
//! Telegram live behind ports (traits) implemented in adapter crates.

pub mod archive;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod monitor;
pub mod ports;

pub use errors::{Error, Result};
