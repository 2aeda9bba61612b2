//! Core domain + application logic for the mailing-list bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the Mailman
//! REST API live behind ports (traits) implemented in adapter crates.

pub mod address;
pub mod bot;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod handlers;
pub mod logging;
pub mod messaging;
pub mod permission;
pub mod ports;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
