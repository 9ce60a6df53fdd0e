//! Core domain + application logic for the GitHub Telegram Bot.
//!
//! This crate is intentionally framework-agnostic. Telegram, GitHub and the
//! durable store live behind ports (traits) implemented in adapter crates.

pub mod accounts;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod gateway;
pub mod hosting;
pub mod linkage;
pub mod logging;
pub mod messaging;
pub mod model;
pub mod snapshot;
pub mod store;
pub mod utils;

pub use errors::{Error, Result};
