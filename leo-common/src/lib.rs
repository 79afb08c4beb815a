//! LeoConnect Common
//!
//! Shared utilities for the LeoConnect key vault crates.
//!
//! This crate provides:
//! - Component-based structured logging with a device ID context

pub mod logging;

pub use logging::{Component, Logger};
