//! Zero Common - Shared configuration, errors and logging for Zero services.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Error types and handling utilities
//! - Logging setup and trace id helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, ObservabilityConfig, ScreenerSection};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, ObservabilityConfig, ScreenerSection};
    pub use crate::error::{Error, Result};
    pub use crate::logging::{generate_trace_id, init_logging, init_logging_with_exclusions};
}
