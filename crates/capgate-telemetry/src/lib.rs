//! Capgate Telemetry - logging setup for capgate frontends.
//!
//! Wraps `tracing-subscriber` behind a serializable [`LogConfig`] so the
//! same settings can come from a config file, environment variables, or
//! command-line flags.
//!
//! # Example
//!
//! ```rust,no_run
//! use capgate_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), capgate_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("capgate_storage=warn");
//!
//! let _guard = setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogGuard, LogTarget, setup_default_logging,
    setup_logging,
};
