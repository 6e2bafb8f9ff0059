//! # pier-config
//!
//! Configuration model for the Pier web-module installer.
//!
//! This crate owns the user-facing configuration shape (mounts, exclusion
//! globs, aliases, install options) and its pre-run validation. The install
//! pipeline itself lives in `pier-install`.

pub mod config;
pub mod error;
pub mod validation;

pub use config::{EngineTuning, InstallOptions, PierConfig};
pub use error::{ConfigError, Result};
pub use validation::{validate, ConfigWarning};
