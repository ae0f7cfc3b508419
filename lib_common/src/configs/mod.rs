//! # Configuration Modules
//!
//! This module aggregates the configuration providers used by the connector.
//! Settings are resolved once at process start and then passed by reference to
//! whichever component needs them.

/// Service settings resolved from environment variables with per-key defaults.
pub mod config_env;
