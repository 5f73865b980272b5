//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML file at startup, fills in defaults
//! for anything missing, and range-checks the result before any device is
//! built.  It can also write the live settings back out.

pub mod config;
