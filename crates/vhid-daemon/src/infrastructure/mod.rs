//! Infrastructure layer for the daemon.
//!
//! Contains the adapters facing the outside world: the TOML config file, the
//! line-oriented command sources, the event log sinks, and the statistics
//! report renderers.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `vhid_core`, but MUST NOT be imported by the `application` layer.

pub mod command_source;
pub mod event_log;
pub mod report;
pub mod storage;
