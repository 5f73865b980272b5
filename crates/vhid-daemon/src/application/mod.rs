//! Application layer use cases for the daemon.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the device pipeline in `vhid_core` and
//! the infrastructure (files, stdin, logs).  Code here:
//!
//! - **Orchestrates** the devices to fulfil a command ("inject this packet",
//!   "reset the keyboard").
//! - **Depends on abstractions** such as [`runtime::DrainScheduler`] rather
//!   than on a concrete task system, so tests can drain synchronously.
//! - **Contains no file or terminal I/O**.
//!
//! # Sub-modules
//!
//! - **`runtime`** – Owns the device set and runs one deferred worker task
//!   per device.
//!
//! - **`inject`** – Executes parsed commands: stimulus injection, settings,
//!   statistics and reinitialisation, with optional recording.

pub mod inject;
pub mod runtime;
