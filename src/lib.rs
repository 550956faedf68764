//! Attendance computation and payroll calculation core of a multi-tenant HR
//! backend.
//!
//! Derives per-day attendance state from raw check-in/check-out events
//! (shift-aware lateness, overtime and half-day rules), serves the daily /
//! history / monthly read-models, and turns monthly aggregates into payroll
//! entries. The HTTP layer, auth and file storage live elsewhere; this crate
//! talks to MySQL and takes "now" as an explicit parameter everywhere.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod service;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
