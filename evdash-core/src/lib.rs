//! Board-agnostic dashboard logic
//!
//! Everything the dashboard firmware needs between the UART and the
//! display that does not depend on a particular board:
//!
//! - Latest-value telemetry snapshot with change tracking
//! - Link watchdog (idle frame reset, stale link detection)
//! - Link service tying source, receiver, snapshot and watchdog together
//! - Receiver configuration (postcard for flash, TOML for humans)

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod link;
pub mod snapshot;
pub mod watchdog;

pub use config::{ConfigError, ReceiverConfig};
pub use link::{LinkError, ServiceReport, TelemetryLink};
pub use snapshot::{FieldSet, TelemetrySnapshot};
pub use watchdog::{LinkStatus, LinkWatchdog, WatchdogAction};
