//! evdash Hardware Abstraction Layer
//!
//! This crate defines the boundary between the telemetry receiver and
//! whatever delivers raw bytes from the RS485 transceiver. The receiver
//! only ever polls for the next byte; it never owns the serial port.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  evdash-core (snapshot, watchdog, link) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  evdash-protocol (receiver)             │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  evdash-hal (this crate - ByteSource)   │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ IoByteSource  │       │  SliceSource  │
//! │ (UART driver) │       │   (replay)    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::ByteSource`] - Non-blocking byte supply

#![no_std]
#![deny(unsafe_code)]

pub mod replay;
pub mod uart;

// Re-export key types at crate root for convenience
pub use replay::SliceSource;
pub use uart::{ByteSource, DataBits, IoByteSource, Parity, StopBits, UartConfig};
