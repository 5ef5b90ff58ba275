//! Controller telemetry protocol
//!
//! This crate turns the raw RS485 byte stream from the vehicle controller
//! into validated, typed field updates for the dashboard. It regains
//! synchronization after noise or dropped bytes, checks every frame's CRC
//! before trusting it, and decodes the tag-value payload without ever
//! reading past the frame.
//!
//! # Protocol Overview
//!
//! All multi-byte integers are big-endian:
//! ```text
//! ┌──────┬──────┬────────┬─────────┬─────────────┬──────┬────────┐
//! │ STX1 │ STX2 │ LENGTH │ ADDRESS │ PAYLOAD     │ ETX  │ CRC16  │
//! │ 0x5D │ 0x47 │ 2B     │ 3B      │ (tag, val)* │ 0x78 │ 2B     │
//! └──────┴──────┴────────┴─────────┴─────────────┴──────┴────────┘
//! ```
//!
//! LENGTH counts ADDRESS + PAYLOAD + ETX; the CRC covers LENGTH through ETX.
//!
//! # Data Flow
//!
//! ```text
//! bytes ─► FrameAssembler ─► validate ─► decode ─► UpdateSink
//! ```
//!
//! [`TelemetryReceiver`] wires these stages together and keeps error
//! counters. Everything is `no_std` and allocation-free.

#![no_std]
#![deny(unsafe_code)]

pub mod assembler;
pub mod crc;
pub mod decoder;
pub mod fields;
pub mod frame;
pub mod receiver;
pub mod sink;

pub use assembler::{AssemblerState, FrameAssembler};
pub use crc::{checksum, Crc16};
pub use decoder::{
    decode, decode_into, BatchSummary, DecodeError, Fields, PolicyError, SkipPolicy, SkipRule,
    MAX_SKIP_RULES,
};
pub use fields::{ArmedState, DrivingMode, FieldId, FieldUpdate};
pub use frame::{
    encode_frame, is_valid, validate, FrameBuilder, FrameError, ValidFrame, ETX, MAX_FRAME_LEN,
    MIN_FRAME_LEN, STX1, STX2,
};
pub use receiver::{PollError, PollOutcome, ReceiverStats, TelemetryReceiver};
pub use sink::{Recorder, UpdateSink};
