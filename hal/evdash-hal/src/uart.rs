//! UART serial communication abstractions
//!
//! The telemetry link is receive-only: the controller broadcasts frames and
//! the dashboard never answers, so only the receive side is modelled here.

use embedded_io::{Read, ReadReady};

/// Non-blocking supply of received bytes
///
/// Implementations return `Ok(None)` when no byte is currently available.
/// Callers poll; an implementation must never block waiting for data.
pub trait ByteSource {
    /// Error type for receive operations (framing, parity, overrun, ...)
    type Error;

    /// Take the next received byte, if one is available
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    type Error = S::Error;

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        (**self).read_byte()
    }
}

/// Adapter exposing any `embedded-io` reader as a [`ByteSource`]
///
/// `ReadReady` is checked first so that `read` is only called when it is
/// guaranteed not to block.
#[derive(Debug)]
pub struct IoByteSource<R> {
    inner: R,
}

impl<R> IoByteSource<R> {
    /// Wrap a UART receiver
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped receiver
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Release the wrapped receiver
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + ReadReady> ByteSource for IoByteSource<R> {
    type Error = R::Error;

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        if !self.inner.read_ready()? {
            return Ok(None);
        }

        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for UartConfig {
    /// Controller link settings: 115200 8N1
    fn default() -> Self {
        Self {
            baudrate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl UartConfig {
    /// Same line settings at a different baud rate
    pub const fn with_baudrate(self, baudrate: u32) -> Self {
        Self { baudrate, ..self }
    }

    /// Bits on the wire per transmitted byte (start + data + parity + stop)
    pub const fn bits_per_byte(&self) -> u32 {
        let data = match self.data_bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
            DataBits::Nine => 9,
        };
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + data + parity + stop
    }

    /// Time to receive `bytes` bytes at line rate, rounded up to whole ms
    ///
    /// Useful for sizing idle timeouts relative to the longest frame.
    pub const fn transfer_time_ms(&self, bytes: u32) -> u32 {
        if self.baudrate == 0 {
            return u32::MAX;
        }
        let bits = bytes as u64 * self.bits_per_byte() as u64;
        let ms = (bits * 1000).div_ceil(self.baudrate as u64);
        if ms > u32::MAX as u64 {
            u32::MAX
        } else {
            ms as u32
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
    Nine,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}
