//! Telemetry link service
//!
//! Owns everything between the UART and the display: the byte source, the
//! receiver, the snapshot the display reads, and the watchdog. The
//! firmware's main loop calls [`TelemetryLink::service`] periodically with
//! the time since the last call.

use evdash_hal::ByteSource;
use evdash_protocol::{PollError, TelemetryReceiver, MAX_FRAME_LEN};

use crate::config::{ConfigError, ReceiverConfig};
use crate::snapshot::TelemetrySnapshot;
use crate::watchdog::{LinkStatus, LinkWatchdog, WatchdogAction};

/// Link errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
    /// The byte source failed
    Transport(E),
}

/// Result of one [`TelemetryLink::service`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceReport {
    /// Bytes consumed
    pub bytes: usize,
    /// Valid frames applied to the snapshot
    pub batches: usize,
    /// Whether the watchdog reset the receiver
    pub reset: bool,
    /// Link status after this call
    pub status: LinkStatus,
}

/// Byte source, receiver, snapshot and watchdog wired together
pub struct TelemetryLink<S: ByteSource, const N: usize = MAX_FRAME_LEN> {
    source: S,
    receiver: TelemetryReceiver<N>,
    snapshot: TelemetrySnapshot,
    watchdog: LinkWatchdog,
    transport_errors: u32,
}

impl<S: ByteSource, const N: usize> TelemetryLink<S, N> {
    /// Create a link from validated configuration
    pub fn new(source: S, config: &ReceiverConfig) -> Result<Self, ConfigError> {
        let policy = config.skip_policy()?;
        Ok(Self::from_parts(
            source,
            TelemetryReceiver::with_policy(policy),
            config.link.watchdog(),
        ))
    }

    /// Create a link from already built parts
    pub fn from_parts(source: S, receiver: TelemetryReceiver<N>, watchdog: LinkWatchdog) -> Self {
        Self {
            source,
            receiver,
            snapshot: TelemetrySnapshot::new(),
            watchdog,
            transport_errors: 0,
        }
    }

    /// Drain the source, update the snapshot and supervise the link
    ///
    /// # Arguments
    /// - `elapsed_ms`: Time since the previous call
    ///
    /// Updates from frames completed before a transport error are kept, and
    /// the watchdog still advances.
    pub fn service(&mut self, elapsed_ms: u32) -> Result<ServiceReport, LinkError<S::Error>> {
        let (outcome, error) = match self.receiver.poll(&mut self.source, &mut self.snapshot) {
            Ok(outcome) => (outcome, None),
            Err(PollError { outcome, error }) => (outcome, Some(error)),
        };

        if outcome.bytes > 0 {
            self.watchdog.byte_received();
        }
        if outcome.batches > 0 {
            self.watchdog.frame_received();
        }

        let reset = match self.watchdog.advance(elapsed_ms, self.receiver.in_frame()) {
            WatchdogAction::ResetReceiver => {
                self.receiver.reset();
                true
            }
            WatchdogAction::Continue => false,
        };

        if let Some(e) = error {
            self.transport_errors = self.transport_errors.saturating_add(1);
            return Err(LinkError::Transport(e));
        }

        Ok(ServiceReport {
            bytes: outcome.bytes,
            batches: outcome.batches,
            reset,
            status: self.watchdog.status(),
        })
    }

    /// Latest telemetry values
    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    /// Mutable snapshot, for [`TelemetrySnapshot::take_changed`]
    pub fn snapshot_mut(&mut self) -> &mut TelemetrySnapshot {
        &mut self.snapshot
    }

    pub fn receiver(&self) -> &TelemetryReceiver<N> {
        &self.receiver
    }

    pub fn watchdog(&self) -> &LinkWatchdog {
        &self.watchdog
    }

    /// Current link status
    pub fn status(&self) -> LinkStatus {
        self.watchdog.status()
    }

    /// Source errors seen so far
    pub fn transport_errors(&self) -> u32 {
        self.transport_errors
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Release the byte source
    pub fn into_source(self) -> S {
        self.source
    }
}
