//! Link supervision
//!
//! The protocol has no timeouts of its own: a frame cut off mid-way would
//! sit in the assembler until enough noise arrived to fail it. The watchdog
//! tracks time since the last byte and the last valid frame, asks for a
//! receiver reset when a partial frame goes quiet, and reports a stale link
//! when valid frames stop arriving.

/// Health of the telemetry link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    /// No valid frame received yet
    NoData,
    /// Valid frames are arriving
    Live,
    /// Valid frames stopped arriving
    Stale,
}

/// What the caller should do after [`LinkWatchdog::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WatchdogAction {
    /// Nothing to do
    Continue,
    /// Abandon the partial frame
    ResetReceiver,
}

/// Byte and frame timeout tracker
///
/// Feed it [`byte_received`](Self::byte_received) and
/// [`frame_received`](Self::frame_received) notices as they happen, then
/// call [`advance`](Self::advance) with the time elapsed since the previous
/// call. A notice restarts its timer, so time spent before the activity in
/// the same interval is not held against the link.
#[derive(Debug, Clone)]
pub struct LinkWatchdog {
    idle_reset_ms: u32,
    stale_after_ms: u32,
    since_byte_ms: u32,
    since_frame_ms: u32,
    byte_seen: bool,
    frame_seen: bool,
    status: LinkStatus,
    resets: u32,
}

impl LinkWatchdog {
    /// Create a watchdog
    ///
    /// # Arguments
    /// - `idle_reset_ms`: Silence mid-frame before the receiver is reset,
    ///   0 disables the idle reset
    /// - `stale_after_ms`: Time without a valid frame before the link is stale
    pub const fn new(idle_reset_ms: u32, stale_after_ms: u32) -> Self {
        Self {
            idle_reset_ms,
            stale_after_ms,
            since_byte_ms: 0,
            since_frame_ms: 0,
            byte_seen: false,
            frame_seen: false,
            status: LinkStatus::NoData,
            resets: 0,
        }
    }

    /// Note that at least one byte arrived
    pub fn byte_received(&mut self) {
        self.byte_seen = true;
    }

    /// Note that at least one valid frame arrived
    pub fn frame_received(&mut self) {
        self.frame_seen = true;
    }

    /// Advance time
    ///
    /// # Arguments
    /// - `elapsed_ms`: Time since the previous call
    /// - `in_frame`: Whether the receiver holds a partial frame
    pub fn advance(&mut self, elapsed_ms: u32, in_frame: bool) -> WatchdogAction {
        if core::mem::take(&mut self.byte_seen) {
            self.since_byte_ms = 0;
        } else {
            self.since_byte_ms = self.since_byte_ms.saturating_add(elapsed_ms);
        }

        if core::mem::take(&mut self.frame_seen) {
            self.since_frame_ms = 0;
            self.set_status(LinkStatus::Live);
        } else {
            self.since_frame_ms = self.since_frame_ms.saturating_add(elapsed_ms);
            if self.status == LinkStatus::Live && self.since_frame_ms >= self.stale_after_ms {
                self.set_status(LinkStatus::Stale);
            }
        }

        if in_frame && self.idle_reset_ms > 0 && self.since_byte_ms >= self.idle_reset_ms {
            self.resets = self.resets.saturating_add(1);
            self.since_byte_ms = 0;
            #[cfg(feature = "defmt")]
            defmt::warn!("partial frame idle for {} ms, resetting receiver", self.idle_reset_ms);
            return WatchdogAction::ResetReceiver;
        }

        WatchdogAction::Continue
    }

    /// Current link status
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Returns true while valid frames are arriving
    pub fn is_live(&self) -> bool {
        self.status == LinkStatus::Live
    }

    /// Idle resets requested so far
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Milliseconds since the last valid frame
    pub fn since_frame_ms(&self) -> u32 {
        self.since_frame_ms
    }

    fn set_status(&mut self, status: LinkStatus) {
        if self.status != status {
            #[cfg(feature = "defmt")]
            defmt::info!("link {} -> {}", self.status, status);
            self.status = status;
        }
    }
}
