//! Receiver configuration types
//!
//! All sections default field by field, so a TOML file only needs the keys
//! it changes.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use evdash_hal::UartConfig;
use evdash_protocol::{SkipPolicy, SkipRule, MAX_SKIP_RULES};

use crate::watchdog::LinkWatchdog;

/// Controller link baud rate
pub const DEFAULT_BAUDRATE: u32 = 115_200;

/// Silence inside a frame before the receiver gives up on it
pub const DEFAULT_IDLE_RESET_MS: u32 = 100;

/// Time without a valid frame before the link is reported stale
pub const DEFAULT_STALE_AFTER_MS: u32 = 1_000;

/// Widest value a skip rule may step over
pub const MAX_SKIP_WIDTH: u8 = 4;

/// Reason a configuration was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigIssue {
    /// Baud rate is zero
    ZeroBaudrate,
    /// Idle reset of zero would drop every frame split across two polls
    ZeroIdleReset,
    /// Idle reset is not shorter than the stale timeout
    IdleNotBelowStale,
    /// A skip width is outside `1..=MAX_SKIP_WIDTH`
    SkipWidth,
    /// A skip rule has `first > last`
    RuleRange,
}

/// Serial link settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct LinkConfig {
    /// UART baud rate
    pub baudrate: u32,
    /// Silence mid-frame before the partial frame is dropped (ms)
    pub idle_reset_ms: u32,
    /// Time without a valid frame before the link is stale (ms)
    pub stale_after_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baudrate: DEFAULT_BAUDRATE,
            idle_reset_ms: DEFAULT_IDLE_RESET_MS,
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
        }
    }
}

impl LinkConfig {
    /// UART settings for this link (8N1 at the configured baud rate)
    pub fn uart(&self) -> UartConfig {
        UartConfig::default().with_baudrate(self.baudrate)
    }

    /// Watchdog using these timeouts
    pub fn watchdog(&self) -> LinkWatchdog {
        LinkWatchdog::new(self.idle_reset_ms, self.stale_after_ms)
    }
}

/// One skip rule as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SkipRuleConfig {
    /// First tag covered (inclusive)
    pub first: u8,
    /// Last tag covered (inclusive)
    pub last: u8,
    /// Value bytes following the tag
    pub width: u8,
}

impl From<SkipRuleConfig> for SkipRule {
    fn from(rule: SkipRuleConfig) -> Self {
        SkipRule::new(rule.first, rule.last, rule.width)
    }
}

impl From<SkipRule> for SkipRuleConfig {
    fn from(rule: SkipRule) -> Self {
        Self {
            first: rule.first,
            last: rule.last,
            width: rule.width,
        }
    }
}

/// Payload decoder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct DecoderConfig {
    /// Bytes skipped after an unknown tag no rule covers
    pub default_skip_width: u8,
    /// Per-range skip widths, first match wins
    pub skip_rules: Vec<SkipRuleConfig, MAX_SKIP_RULES>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        let policy = SkipPolicy::default();
        Self {
            default_skip_width: policy.default_width(),
            // Both tables hold MAX_SKIP_RULES entries
            skip_rules: policy.rules().iter().map(|rule| (*rule).into()).collect(),
        }
    }
}

/// Complete receiver configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct ReceiverConfig {
    pub link: LinkConfig,
    pub decoder: DecoderConfig,
}

impl ReceiverConfig {
    /// Check value ranges and cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigIssue> {
        if self.link.baudrate == 0 {
            return Err(ConfigIssue::ZeroBaudrate);
        }
        if self.link.idle_reset_ms == 0 {
            return Err(ConfigIssue::ZeroIdleReset);
        }
        if self.link.idle_reset_ms >= self.link.stale_after_ms {
            return Err(ConfigIssue::IdleNotBelowStale);
        }
        if !valid_width(self.decoder.default_skip_width) {
            return Err(ConfigIssue::SkipWidth);
        }
        for rule in &self.decoder.skip_rules {
            if !valid_width(rule.width) {
                return Err(ConfigIssue::SkipWidth);
            }
            if rule.first > rule.last {
                return Err(ConfigIssue::RuleRange);
            }
        }
        Ok(())
    }

    /// Build the decoder's skip policy
    pub fn skip_policy(&self) -> Result<SkipPolicy, ConfigIssue> {
        self.validate()?;
        let mut policy = SkipPolicy::new(self.decoder.default_skip_width);
        for rule in &self.decoder.skip_rules {
            // Both tables share MAX_SKIP_RULES, so only the range can fail
            policy
                .add_rule((*rule).into())
                .map_err(|_| ConfigIssue::RuleRange)?;
        }
        Ok(policy)
    }
}

fn valid_width(width: u8) -> bool {
    (1..=MAX_SKIP_WIDTH).contains(&width)
}
