//! Configuration loading and persistence
//!
//! The binary form is a postcard-encoded header (magic, version) followed by
//! the postcard-encoded [`ReceiverConfig`]. It is what gets written to
//! flash. The TOML form is for humans and bench tools.

use super::types::{ConfigIssue, ReceiverConfig};

/// Magic number identifying stored receiver configuration
pub const CONFIG_MAGIC: u32 = 0x4556_4443; // "EVDC"

/// Current binary format version
pub const CONFIG_VERSION: u8 = 1;

/// Upper bound on the encoded size of a [`ReceiverConfig`]
pub const MAX_CONFIG_SIZE: usize = 64;

/// Configuration load/store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Output buffer too small or encoding failed
    Serialize,
    /// Stored bytes are not a valid encoding
    Deserialize,
    /// Stored bytes are not receiver configuration
    BadMagic,
    /// Stored with a different format version
    VersionMismatch,
    /// TOML text could not be parsed into a configuration
    Toml,
    /// Configuration parsed but failed validation
    Invalid(ConfigIssue),
}

impl From<ConfigIssue> for ConfigError {
    fn from(issue: ConfigIssue) -> Self {
        ConfigError::Invalid(issue)
    }
}

impl ReceiverConfig {
    /// Encode into `buf`, returning the written bytes
    pub fn to_bytes<'a>(&self, buf: &'a mut [u8]) -> Result<&'a [u8], ConfigError> {
        let header = postcard::to_slice(&(CONFIG_MAGIC, CONFIG_VERSION), buf)
            .map_err(|_| ConfigError::Serialize)?
            .len();
        let body = postcard::to_slice(self, &mut buf[header..])
            .map_err(|_| ConfigError::Serialize)?
            .len();
        Ok(&buf[..header + body])
    }

    /// Decode and validate a stored configuration
    ///
    /// Trailing bytes after the configuration (erased flash) are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let ((magic, version), body) = postcard::take_from_bytes::<(u32, u8)>(bytes)
            .map_err(|_| ConfigError::Deserialize)?;
        if magic != CONFIG_MAGIC {
            return Err(ConfigError::BadMagic);
        }
        if version != CONFIG_VERSION {
            return Err(ConfigError::VersionMismatch);
        }

        let (config, _) =
            postcard::take_from_bytes::<Self>(body).map_err(|_| ConfigError::Deserialize)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate TOML text
    ///
    /// Missing sections and keys take their defaults:
    ///
    /// ```toml
    /// [link]
    /// baudrate = 115200
    /// idle_reset_ms = 100
    ///
    /// [decoder]
    /// default_skip_width = 1
    ///
    /// [[decoder.skip_rules]]
    /// first = 0x80
    /// last = 0x8F
    /// width = 2
    /// ```
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|_| ConfigError::Toml)?;
        config.validate()?;
        Ok(config)
    }
}
