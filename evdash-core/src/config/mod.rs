//! Receiver configuration
//!
//! Board-agnostic settings for the link and the payload decoder. Stored in
//! flash as postcard binary data, or written by hand as TOML.

pub mod store;
pub mod types;

pub use store::*;
pub use types::*;
