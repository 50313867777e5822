//! cinder-core: configuration surface and shared constants for CinderGrid.
//!
//! Every component takes a [`CinderConfig`] by value at construction. There
//! is no ambient global configuration; a process builds one config (from
//! defaults or a TOML file) and hands clones to the store, the object model,
//! the scheduler, and the IPAM.

pub mod config;

pub use config::{CinderConfig, ConfigError, ConfigResult};

/// Byte-size multipliers shared by scheduler disk math.
pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * 1024 * 1024;
