//! # keel-settings
//!
//! Configuration management with layered sources for the Keel wallet relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`KeelSettings::default()`]
//! 2. **User file**: `~/.keel/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `KEEL_*` and vendor key overrides (highest priority)
//!
//! The loaded value is passed by reference into each component's constructor.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, keel_home, load_settings, load_settings_from_path,
    resolve_data_dir, settings_path,
};
pub use types::*;
