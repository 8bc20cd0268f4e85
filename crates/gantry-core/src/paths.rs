//! Centralized path utilities
//!
//! All host-local filesystem locations in one place.

use std::path::PathBuf;

/// Environment override for the trusted key directory. Intended for tests
/// and deployments that keep keys outside the user configuration directory.
pub const KEYS_DIR_ENV: &str = "GANTRY_KEYS_DIR";

/// Get the gantry config directory (~/.config/gantry)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("gantry")
}

/// Get the trusted public key directory (~/.config/gantry/keys)
///
/// Honors [`KEYS_DIR_ENV`] when set.
pub fn trusted_keys_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(KEYS_DIR_ENV) {
        return PathBuf::from(dir);
    }
    config_dir().join("keys")
}
