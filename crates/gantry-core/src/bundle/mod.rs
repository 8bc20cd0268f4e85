//! Signed plugin bundle loading.
//!
//! A bundle is a zip-family archive carrying a `manifest.yaml`, one or more
//! platform-specific plugin binaries, and a detached signature over the
//! canonical digest of those files. Opening a bundle stages it into a scoped
//! temporary directory, authenticates the signer against the host trust
//! store, screens binaries against the host platform, and loads the
//! survivors through the plugin manager.

mod abi;
mod archive;
mod keys;
mod loader;
mod manifest;
mod signing;

pub use abi::{AbiSignature, HostPlatform};
pub use keys::{trusted_keys, trusted_keys_from, TrustedKey};
pub use loader::{LoadPolicy, PluginBundle};
pub use manifest::{BundleManifest, ManifestPlugin, ManifestSignature, PluginBinary};
pub use signing::{canonical_payload, verify_with_keys, Trust};
