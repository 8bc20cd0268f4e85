//! Gantry: a runtime plugin framework with signed bundle distribution.
//!
//! Two subsystems share this crate:
//!
//! - [`manager::PluginManager`], the process-wide registry that loads native
//!   plugin modules through the factory ABI defined in `gantry-api`, hands
//!   out type-checked references, and guarantees that a plugin's destructor
//!   runs strictly before its module is unmapped;
//! - [`bundle::PluginBundle`], which opens a signed archive of plugin
//!   binaries, verifies it against the host trust store, screens binaries by
//!   platform and ABI, and drives the manager to load the survivors.
//!
//! Plugins implement [`gantry_api::Plugin`] and export their entry points
//! with `gantry_api::declare_plugin!`.

pub mod bundle;
pub mod digest;
pub mod error;
mod library;
pub mod manager;
pub mod paths;

pub use bundle::{LoadPolicy, PluginBundle};
pub use error::{Error, Result};
pub use manager::PluginManager;

/// Re-export of the shared plugin interface crate.
pub use gantry_api as api;

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    use parking_lot::Mutex;

    /// Serializes tests that touch process environment variables.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Write a zip archive with the given `(name, content)` entries.
    pub(crate) fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
}
