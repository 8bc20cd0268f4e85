//! Dynamic loader adapter
//!
//! Thin RAII wrapper over the OS dynamic loader: open a plugin module,
//! resolve its two entry symbols, unmap on drop.

use std::path::Path;

use libloading::Library;

use gantry_api::{
    PluginCreateFn, PluginDestroyFn, CREATE_PLUGIN_SYMBOL, DESTROY_PLUGIN_SYMBOL,
};

use crate::error::{Error, Result};

/// An open plugin module. Dropping it unmaps the library, so it must
/// outlive every instance its factory produced.
#[derive(Debug)]
pub(crate) struct PluginLibrary {
    library: Library,
}

impl PluginLibrary {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        // Library initialisation runs module constructors; that is the point
        // of loading a plugin, and the contract the caller opted into.
        let library = unsafe { Library::new(path) }.map_err(|err| Error::LoadFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Ok(Self { library })
    }

    /// Resolve the paired factory and destroyer exports.
    pub(crate) fn entry_points(&self, path: &Path) -> Result<(PluginCreateFn, PluginDestroyFn)> {
        let create = unsafe { self.library.get::<PluginCreateFn>(CREATE_PLUGIN_SYMBOL) }
            .map_err(|_| Error::MissingSymbol {
                path: path.to_path_buf(),
                symbol: "create_plugin",
            })?;
        let destroy = unsafe { self.library.get::<PluginDestroyFn>(DESTROY_PLUGIN_SYMBOL) }
            .map_err(|_| Error::MissingSymbol {
                path: path.to_path_buf(),
                symbol: "destroy_plugin",
            })?;
        Ok((*create, *destroy))
    }
}
