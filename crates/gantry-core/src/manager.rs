//! Process-wide plugin registry.
//!
//! The manager owns every loaded plugin instance together with the module
//! handle it came from, keyed by the name the plugin reports. One manager
//! exists per process, lazily initialized behind a lock (see
//! [`PluginManager::global`]).

use std::collections::BTreeMap;
use std::path::Path;
use std::ptr::NonNull;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info};

use gantry_api::{
    destroy_host_instance, instance_as_plugin, instance_from_plugin, Plugin, PluginDestroyFn,
    PluginInstance,
};

use crate::error::{Error, Result};
use crate::library::PluginLibrary;

static GLOBAL: Lazy<Mutex<PluginManager>> = Lazy::new(|| Mutex::new(PluginManager::new()));

/// One registered plugin: the instance handle, the destroyer bound to the
/// module that created it, and the module handle itself.
///
/// Drop order is the core lifetime guarantee: `Drop::drop` runs the bound
/// destroyer on the instance, and only afterwards does the `library` field
/// drop and unmap the module. An instance created by one module is never
/// passed to another module's destroyer.
struct PluginHandle {
    instance: NonNull<PluginInstance>,
    destroy: PluginDestroyFn,
    /// None for in-process registrations, which have nothing to unmap.
    library: Option<PluginLibrary>,
}

// The instance pointer is uniquely owned by the handle and `dyn Plugin`
// requires Send + Sync.
unsafe impl Send for PluginHandle {}

impl PluginHandle {
    fn plugin(&self) -> &dyn Plugin {
        unsafe { instance_as_plugin(self.instance.as_ptr()) }
    }
}

impl Drop for PluginHandle {
    fn drop(&mut self) {
        // Must complete before the `library` field drops below.
        unsafe { (self.destroy)(self.instance.as_ptr()) };
    }
}

/// Central registry for plugin loading and lifecycle management.
///
/// Not clonable; mutations serialize behind the lock returned by
/// [`PluginManager::global`]. References handed out by [`PluginManager::get`]
/// borrow the manager, so the borrow checker enforces that they are discarded
/// before `unload` or `shutdown`.
pub struct PluginManager {
    plugins: BTreeMap<String, PluginHandle>,
}

impl PluginManager {
    pub(crate) fn new() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }

    /// The process-wide manager, lazily initialized.
    pub fn global() -> &'static Mutex<PluginManager> {
        &GLOBAL
    }

    /// Load a plugin module and register its instance.
    ///
    /// The module must export the `create_plugin` / `destroy_plugin` pair and
    /// report a name not already present in the registry. On any failure the
    /// registry is unchanged, the instance (if one was created) has been
    /// destroyed by the module's own destroyer, and the module is unmapped.
    ///
    /// Returns the registered plugin name.
    pub fn load(&mut self, library_path: impl AsRef<Path>) -> Result<String> {
        let path = library_path.as_ref();
        if !path.exists() {
            return Err(Error::PathNotFound(path.to_path_buf()));
        }

        let library = PluginLibrary::open(path)?;
        let (create, destroy) = library.entry_points(path)?;

        let raw = unsafe { create() };
        let Some(instance) = NonNull::new(raw) else {
            // `library` drops here, unmapping the module.
            return Err(Error::FactoryReturnedNull(path.to_path_buf()));
        };

        let handle = PluginHandle {
            instance,
            destroy,
            library: Some(library),
        };
        debug!(path = %path.display(), plugin = %handle.plugin().name(), "Loaded plugin module");
        self.insert(handle)
    }

    /// Register an in-process plugin (statically linked into the host).
    ///
    /// Same identity and collision rules as [`PluginManager::load`]; the
    /// handle has no module to unmap and is destroyed host-side.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<String> {
        let handle = PluginHandle {
            instance: instance_from_plugin(plugin),
            destroy: destroy_host_instance,
            library: None,
        };
        self.insert(handle)
    }

    fn insert(&mut self, handle: PluginHandle) -> Result<String> {
        let name = handle.plugin().name().to_owned();
        if self.plugins.contains_key(&name) {
            // Dropping the handle runs the creating module's destroyer on the
            // fresh instance before its library handle closes.
            drop(handle);
            return Err(Error::NameCollision(name));
        }

        info!(
            plugin = %name,
            version = %handle.plugin().version(),
            dynamic = handle.library.is_some(),
            "Registered plugin"
        );
        self.plugins.insert(name.clone(), handle);
        Ok(name)
    }

    /// Unload a plugin by name: its destroyer runs, then its module unmaps.
    ///
    /// A name that is not registered is a no-op, never an error.
    pub fn unload(&mut self, plugin_name: &str) {
        if let Some(handle) = self.plugins.remove(plugin_name) {
            debug!(plugin = %plugin_name, "Unloading plugin");
            drop(handle);
        }
    }

    /// Type-checked access to a loaded plugin.
    ///
    /// `T` is a concrete interface type from a crate shared between host and
    /// plugin. The reference stays valid until the plugin is unloaded.
    pub fn get<T: Plugin>(&self, plugin_name: &str) -> Result<&T> {
        let plugin = self.get_plugin(plugin_name)?;
        plugin
            .downcast_ref::<T>()
            .ok_or_else(|| Error::TypeMismatch {
                name: plugin_name.to_owned(),
            })
    }

    /// Base-capability access to a loaded plugin (identity only).
    pub fn get_plugin(&self, plugin_name: &str) -> Result<&dyn Plugin> {
        self.plugins
            .get(plugin_name)
            .map(PluginHandle::plugin)
            .ok_or_else(|| Error::NotLoaded(plugin_name.to_owned()))
    }

    pub fn has(&self, plugin_name: &str) -> bool {
        self.plugins.contains_key(plugin_name)
    }

    /// Names of every registered plugin.
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    /// Unload every registered plugin.
    ///
    /// Order across plugins is unspecified; each plugin's destroyer still
    /// strictly precedes its own module unmap. Also runs on drop; hosts that
    /// need deterministic teardown relative to other shutdown work call this
    /// explicitly.
    pub fn shutdown(&mut self) {
        if !self.plugins.is_empty() {
            info!(count = self.plugins.len(), "Unloading all plugins");
        }
        self.plugins.clear();
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
