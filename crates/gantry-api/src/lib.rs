//! Shared plugin interface for the gantry plugin framework.
//!
//! Every plugin module and every host link against this crate. It pins the
//! three things both sides must agree on:
//!
//! - the [`Plugin`] trait, the base capability every plugin implements;
//! - the factory ABI: two `extern "C"` symbols, [`CREATE_PLUGIN_SYMBOL`] and
//!   [`DESTROY_PLUGIN_SYMBOL`], trading in opaque [`PluginInstance`] handles;
//! - the handle convention: a `*mut PluginInstance` is a thinly-disguised
//!   `*mut Box<dyn Plugin>`, and the casts in both directions live here and
//!   nowhere else.
//!
//! Dynamic type checks (`PluginManager::get::<T>`) compare `TypeId`s of
//! concrete types exported by interface crates built on top of this one.
//! Those ids are only meaningful when host and plugins are compiled by the
//! same toolchain against the same `gantry-api`; that requirement is part of
//! the ABI contract, alongside the rule that an instance is destroyed only by
//! the destroyer of the module that created it.

use std::any::Any;
use std::ptr::NonNull;

/// Name of the factory symbol every plugin module exports.
pub const CREATE_PLUGIN_SYMBOL: &[u8] = b"create_plugin\0";

/// Name of the destroyer symbol every plugin module exports.
pub const DESTROY_PLUGIN_SYMBOL: &[u8] = b"destroy_plugin\0";

/// Base capability implemented by every plugin.
///
/// Identity strings must be stable for the lifetime of the instance;
/// string literals are the expected storage.
pub trait Plugin: Any + Send + Sync {
    /// Unique (per manager) plugin name.
    fn name(&self) -> &str;

    /// Informational version string.
    fn version(&self) -> &str;
}

impl dyn Plugin {
    /// Whether this instance is a `T`.
    pub fn is<T: Plugin>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    /// Downcast to a concrete interface type from a shared crate.
    pub fn downcast_ref<T: Plugin>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }
}

/// Plugins that transform a value of type `T`.
///
/// A convenience trait for the common "data in, data out" plugin shape;
/// hosts reach it by downcasting to the implementing type.
pub trait FunctorPlugin<T>: Plugin {
    fn call(&self, input: &T) -> T;
}

/// Opaque handle to a live plugin instance, as passed across the C ABI.
#[repr(C)]
pub struct PluginInstance {
    _opaque: [u8; 0],
}

/// Factory: allocates a fresh instance, or returns null on failure.
pub type PluginCreateFn = unsafe extern "C" fn() -> *mut PluginInstance;

/// Destroyer: frees an instance produced by the same module's factory.
pub type PluginDestroyFn = unsafe extern "C" fn(*mut PluginInstance);

/// Wrap a plugin into the opaque handle representation.
///
/// The handle owns the instance until it is passed to a destroyer.
pub fn instance_from_plugin(plugin: Box<dyn Plugin>) -> NonNull<PluginInstance> {
    let raw = Box::into_raw(Box::new(plugin)).cast::<PluginInstance>();
    // Box::into_raw never returns null.
    unsafe { NonNull::new_unchecked(raw) }
}

/// Borrow the plugin behind a handle.
///
/// # Safety
///
/// `handle` must originate from [`instance_from_plugin`] (directly or via a
/// module factory following the same convention), must still be live, and
/// must not be destroyed for the lifetime `'a`.
pub unsafe fn instance_as_plugin<'a>(handle: *mut PluginInstance) -> &'a dyn Plugin {
    (*handle.cast::<Box<dyn Plugin>>()).as_ref()
}

/// Destroyer for handles created by [`instance_from_plugin`] in this module.
///
/// `declare_plugin!` exports this as the module's `destroy_plugin`; the
/// manager uses it directly for in-process registrations.
///
/// # Safety
///
/// `handle` must originate from this module's [`instance_from_plugin`] and
/// must not be used afterwards. Null is tolerated as a no-op.
pub unsafe extern "C" fn destroy_host_instance(handle: *mut PluginInstance) {
    if !handle.is_null() {
        drop(Box::from_raw(handle.cast::<Box<dyn Plugin>>()));
    }
}

/// Declare the exported entry points of a plugin module.
///
/// Expands to the paired `create_plugin` / `destroy_plugin` symbols for the
/// given plugin type and constructor. Use exactly once per plugin library:
///
/// ```ignore
/// struct Greeter;
///
/// impl gantry_api::Plugin for Greeter {
///     fn name(&self) -> &str {
///         "greeter"
///     }
///     fn version(&self) -> &str {
///         "1.0.0"
///     }
/// }
///
/// gantry_api::declare_plugin!(Greeter, || Greeter);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($plugin:ty, $ctor:expr) => {
        #[no_mangle]
        pub extern "C" fn create_plugin() -> *mut $crate::PluginInstance {
            let ctor: fn() -> $plugin = $ctor;
            let plugin: Box<dyn $crate::Plugin> = Box::new(ctor());
            $crate::instance_from_plugin(plugin).as_ptr()
        }

        #[no_mangle]
        pub unsafe extern "C" fn destroy_plugin(instance: *mut $crate::PluginInstance) {
            $crate::destroy_host_instance(instance);
        }
    };
}
