//! Error types for gantry-core operations

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced at the framework boundary.
///
/// Every failure is terminal for the operation that raised it; the manager
/// and bundle keep their invariants (no partial registration, no leaked
/// module handles or instances) at every failure point.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    #[error("plugin library not found at {0}")]
    PathNotFound(PathBuf),

    #[error("failed to load plugin library {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    #[error("symbol '{symbol}' not found in {path}")]
    MissingSymbol { path: PathBuf, symbol: &'static str },

    #[error("plugin factory in {0} returned a null instance")]
    FactoryReturnedNull(PathBuf),

    #[error("a plugin named '{0}' is already loaded")]
    NameCollision(String),

    #[error("plugin '{0}' has not been loaded")]
    NotLoaded(String),

    #[error("plugin '{name}' is not an instance of the requested type")]
    TypeMismatch { name: String },

    #[error("plugin bundle not found at {0}")]
    BundleNotFound(PathBuf),

    #[error("malformed bundle: {0}")]
    MalformedBundle(String),

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("bundle is not trusted: {0}")]
    UntrustedBundle(String),

    #[error("no trusted key matches fingerprint '{0}'")]
    UntrustedKey(String),

    #[error("ABI screening left {survived} of {required} plugins loadable")]
    AbiIncompatible { required: usize, survived: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gantry-core operations
pub type Result<T> = std::result::Result<T, Error>;
