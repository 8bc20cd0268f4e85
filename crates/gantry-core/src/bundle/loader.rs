//! Signed bundle loading.

use std::path::Path;

use tracing::{debug, info};

use crate::bundle::abi::{AbiSignature, HostPlatform};
use crate::bundle::archive::{StagedBundle, MANIFEST_FILE};
use crate::bundle::manifest::{BundleManifest, PluginBinary};
use crate::bundle::signing::{self, Trust};
use crate::error::{Error, Result};
use crate::manager::PluginManager;

/// How strictly ABI screening gates a bundle load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Every plugin named in the manifest must have at least one
    /// host-compatible binary.
    #[default]
    AllCompatible,
    /// At least one plugin across the whole manifest must have a
    /// host-compatible binary.
    AnyCompatible,
}

/// A verified, unpacked plugin bundle whose surviving binaries have been
/// loaded into a plugin manager.
///
/// The staged directory holding the extracted files lives as long as the
/// bundle value. Plugins loaded from a bundle are owned by the manager, not
/// the bundle; unload them before dropping the bundle, or keep the bundle
/// alive while they are in use.
#[derive(Debug)]
pub struct PluginBundle {
    manifest: BundleManifest,
    host: HostPlatform,
    trust: Trust,
    plugin_names: Vec<String>,
    staged: StagedBundle,
}

impl PluginBundle {
    /// Open a bundle archive and load its surviving plugins into the
    /// process-wide manager.
    pub fn open(path: impl AsRef<Path>, policy: LoadPolicy) -> Result<Self> {
        Self::open_with(path, policy, &mut PluginManager::global().lock())
    }

    /// Open a bundle archive against an explicit manager.
    ///
    /// Sequence: existence check, staging, extraction, manifest parse, host
    /// probe, signature verification, ABI screening, policy check, then one
    /// manager load per surviving binary. Any failure is terminal and tears
    /// the staging directory down.
    pub fn open_with(
        path: impl AsRef<Path>,
        policy: LoadPolicy,
        manager: &mut PluginManager,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::BundleNotFound(path.to_path_buf()));
        }

        let staged = StagedBundle::extract(path)?;
        let manifest_path = staged.manifest_path();
        if !manifest_path.is_file() {
            return Err(Error::MalformedBundle(format!(
                "no {MANIFEST_FILE} at bundle root"
            )));
        }

        let host = HostPlatform::probe()?;
        let manifest = BundleManifest::parse(&std::fs::read_to_string(&manifest_path)?)?;
        debug!(
            bundle = %manifest.name,
            version = %manifest.version,
            host = %host.triplet,
            "Parsed bundle manifest"
        );

        let trust = signing::verify(staged.path(), &manifest)?;
        if !trust.trusted {
            return Err(Error::UntrustedBundle(if trust.signed {
                "signature verification failed".into()
            } else {
                "bundle is unsigned".into()
            }));
        }

        let survivors = screen(&manifest, &host, policy)?;

        let mut plugin_names = Vec::new();
        for binary in &survivors {
            let loaded = manager.load(staged.path().join(&binary.path))?;
            debug!(plugin = %loaded, binary = %binary.path, "Loaded bundle plugin");
            plugin_names.push(binary.plugin.clone());
        }
        plugin_names.sort_unstable();
        plugin_names.dedup();

        info!(
            bundle = %manifest.name,
            plugins = plugin_names.len(),
            "Loaded plugin bundle"
        );
        Ok(Self {
            manifest,
            host,
            trust,
            plugin_names,
            staged,
        })
    }

    /// Whether this bundle loaded a plugin with the given manifest name.
    pub fn has(&self, plugin_name: &str) -> bool {
        self.plugin_names.iter().any(|name| name == plugin_name)
    }

    /// Manifest names of the plugins this bundle loaded.
    pub fn plugin_names(&self) -> &[String] {
        &self.plugin_names
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn author(&self) -> &str {
        &self.manifest.author
    }

    pub fn comment(&self) -> &str {
        &self.manifest.comment
    }

    pub fn bundled_on(&self) -> &str {
        &self.manifest.bundled_on
    }

    /// The `<arch>-<os>` triplet binaries were screened against.
    pub fn host_triplet(&self) -> &str {
        &self.host.triplet
    }

    pub fn is_signed(&self) -> bool {
        self.trust.signed
    }

    pub fn is_trusted(&self) -> bool {
        self.trust.trusted
    }
}

/// Filter manifest binaries down to host-compatible candidates, then apply
/// the policy over per-plugin survival.
fn screen(
    manifest: &BundleManifest,
    host: &HostPlatform,
    policy: LoadPolicy,
) -> Result<Vec<PluginBinary>> {
    let mut survivors = Vec::new();
    let mut surviving_plugins = 0usize;

    for plugin in &manifest.plugins {
        let mut survived = false;
        for binary in &plugin.binaries {
            if binary.triplet != host.triplet {
                continue;
            }
            let required = AbiSignature::parse(&binary.abi_signature)?;
            if host.abi.is_compatible_with(&required) {
                survivors.push(binary.clone());
                survived = true;
            }
        }
        if survived {
            surviving_plugins += 1;
        } else {
            debug!(plugin = %plugin.name, "No host-compatible binary");
        }
    }

    let required = manifest.plugins.len();
    let satisfied = match policy {
        LoadPolicy::AllCompatible => surviving_plugins == required,
        LoadPolicy::AnyCompatible => surviving_plugins > 0,
    };
    if !satisfied {
        return Err(Error::AbiIncompatible {
            required,
            survived: surviving_plugins,
        });
    }
    Ok(survivors)
}
