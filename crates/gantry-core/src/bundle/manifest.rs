//! Bundle manifest parsing.
//!
//! The manifest (`manifest.yaml` at the archive root) is strict on shape and
//! permissive on unknown keys. Parsing never touches the filesystem; digests
//! over the declared files happen later, during signature verification.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Signature block of a manifest, hex-decoded.
#[derive(Debug, Clone)]
pub struct ManifestSignature {
    pub signature: Vec<u8>,
    /// `sha256:<hex>` fingerprint of the author's public key.
    pub key_fingerprint: String,
}

/// One candidate binary for one plugin on one platform.
#[derive(Debug, Clone)]
pub struct PluginBinary {
    /// Manifest name of the plugin this binary belongs to.
    pub plugin: String,
    /// Path relative to the bundle root.
    pub path: String,
    /// Target `<arch>-<os>` triplet.
    pub triplet: String,
    /// Required ABI tag, parsed lazily at screening time.
    pub abi_signature: String,
    pub arch: String,
}

/// One plugin entry: optional source distribution plus candidate binaries.
#[derive(Debug, Clone)]
pub struct ManifestPlugin {
    pub name: String,
    pub sdist: Option<String>,
    pub binaries: Vec<PluginBinary>,
}

/// Parsed and validated `manifest.yaml`.
#[derive(Debug, Clone)]
pub struct BundleManifest {
    pub name: String,
    pub version: String,
    pub author: String,
    pub comment: String,
    pub bundled_on: String,
    pub signature: Option<ManifestSignature>,
    pub plugins: Vec<ManifestPlugin>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    bundle_name: String,
    bundle_version: String,
    bundle_author: String,
    bundle_comment: String,
    bundled_on: String,
    #[serde(default)]
    bundle_signature: Option<RawSignature>,
    bundle_plugins: BTreeMap<String, RawPlugin>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSignature {
    #[serde(default)]
    signature: String,
    #[serde(default)]
    key_fingerprint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlugin {
    #[serde(default)]
    sdist: Option<RawSdist>,
    binaries: Vec<RawBinary>,
}

#[derive(Debug, Deserialize)]
struct RawSdist {
    path: String,
}

#[derive(Debug, Deserialize)]
struct RawBinary {
    path: String,
    platform: RawPlatform,
}

#[derive(Debug, Deserialize)]
struct RawPlatform {
    triplet: String,
    abi_signature: String,
    arch: String,
}

impl BundleManifest {
    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawManifest =
            serde_yaml::from_str(text).map_err(|err| Error::MalformedManifest(err.to_string()))?;

        let signature = match raw.bundle_signature {
            None => None,
            Some(block) => Some(parse_signature(block)?),
        };

        let plugins = raw
            .bundle_plugins
            .into_iter()
            .map(|(name, plugin)| {
                let binaries = plugin
                    .binaries
                    .into_iter()
                    .map(|binary| PluginBinary {
                        plugin: name.clone(),
                        path: binary.path,
                        triplet: binary.platform.triplet,
                        abi_signature: binary.platform.abi_signature,
                        arch: binary.platform.arch,
                    })
                    .collect();
                ManifestPlugin {
                    sdist: plugin.sdist.map(|sdist| sdist.path),
                    binaries,
                    name,
                }
            })
            .collect();

        Ok(Self {
            name: raw.bundle_name,
            version: raw.bundle_version,
            author: raw.bundle_author,
            comment: raw.bundle_comment,
            bundled_on: raw.bundled_on,
            signature,
            plugins,
        })
    }

    /// Every relative path covered by the canonical signed payload: each
    /// plugin's `sdist` entry (if any) plus every binary.
    pub fn payload_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        for plugin in &self.plugins {
            if let Some(sdist) = &plugin.sdist {
                paths.push(sdist.as_str());
            }
            for binary in &plugin.binaries {
                paths.push(binary.path.as_str());
            }
        }
        paths
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

fn parse_signature(block: RawSignature) -> Result<ManifestSignature> {
    if block.signature.trim().is_empty() {
        return Err(Error::MalformedManifest(
            "signature section present but 'signature' is empty".into(),
        ));
    }
    let Some(key_fingerprint) = block.key_fingerprint else {
        return Err(Error::MalformedManifest(
            "signature section missing 'keyFingerprint'".into(),
        ));
    };
    let signature = hex::decode(block.signature.trim()).map_err(|err| {
        Error::MalformedManifest(format!("signature is not valid hex: {err}"))
    })?;
    Ok(ManifestSignature {
        signature,
        key_fingerprint,
    })
}
