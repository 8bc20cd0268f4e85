//! Detached signature verification over the canonical bundle payload.
//!
//! The payload is derived from bundle *content*, never from YAML layout: the
//! producer and this consumer both digest the declared files, sort by path,
//! and sign/verify the same byte string. Reordering manifest entries, adding
//! or removing files, or touching a single file byte all invalidate the
//! signature.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::bundle::keys::{self, TrustedKey};
use crate::bundle::manifest::BundleManifest;
use crate::digest;
use crate::error::{Error, Result};

/// Trust state derived from a manifest's signature block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trust {
    /// The manifest declared a signature.
    pub signed: bool,
    /// The signature verified against a trusted key.
    pub trusted: bool,
}

/// Canonical signed payload for a staged bundle.
///
/// `"{path}:sha256:{hex}"` lines sorted by path, joined with `\n`, no
/// trailing newline.
pub fn canonical_payload(root: &Path, manifest: &BundleManifest) -> Result<String> {
    let mut digests = BTreeMap::new();
    for rel in manifest.payload_paths() {
        let file = root.join(rel);
        if !file.is_file() {
            return Err(Error::MalformedBundle(format!(
                "file listed in manifest is missing: {rel}"
            )));
        }
        digests.insert(
            rel.to_owned(),
            format!("sha256:{}", digest::sha256_file_hex(&file)?),
        );
    }

    Ok(digests
        .iter()
        .map(|(path, digest)| format!("{path}:{digest}"))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Verify the manifest's detached signature against an explicit trust store.
///
/// An unsigned manifest is not an error here; it reports as neither signed
/// nor trusted and the bundle loader decides what that means. A signed
/// manifest whose fingerprint matches no key in the store is
/// [`Error::UntrustedKey`].
pub fn verify_with_keys(
    root: &Path,
    manifest: &BundleManifest,
    keys: &[TrustedKey],
) -> Result<Trust> {
    let Some(block) = &manifest.signature else {
        return Ok(Trust {
            signed: false,
            trusted: false,
        });
    };

    let key = keys
        .iter()
        .find(|key| key.fingerprint() == block.key_fingerprint)
        .ok_or_else(|| Error::UntrustedKey(block.key_fingerprint.clone()))?;

    let payload = canonical_payload(root, manifest)?;
    let trusted = key.verify(payload.as_bytes(), &block.signature);
    if trusted {
        debug!(
            bundle = %manifest.name,
            key = %key.path().display(),
            "Bundle signature verified"
        );
    } else {
        warn!(
            bundle = %manifest.name,
            fingerprint = %block.key_fingerprint,
            "Bundle signature did not verify"
        );
    }

    Ok(Trust {
        signed: true,
        trusted,
    })
}

/// Verify against the host trust store.
pub fn verify(root: &Path, manifest: &BundleManifest) -> Result<Trust> {
    verify_with_keys(root, manifest, &keys::trusted_keys()?)
}
