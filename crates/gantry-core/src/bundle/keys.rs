//! Host-local trusted key store.
//!
//! Bundle signers are authenticated against public keys the user has
//! installed under the key directory (see [`crate::paths::trusted_keys_dir`]).
//! Any regular file whose PEM armor declares a public key is a candidate;
//! files that fail to parse are skipped, not fatal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ed25519_dalek::pkcs8::{DecodePublicKey, EncodePublicKey};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use tracing::{debug, warn};

use crate::digest;
use crate::error::{Error, Result};
use crate::paths;

const PEM_BEGIN: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_END: &str = "-----END PUBLIC KEY-----";

/// A public key installed in the host trust store.
#[derive(Debug, Clone)]
pub struct TrustedKey {
    key: VerifyingKey,
    fingerprint: String,
    path: PathBuf,
}

impl TrustedKey {
    /// Parse a PEM `SubjectPublicKeyInfo` file into a trusted key.
    pub fn from_pem_file(path: &Path) -> Result<Self> {
        let pem = fs::read_to_string(path)?;
        let key = VerifyingKey::from_public_key_pem(&pem)
            .map_err(|err| invalid_key(path, &err.to_string()))?;

        let der = key
            .to_public_key_der()
            .map_err(|err| invalid_key(path, &err.to_string()))?;
        let fingerprint = format!("sha256:{}", digest::sha256_hex(der.as_bytes()));

        Ok(Self {
            key,
            fingerprint,
            path: path.to_path_buf(),
        })
    }

    /// `sha256:<hex>` over the DER `SubjectPublicKeyInfo` encoding.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Where the key was found on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify a detached signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        self.key.verify(message, &signature).is_ok()
    }
}

fn invalid_key(path: &Path, reason: &str) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("invalid public key {}: {reason}", path.display()),
    ))
}

/// Enumerate PEM public keys under the host trust directory.
///
/// A missing directory yields an empty store.
pub fn trusted_keys() -> Result<Vec<TrustedKey>> {
    trusted_keys_from(&paths::trusted_keys_dir())
}

/// Enumerate PEM public keys under `dir`, recursively.
pub fn trusted_keys_from(dir: &Path) -> Result<Vec<TrustedKey>> {
    let mut keys = Vec::new();
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Trusted key directory does not exist");
        return Ok(keys);
    }
    collect_keys(dir, &mut keys)?;
    Ok(keys)
}

fn collect_keys(dir: &Path, keys: &mut Vec<TrustedKey>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_keys(&path, keys)?;
            continue;
        }
        if !is_public_key_pem(&path) {
            continue;
        }
        match TrustedKey::from_pem_file(&path) {
            Ok(key) => {
                debug!(path = %path.display(), fingerprint = %key.fingerprint(), "Trusted key");
                keys.push(key);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Skipping unparseable public key");
            }
        }
    }
    Ok(())
}

/// Cheap armor screen: first and last non-empty lines must be the public
/// key PEM markers.
fn is_public_key_pem(path: &Path) -> bool {
    let Ok(text) = fs::read_to_string(path) else {
        return false;
    };

    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let Some(first) = lines.next() else {
        return false;
    };
    let last = lines.last().unwrap_or(first);

    first.trim_end() == PEM_BEGIN && last.trim_end() == PEM_END
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::LineEnding;
    use ed25519_dalek::SigningKey;

    fn write_key(dir: &Path, name: &str, seed: u8) -> TrustedKey {
        let signing = SigningKey::from_bytes(&[seed; 32]);
        let pem = signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let path = dir.join(name);
        fs::write(&path, pem).unwrap();
        TrustedKey::from_pem_file(&path).unwrap()
    }

    #[test]
    fn fingerprint_round_trips_pem_der_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let key = write_key(dir.path(), "author.pem", 7);

        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let der = signing.verifying_key().to_public_key_der().unwrap();
        let expected = format!("sha256:{}", digest::sha256_hex(der.as_bytes()));

        assert_eq!(key.fingerprint(), expected);
        assert!(key.fingerprint().starts_with("sha256:"));
        assert_eq!(key.fingerprint().len(), "sha256:".len() + 64);
    }

    #[test]
    fn store_enumeration_recurses_and_screens() {
        let dir = tempfile::tempdir().unwrap();
        write_key(dir.path(), "top.pem", 1);

        let nested = dir.path().join("team/release");
        fs::create_dir_all(&nested).unwrap();
        write_key(&nested, "nested.pem", 2);

        // Not PEM armored: ignored without a parse attempt.
        fs::write(dir.path().join("README"), "keys live here").unwrap();
        // Armored but not a key: skipped with a warning.
        fs::write(
            dir.path().join("broken.pem"),
            format!("{PEM_BEGIN}\nAAAA\n{PEM_END}\n"),
        )
        .unwrap();

        let keys = trusted_keys_from(dir.path()).unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn missing_store_is_empty_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let keys = trusted_keys_from(&dir.path().join("absent")).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn verify_accepts_only_matching_signatures() {
        use ed25519_dalek::Signer;

        let dir = tempfile::tempdir().unwrap();
        let key = write_key(dir.path(), "author.pem", 9);
        let signing = SigningKey::from_bytes(&[9u8; 32]);

        let message = b"payload bytes";
        let signature = signing.sign(message).to_bytes();

        assert!(key.verify(message, &signature));
        assert!(!key.verify(b"tampered bytes", &signature));
        assert!(!key.verify(message, &signature[..32]));
    }
}
