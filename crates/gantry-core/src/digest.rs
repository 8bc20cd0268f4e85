//! SHA-256 digest helpers

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Lowercase hex SHA-256 of a byte buffer.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Lowercase hex SHA-256 of a file, streamed in chunks.
pub fn sha256_file_hex(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn hashes_known_vectors() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_digest_matches_buffer_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"gantry digest fixture").unwrap();
        file.flush().unwrap();

        assert_eq!(
            sha256_file_hex(file.path()).unwrap(),
            sha256_hex(b"gantry digest fixture")
        );
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = sha256_file_hex(Path::new("/nonexistent/gantry-digest")).unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}
