//! Bundle staging: archive extraction into a scoped temporary directory.

use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{Error, Result};

/// Manifest file expected at the root of every bundle archive.
pub(crate) const MANIFEST_FILE: &str = "manifest.yaml";

/// An unpacked bundle archive.
///
/// The backing directory is uniquely named under the system temp dir,
/// populated on construction, and removed recursively on drop. Extraction
/// preserves the archive's relative paths, so manifest `path` entries
/// resolve against [`StagedBundle::path`].
#[derive(Debug)]
pub(crate) struct StagedBundle {
    dir: TempDir,
}

impl StagedBundle {
    /// Extract `archive` into a fresh staging directory.
    pub(crate) fn extract(archive: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("gantry-bundle-").tempdir()?;

        let file = File::open(archive)?;
        let mut zip = ZipArchive::new(file).map_err(archive_error)?;
        zip.extract(dir.path()).map_err(archive_error)?;

        debug!(
            archive = %archive.display(),
            staged = %dir.path().display(),
            entries = zip.len(),
            "Staged bundle archive"
        );
        Ok(Self { dir })
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn manifest_path(&self) -> PathBuf {
        self.dir.path().join(MANIFEST_FILE)
    }
}

fn archive_error(err: zip::result::ZipError) -> Error {
    match err {
        zip::result::ZipError::Io(io) => Error::Io(io),
        other => Error::MalformedBundle(format!("invalid archive: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_zip;

    #[test]
    fn extracts_entries_preserving_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(
            &archive,
            &[
                (MANIFEST_FILE, b"bundleName: demo".as_slice()),
                ("binaries/linux/libdemo.so", b"not really elf".as_slice()),
            ],
        );

        let staged = StagedBundle::extract(&archive).unwrap();
        assert!(staged.manifest_path().is_file());
        assert_eq!(
            std::fs::read(staged.path().join("binaries/linux/libdemo.so")).unwrap(),
            b"not really elf"
        );
    }

    #[test]
    fn staging_directory_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(&archive, &[(MANIFEST_FILE, b"x: 1".as_slice())]);

        let staged = StagedBundle::extract(&archive).unwrap();
        let staged_path = staged.path().to_path_buf();
        assert!(staged_path.is_dir());

        drop(staged);
        assert!(!staged_path.exists());
    }

    #[test]
    fn garbage_archives_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        std::fs::write(&archive, b"this is not a zip archive").unwrap();

        let err = StagedBundle::extract(&archive).unwrap_err();
        assert!(matches!(err, Error::MalformedBundle(_)));
    }

    #[test]
    fn missing_archives_are_io_errors() {
        let err = StagedBundle::extract(Path::new("/nonexistent/bundle.zip")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
