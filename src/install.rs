//! Staged unpack and atomic publication into the version store

use std::io::{self, Cursor};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::catalog::CatalogError;
use crate::download::DownloadError;
use crate::tool::{Distribution, Tool};
use crate::verify::IntegrityError;

/// Error type for the install pipeline.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Archive entry escapes the staging directory: {0}")]
    UnsafePath(String),

    #[error("Filesystem error: {0}")]
    Io(#[from] io::Error),
}

/// Unpack verified release bytes into a fresh staging directory next to
/// `target_dir`, then rename it into place.
///
/// The rename is the only mutation concurrent observers can see. When a
/// concurrent install commits the same version first, the staging
/// directory is discarded and the call reports success; the committed
/// content of one version is identical either way.
pub fn commit(tool: Tool, data: &[u8], target_dir: &Path) -> Result<(), InstallError> {
    let parent = target_dir.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("target path {} has no parent", target_dir.display()),
        )
    })?;
    std::fs::create_dir_all(parent)?;

    // Staging lives in the tool directory so the final rename never
    // crosses a filesystem boundary.
    let staging = tempfile::Builder::new()
        .prefix(".stage-")
        .tempdir_in(parent)?;

    match tool.distribution() {
        Distribution::ZipArchive => unzip(data, staging.path())?,
        Distribution::SingleBinary => {
            write_executable(&staging.path().join(tool.binary_name()), data)?;
        }
    }

    let staged = staging.into_path();
    match std::fs::rename(&staged, target_dir) {
        Ok(()) => {
            debug!("Committed {}", target_dir.display());
            Ok(())
        }
        Err(e) => {
            let lost_race = target_dir.is_dir();
            let _ = std::fs::remove_dir_all(&staged);
            if lost_race {
                debug!("{} already committed by a concurrent install", target_dir.display());
                Ok(())
            } else {
                Err(e.into())
            }
        }
    }
}

fn unzip(data: &[u8], dest: &Path) -> Result<(), InstallError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(InstallError::UnsafePath(entry.name().to_string()));
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = std::fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut writer)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = entry.unix_mode().unwrap_or(0o755);
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(())
}

fn write_executable(path: &Path, data: &[u8]) -> Result<(), InstallError> {
    std::fs::write(path, data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o755);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn commit_unpacks_archive_into_final_path() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("terraform/1.6.2");
        let data = zip_with(&[("terraform", b"#!/bin/true\n"), ("LICENSE.txt", b"MIT")]);

        commit(Tool::Terraform, &data, &target).unwrap();

        assert!(target.join("terraform").is_file());
        assert!(target.join("LICENSE.txt").is_file());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(target.join("terraform"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn commit_writes_single_binary_executable() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("terragrunt/0.55.1");

        commit(Tool::Terragrunt, b"\x7fELF...", &target).unwrap();

        let binary = target.join(Tool::Terragrunt.binary_name());
        assert_eq!(std::fs::read(&binary).unwrap(), b"\x7fELF...");
    }

    #[test]
    fn commit_leaves_no_staging_directory_behind() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("terragrunt/0.55.1");

        commit(Tool::Terragrunt, b"binary", &target).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(temp.path().join("terragrunt"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".stage-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn commit_is_idempotent_when_version_already_present() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("terragrunt/0.55.1");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("terragrunt"), b"existing").unwrap();

        // The second committer loses the rename race and must succeed
        // without touching the winner's content.
        commit(Tool::Terragrunt, b"replacement", &target).unwrap();

        assert_eq!(
            std::fs::read(target.join("terragrunt")).unwrap(),
            b"existing"
        );
    }

    #[test]
    fn commit_rejects_escaping_archive_entry() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("terraform/1.6.2");
        let data = zip_with(&[("../escape.txt", b"nope")]);

        let err = commit(Tool::Terraform, &data, &target).unwrap_err();

        assert!(matches!(err, InstallError::UnsafePath(_)));
        assert!(!target.exists());
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[test]
    fn commit_rejects_truncated_archive() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("terraform/1.6.2");

        let err = commit(Tool::Terraform, b"not a zip", &target).unwrap_err();

        assert!(matches!(err, InstallError::Archive(_)));
        assert!(!target.exists());
    }
}
