//! Version store layout: one directory per tool, one per installed version

use std::io;
use std::path::{Path, PathBuf};

use semver::Version;

/// Marker file recording the active version of a tool.
const ACTIVE_FILE: &str = "version";

/// Handle on one tool's slice of the persistent version store.
///
/// Only the installer mutates version directories, and only through
/// stage-then-rename; everything here is plain path arithmetic and
/// directory enumeration.
#[derive(Debug, Clone)]
pub struct VersionStore {
    tool_dir: PathBuf,
}

impl VersionStore {
    pub fn new(root: &Path, tool: crate::tool::Tool) -> Self {
        Self {
            tool_dir: root.join(tool.name()),
        }
    }

    /// Directory holding every installed version of the tool.
    pub fn tool_dir(&self) -> &Path {
        &self.tool_dir
    }

    /// Final path of one version, installed or not.
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.tool_dir.join(version.trim_start_matches('v'))
    }

    pub fn is_installed(&self, version: &str) -> bool {
        self.version_dir(version).is_dir()
    }

    /// Installed versions, ascending by semantic version. Entries that
    /// do not parse as versions (stray files, staging leftovers) are
    /// ignored.
    pub fn installed_versions(&self) -> io::Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.tool_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(version) = Version::parse(name) {
                    versions.push(version);
                }
            }
        }

        versions.sort();
        Ok(versions.into_iter().map(|v| v.to_string()).collect())
    }

    /// Remove one installed version. Returns whether anything was
    /// removed.
    pub fn uninstall(&self, version: &str) -> io::Result<bool> {
        let dir = self.version_dir(version);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The version currently marked active, if any.
    pub fn active_version(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.tool_dir.join(ACTIVE_FILE)) {
            Ok(content) => Ok(Some(content.trim().to_string()).filter(|v| !v.is_empty())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Mark one version active.
    pub fn activate(&self, version: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.tool_dir)?;
        std::fs::write(
            self.tool_dir.join(ACTIVE_FILE),
            format!("{}\n", version.trim_start_matches('v')),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Tool;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> VersionStore {
        VersionStore::new(temp.path(), Tool::Terraform)
    }

    #[test]
    fn version_dir_strips_v_prefix() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert_eq!(
            store.version_dir("v1.6.2"),
            temp.path().join("terraform/1.6.2")
        );
    }

    #[test]
    fn installed_versions_is_empty_without_tool_dir() {
        let temp = TempDir::new().unwrap();
        assert!(store(&temp).installed_versions().unwrap().is_empty());
    }

    #[test]
    fn installed_versions_sorts_and_filters() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        for name in ["1.10.0", "1.2.0", "1.9.5", "not-a-version"] {
            std::fs::create_dir_all(store.tool_dir().join(name)).unwrap();
        }
        std::fs::write(store.tool_dir().join("version"), "1.2.0").unwrap();

        assert_eq!(
            store.installed_versions().unwrap(),
            vec!["1.2.0", "1.9.5", "1.10.0"]
        );
    }

    #[test]
    fn uninstall_reports_whether_version_existed() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        std::fs::create_dir_all(store.version_dir("1.6.2")).unwrap();

        assert!(store.uninstall("1.6.2").unwrap());
        assert!(!store.uninstall("1.6.2").unwrap());
        assert!(!store.is_installed("1.6.2"));
    }

    #[test]
    fn activate_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        assert_eq!(store.active_version().unwrap(), None);
        store.activate("v1.6.2").unwrap();
        assert_eq!(store.active_version().unwrap().as_deref(), Some("1.6.2"));
    }
}
