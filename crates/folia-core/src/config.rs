//! Library configuration loaded from a TOML file.
//!
//! The only required setting is the library root:
//!
//! ```toml
//! root = "~/notes"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Where the library lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Absolute or working-directory-relative path of the library root.
    pub root: PathBuf,
}

impl LibraryConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loads configuration from a TOML file at `path`.
    ///
    /// A leading `~/` in `root` is expanded against `$HOME`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the file does not exist.
    /// - [`CoreError::PermissionDenied`] if the file is not readable.
    /// - [`CoreError::ConfigParse`] if the TOML is malformed or lacks `root`.
    /// - [`CoreError::InvalidConfig`] if `root` is empty.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => CoreError::PermissionDenied(path.to_path_buf()),
            _ => CoreError::Io(e),
        })?;
        let config: Self =
            toml::from_str(&content).map_err(|e| CoreError::ConfigParse(e.to_string()))?;
        config.validated()
    }

    /// Expands `~/` and rejects an empty root.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidConfig`] if `root` is empty.
    pub fn validated(self) -> CoreResult<Self> {
        if self.root.as_os_str().is_empty() {
            return Err(CoreError::InvalidConfig("library root must not be empty".to_string()));
        }
        Ok(Self {
            root: expand_home(&self.root),
        })
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_reads_root() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("folia.toml");
        fs::write(&path, "root = \"/srv/library\"\n").unwrap();

        let config = LibraryConfig::load(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/library"));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = LibraryConfig::load(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn load_without_root_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("folia.toml");
        fs::write(&path, "other = 1\n").unwrap();

        let err = LibraryConfig::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::ConfigParse(_)));
    }

    #[test]
    fn empty_root_is_rejected() {
        let err = LibraryConfig::new("").validated().unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = std::env::var_os("HOME") else {
            return;
        };
        let config = LibraryConfig::new("~/notes").validated().unwrap();
        assert_eq!(config.root, PathBuf::from(home).join("notes"));
    }
}
