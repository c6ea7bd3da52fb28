//! Config directory and rule-file discovery.
//!
//! A project carries its build configuration in `.enb/` (preferred) or
//! `.bem/`. Rule files inside that directory are probed with the `enb-`
//! prefix first, so `enb-make.js` shadows a plain `make.js`.

use std::path::{Path, PathBuf};

use crate::errors::MakeError;

/// Candidate config directory names, in preference order.
const CONFIG_DIR_CANDIDATES: &[&str] = &[".enb", ".bem"];

/// Rule-file prefixes, in preference order.
const MAKE_FILE_PREFIXES: &[&str] = &["enb-", ""];

/// Which rule file to look up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MakeFileKind {
    /// The required primary rule file (`*make.js`).
    Make,
    /// The optional personal override (`*make.personal.js`).
    Personal,
}

impl MakeFileKind {
    fn stem(self) -> &'static str {
        match self {
            Self::Make => "make",
            Self::Personal => "make.personal",
        }
    }
}

/// Locate the project's config directory.
pub fn find_config_dir(project_dir: &Path) -> Result<PathBuf, MakeError> {
    for candidate in CONFIG_DIR_CANDIDATES {
        let dir = project_dir.join(candidate);
        if dir.is_dir() {
            return Ok(dir);
        }
    }
    Err(MakeError::ConfigDirNotFound {
        project_dir: project_dir.to_path_buf(),
    })
}

/// Locate a rule file of the given kind, or `None` if absent.
pub fn find_make_file(config_dir: &Path, kind: MakeFileKind) -> Option<PathBuf> {
    for prefix in MAKE_FILE_PREFIXES {
        let path = config_dir.join(format!("{prefix}{}.js", kind.stem()));
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn prefers_enb_over_bem() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(".enb")).unwrap();
        std::fs::create_dir(tmp.path().join(".bem")).unwrap();
        let dir = find_config_dir(tmp.path()).unwrap();
        assert_eq!(dir, tmp.path().join(".enb"));
    }

    #[test]
    fn falls_back_to_bem() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(".bem")).unwrap();
        let dir = find_config_dir(tmp.path()).unwrap();
        assert_eq!(dir, tmp.path().join(".bem"));
    }

    #[test]
    fn missing_config_dir_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = find_config_dir(tmp.path()).unwrap_err();
        assert!(matches!(err, MakeError::ConfigDirNotFound { .. }));
    }

    #[test]
    fn a_config_file_is_not_a_config_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".enb"), "").unwrap();
        assert!(find_config_dir(tmp.path()).is_err());
    }

    #[test]
    fn prefixed_make_file_shadows_plain_one() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("enb-make.js"), "{}").unwrap();
        std::fs::write(tmp.path().join("make.js"), "{}").unwrap();
        let path = find_make_file(tmp.path(), MakeFileKind::Make).unwrap();
        assert_eq!(path, tmp.path().join("enb-make.js"));
    }

    #[test]
    fn plain_make_file_is_found() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("make.js"), "{}").unwrap();
        let path = find_make_file(tmp.path(), MakeFileKind::Make).unwrap();
        assert_eq!(path, tmp.path().join("make.js"));
    }

    #[test]
    fn personal_file_is_optional() {
        let tmp = TempDir::new().unwrap();
        assert!(find_make_file(tmp.path(), MakeFileKind::Personal).is_none());
        std::fs::write(tmp.path().join("enb-make.personal.js"), "{}").unwrap();
        let path = find_make_file(tmp.path(), MakeFileKind::Personal).unwrap();
        assert_eq!(path, tmp.path().join("enb-make.personal.js"));
    }
}
