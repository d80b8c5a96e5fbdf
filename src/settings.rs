use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_OUTPUT_DIR: &str = "~/Documents/Invoices";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where templates and PDFs are written. May start with `~`.
    pub output_dir: String,
    /// Template reopened by `edit` when no file is given.
    pub working_file: Option<PathBuf>,
    /// Typst compiler used for PDF export.
    pub typst: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            working_file: None,
            typst: "typst".to_string(),
        }
    }
}

impl Settings {
    /// `settings.toml` in the platform config directory, or the current
    /// directory when no home directory can be determined.
    pub fn config_path() -> PathBuf {
        match ProjectDirs::from("com", "invoice-editor", "app") {
            Some(dirs) => dirs.config_dir().join("settings.toml"),
            None => PathBuf::from("settings.toml"),
        }
    }

    /// Missing file means defaults; an unreadable or malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::config_path())
    }

    /// The output directory with `~` expanded, created if missing.
    pub fn ensure_output_dir(&self) -> Result<PathBuf, SettingsError> {
        let dir = PathBuf::from(expand_home_dir(&self.output_dir));
        fs::create_dir_all(&dir).map_err(|source| SettingsError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings = Settings {
            output_dir: "/tmp/invoices".into(),
            working_file: Some(PathBuf::from("/tmp/invoices/Invoice-1.template")),
            typst: "/opt/typst".into(),
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "output_dir = \"/srv/out\"\n").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.output_dir, "/srv/out");
        assert_eq!(settings.typst, "typst");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "output_dir = [").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn plain_paths_are_not_expanded() {
        assert_eq!(expand_home_dir("/var/invoices"), "/var/invoices");
    }
}
