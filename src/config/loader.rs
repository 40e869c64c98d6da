use crate::config::schema::{InstallerConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up in the project root when `--config` is not given.
pub const CONFIG_FILE: &str = "deploykit.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read installer config from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse installer config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse installer config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(
                    f,
                    "invalid installer config ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "invalid installer config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<InstallerConfig, ConfigError> {
    let config: InstallerConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<InstallerConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load `deploykit.toml` from the project root, falling back to defaults
/// when the file does not exist.
pub fn load_from_project(project_root: &Path) -> Result<InstallerConfig, ConfigError> {
    let path = project_root.join(CONFIG_FILE);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no installer config, using defaults");
        return Ok(InstallerConfig::default());
    }
    load_from_path(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, InstallerConfig::default());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = load_from_str(
            r#"
[database]
connection = "mysql"
port = "3306"
"#,
        )
        .unwrap();
        assert_eq!(config.database.connection, "mysql");
        assert_eq!(config.database.port, "3306");
        assert_eq!(config.database.host, "127.0.0.1");
        assert_eq!(config.tools.composer, "composer");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = load_from_str("[tools]\nnpm = \"npm\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_validation_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[redis]\nclient = \"\"\n").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { path: Some(_), .. }));
        assert!(err.to_string().contains("redis.client"));
    }

    #[test]
    fn test_missing_project_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from_project(dir.path()).unwrap();
        assert_eq!(config, InstallerConfig::default());
    }
}
