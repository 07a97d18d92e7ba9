//! Runtime configuration file.
//!
//! # Responsibility
//! - Load the JSON configuration used by operator entry points.
//! - Resolve relative paths against the configuration file's directory.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// `trace|debug|info|warn|error`. Build-mode default when absent.
    #[serde(default)]
    pub log_level: Option<String>,
    /// Absolute or config-relative log directory. File logging is off when
    /// absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Entity-type definitions holding link delete policies. Every link
    /// breaks when absent.
    #[serde(default)]
    pub entity_types_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl CoreConfig {
    pub fn log_level_or_default(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or(crate::logging::default_log_level())
    }

    fn resolve_relative_to(mut self, base: &Path) -> Self {
        let resolve = |path: PathBuf| {
            if path.is_relative() {
                base.join(path)
            } else {
                path
            }
        };
        self.database_path = resolve(self.database_path);
        self.log_dir = self.log_dir.map(resolve);
        self.entity_types_path = self.entity_types_path.map(resolve);
        self
    }
}

/// Reads and validates a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<CoreConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: CoreConfig = serde_json::from_str(&raw).map_err(ConfigError::Parse)?;
    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("databasePath must not be empty".to_string()));
    }

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.resolve_relative_to(base))
}

#[cfg(test)]
mod tests {
    use super::{load_config, ConfigError};

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entity.json");
        std::fs::write(
            &path,
            r#"{ "databasePath": "data/entity.db", "entityTypesPath": "types.json" }"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.database_path, dir.path().join("data/entity.db"));
        assert_eq!(
            config.entity_types_path,
            Some(dir.path().join("types.json"))
        );
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entity.json");
        std::fs::write(&path, r#"{ "databasePath": "a.db", "tenant": "X" }"#).unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn empty_database_path_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entity.json");
        std::fs::write(&path, r#"{ "databasePath": "" }"#).unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn log_level_falls_back_to_build_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entity.json");
        std::fs::write(&path, r#"{ "databasePath": "a.db" }"#).unwrap();
        let mut config = load_config(&path).unwrap();
        assert_eq!(
            config.log_level_or_default(),
            crate::logging::default_log_level()
        );

        config.log_level = Some("warn".to_string());
        assert_eq!(config.log_level_or_default(), "warn");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
