use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ServiceError;

/// Storage configuration shared by the portal binary and tests.
///
/// Read from the `[storage]` table of a TOML file, then optionally
/// overridden by command-line flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding the portal database.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/portal.sqlite` if not specified.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    storage: ServiceConfig,
}

impl ServiceConfig {
    /// Load the `[storage]` table from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Validation(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse the `[storage]` table from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ServiceError> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| ServiceError::Validation(format!("invalid config: {}", e)))?;
        Ok(file.storage)
    }

    /// Apply command-line overrides.
    ///
    /// Supported flags:
    /// - `--data-dir=PATH`
    /// - `--sqlite=PATH`
    pub fn apply_args(mut self, args: &[String]) -> Self {
        for arg in args {
            if let Some(val) = arg.strip_prefix("--data-dir=") {
                self.data_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--sqlite=") {
                self.sqlite_path = Some(PathBuf::from(val));
            }
        }
        self
    }

    /// Parse configuration from command-line arguments only.
    pub fn from_args(args: &[String]) -> Self {
        Self::default().apply_args(args)
    }

    /// Resolve the SQLite database path, falling back to `{data_dir}/portal.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path.clone().unwrap_or_else(|| {
            self.data_dir
                .as_ref()
                .map(|d| d.join("portal.sqlite"))
                .unwrap_or_else(|| PathBuf::from("portal.sqlite"))
        })
    }
}
