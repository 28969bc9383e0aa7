use anyhow::{bail, Context, Result};
use carbonwatch_import::ImportConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// `carbonwatch` settings, read from `config.toml` in the platform config
/// directory unless `--config` names another file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Defaults to `carbon.db` in the platform data directory.
    pub database_path: Option<PathBuf>,
    pub default_user: String,
    /// Files above this size are refused before they are read.
    pub max_file_bytes: u64,
    pub import: ImportConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            default_user: "default".to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            import: ImportConfig::default(),
        }
    }
}

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("org", "carbonwatch", "CarbonWatch").context("could not determine home directory")
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content).context("parse config.toml")?;
        settings.import.validate()?;
        if settings.max_file_bytes == 0 {
            bail!("max_file_bytes must be greater than zero");
        }
        Ok(settings)
    }

    /// An explicit path must exist; the default location may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let p = default_config_path()?;
                if !p.exists() {
                    return Ok(Settings::default());
                }
                p
            }
        };
        let content = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("load {}", path.display()))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(p) => Ok(p.clone()),
            None => Ok(project_dirs()?.data_dir().join("carbon.db")),
        }
    }
}
