use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "WALLSWAP_CONFIG_DIR";
pub const CONFIG_FILE: &str = "wallswap.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Wallswap";
const APPLICATION: &str = "wallswap";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    config_file: PathBuf,
    explicit: bool,
}

impl AppPaths {
    /// Resolves the configuration location: `--config` first, then
    /// `WALLSWAP_CONFIG_DIR`, then the platform config directory.
    pub fn discover(explicit_file: Option<&Path>) -> Result<Self> {
        if let Some(file) = explicit_file {
            let config_dir = file
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            return Ok(Self {
                config_dir,
                config_file: file.to_path_buf(),
                explicit: true,
            });
        }

        let config_dir = match env_override(ENV_CONFIG_DIR) {
            Some(dir) => dir,
            None => ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
                .ok_or_else(|| anyhow!("failed to determine user directories"))?
                .config_dir()
                .to_path_buf(),
        };
        Ok(Self {
            config_file: config_dir.join(CONFIG_FILE),
            config_dir,
            explicit: false,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// The file was named on the command line and must exist.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
