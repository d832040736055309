//! Server configuration, loaded from a TOML file with field-by-field
//! defaults so a deployment only needs to override what it cares about.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::UtilsError;

fn default_port() -> u16 {
    7777
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_frame_body_size() -> u32 {
    16 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub max_worker_threads: Option<usize>,
    #[serde(default = "default_max_frame_body_size")]
    pub max_frame_body_size: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_worker_threads: None,
            max_frame_body_size: default_max_frame_body_size(),
            log_level: default_log_level(),
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Loads a config file, falling back to all defaults if `path` doesn't
    /// exist so a fresh deployment can start without one.
    pub fn load_from(path: &Path) -> Result<Self, UtilsError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(UtilsError::ReadConfig { path: path.to_path_buf(), source }),
        };
        toml::from_str(&contents).map_err(|source| UtilsError::ParseConfig { path: path.to_path_buf(), source })
    }
}
