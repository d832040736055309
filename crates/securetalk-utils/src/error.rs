use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UtilsError {
    #[error("failed to read config from {path}: {source}")]
    ReadConfig { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse config at {path}: {source}")]
    ParseConfig { path: PathBuf, #[source] source: toml::de::Error },
}
