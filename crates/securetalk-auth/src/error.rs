use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("failed to read credential store from {path}: {source}")]
    Load { path: std::path::PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse credential store at {path}: {source}")]
    Parse { path: std::path::PathBuf, #[source] source: toml::de::Error },
    #[error("failed to serialize credential store: {0}")]
    Serialize(#[source] toml::ser::Error),
    #[error("failed to write credential store to {path}: {source}")]
    Persist { path: std::path::PathBuf, #[source] source: std::io::Error },
    #[error("credential store lock was poisoned by a panicked thread")]
    Poisoned,
}
