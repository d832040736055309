//! Salted-hash user table. Mirrors the contract the original implementation
//! exposed to its message handlers (`createUser`/`authenticateUser`/
//! `deleteUser` against a `ResultCode`-shaped outcome), reimplemented as an
//! in-process table rather than a SQLite-backed one — persistence to disk
//! is explicitly out of the connection core's scope, and no crate in this
//! workspace's stack speaks SQLite.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::AuthError;

const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Credential {
    salt_hex: String,
    digest_hex: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    Ok,
    NotFound,
    BadPassword,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

#[derive(Default, Serialize, Deserialize)]
struct PersistedTable {
    users: HashMap<String, Credential>,
}

/// A salted-SHA-256 user table, safe to share across worker threads.
pub struct CredentialStore {
    users: RwLock<HashMap<String, Credential>>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self { users: RwLock::new(HashMap::new()) }
    }

    pub fn create_user(&self, username: &str, password: &str) -> Result<CreateOutcome, AuthError> {
        let mut users = self.users.write().map_err(|_| AuthError::Poisoned)?;
        if users.contains_key(username) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        users.insert(username.to_string(), hash_password(password));
        Ok(CreateOutcome::Created)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<AuthOutcome, AuthError> {
        let users = self.users.read().map_err(|_| AuthError::Poisoned)?;
        let Some(credential) = users.get(username) else {
            return Ok(AuthOutcome::NotFound);
        };
        Ok(if verify_password(credential, password) {
            AuthOutcome::Ok
        } else {
            AuthOutcome::BadPassword
        })
    }

    pub fn delete_user(&self, username: &str) -> Result<DeleteOutcome, AuthError> {
        let mut users = self.users.write().map_err(|_| AuthError::Poisoned)?;
        Ok(if users.remove(username).is_some() {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }

    /// Loads a previously persisted table. Missing files are treated as an
    /// empty store so a fresh deployment starts up without one.
    pub fn load_from(path: &Path) -> Result<Self, AuthError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(?path, "no credential store found, starting empty");
                return Ok(Self::new());
            }
            Err(source) => return Err(AuthError::Load { path: path.to_path_buf(), source }),
        };
        let table: PersistedTable = toml::from_str(&String::from_utf8_lossy(&bytes))
            .map_err(|source| AuthError::Parse { path: path.to_path_buf(), source })?;
        Ok(Self { users: RwLock::new(table.users) })
    }

    pub fn persist_to(&self, path: &Path) -> Result<(), AuthError> {
        let users = self.users.read().map_err(|_| AuthError::Poisoned)?.clone();
        let table = PersistedTable { users };
        let rendered = toml::to_string_pretty(&table).map_err(AuthError::Serialize)?;
        std::fs::write(path, rendered).map_err(|source| AuthError::Persist { path: path.to_path_buf(), source })
    }

    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join("credentials.toml")
    }
}

fn hash_password(password: &str) -> Credential {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    digest(password, &salt)
}

fn verify_password(credential: &Credential, password: &str) -> bool {
    let Ok(salt) = hex::decode(&credential.salt_hex) else {
        return false;
    };
    let candidate = digest(password, &salt);
    candidate.digest_hex == credential.digest_hex
}

fn digest(password: &str, salt: &[u8]) -> Credential {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    let digest_hex = hex::encode(hasher.finalize());
    Credential { salt_hex: hex::encode(salt), digest_hex }
}
