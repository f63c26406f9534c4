//! services/api/src/adapters/credentials.rs
//!
//! This module contains the credential store, the concrete implementation of the
//! `CredentialStore` port from the `core` crate. All users live in a single JSON
//! file mapping username to `{"password_hash": ..., "email": ...}`.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use report_interpreter_core::domain::UserRecord;
use report_interpreter_core::ports::{CredentialStore, PortError, PortResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::adapters::store::write_atomically;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A JSON-file credential store that implements the `CredentialStore` port.
pub struct JsonCredentialStore {
    path: PathBuf,
    /// Serializes the read-check-write of registrations within this process.
    write_lock: Mutex<()>,
}

impl JsonCredentialStore {
    /// Creates a new `JsonCredentialStore` backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates an empty credential file if none exists yet.
    pub async fn ensure_exists(&self) -> PortResult<()> {
        if fs::try_exists(&self.path)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
        {
            return Ok(());
        }
        self.write_all(&BTreeMap::new()).await?;
        info!(path = %self.path.display(), "Created empty credential file");
        Ok(())
    }

    async fn read_all(&self) -> PortResult<BTreeMap<String, CredentialRecord>> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                PortError::Unexpected(format!("Corrupt credential file {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }

    async fn write_all(&self, users: &BTreeMap<String, CredentialRecord>) -> PortResult<()> {
        let json = serde_json::to_string_pretty(users)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        write_atomically(&self.path, json.as_bytes())
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// "Impure" File Record Struct
//=========================================================================================

#[derive(Serialize, Deserialize, Clone)]
struct CredentialRecord {
    password_hash: String,
    #[serde(default)]
    email: String,
}

impl CredentialRecord {
    fn to_domain(self, username: &str) -> UserRecord {
        UserRecord {
            username: username.to_string(),
            password_hash: self.password_hash,
            email: self.email,
        }
    }
}

//=========================================================================================
// Password Hashing
//=========================================================================================

/// Hashes a password into an Argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            PortError::Unexpected("Failed to hash password".to_string())
        })
}

/// Checks a password against a stored hash.
///
/// Besides Argon2 PHC strings, this accepts the unsalted hex SHA-256 digests
/// found in credential files written by earlier versions of the tool.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) if is_legacy_digest(stored_hash) => {
            let digest = format!("{:x}", Sha256::digest(password.as_bytes()));
            digest.eq_ignore_ascii_case(stored_hash)
        }
        Err(e) => {
            error!("Failed to parse password hash: {:?}", e);
            false
        }
    }
}

fn is_legacy_digest(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

//=========================================================================================
// `CredentialStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CredentialStore for JsonCredentialStore {
    async fn register(&self, username: &str, password: &str, email: &str) -> PortResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut users = self.read_all().await?;
        if users.contains_key(username) {
            return Ok(false);
        }

        users.insert(
            username.to_string(),
            CredentialRecord {
                password_hash: hash_password(password)?,
                email: email.to_string(),
            },
        );
        self.write_all(&users).await?;
        Ok(true)
    }

    async fn authenticate(&self, username: &str, password: &str) -> PortResult<bool> {
        let users = self.read_all().await?;
        let Some(user) = users.get(username).cloned().map(|r| r.to_domain(username)) else {
            return Ok(false);
        };
        Ok(verify_password(password, &user.password_hash))
    }
}
