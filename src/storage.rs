//! Secure Storage Module
//!
//! Durable key-value storage for the persisted credential record. Values are
//! JSON, encrypted with DPAPI on Windows.

use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info};

use crate::models::User;

#[cfg(windows)]
use windows::Win32::Security::Cryptography::{
    CryptProtectData, CryptUnprotectData, CRYPTPROTECT_UI_FORBIDDEN, CRYPT_INTEGER_BLOB,
};

const TOKEN_KEY: &str = "token";
const USER_KEY: &str = "user";

/// One file per key in the storage directory
#[derive(Debug, Clone)]
pub struct SecureStorage {
    storage_path: PathBuf,
}

impl SecureStorage {
    /// Create storage rooted at `storage_path`, creating the directory
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();

        if let Err(e) = std::fs::create_dir_all(&storage_path) {
            error!("Failed to create storage directory: {}", e);
        }

        debug!("Secure storage initialized at: {:?}", storage_path);

        Self { storage_path }
    }

    /// Serialize and store a value under `key`
    pub fn save<T: Serialize>(&self, key: &str, data: &T) -> Result<(), StorageError> {
        let json =
            serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let sealed = protect(&json)?;

        std::fs::write(self.path_for(key), sealed).map_err(|e| StorageError::Io(e.to_string()))?;

        debug!("Saved data for key: {}", key);
        Ok(())
    }

    /// Load a value; `Ok(None)` when nothing is stored under `key`
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let sealed = match std::fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };

        let json = unprotect(&sealed)?;

        serde_json::from_slice(&json)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Delete stored data; missing keys are fine
    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        let file_path = self.path_for(key);

        if file_path.exists() {
            std::fs::remove_file(&file_path).map_err(|e| StorageError::Io(e.to_string()))?;
            debug!("Deleted stored data for key: {}", key);
        }

        Ok(())
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.storage_path.join(format!("{}.dat", key))
    }
}

/// The `{token, user}` pair kept across restarts
#[derive(Clone, PartialEq)]
pub struct CredentialRecord {
    pub token: String,
    pub user: User,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Reads and writes the credential record in [`SecureStorage`]
#[derive(Debug, Clone)]
pub struct CredentialStore {
    storage: SecureStorage,
}

impl CredentialStore {
    pub fn new(storage: SecureStorage) -> Self {
        Self { storage }
    }

    /// Read the persisted record.
    ///
    /// A half-written record (token without user or the reverse) or one that
    /// fails to parse is reported as [`StorageError::Malformed`].
    pub fn load(&self) -> Result<Option<CredentialRecord>, StorageError> {
        let token = self.storage.load::<String>(TOKEN_KEY);
        let user = self.storage.load::<User>(USER_KEY);

        match (token, user) {
            (Ok(None), Ok(None)) => Ok(None),
            (Ok(Some(token)), Ok(Some(user))) if !token.is_empty() => {
                Ok(Some(CredentialRecord { token, user }))
            }
            (Ok(_), Ok(_)) => Err(StorageError::Malformed(
                "token and user must be stored together".into(),
            )),
            (Err(StorageError::Io(e)), _) | (_, Err(StorageError::Io(e))) => {
                Err(StorageError::Io(e))
            }
            (Err(e), _) | (_, Err(e)) => Err(StorageError::Malformed(e.to_string())),
        }
    }

    /// Persist a record, replacing any previous one
    pub fn save(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        self.storage.save(TOKEN_KEY, &record.token)?;
        if let Err(e) = self.storage.save(USER_KEY, &record.user) {
            // Never leave a token on disk without its user
            if let Err(rollback) = self.storage.delete(TOKEN_KEY) {
                error!("Failed to roll back stored token: {}", rollback);
            }
            return Err(e);
        }
        info!("Persisted credentials for user: {}", record.user.id);
        Ok(())
    }

    /// Remove both keys
    pub fn clear(&self) -> Result<(), StorageError> {
        let token = self.storage.delete(TOKEN_KEY);
        let user = self.storage.delete(USER_KEY);
        token.and(user)?;
        info!("Cleared persisted credentials");
        Ok(())
    }
}

#[cfg(windows)]
fn protect(data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let input = blob_for(data);
    let mut output = CRYPT_INTEGER_BLOB::default();

    unsafe {
        CryptProtectData(&input, None, None, None, None, CRYPTPROTECT_UI_FORBIDDEN, &mut output)
            .map_err(|_| StorageError::Encryption("DPAPI encryption failed".into()))?;
        Ok(take_blob(output))
    }
}

#[cfg(windows)]
fn unprotect(data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let input = blob_for(data);
    let mut output = CRYPT_INTEGER_BLOB::default();

    unsafe {
        CryptUnprotectData(&input, None, None, None, None, CRYPTPROTECT_UI_FORBIDDEN, &mut output)
            .map_err(|_| StorageError::Decryption("DPAPI decryption failed".into()))?;
        Ok(take_blob(output))
    }
}

#[cfg(windows)]
fn blob_for(data: &[u8]) -> CRYPT_INTEGER_BLOB {
    CRYPT_INTEGER_BLOB {
        cbData: data.len() as u32,
        pbData: data.as_ptr() as *mut u8,
    }
}

/// Copy a DPAPI output blob and release the buffer DPAPI allocated
#[cfg(windows)]
unsafe fn take_blob(blob: CRYPT_INTEGER_BLOB) -> Vec<u8> {
    let bytes = std::slice::from_raw_parts(blob.pbData, blob.cbData as usize).to_vec();
    windows::Win32::Foundation::LocalFree(windows::Win32::Foundation::HLOCAL(
        blob.pbData as *mut std::ffi::c_void,
    ));
    bytes
}

// Plain JSON on other platforms
#[cfg(not(windows))]
fn protect(data: &[u8]) -> Result<Vec<u8>, StorageError> {
    Ok(data.to_vec())
}

#[cfg(not(windows))]
fn unprotect(data: &[u8]) -> Result<Vec<u8>, StorageError> {
    Ok(data.to_vec())
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Malformed credential record: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn farmer() -> User {
        User {
            id: 1,
            name: "Juan Dela Cruz".into(),
            role: Role::Farmer,
            email: Some("farmer1@example.com".into()),
            farmer_id: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn record_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(SecureStorage::new(dir.path()));
        let record = CredentialRecord {
            token: "abc".into(),
            user: farmer(),
        };
        store.save(&record).unwrap();

        let reopened = CredentialStore::new(SecureStorage::new(dir.path()));
        assert_eq!(reopened.load().unwrap(), Some(record));
    }

    #[test]
    fn failed_user_write_rolls_back_the_token() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("user.dat")).unwrap();
        let store = CredentialStore::new(SecureStorage::new(dir.path()));

        let result = store.save(&CredentialRecord {
            token: "abc".into(),
            user: farmer(),
        });

        assert!(matches!(result, Err(StorageError::Io(_))));
        assert!(!dir.path().join("token.dat").exists());
    }

    #[test]
    fn empty_directory_has_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(SecureStorage::new(dir.path()));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn token_without_user_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SecureStorage::new(dir.path());
        storage.save(TOKEN_KEY, &"abc").unwrap();

        let store = CredentialStore::new(storage);
        assert!(matches!(store.load(), Err(StorageError::Malformed(_))));
    }

    #[test]
    fn garbage_user_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SecureStorage::new(dir.path());
        storage.save(TOKEN_KEY, &"abc").unwrap();
        std::fs::write(dir.path().join("user.dat"), b"{not json").unwrap();

        let store = CredentialStore::new(storage);
        assert!(matches!(store.load(), Err(StorageError::Malformed(_))));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SecureStorage::new(dir.path());
        let store = CredentialStore::new(storage.clone());
        store
            .save(&CredentialRecord {
                token: "abc".into(),
                user: farmer(),
            })
            .unwrap();

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!storage.exists(TOKEN_KEY));
        assert!(!storage.exists(USER_KEY));
    }

    #[test]
    fn debug_hides_token() {
        let record = CredentialRecord {
            token: "super-secret".into(),
            user: farmer(),
        };
        assert!(!format!("{:?}", record).contains("super-secret"));
    }
}
