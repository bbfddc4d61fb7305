//! Session Errors
//!
//! What the session operations report to the UI layer.

use crate::api::ApiError;
use crate::storage::StorageError;

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Backend reachable, credentials refused
    #[error("{0}")]
    CredentialRejected(String),

    /// Network failure or timeout
    #[error("Backend unreachable: {0}")]
    BackendUnreachable(String),

    /// A previously accepted token was refused; the session has been cleared
    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Malformed persisted credentials: {0}")]
    MalformedPersistedRecord(String),

    /// The session changed while the request was in flight
    #[error("Request cancelled because the session changed")]
    Cancelled,

    #[error(transparent)]
    Api(ApiError),

    #[error(transparent)]
    Storage(StorageError),
}

impl SessionError {
    /// True when the UI should send the user back to the login screen
    pub fn requires_login(&self) -> bool {
        matches!(self, SessionError::SessionExpired)
    }
}

impl From<ApiError> for SessionError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Network(message) => SessionError::BackendUnreachable(message),
            other => SessionError::Api(other),
        }
    }
}

impl From<StorageError> for SessionError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Malformed(reason) => SessionError::MalformedPersistedRecord(reason),
            other => SessionError::Storage(other),
        }
    }
}
