//! CropAid Session Library
//!
//! Client-side session handling for the CropAid calamity-reporting app:
//! sign-in, persisted credentials, authorized requests and the offline mock
//! mode.

pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod mock;
pub mod models;
pub mod session;
pub mod storage;

use std::sync::Arc;

pub use auth::{AuthMode, Session, SessionView};
pub use config::ClientConfig;
pub use error::SessionError;
pub use session::{LoginOutcome, RegisterOutcome, SessionManager};

/// Session handle shared by every part of the application
pub type SharedSession = Arc<SessionManager>;

/// Build a manager from `config` and restore the persisted session
pub async fn start(config: ClientConfig) -> Result<SharedSession, SessionError> {
    let manager = Arc::new(SessionManager::new(config)?);
    manager.restore().await;
    Ok(manager)
}
