//! Authentication Module
//!
//! The session value: who is signed in, with what token, against which
//! backend. Values are only built through the constructors below, so a token
//! never exists without its user and mock mode never carries a token.

use serde::Serialize;

use crate::models::User;

/// Which backend answers domain requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Real,
    Mock,
}

/// Snapshot of the authentication state
#[derive(Clone, PartialEq)]
pub struct Session {
    token: Option<String>,
    current_user: Option<User>,
    mock_mode: bool,
    loading: bool,
}

impl Session {
    /// Startup state while the persisted record is being restored
    pub(crate) fn restoring() -> Self {
        Self {
            token: None,
            current_user: None,
            mock_mode: false,
            loading: true,
        }
    }

    /// Nobody signed in, real mode
    pub(crate) fn signed_out() -> Self {
        Self {
            loading: false,
            ..Self::restoring()
        }
    }

    /// Signed in against the real backend
    pub(crate) fn authenticated(token: String, user: User) -> Self {
        Self {
            token: Some(token),
            current_user: Some(user),
            mock_mode: false,
            loading: false,
        }
    }

    /// Signed in against the mock dataset; never holds a token
    pub(crate) fn mock(user: User) -> Self {
        Self {
            token: None,
            current_user: Some(user),
            mock_mode: true,
            loading: false,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn is_mock_mode(&self) -> bool {
        self.mock_mode
    }

    /// True until startup restoration has finished
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn mode(&self) -> AuthMode {
        if self.mock_mode {
            AuthMode::Mock
        } else {
            AuthMode::Real
        }
    }

    /// Real mode needs token and user; mock mode needs a user
    pub fn is_authenticated(&self) -> bool {
        match (&self.token, &self.current_user) {
            (_, None) => false,
            (Some(_), Some(_)) => !self.mock_mode,
            (None, Some(_)) => self.mock_mode,
        }
    }

    /// The UI-facing view of this session
    pub fn view(&self) -> SessionView {
        SessionView {
            is_authenticated: self.is_authenticated(),
            is_mock_mode: self.mock_mode,
            loading: self.loading,
            current_user: self.current_user.clone(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("current_user", &self.current_user)
            .field("mock_mode", &self.mock_mode)
            .field("loading", &self.loading)
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::restoring()
    }
}

/// Serializable session state for UI consumers; never includes the token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub is_authenticated: bool,
    pub is_mock_mode: bool,
    pub loading: bool,
    pub current_user: Option<User>,
}
