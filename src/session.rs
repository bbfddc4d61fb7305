//! Session Manager
//!
//! Owns the session for the whole application: restores it at startup,
//! signs in and out, and routes every domain request either to the real
//! backend (with the bearer token attached) or to the mock dataset.
//!
//! Every request is tied to the identity it was issued under. Any change of
//! identity cancels requests still in flight, and a response that arrives
//! for a previous identity is discarded as [`SessionError::Cancelled`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{AuthMode, Session};
use crate::backend::{Backend, RemoteBackend};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::mock::MockProvider;
use crate::models::{
    AdminStats, AuthResponse, AuthResult, CreatedReport, DailySummary, FarmerDashboard,
    FarmerProfile, FarmerQuery, FarmerSummary, MediaReceipt, MediaUpload, NewReport,
    ProfileUpdate, RegistrationProfile, Report, ReportQuery, ReportStatus, ReportUpdate, User,
};
use crate::storage::{CredentialRecord, CredentialStore, SecureStorage, StorageError};

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginOutcome {
    pub mode: AuthMode,
    pub user: User,
}

/// Result of a successful registration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterOutcome {
    pub message: Option<String>,
    /// The backend returned a session and it was adopted
    pub signed_in: bool,
}

/// Identity generation; bumped on every sign-in or sign-out
struct Lifecycle {
    epoch: u64,
    cancel: CancellationToken,
}

/// What a request needs to run under the current identity
struct Ticket {
    epoch: u64,
    cancel: CancellationToken,
    backend: Arc<dyn Backend>,
}

/// Shared session owner; wrap in an `Arc` and hand it to whoever needs it
pub struct SessionManager {
    config: ClientConfig,
    api: ApiClient,
    credentials: CredentialStore,
    mock: MockProvider,
    state: watch::Sender<Session>,
    lifecycle: Mutex<Lifecycle>,
}

impl SessionManager {
    /// Create a manager in the loading state; call [`restore`](Self::restore) next
    pub fn new(config: ClientConfig) -> Result<Self, SessionError> {
        let api = ApiClient::new(&config.api_base_url, config.request_timeout)?;
        let credentials = CredentialStore::new(SecureStorage::new(config.data_dir.clone()));
        let (state, _) = watch::channel(Session::restoring());

        Ok(Self {
            config,
            api,
            credentials,
            mock: MockProvider::seeded(),
            state,
            lifecycle: Mutex::new(Lifecycle {
                epoch: 0,
                cancel: CancellationToken::new(),
            }),
        })
    }

    /// Use a specific mock dataset instead of a fresh seed
    pub fn with_mock_provider(mut self, mock: MockProvider) -> Self {
        self.mock = mock;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current session snapshot
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver that observes every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Wait until startup restoration has finished
    pub async fn wait_until_ready(&self) -> Session {
        let mut rx = self.state.subscribe();
        let ready = rx.wait_for(|session| !session.is_loading()).await.map(|s| s.clone());
        ready.unwrap_or_else(|_| self.session())
    }

    /// Restore the persisted session, checking it against the backend.
    ///
    /// Ends in one of: real session, mock session (backend unreachable) or
    /// signed out (no record, malformed record, or token rejected).
    pub async fn restore(&self) -> Session {
        debug!("Restoring session");

        let next = match self.credentials.load() {
            Ok(Some(record)) => self.revalidate(record).await,
            Ok(None) => {
                info!("No stored session found");
                Session::signed_out()
            }
            Err(StorageError::Malformed(reason)) => {
                warn!("Discarding malformed stored session: {}", reason);
                self.forget_credentials();
                Session::signed_out()
            }
            Err(e) => {
                error!("Failed to read stored session: {}", e);
                Session::signed_out()
            }
        };

        self.transition(next.clone());
        next
    }

    async fn revalidate(&self, record: CredentialRecord) -> Session {
        match self.api.probe(&self.config.probe_path, &record.token).await {
            Ok(()) => {
                info!("Restored session for user: {}", record.user.id);
                Session::authenticated(record.token, record.user)
            }
            Err(ApiError::Unauthorized(reason)) => {
                warn!("Stored session rejected: {}", reason);
                self.forget_credentials();
                Session::signed_out()
            }
            Err(e) if e.is_unreachable() && self.config.mock_fallback => {
                warn!("Backend unreachable ({}), continuing with mock data", e);
                Session::mock(self.mock.user_matching(&record.user))
            }
            Err(e) => {
                warn!("Session probe failed ({}), keeping stored session", e);
                Session::authenticated(record.token, record.user)
            }
        }
    }

    /// Sign in with an email or farmer ID.
    ///
    /// Falls back to mock mode when the backend cannot be reached (unless
    /// disabled in config). A refusal leaves the session untouched.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<LoginOutcome, SessionError> {
        debug!("Login requested for: {}", identifier);

        match self.api.login(identifier, password).await {
            Ok(AuthResponse {
                token: Some(token),
                user: Some(user),
                ..
            }) if !token.is_empty() => {
                self.adopt(token, user.clone());
                Ok(LoginOutcome {
                    mode: AuthMode::Real,
                    user,
                })
            }
            Ok(response) => Err(SessionError::CredentialRejected(
                response
                    .message
                    .unwrap_or_else(|| "Login response did not include a session".into()),
            )),
            Err(e) if e.is_unreachable() => {
                if !self.config.mock_fallback {
                    return Err(e.into());
                }
                warn!("Backend unreachable ({}), signing in with mock data", e);
                let user = self.mock.user_for(identifier);
                self.forget_other_identity(&user);
                self.transition(Session::mock(user.clone()));
                Ok(LoginOutcome {
                    mode: AuthMode::Mock,
                    user,
                })
            }
            Err(e) => {
                info!("Login refused: {}", e);
                Err(rejection(e))
            }
        }
    }

    /// Create an account from the sign-up wizard's profile.
    ///
    /// No mock fallback: an account has to exist on the real backend. If the
    /// backend answers with a session it is adopted like a login.
    pub async fn register(
        &self,
        profile: &RegistrationProfile,
    ) -> Result<RegisterOutcome, SessionError> {
        let response = self.api.register(profile).await.map_err(rejection)?;

        let signed_in = match (response.token, response.user) {
            (Some(token), Some(user)) if !token.is_empty() => {
                self.adopt(token, user);
                true
            }
            _ => false,
        };

        info!("Registration accepted (signed in: {})", signed_in);
        Ok(RegisterOutcome {
            message: response.message,
            signed_in,
        })
    }

    /// Sign out. Safe to call when already signed out.
    pub async fn logout(&self) {
        let previous = self.session();

        self.forget_credentials();
        self.transition(Session::signed_out());

        if let (Some(token), false) = (previous.token(), previous.is_mock_mode()) {
            if let Err(e) = self.api.logout(token).await {
                debug!("Logout notification failed: {}", e);
            }
        }
    }

    // Domain requests

    pub async fn farmer_dashboard(&self) -> Result<FarmerDashboard, SessionError> {
        self.authorized(|backend| async move { backend.farmer_dashboard().await })
            .await
    }

    pub async fn farmer_profile(&self) -> Result<FarmerProfile, SessionError> {
        self.authorized(|backend| async move { backend.farmer_profile().await })
            .await
    }

    pub async fn update_farmer_profile(
        &self,
        update: ProfileUpdate,
    ) -> Result<FarmerProfile, SessionError> {
        self.authorized(move |backend| async move { backend.update_farmer_profile(update).await })
            .await
    }

    /// The signed-in farmer's report history
    pub async fn farmer_reports(&self) -> Result<Vec<Report>, SessionError> {
        self.authorized(|backend| async move { backend.farmer_reports().await })
            .await
    }

    pub async fn create_report(&self, report: NewReport) -> Result<CreatedReport, SessionError> {
        info!("Submitting {:?} report", report.kind());
        self.authorized(move |backend| async move { backend.create_report(report).await })
            .await
    }

    pub async fn report_details(&self, report_id: u64) -> Result<Report, SessionError> {
        self.authorized(move |backend| async move { backend.report_details(report_id).await })
            .await
    }

    pub async fn upload_media(
        &self,
        report_id: u64,
        media: MediaUpload,
    ) -> Result<MediaReceipt, SessionError> {
        self.authorized(move |backend| async move { backend.upload_media(report_id, media).await })
            .await
    }

    pub async fn update_report(
        &self,
        report_id: u64,
        update: ReportUpdate,
    ) -> Result<Report, SessionError> {
        self.authorized(
            move |backend| async move { backend.update_report(report_id, update).await },
        )
        .await
    }

    pub async fn delete_report(&self, report_id: u64) -> Result<(), SessionError> {
        self.authorized(move |backend| async move { backend.delete_report(report_id).await })
            .await
    }

    pub async fn admin_stats(&self) -> Result<AdminStats, SessionError> {
        self.authorized(|backend| async move { backend.admin_stats().await })
            .await
    }

    pub async fn admin_farmers(
        &self,
        query: FarmerQuery,
    ) -> Result<Vec<FarmerSummary>, SessionError> {
        self.authorized(move |backend| async move { backend.admin_farmers(query).await })
            .await
    }

    pub async fn farmer_details(&self, farmer_id: u64) -> Result<FarmerProfile, SessionError> {
        self.authorized(move |backend| async move { backend.farmer_details(farmer_id).await })
            .await
    }

    pub async fn admin_reports(&self, query: ReportQuery) -> Result<Vec<Report>, SessionError> {
        self.authorized(move |backend| async move { backend.admin_reports(query).await })
            .await
    }

    pub async fn update_report_status(
        &self,
        report_id: u64,
        status: ReportStatus,
    ) -> Result<Report, SessionError> {
        self.authorized(move |backend| async move {
            backend.update_report_status(report_id, status).await
        })
        .await
    }

    pub async fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary, SessionError> {
        self.authorized(move |backend| async move { backend.daily_summary(date).await })
            .await
    }

    /// Run one domain request under the current identity.
    ///
    /// A 401 clears the session like a logout and reports `SessionExpired`.
    /// Network failures are passed back without touching the session.
    async fn authorized<T, F, Fut>(&self, op: F) -> Result<T, SessionError>
    where
        F: FnOnce(Arc<dyn Backend>) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let Ticket {
            epoch,
            cancel,
            backend,
        } = self.ticket();

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            outcome = op(backend) => outcome,
        };

        if self.current_epoch() != epoch {
            debug!("Discarding response issued under a previous session");
            return Err(SessionError::Cancelled);
        }

        match outcome {
            Ok(value) => Ok(value),
            Err(ApiError::Unauthorized(reason)) => {
                warn!("Request rejected as unauthorized: {}", reason);
                self.expire(epoch);
                Err(SessionError::SessionExpired)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn ticket(&self) -> Ticket {
        let lifecycle = self.lifecycle();
        let session = self.state.borrow();

        let backend: Arc<dyn Backend> = match session.current_user() {
            Some(user) if session.is_mock_mode() => Arc::new(self.mock.backend_for(user.clone())),
            _ => Arc::new(RemoteBackend::new(
                self.api.clone(),
                session.token().map(str::to_string),
            )),
        };

        Ticket {
            epoch: lifecycle.epoch,
            cancel: lifecycle.cancel.child_token(),
            backend,
        }
    }

    /// Persist a real session and make it current
    fn adopt(&self, token: String, user: User) {
        let record = CredentialRecord {
            token: token.clone(),
            user: user.clone(),
        };
        if let Err(e) = self.credentials.save(&record) {
            error!("Failed to save session: {}", e);
        }
        info!("Signed in as user: {} ({})", user.id, user.role);
        self.transition(Session::authenticated(token, user));
    }

    /// Clear the session after a rejection, unless it already changed
    fn expire(&self, epoch: u64) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.epoch != epoch {
            return;
        }
        self.forget_credentials();
        self.replace(&mut lifecycle, Session::signed_out());
    }

    fn transition(&self, next: Session) {
        let mut lifecycle = self.lifecycle();
        self.replace(&mut lifecycle, next);
    }

    /// Start a new identity epoch: cancel in-flight requests, publish `next`
    fn replace(&self, lifecycle: &mut Lifecycle, next: Session) {
        lifecycle.cancel.cancel();
        lifecycle.cancel = CancellationToken::new();
        lifecycle.epoch += 1;

        info!(
            "Session now: authenticated={}, mode={:?}",
            next.is_authenticated(),
            next.mode()
        );
        self.state.send_replace(next);
    }

    /// A stored record is only kept for the mock user it restores to
    fn forget_other_identity(&self, user: &User) {
        match self.credentials.load() {
            Ok(None) => {}
            Ok(Some(record)) if self.mock.user_matching(&record.user).id == user.id => {}
            _ => {
                info!("Dropping stored session of a previous user");
                self.forget_credentials();
            }
        }
    }

    fn forget_credentials(&self) {
        if let Err(e) = self.credentials.clear() {
            error!("Failed to delete stored session: {}", e);
        }
    }

    fn current_epoch(&self) -> u64 {
        self.lifecycle().epoch
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map a failed login/register call onto the session taxonomy
fn rejection(e: ApiError) -> SessionError {
    match e {
        ApiError::Unauthorized(reason) => SessionError::CredentialRejected(reason),
        ApiError::Server { status, message } if (400..500).contains(&status) => {
            SessionError::CredentialRejected(message)
        }
        other => other.into(),
    }
}

impl From<Result<LoginOutcome, SessionError>> for AuthResult {
    fn from(result: Result<LoginOutcome, SessionError>) -> Self {
        match result {
            Ok(outcome) => AuthResult {
                success: true,
                mock: outcome.mode == AuthMode::Mock,
                user: Some(outcome.user),
                error: None,
            },
            Err(e) => AuthResult::failure(e),
        }
    }
}

impl From<Result<RegisterOutcome, SessionError>> for AuthResult {
    fn from(result: Result<RegisterOutcome, SessionError>) -> Self {
        match result {
            Ok(_) => AuthResult {
                success: true,
                mock: false,
                user: None,
                error: None,
            },
            Err(e) => AuthResult::failure(e),
        }
    }
}

impl AuthResult {
    fn failure(e: SessionError) -> Self {
        AuthResult {
            success: false,
            mock: false,
            user: None,
            error: Some(e.to_string()),
        }
    }
}
