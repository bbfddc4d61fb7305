//! API Module
//!
//! Handles HTTP communication with the CropAid backend: bearer attachment,
//! bounded timeouts and classification of failures into network, rejection
//! and server errors.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::{AuthResponse, LoginRequest, RegistrationProfile};

/// HTTP client for the CropAid backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a new API client; every request is bounded by `timeout`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange credentials for a token and user
    pub(crate) async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        debug!("Logging in at: {}/auth/login", self.base_url);

        let builder = self
            .request(Method::POST, "/auth/login", None)
            .json(&LoginRequest { identifier, password });
        self.execute(builder).await
    }

    /// Create an account
    pub(crate) async fn register(
        &self,
        profile: &RegistrationProfile,
    ) -> Result<AuthResponse, ApiError> {
        info!("Registering account for: {}", profile.email);

        let builder = self.request(Method::POST, "/auth/register", None).json(profile);
        self.execute(builder).await
    }

    /// Tell the backend the token is no longer in use
    pub(crate) async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, "/auth/logout", Some(token));
        self.execute_empty(builder).await?;

        info!("Notified server of logout");
        Ok(())
    }

    /// Check that the backend is reachable and accepts `token`.
    ///
    /// Only the status matters: a 401 is a rejection, any other response
    /// means the backend answered without rejecting the token.
    pub(crate) async fn probe(&self, path: &str, token: &str) -> Result<(), ApiError> {
        let response = self
            .request(Method::GET, path, Some(token))
            .send()
            .await
            .map_err(classify_transport)?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized(
                error_message(response, "Session expired").await,
            )),
            status if !status.is_success() => {
                warn!("Probe answered with status {}, keeping session", status);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Start a request to `path`, with a bearer token when one is given
    pub(crate) fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let builder = self.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        response.json::<T>().await.map_err(|e| {
            // The client timeout also covers the body read
            if e.is_timeout() {
                classify_transport(e)
            } else {
                ApiError::Parse(e.to_string())
            }
        })
    }

    /// Send a request and ignore the body
    pub(crate) async fn execute_empty(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        self.send(builder).await.map(|_| ())
    }

    /// Send a JSON body with `method`
    pub(crate) async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method, path, token).json(body);
        self.execute(builder).await
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await.map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized(
                error_message(response, "Invalid credentials").await,
            ));
        }

        let message = error_message(response, &format!("Status: {}", status)).await;
        Err(ApiError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

/// Failures before any response arrived count as "backend unreachable"
fn classify_transport(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Network(format!("Request timed out: {}", e))
    } else if e.is_builder() {
        ApiError::Client(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}

/// Pull a human-readable reason out of an error body
async fn error_message(response: reqwest::Response, fallback: &str) -> String {
    response
        .json::<ErrorResponse>()
        .await
        .ok()
        .and_then(|body| body.message.or(body.error))
        .unwrap_or_else(|| fallback.to_string())
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// API errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Client error: {0}")]
    Client(String),
}

impl ApiError {
    /// True when the backend could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    pub(crate) fn not_found(what: &str) -> Self {
        ApiError::Server {
            status: 404,
            message: format!("{} not found", what),
        }
    }

    pub(crate) fn forbidden() -> Self {
        ApiError::Server {
            status: 403,
            message: "Forbidden".into(),
        }
    }
}
