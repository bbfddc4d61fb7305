//! Configuration Module
//!
//! Client settings read once from the environment.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROBE_PATH: &str = "/auth/me";

/// Settings for the session manager and its HTTP transport
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is appended to
    pub api_base_url: String,
    /// Upper bound for every request, including the startup probe
    pub request_timeout: Duration,
    /// Directory holding persisted credentials and logs
    pub data_dir: PathBuf,
    /// Path probed at startup to check a persisted token
    pub probe_path: String,
    /// Serve mock data when the backend cannot be reached
    pub mock_fallback: bool,
}

impl ClientConfig {
    /// Create a config for the given backend with default settings
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            data_dir: default_data_dir(),
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            mock_fallback: true,
        }
    }

    /// Load from `CROPAID_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let api_base_url = std::env::var("CROPAID_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&api_base_url);

        if let Ok(raw) = std::env::var("CROPAID_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => warn!("Ignoring invalid CROPAID_TIMEOUT_SECS: {}", raw),
            }
        }

        if let Ok(dir) = std::env::var("CROPAID_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(path) = std::env::var("CROPAID_PROBE_PATH") {
            config.probe_path = path;
        }

        if let Ok(raw) = std::env::var("CROPAID_MOCK_FALLBACK") {
            match parse_flag(&raw) {
                Some(flag) => config.mock_fallback = flag,
                None => warn!("Ignoring invalid CROPAID_MOCK_FALLBACK: {}", raw),
            }
        }

        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_probe_path(mut self, path: &str) -> Self {
        self.probe_path = path.to_string();
        self
    }

    pub fn with_mock_fallback(mut self, enabled: bool) -> Self {
        self.mock_fallback = enabled;
        self
    }

    /// Directory for rolling log files
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("CropAid")
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
