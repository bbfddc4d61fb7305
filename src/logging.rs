//! Diagnostics log for the CropAid client.
//!
//! Everything lands in `<log_dir>/cropaid.log`, rotated daily. Debug builds
//! echo to stderr as well; stdout is left to command output.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE: &str = "cropaid.log";

/// HTTP stack internals are only interesting when they fail
const QUIET_TARGETS: &str = "hyper=warn,reqwest=warn";

/// Install the global subscriber. A second call is a no-op.
pub fn init(log_dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("cropaid: cannot create log directory {:?}: {}", log_dir, e);
    }

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE));

    let console_layer = cfg!(debug_assertions)
        .then(|| fmt::layer().with_writer(std::io::stderr).pretty());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives()));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();
}

fn default_directives() -> String {
    let level = if cfg!(debug_assertions) { "debug" } else { "info" };
    format!("{},{}", level, QUIET_TARGETS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_internals_are_quieted() {
        let directives = default_directives();
        assert!(directives.ends_with(QUIET_TARGETS));
    }

    #[test]
    fn init_creates_the_log_directory_and_tolerates_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");

        init(&logs);
        init(&logs);

        assert!(logs.is_dir());
    }
}
