//! Diagnostic logging.
//!
//! modsec logs through `tracing`; this module installs a compact
//! `tracing-subscriber` formatter on stderr so generated artifacts written
//! to stdout stay clean. `RUST_LOG` overrides the level chosen on the
//! command line.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{ModsecError, Result};

/// Minimum severity that gets logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    /// Default: only problems.
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Level selected by the `-v` / `-q` flags.
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Self::Debug,
            (false, true) => Self::Error,
            (false, false) => Self::default(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the filter is invalid or a subscriber is already installed.
pub fn init_logging(level: LogLevel) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("modsec={level}"))
            .map_err(|e| ModsecError::Config(format!("invalid log filter: {e}")))?,
    };

    let fmt_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ModsecError::CommandFailed(format!("failed to initialize logging: {e}")))
}
