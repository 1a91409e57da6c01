//! Logging initialization for authorizer processes
//!
//! Logs always go to stderr. Structured (JSON) output is what the gateway's
//! log pipeline expects; plain output is easier to read locally.
//!
//! ```rust,no_run
//! use quillpad_auth::LoggingConfig;
//!
//! LoggingConfig::structured().init()?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! `RUST_LOG` overrides the configured level, e.g.
//! `RUST_LOG=info,audit::auth=warn` to keep only denials in the audit stream.

use std::io;

use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub structured: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            structured: false,
        }
    }
}

impl LoggingConfig {
    /// JSON logs at `info`
    pub fn structured() -> Self {
        Self {
            structured: true,
            ..Self::default()
        }
    }

    /// Set the default level directive
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed.
    pub fn init(&self) -> io::Result<()> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        let subscriber = tracing_subscriber::registry().with(filter);

        if self.structured {
            subscriber
                .with(fmt::layer().json().with_writer(io::stderr))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        } else {
            subscriber
                .with(fmt::layer().with_writer(io::stderr))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        }
    }
}
