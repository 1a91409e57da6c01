//! Structured audit logging for authorization decisions
//!
//! Every decision the gateway takes, and every key-set fetch it performs, is
//! emitted as a structured event on the `audit::auth` tracing target so that it
//! can be routed to a separate sink from operational logs.
//!
//! ## Event Types
//!
//! - [`AuthEvent::AccessGranted`] - token verified, Allow issued
//! - [`AuthEvent::AccessDenied`] - Deny issued, with the failure class and the stage it happened at
//! - [`AuthEvent::KeySetFetched`] - key set refreshed from the issuer
//! - [`AuthEvent::KeySetFetchFailed`] - key-set fetch failed
//! - [`AuthEvent::StaleKeySetServed`] - expired key set served after a failed refresh
//!
//! ## Usage
//!
//! ```rust
//! use quillpad_auth::audit::{AuditLogger, AuthEvent};
//!
//! let logger = AuditLogger::privacy_focused("notes-api");
//!
//! logger.log(AuthEvent::AccessGranted {
//!     subject: "user-42".to_string(),
//!     kid: "key-1".to_string(),
//! });
//! ```
//!
//! Subjects are user identifiers; a privacy-focused logger replaces them with
//! a truncated BLAKE3 digest so that events can still be correlated per user.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ErrorKind;

/// Audit logger for authorization events
#[derive(Debug, Clone)]
pub struct AuditLogger {
    /// Service name for event attribution
    service_name: String,
    /// Whether to hash subjects
    hash_identifiers: bool,
}

impl AuditLogger {
    /// Create a new audit logger with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            hash_identifiers: false,
        }
    }

    /// Create a logger that hashes subjects
    pub fn privacy_focused(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            hash_identifiers: true,
        }
    }

    /// Builder method to configure identifier hashing
    pub fn with_identifier_hashing(mut self, hash: bool) -> Self {
        self.hash_identifiers = hash;
        self
    }

    /// Service name events are attributed to
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Wrap an event in an [`AuditRecord`], hashing identifiers if configured
    pub fn record(&self, event: AuthEvent) -> AuditRecord {
        AuditRecord {
            id: Uuid::now_v7(),
            timestamp: SystemTime::now(),
            service: self.service_name.clone(),
            event: self.maybe_redact(event),
        }
    }

    /// Log an authorization event
    pub fn log(&self, event: AuthEvent) {
        let record = self.record(event);

        match &record.event {
            AuthEvent::AccessGranted { subject, kid } => {
                info!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = "access_granted",
                    subject = %subject,
                    kid = %kid,
                    service = %record.service,
                    "Access granted"
                );
            }
            AuthEvent::AccessDenied {
                error_kind,
                stage,
                reason,
            } => {
                warn!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = "access_denied",
                    error_kind = %error_kind,
                    stage = %stage,
                    reason = %reason,
                    service = %record.service,
                    "Access denied"
                );
            }
            AuthEvent::KeySetFetched {
                key_set_url,
                key_count,
            } => {
                info!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = "key_set_fetched",
                    key_set_url = %key_set_url,
                    key_count = key_count,
                    service = %record.service,
                    "Key set fetched"
                );
            }
            AuthEvent::KeySetFetchFailed {
                key_set_url,
                reason,
            } => {
                error!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = "key_set_fetch_failed",
                    key_set_url = %key_set_url,
                    reason = %reason,
                    service = %record.service,
                    "Key set fetch failed"
                );
            }
            AuthEvent::StaleKeySetServed {
                key_set_url,
                age_secs,
            } => {
                warn!(
                    target: "audit::auth",
                    audit_id = %record.id,
                    event_type = "stale_key_set_served",
                    key_set_url = %key_set_url,
                    age_secs = age_secs,
                    service = %record.service,
                    "Serving stale key set"
                );
            }
        }
    }

    fn maybe_hash(&self, value: &str) -> String {
        if self.hash_identifiers {
            let hash = blake3::hash(value.as_bytes());
            format!("blake3:{}", &hash.to_hex()[..16])
        } else {
            value.to_string()
        }
    }

    fn maybe_redact(&self, event: AuthEvent) -> AuthEvent {
        match event {
            AuthEvent::AccessGranted { subject, kid } => AuthEvent::AccessGranted {
                subject: self.maybe_hash(&subject),
                kid,
            },
            other => other,
        }
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new("quillpad")
    }
}

/// Authorization event types for audit logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// Token verified and access allowed
    AccessGranted {
        /// Verified subject
        subject: String,
        /// Key the token was verified with
        kid: String,
    },

    /// Access denied
    AccessDenied {
        /// Failure class
        error_kind: ErrorKind,
        /// Pipeline stage that failed
        stage: String,
        /// Internal detail, never shown to the caller
        reason: String,
    },

    /// Key set fetched and cached
    KeySetFetched {
        /// Key-set endpoint
        key_set_url: String,
        /// Number of keys in the fetched set
        key_count: usize,
    },

    /// Key-set fetch failed
    KeySetFetchFailed {
        /// Key-set endpoint
        key_set_url: String,
        /// Failure detail
        reason: String,
    },

    /// An expired key set was served because the refresh failed
    StaleKeySetServed {
        /// Key-set endpoint
        key_set_url: String,
        /// Age of the served entry in seconds
        age_secs: u64,
    },
}

/// Audit record wrapping an event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique audit record ID
    pub id: Uuid,
    /// Timestamp of the event
    #[serde(with = "system_time_serde")]
    pub timestamp: SystemTime,
    /// Service that generated the event
    pub service: String,
    /// The audit event
    pub event: AuthEvent,
}

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}
