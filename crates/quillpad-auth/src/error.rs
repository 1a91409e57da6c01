//! Error taxonomy for the authorization gateway
//!
//! Every stage of an authorization call fails with an [`AuthError`]. Each variant
//! carries internal detail for logs and maps onto exactly one [`ErrorKind`], the
//! closed set of failure classes a [`Deny`](crate::Effect::Deny) decision can carry.
//!
//! Nothing in this module is ever rendered back to the caller: the gateway only
//! answers Allow or Deny.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Result alias used throughout the crate
pub type AuthResult<T> = Result<T, AuthError>;

/// Failure classes of an authorization call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No `Authorization` header, or an empty one
    MissingHeader,
    /// Header is not `Bearer <token>`, or the token is not a well-formed JWT
    MalformedHeader,
    /// The issuer's key set could not be obtained
    KeySetUnavailable,
    /// No key in the key set matches the token's `kid`
    KeyNotFound,
    /// The matched key does not carry a usable certificate
    InvalidKeyMaterial,
    /// The token declares an algorithm other than the configured one
    UnsupportedAlgorithm,
    /// The signature does not verify
    SignatureInvalid,
    /// `exp` is at or before the current time
    TokenExpired,
    /// `nbf` is after the current time
    TokenNotYetValid,
    /// Issuer or audience does not match the configured value
    ClaimMismatch,
}

impl ErrorKind {
    /// Every kind, in pipeline order
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::MissingHeader,
        ErrorKind::MalformedHeader,
        ErrorKind::KeySetUnavailable,
        ErrorKind::KeyNotFound,
        ErrorKind::InvalidKeyMaterial,
        ErrorKind::UnsupportedAlgorithm,
        ErrorKind::SignatureInvalid,
        ErrorKind::TokenExpired,
        ErrorKind::TokenNotYetValid,
        ErrorKind::ClaimMismatch,
    ];

    /// Stable snake_case name, used for log fields and metric labels
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingHeader => "missing_header",
            ErrorKind::MalformedHeader => "malformed_header",
            ErrorKind::KeySetUnavailable => "key_set_unavailable",
            ErrorKind::KeyNotFound => "key_not_found",
            ErrorKind::InvalidKeyMaterial => "invalid_key_material",
            ErrorKind::UnsupportedAlgorithm => "unsupported_algorithm",
            ErrorKind::SignatureInvalid => "signature_invalid",
            ErrorKind::TokenExpired => "token_expired",
            ErrorKind::TokenNotYetValid => "token_not_yet_valid",
            ErrorKind::ClaimMismatch => "claim_mismatch",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detailed authorization failure
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Header absent or blank
    #[error("no authorization header")]
    MissingHeader,

    /// Header or token structure rejected
    #[error("malformed authorization header: {0}")]
    MalformedHeader(String),

    /// Key-set fetch failed (network, status, document, or timeout)
    #[error("key set unavailable from {url}: {reason}")]
    KeySetUnavailable {
        /// Key-set endpoint
        url: String,
        /// What went wrong
        reason: String,
    },

    /// Nothing in the key set carries the requested `kid`
    #[error("no signing key with kid {kid:?}")]
    KeyNotFound {
        /// The `kid` that was looked up (possibly empty)
        kid: String,
    },

    /// The matched key's certificate chain is empty or unusable
    #[error("invalid key material for kid {kid:?}: {reason}")]
    InvalidKeyMaterial {
        /// Key the material came from
        kid: String,
        /// What went wrong
        reason: String,
    },

    /// Declared `alg` is not the configured one
    #[error("algorithm {declared:?} not accepted (expected {expected})")]
    UnsupportedAlgorithm {
        /// `alg` from the token header
        declared: String,
        /// Configured algorithm
        expected: String,
    },

    /// Signature verification failed
    #[error("signature verification failed")]
    SignatureInvalid(#[source] Option<jsonwebtoken::errors::Error>),

    /// `exp` reached
    #[error("token expired at {exp}")]
    TokenExpired {
        /// The token's `exp` claim
        exp: u64,
    },

    /// `nbf` not reached
    #[error("token not valid before {nbf}")]
    TokenNotYetValid {
        /// The token's `nbf` claim
        nbf: u64,
    },

    /// Issuer or audience mismatch
    #[error("claim {claim} does not match the configured value")]
    ClaimMismatch {
        /// `iss` or `aud`
        claim: &'static str,
    },
}

impl AuthError {
    /// The failure class this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingHeader => ErrorKind::MissingHeader,
            AuthError::MalformedHeader(_) => ErrorKind::MalformedHeader,
            AuthError::KeySetUnavailable { .. } => ErrorKind::KeySetUnavailable,
            AuthError::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            AuthError::InvalidKeyMaterial { .. } => ErrorKind::InvalidKeyMaterial,
            AuthError::UnsupportedAlgorithm { .. } => ErrorKind::UnsupportedAlgorithm,
            AuthError::SignatureInvalid(_) => ErrorKind::SignatureInvalid,
            AuthError::TokenExpired { .. } => ErrorKind::TokenExpired,
            AuthError::TokenNotYetValid { .. } => ErrorKind::TokenNotYetValid,
            AuthError::ClaimMismatch { .. } => ErrorKind::ClaimMismatch,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        AuthError::MalformedHeader(reason.into())
    }

    pub(crate) fn key_set_unavailable(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        AuthError::KeySetUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_key_material(kid: &str, reason: impl fmt::Display) -> Self {
        AuthError::InvalidKeyMaterial {
            kid: kid.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Semantically invalid configuration
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// HTTP client construction failed
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_maps_to_its_kind() {
        let cases = [
            (AuthError::MissingHeader, ErrorKind::MissingHeader),
            (AuthError::malformed("x"), ErrorKind::MalformedHeader),
            (
                AuthError::key_set_unavailable("https://a/jwks", "timeout"),
                ErrorKind::KeySetUnavailable,
            ),
            (
                AuthError::KeyNotFound { kid: "k".into() },
                ErrorKind::KeyNotFound,
            ),
            (
                AuthError::invalid_key_material("k", "empty x5c"),
                ErrorKind::InvalidKeyMaterial,
            ),
            (
                AuthError::UnsupportedAlgorithm {
                    declared: "none".into(),
                    expected: "RS256".into(),
                },
                ErrorKind::UnsupportedAlgorithm,
            ),
            (AuthError::SignatureInvalid(None), ErrorKind::SignatureInvalid),
            (AuthError::TokenExpired { exp: 1 }, ErrorKind::TokenExpired),
            (
                AuthError::TokenNotYetValid { nbf: 1 },
                ErrorKind::TokenNotYetValid,
            ),
            (
                AuthError::ClaimMismatch { claim: "aud" },
                ErrorKind::ClaimMismatch,
            ),
        ];

        for (error, kind) in cases {
            assert_eq!(error.kind(), kind, "{error}");
        }
    }

    #[test]
    fn test_kind_names_are_unique_snake_case() {
        let mut names: Vec<_> = ErrorKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ErrorKind::ALL.len());
        assert!(names.iter().all(|n| n.chars().all(|c| c.is_ascii_lowercase() || c == '_')));
    }

    #[test]
    fn test_kind_serializes_as_its_name() {
        let json = serde_json::to_string(&ErrorKind::KeySetUnavailable).unwrap();
        assert_eq!(json, "\"key_set_unavailable\"");
    }
}
