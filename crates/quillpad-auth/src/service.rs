//! Authorization pipeline
//!
//! [`AuthorizationService`] runs one inbound request through every stage:
//!
//! ```text
//! Start ─▶ HeaderExtracted ─▶ KeysLoaded ─▶ KeyMatched ─▶ CredentialBuilt ─▶ Verified ─▶ Decided
//!   └───────────┴─────────────────┴─────────────┴───────────────┴──────────────┴──▶ Failed(kind)
//! ```
//!
//! The first failure short-circuits to a Deny carrying that failure's
//! [`ErrorKind`]. The stage reached is recorded on the tracing span and in the
//! audit event, never in the decision.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{Span, debug, info, instrument, warn};

use crate::audit::{AuditLogger, AuthEvent};
use crate::auth_metrics;
use crate::config::AuthorizerConfig;
use crate::error::{AuthResult, ConfigError, ErrorKind};
use crate::jwt::{CertificateBuilder, KeySetCache, SignatureVerifier, VerifiedClaims};
use crate::policy::{AuthorizationDecision, PolicyGenerator};
use crate::token::{TokenClaims, UnverifiedToken, extract_bearer};

/// Pipeline stage of one authorization call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationState {
    /// Nothing done yet
    Start,
    /// Bearer token extracted and decoded (unverified)
    HeaderExtracted,
    /// Key set obtained from the cache
    KeysLoaded,
    /// Signing key for the token's `kid` located
    KeyMatched,
    /// Verification key built from the certificate
    CredentialBuilt,
    /// Signature and claims verified
    Verified,
    /// Allow issued
    Decided,
    /// Deny issued
    Failed(ErrorKind),
}

impl AuthorizationState {
    /// Stable snake_case name for logs
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorizationState::Start => "start",
            AuthorizationState::HeaderExtracted => "header_extracted",
            AuthorizationState::KeysLoaded => "keys_loaded",
            AuthorizationState::KeyMatched => "key_matched",
            AuthorizationState::CredentialBuilt => "credential_built",
            AuthorizationState::Verified => "verified",
            AuthorizationState::Decided => "decided",
            AuthorizationState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision plus, on Allow, the claims it was based on
#[derive(Debug, Clone)]
pub struct Authorization {
    /// The access decision
    pub decision: AuthorizationDecision,
    /// Verified claims; `Some` exactly when the decision is Allow
    pub claims: Option<VerifiedClaims>,
    /// Final pipeline state
    pub state: AuthorizationState,
}

/// The verified caller, as seen by request handlers
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    user_id: String,
    claims: TokenClaims,
}

impl Principal {
    /// The caller's user id (the verified `sub` claim)
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// All verified claims
    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }
}

impl From<VerifiedClaims> for Principal {
    fn from(claims: VerifiedClaims) -> Self {
        let claims = claims.into_claims();
        Self {
            user_id: claims.sub.clone(),
            claims,
        }
    }
}

/// Bearer-token authorization service
///
/// Cheap to clone; all clones share the same key-set cache.
///
/// # Example
///
/// ```rust,no_run
/// use quillpad_auth::{AuthorizationService, AuthorizerConfig};
///
/// # tokio_test::block_on(async {
/// let config = AuthorizerConfig::builder("https://issuer.example.com/.well-known/jwks.json")
///     .audience("https://notes.example.com")
///     .build()?;
/// let service = AuthorizationService::from_config(config)?;
///
/// let decision = service.authorize(Some("Bearer eyJhbGciOi...")).await;
/// if decision.is_allowed() {
///     println!("user id: {}", decision.principal_id);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationService {
    config: Arc<AuthorizerConfig>,
    cache: Arc<KeySetCache>,
    certificates: CertificateBuilder,
    verifier: Arc<SignatureVerifier>,
    audit: AuditLogger,
}

impl AuthorizationService {
    /// Create a service around an existing key-set cache
    pub fn new(config: AuthorizerConfig, cache: Arc<KeySetCache>) -> Self {
        Self {
            certificates: CertificateBuilder::new(config.algorithm),
            verifier: Arc::new(SignatureVerifier::from_config(&config)),
            config: Arc::new(config),
            cache,
            audit: AuditLogger::default(),
        }
    }

    /// Validate `config` and create a service with an HTTP-backed key-set cache
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(config: AuthorizerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let cache = Arc::new(KeySetCache::from_config(&config)?);
        Ok(Self::new(config, cache))
    }

    /// Use `audit` for decision events
    pub fn with_audit_logger(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// The active configuration
    pub fn config(&self) -> &AuthorizerConfig {
        &self.config
    }

    /// The shared key-set cache
    pub fn cache(&self) -> &Arc<KeySetCache> {
        &self.cache
    }

    /// Authorize a request from its raw `Authorization` header value
    ///
    /// Never fails: every error becomes a Deny.
    pub async fn authorize(&self, header: Option<&str>) -> AuthorizationDecision {
        self.evaluate(header).await.decision
    }

    /// Like [`authorize`](Self::authorize), also returning the verified claims on Allow
    #[instrument(
        name = "authorize",
        skip_all,
        fields(stage = tracing::field::Empty, error_kind = tracing::field::Empty)
    )]
    pub async fn evaluate(&self, header: Option<&str>) -> Authorization {
        let started = Instant::now();
        let mut reached = AuthorizationState::Start;
        let outcome = self.run(header, &mut reached).await;
        let span = Span::current();
        span.record("stage", reached.as_str());

        let authorization = match outcome {
            Ok(claims) => {
                info!(kid = %claims.kid(), "Access granted");
                self.audit.log(AuthEvent::AccessGranted {
                    subject: claims.subject().to_string(),
                    kid: claims.kid().to_string(),
                });
                Authorization {
                    decision: PolicyGenerator::allow(&claims),
                    claims: Some(claims),
                    state: AuthorizationState::Decided,
                }
            }
            Err(err) => {
                let kind = err.kind();
                span.record("error_kind", kind.as_str());
                warn!(error_kind = %kind, stage = %reached, error = %err, "Access denied");
                self.audit.log(AuthEvent::AccessDenied {
                    error_kind: kind,
                    stage: reached.to_string(),
                    reason: err.to_string(),
                });
                Authorization {
                    decision: PolicyGenerator::deny(kind),
                    claims: None,
                    state: AuthorizationState::Failed(kind),
                }
            }
        };

        auth_metrics::record_decision(
            authorization.decision.error_kind,
            started.elapsed().as_secs_f64(),
        );
        authorization
    }

    async fn run(
        &self,
        header: Option<&str>,
        reached: &mut AuthorizationState,
    ) -> AuthResult<VerifiedClaims> {
        let token = UnverifiedToken::decode(extract_bearer(header)?)?;
        *reached = AuthorizationState::HeaderExtracted;

        let mut keys = self.cache.get_keys().await?;
        *reached = AuthorizationState::KeysLoaded;

        if self.config.refresh_on_unknown_kid
            && !token.kid().is_empty()
            && keys.find(token.kid()).is_err()
        {
            debug!(kid = %token.kid(), "Unknown kid, refreshing key set");
            keys = self.cache.refresh_after_miss().await?;
        }

        let key = keys.find(token.kid())?;
        *reached = AuthorizationState::KeyMatched;

        let credential = self.certificates.build(key)?;
        *reached = AuthorizationState::CredentialBuilt;

        let claims = self.verifier.verify(&token, &credential)?;
        *reached = AuthorizationState::Verified;

        Ok(claims)
    }
}
