//! # Quillpad Auth - Bearer-Token Authorization Gateway
//!
//! Independently verifies caller-supplied JWTs against the issuer's rotating
//! key set (JWKS) and turns every request into a binary Allow/Deny decision,
//! with no shared session state.
//!
//! ## Pipeline
//!
//! 1. [`token`] - extract `Bearer <token>` and decode header/claims (unverified)
//! 2. [`jwt::KeySetCache`] - fetch and cache the issuer's key set (TTL, single-flight)
//! 3. [`jwt::KeySet::find`] - locate the signing key by `kid`
//! 4. [`jwt::CertificateBuilder`] - turn the key's `x5c` certificate into a verification key
//! 5. [`jwt::SignatureVerifier`] - check algorithm, signature, and claims
//! 6. [`policy::PolicyGenerator`] - emit Allow (verified subject) or Deny (failure class)
//!
//! [`AuthorizationService`] runs all six for one request and never returns an
//! error: every failure becomes a Deny carrying an [`ErrorKind`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quillpad_auth::{AuthorizationService, AuthorizerConfig};
//!
//! # tokio_test::block_on(async {
//! let config = AuthorizerConfig::from_file("quillpad.toml")?;
//! let service = AuthorizationService::from_config(config)?;
//!
//! let decision = service.authorize(Some("Bearer eyJhbGciOi...")).await;
//! println!("{:?} for {}", decision.effect, decision.principal_id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! ## Feature Flags
//!
//! - `middleware` (alias `tower`) - Tower layer for `http::Request` services
//! - `metrics` - decision and key-set fetch metrics via the `metrics` facade
//! - `full` - all of the above

// Submodules
pub mod audit;
pub mod auth_metrics;
pub mod config;
pub mod error;
pub mod gateway;
pub mod jwt;
pub mod logging;
pub mod policy;
pub mod service;
pub mod token;

#[cfg(feature = "middleware")]
pub mod tower;

#[doc(inline)]
pub use config::{AuthorizerConfig, AuthorizerConfigBuilder, StaleKeysPolicy};

#[doc(inline)]
pub use error::{AuthError, AuthResult, ConfigError, ErrorKind};

#[doc(inline)]
pub use gateway::{GatewayAuthorizer, TokenAuthorizerEvent};

#[doc(inline)]
pub use logging::LoggingConfig;

#[doc(inline)]
pub use policy::{AuthorizationDecision, AuthorizerResponse, Effect, PolicyGenerator};

#[doc(inline)]
pub use service::{Authorization, AuthorizationService, AuthorizationState, Principal};

pub use auth_metrics::init_auth_metrics;
