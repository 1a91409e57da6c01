//! JWT verification against a remote key set
//!
//! ```text
//! UnverifiedToken ──kid──▶ KeySetCache ─▶ KeySet::find ─▶ CertificateBuilder
//!        │                                                      │
//!        └──────────────▶ SignatureVerifier ◀── PublicKeyCredential
//!                               │
//!                               ▼
//!                        VerifiedClaims
//! ```
//!
//! # Modules
//!
//! - `cache` - key-set fetching and caching
//! - `keyset` - key-set document and key matching
//! - `certificate` - `x5c` certificate to verification key
//! - `verifier` - signature and claim checks

pub mod cache;
pub mod certificate;
pub mod keyset;
pub mod verifier;

pub use cache::{HttpKeySetSource, KeySetCache, KeySetFetchError, KeySetSource};
pub use certificate::{CertificateBuilder, PublicKeyCredential};
pub use keyset::{KeySet, SigningKey, match_key};
pub use verifier::{SignatureVerifier, VerifiedClaims};
