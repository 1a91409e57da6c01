//! Signature and claim verification
//!
//! Checks run in a fixed order: declared algorithm, then signature, then the
//! time and identity claims. Claims are only read from the payload bytes that
//! `jsonwebtoken` has verified, never from the unverified decode.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use tracing::debug;

use super::certificate::PublicKeyCredential;
use crate::config::AuthorizerConfig;
use crate::error::{AuthError, AuthResult};
use crate::token::{TokenClaims, TokenHeader, UnverifiedToken};

/// Claims of a token whose signature has been verified
///
/// Only [`SignatureVerifier::verify`] constructs this type.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    claims: TokenClaims,
    kid: String,
}

impl VerifiedClaims {
    /// The verified subject
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    /// `kid` of the key that verified the token
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// All verified claims
    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    /// Take ownership of the claims
    pub fn into_claims(self) -> TokenClaims {
        self.claims
    }
}

/// Verifies tokens against a single configured algorithm
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    algorithm: Algorithm,
    issuer: Option<String>,
    audience: Option<String>,
    leeway: Duration,
}

impl SignatureVerifier {
    /// Verifier accepting only `algorithm`, with no issuer/audience requirement
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            issuer: None,
            audience: None,
            leeway: Duration::ZERO,
        }
    }

    /// Verifier for the algorithm, issuer, audience and leeway in `config`
    pub fn from_config(config: &AuthorizerConfig) -> Self {
        Self {
            algorithm: config.algorithm,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            leeway: config.leeway,
        }
    }

    /// Require `iss` to equal `issuer`
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require `aud` to contain `audience`
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Clock skew tolerance for `exp` and `nbf`
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// The accepted algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Verify `token` with `credential` at the current time
    ///
    /// # Errors
    ///
    /// In order of evaluation:
    /// - [`AuthError::UnsupportedAlgorithm`] if the header's `alg` is not the configured algorithm
    /// - [`AuthError::SignatureInvalid`] if the signature does not verify under `credential`
    /// - [`AuthError::TokenExpired`] if `exp` is at or before now (minus leeway)
    /// - [`AuthError::TokenNotYetValid`] if `nbf` is after now (plus leeway)
    /// - [`AuthError::ClaimMismatch`] if a configured issuer or audience does not match
    pub fn verify(
        &self,
        token: &UnverifiedToken,
        credential: &PublicKeyCredential,
    ) -> AuthResult<VerifiedClaims> {
        self.verify_at(token, credential, now_secs())
    }

    pub(crate) fn verify_at(
        &self,
        token: &UnverifiedToken,
        credential: &PublicKeyCredential,
        now: u64,
    ) -> AuthResult<VerifiedClaims> {
        self.check_algorithm(token.header())?;

        // Claims are checked below with our own clock and error kinds
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<TokenClaims>(
            token.as_str(),
            credential.decoding_key(),
            &validation,
        )
        .map_err(|e| match e.kind() {
            JwtErrorKind::InvalidAlgorithm | JwtErrorKind::InvalidAlgorithmName => {
                AuthError::UnsupportedAlgorithm {
                    declared: token.header().alg.clone(),
                    expected: format!("{:?}", self.algorithm),
                }
            }
            _ => AuthError::SignatureInvalid(Some(e)),
        })?;

        self.check_claims(&data.claims, now)?;
        debug!(kid = %credential.kid(), "Token signature and claims verified");

        Ok(VerifiedClaims {
            claims: data.claims,
            kid: credential.kid().to_string(),
        })
    }

    fn check_algorithm(&self, header: &TokenHeader) -> AuthResult<()> {
        match header.alg.parse::<Algorithm>() {
            Ok(declared) if declared == self.algorithm => Ok(()),
            _ => Err(AuthError::UnsupportedAlgorithm {
                declared: header.alg.clone(),
                expected: format!("{:?}", self.algorithm),
            }),
        }
    }

    fn check_claims(&self, claims: &TokenClaims, now: u64) -> AuthResult<()> {
        let leeway = self.leeway.as_secs();

        if claims.exp <= now.saturating_sub(leeway) {
            return Err(AuthError::TokenExpired { exp: claims.exp });
        }

        if let Some(nbf) = claims.nbf
            && nbf > now.saturating_add(leeway)
        {
            return Err(AuthError::TokenNotYetValid { nbf });
        }

        if let Some(issuer) = &self.issuer
            && claims.iss.as_deref() != Some(issuer.as_str())
        {
            return Err(AuthError::ClaimMismatch { claim: "iss" });
        }

        if let Some(audience) = &self.audience
            && !claims.aud.as_ref().is_some_and(|aud| aud.contains(audience))
        {
            return Err(AuthError::ClaimMismatch { claim: "aud" });
        }

        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
