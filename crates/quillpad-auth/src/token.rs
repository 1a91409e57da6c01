//! Bearer token extraction and unverified decoding
//!
//! [`extract_bearer`] turns a raw `Authorization` header value into a
//! [`BearerToken`]. [`UnverifiedToken::decode`] then splits the compact JWT and
//! deserializes its header and payload against explicit schemas, without looking
//! at the signature. The decoded claims are kept private to the crate: the only
//! way to read them as trusted data is through
//! [`SignatureVerifier::verify`](crate::jwt::SignatureVerifier::verify).

use std::collections::HashMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

const BEARER_SCHEME: &str = "bearer";

/// A bearer token as presented by the caller
///
/// The `Debug` impl never prints the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// The compact token string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BearerToken")
            .field(&format_args!("<{} bytes>", self.0.len()))
            .finish()
    }
}

/// Extract the bearer token from a raw `Authorization` header value
///
/// The scheme is matched case-insensitively and must be followed by a space.
/// Extra spaces before the token are tolerated; any other whitespace is not.
///
/// # Errors
///
/// - [`AuthError::MissingHeader`] if the value is absent or blank
/// - [`AuthError::MalformedHeader`] if it is not `Bearer <token>`
///
/// # Example
///
/// ```rust
/// use quillpad_auth::token::extract_bearer;
///
/// let token = extract_bearer(Some("bearer abc.def.ghi")).unwrap();
/// assert_eq!(token.as_str(), "abc.def.ghi");
/// assert!(extract_bearer(Some("Basic dXNlcjpwYXNz")).is_err());
/// ```
pub fn extract_bearer(header: Option<&str>) -> AuthResult<BearerToken> {
    let header = match header.map(str::trim) {
        None | Some("") => return Err(AuthError::MissingHeader),
        Some(value) => value,
    };

    let (scheme, rest) = header
        .split_once(' ')
        .ok_or_else(|| AuthError::malformed("expected `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthError::malformed("authorization scheme is not bearer"));
    }

    let token = rest.trim_start_matches(' ');
    if token.is_empty() {
        return Err(AuthError::malformed("empty bearer token"));
    }
    if token.contains(char::is_whitespace) {
        return Err(AuthError::malformed("bearer token contains whitespace"));
    }

    Ok(BearerToken(token.to_string()))
}

/// Decoded JOSE header
///
/// `alg` is kept as the raw string so that values outside the algorithm
/// registry (`"none"`, typos) are reported as unsupported algorithms rather
/// than as decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Declared signing algorithm
    pub alg: String,
    /// Key identifier
    #[serde(default)]
    pub kid: Option<String>,
    /// Media type, usually `JWT`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// The `aud` claim, which RFC 7519 allows as a string or an array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience
    Single(String),
    /// Several audiences
    Many(Vec<String>),
}

impl Audience {
    /// Whether `value` is one of the audiences
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == value,
            Audience::Many(auds) => auds.iter().any(|aud| aud == value),
        }
    }
}

/// Token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject, the caller's user id
    pub sub: String,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Expiration time (epoch seconds)
    pub exp: u64,
    /// Issued at (epoch seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Not before (epoch seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    /// Everything else
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

/// A structurally valid JWT whose signature has not been checked
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    raw: BearerToken,
    header: TokenHeader,
    claims: TokenClaims,
}

impl UnverifiedToken {
    /// Split and decode a compact JWT
    ///
    /// # Errors
    ///
    /// [`AuthError::MalformedHeader`] unless the token has exactly three
    /// segments, the first two are base64url JSON matching [`TokenHeader`] and
    /// [`TokenClaims`], and the signature segment is non-empty.
    pub fn decode(token: BearerToken) -> AuthResult<Self> {
        let mut segments = token.as_str().split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::malformed("token must have three segments"));
        };

        if signature.is_empty() {
            return Err(AuthError::malformed("token signature segment is empty"));
        }

        let header: TokenHeader = decode_segment(header, "header")?;
        let claims: TokenClaims = decode_segment(payload, "payload")?;

        Ok(Self {
            raw: token,
            header,
            claims,
        })
    }

    /// The decoded header
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// `kid` from the header, empty if absent
    pub fn kid(&self) -> &str {
        self.header.kid.as_deref().unwrap_or_default()
    }

    /// The compact token string
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    pub(crate) fn claims(&self) -> &TokenClaims {
        &self.claims
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str, name: &str) -> AuthResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::malformed(format!("token {name} is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::malformed(format!("token {name} does not match schema: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;
    use serde_json::json;

    fn segment(value: serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&value).unwrap())
    }

    fn compact(header: serde_json::Value, claims: serde_json::Value) -> BearerToken {
        BearerToken(format!("{}.{}.c2ln", segment(header), segment(claims)))
    }

    #[test]
    fn test_extract_accepts_any_scheme_case() {
        for header in ["Bearer abc.def.ghi", "bearer abc.def.ghi", "BEARER abc.def.ghi"] {
            let token = extract_bearer(Some(header)).unwrap();
            assert_eq!(token.as_str(), "abc.def.ghi");
        }
    }

    #[test]
    fn test_extract_tolerates_extra_spaces() {
        let token = extract_bearer(Some("Bearer    abc.def.ghi")).unwrap();
        assert_eq!(token.as_str(), "abc.def.ghi");
    }

    #[test]
    fn test_extract_missing_and_empty() {
        for header in [None, Some(""), Some("   ")] {
            let err = extract_bearer(header).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingHeader);
        }
    }

    #[test]
    fn test_extract_malformed() {
        for header in [
            "Bearer",
            "Bearer ",
            "Basic dXNlcjpwYXNz",
            "Bearerabc.def.ghi",
            "Token abc.def.ghi",
            "Bearer abc def",
            "Bearer\tabc.def.ghi",
            "Bearer\nabc.def.ghi",
            "Bearer \tabc.def.ghi",
        ] {
            let err = extract_bearer(Some(header)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedHeader, "{header:?}");
        }
    }

    #[test]
    fn test_bearer_token_debug_redacts() {
        let token = extract_bearer(Some("Bearer secret.token.value")).unwrap();
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_decode_valid_token() {
        let token = compact(
            json!({"alg": "RS256", "kid": "k1", "typ": "JWT"}),
            json!({"sub": "user-42", "exp": 2_000_000_000u64, "aud": ["a", "b"], "scope": "notes"}),
        );
        let decoded = UnverifiedToken::decode(token).unwrap();
        assert_eq!(decoded.header().alg, "RS256");
        assert_eq!(decoded.kid(), "k1");
        assert_eq!(decoded.claims().sub, "user-42");
        assert!(decoded.claims().aud.as_ref().unwrap().contains("b"));
        assert_eq!(decoded.claims().additional["scope"], "notes");
    }

    #[test]
    fn test_decode_keeps_unknown_algorithm_names() {
        let token = compact(json!({"alg": "none"}), json!({"sub": "x", "exp": 1}));
        let decoded = UnverifiedToken::decode(token).unwrap();
        assert_eq!(decoded.header().alg, "none");
        assert_eq!(decoded.kid(), "");
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        let header = segment(json!({"alg": "RS256", "kid": "k1"}));
        let claims = segment(json!({"sub": "x", "exp": 1}));
        let no_sub = segment(json!({"exp": 1}));
        let cases = [
            "abc".to_string(),
            format!("{header}.{claims}"),
            format!("{header}.{claims}."),
            format!("{header}.{claims}.sig.extra"),
            format!("!!!.{claims}.sig"),
            format!("{header}.{no_sub}.sig"),
            format!("{}.{claims}.sig", segment(json!({"kid": "k1"}))),
        ];

        for raw in cases {
            let err = UnverifiedToken::decode(BearerToken(raw.clone())).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedHeader, "{raw}");
        }
    }

    proptest! {
        #[test]
        fn prop_extract_roundtrips_any_token_segment(token in "[A-Za-z0-9_.-]{1,200}") {
            let extracted = extract_bearer(Some(&format!("Bearer {token}"))).unwrap();
            prop_assert_eq!(extracted.as_str(), token.as_str());
        }

        #[test]
        fn prop_non_bearer_schemes_are_malformed(
            scheme in "[A-Za-z]{1,10}",
            token in "[A-Za-z0-9_.-]{1,50}",
        ) {
            prop_assume!(!scheme.eq_ignore_ascii_case("bearer"));
            let err = extract_bearer(Some(&format!("{scheme} {token}"))).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::MalformedHeader);
        }

        #[test]
        fn prop_extract_never_panics(header in ".*") {
            let _ = extract_bearer(Some(&header));
        }
    }
}
