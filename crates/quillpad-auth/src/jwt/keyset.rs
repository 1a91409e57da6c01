//! Key-set document and key matching

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// One signing key as published in the issuer's key set
///
/// Only the members the gateway uses are modeled; anything else in the JWK
/// (`n`, `e`, `x5t`, ...) is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    /// Key identifier
    pub kid: String,
    /// Key type (`RSA`, `EC`, `OKP`)
    pub kty: String,
    /// Intended algorithm, if published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Intended use, if published (`sig`)
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Certificate chain, base64 DER, leaf first
    #[serde(default)]
    pub x5c: Vec<String>,
}

/// The issuer's key set (`{"keys": [...]}`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeySet {
    /// Published keys, in document order
    pub keys: Vec<SigningKey>,
}

impl KeySet {
    /// Parse a key-set document
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the document does not match the
    /// key-set schema.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// First key whose `kid` equals `kid`
    ///
    /// # Errors
    ///
    /// [`AuthError::KeyNotFound`] if `kid` is empty or no key matches.
    pub fn find(&self, kid: &str) -> AuthResult<&SigningKey> {
        if kid.is_empty() {
            return Err(AuthError::KeyNotFound { kid: String::new() });
        }

        self.keys
            .iter()
            .find(|key| key.kid == kid)
            .ok_or_else(|| AuthError::KeyNotFound {
                kid: kid.to_string(),
            })
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Locate the signing key for `kid` in `keys`
///
/// # Errors
///
/// See [`KeySet::find`].
pub fn match_key<'a>(keys: &'a KeySet, kid: &str) -> AuthResult<&'a SigningKey> {
    keys.find(kid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn key(kid: &str, cert: &str) -> SigningKey {
        SigningKey {
            kid: kid.into(),
            kty: "RSA".into(),
            alg: Some("RS256".into()),
            key_use: Some("sig".into()),
            x5c: vec![cert.into()],
        }
    }

    #[test]
    fn test_parses_jwks_and_ignores_unknown_members() {
        let doc = br#"{"keys":[{"kid":"k1","kty":"RSA","use":"sig","alg":"RS256",
            "n":"abc","e":"AQAB","x5t":"zzz","x5c":["MIIB"]}]}"#;
        let set = KeySet::from_slice(doc).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.keys[0].key_use.as_deref(), Some("sig"));
        assert_eq!(set.keys[0].x5c, vec!["MIIB".to_string()]);
    }

    #[test]
    fn test_rejects_document_without_keys() {
        assert!(KeySet::from_slice(br#"{"items":[]}"#).is_err());
        assert!(KeySet::from_slice(b"<html>").is_err());
    }

    #[test]
    fn test_first_match_wins() {
        let set = KeySet {
            keys: vec![key("a", "first"), key("b", "other"), key("a", "second")],
        };
        assert_eq!(set.find("a").unwrap().x5c[0], "first");
        assert_eq!(match_key(&set, "b").unwrap().x5c[0], "other");
    }

    #[test]
    fn test_missing_and_empty_kid() {
        let set = KeySet {
            keys: vec![key("a", "c")],
        };
        assert_eq!(set.find("zzz").unwrap_err().kind(), ErrorKind::KeyNotFound);
        assert_eq!(set.find("").unwrap_err().kind(), ErrorKind::KeyNotFound);
        assert_eq!(
            KeySet::default().find("a").unwrap_err().kind(),
            ErrorKind::KeyNotFound
        );
    }
}
