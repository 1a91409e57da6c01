//! Public-key credentials from `x5c` certificate chains

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, DecodingKey};

use super::keyset::SigningKey;
use crate::error::{AuthError, AuthResult};

const PEM_LINE_WIDTH: usize = 64;

/// Key family a certificate must contain for a given algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    fn for_algorithm(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Some(KeyFamily::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Some(KeyFamily::Ec),
            Algorithm::EdDSA => Some(KeyFamily::Ed),
            _ => None,
        }
    }
}

/// Verification key derived from a signing key's certificate
#[derive(Clone)]
pub struct PublicKeyCredential {
    kid: String,
    key: DecodingKey,
}

impl PublicKeyCredential {
    /// `kid` of the signing key this credential was built from
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for PublicKeyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyCredential")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Builds [`PublicKeyCredential`]s for one configured algorithm
#[derive(Debug, Clone, Copy)]
pub struct CertificateBuilder {
    algorithm: Algorithm,
}

impl CertificateBuilder {
    /// Builder for keys usable with `algorithm`
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }

    /// Load the leaf certificate of `key.x5c` as a verification key
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidKeyMaterial`] if `x5c` is empty, its first entry is
    /// not standard base64, or the certificate does not hold a public key of
    /// the family the configured algorithm needs.
    pub fn build(&self, key: &SigningKey) -> AuthResult<PublicKeyCredential> {
        let leaf = key
            .x5c
            .first()
            .ok_or_else(|| AuthError::invalid_key_material(&key.kid, "x5c is empty"))?;

        let family = KeyFamily::for_algorithm(self.algorithm).ok_or_else(|| {
            AuthError::invalid_key_material(
                &key.kid,
                format!("no certificate key family for {:?}", self.algorithm),
            )
        })?;

        let pem = certificate_pem(leaf)
            .ok_or_else(|| AuthError::invalid_key_material(&key.kid, "x5c entry is not base64"))?;

        let decoding_key = match family {
            KeyFamily::Rsa => DecodingKey::from_rsa_pem(pem.as_bytes()),
            KeyFamily::Ec => DecodingKey::from_ec_pem(pem.as_bytes()),
            KeyFamily::Ed => DecodingKey::from_ed_pem(pem.as_bytes()),
        }
        .map_err(|e| AuthError::invalid_key_material(&key.kid, e))?;

        Ok(PublicKeyCredential {
            kid: key.kid.clone(),
            key: decoding_key,
        })
    }
}

/// Wrap a base64 DER certificate in a PEM envelope, or `None` if it is not base64
///
/// The blob is decoded and re-encoded so that stray whitespace in the key set
/// does not leak into the PEM body.
fn certificate_pem(blob: &str) -> Option<String> {
    let der = STANDARD.decode(blob.trim()).ok()?;
    if der.is_empty() {
        return None;
    }
    let body = STANDARD.encode(der);

    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 output is ASCII
        pem.push_str(std::str::from_utf8(line).ok()?);
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    Some(pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn signing_key(x5c: Vec<String>) -> SigningKey {
        SigningKey {
            kid: "k1".into(),
            kty: "RSA".into(),
            alg: None,
            key_use: None,
            x5c,
        }
    }

    #[test]
    fn test_pem_envelope_wraps_at_64_columns() {
        let blob = STANDARD.encode([7u8; 200]);
        let pem = certificate_pem(&blob).unwrap();
        let lines: Vec<_> = pem.lines().collect();
        assert_eq!(lines.first(), Some(&"-----BEGIN CERTIFICATE-----"));
        assert_eq!(lines.last(), Some(&"-----END CERTIFICATE-----"));
        let body = &lines[1..lines.len() - 1];
        assert!(body[..body.len() - 1].iter().all(|l| l.len() == 64));
        assert_eq!(body.concat(), blob);
    }

    #[test]
    fn test_pem_rejects_non_base64() {
        assert!(certificate_pem("not base64 !!").is_none());
        assert!(certificate_pem("").is_none());
    }

    #[test]
    fn test_empty_chain_is_invalid_key_material() {
        let err = CertificateBuilder::new(Algorithm::RS256)
            .build(&signing_key(vec![]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKeyMaterial);
    }

    #[test]
    fn test_garbage_certificate_is_invalid_key_material() {
        for blob in ["%%%".to_string(), STANDARD.encode(b"definitely not DER")] {
            let err = CertificateBuilder::new(Algorithm::RS256)
                .build(&signing_key(vec![blob]))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidKeyMaterial);
        }
    }

    #[test]
    fn test_key_family_selection() {
        assert_eq!(KeyFamily::for_algorithm(Algorithm::PS384), Some(KeyFamily::Rsa));
        assert_eq!(KeyFamily::for_algorithm(Algorithm::ES256), Some(KeyFamily::Ec));
        assert_eq!(KeyFamily::for_algorithm(Algorithm::EdDSA), Some(KeyFamily::Ed));
        assert_eq!(KeyFamily::for_algorithm(Algorithm::HS256), None);
    }
}
