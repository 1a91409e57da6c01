//! Access decisions and their gateway rendering

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::jwt::VerifiedClaims;

/// Principal reported on a Deny
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

/// Resource every decision applies to
pub const ALL_RESOURCES: &str = "*";

/// Policy language version of the gateway's policy documents
pub const POLICY_VERSION: &str = "2012-10-17";

/// Action the gateway policy governs
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

/// Allow or Deny
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Request may proceed
    Allow,
    /// Request is rejected
    Deny,
}

impl Effect {
    /// `"Allow"` or `"Deny"`
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// Outcome of one authorization call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    /// Verified subject on Allow, [`ANONYMOUS_PRINCIPAL`] on Deny
    pub principal_id: String,
    /// Allow or Deny
    pub effect: Effect,
    /// Resource the decision covers
    pub resource: String,
    /// Why access was denied; `None` on Allow
    pub error_kind: Option<ErrorKind>,
}

impl AuthorizationDecision {
    /// Whether the request may proceed
    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }

    /// Render as the gateway's authorizer response
    ///
    /// The error kind is not part of the rendering.
    pub fn to_authorizer_response(&self) -> AuthorizerResponse {
        AuthorizerResponse {
            principal_id: self.principal_id.clone(),
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_string(),
                statement: vec![PolicyStatement {
                    action: INVOKE_ACTION.to_string(),
                    effect: self.effect,
                    resource: self.resource.clone(),
                }],
            },
        }
    }
}

/// Converts verification outcomes into decisions
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyGenerator;

impl PolicyGenerator {
    /// Allow decision for a verified caller
    pub fn allow(claims: &VerifiedClaims) -> AuthorizationDecision {
        AuthorizationDecision {
            principal_id: claims.subject().to_string(),
            effect: Effect::Allow,
            resource: ALL_RESOURCES.to_string(),
            error_kind: None,
        }
    }

    /// Deny decision carrying the failure class
    pub fn deny(kind: ErrorKind) -> AuthorizationDecision {
        AuthorizationDecision {
            principal_id: ANONYMOUS_PRINCIPAL.to_string(),
            effect: Effect::Deny,
            resource: ALL_RESOURCES.to_string(),
            error_kind: Some(kind),
        }
    }
}

/// Gateway authorizer response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    /// Principal the gateway attributes the request to
    pub principal_id: String,
    /// Policy to apply
    pub policy_document: PolicyDocument,
}

/// Gateway policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    /// Policy language version
    pub version: String,
    /// Statements, exactly one for authorizer responses
    pub statement: Vec<PolicyStatement>,
}

/// One policy statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    /// Governed action
    pub action: String,
    /// Allow or Deny
    pub effect: Effect,
    /// Governed resource
    pub resource: String,
}
