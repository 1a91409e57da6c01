//! API gateway token-authorizer boundary
//!
//! The gateway invokes the authorizer with a `TOKEN` event carrying the raw
//! `Authorization` header value and the ARN of the method being called, and
//! expects a policy document back.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ErrorKind;
use crate::policy::{AuthorizerResponse, PolicyGenerator};
use crate::service::AuthorizationService;

/// Event type of token authorizers
pub const TOKEN_EVENT_TYPE: &str = "TOKEN";

/// Token-authorizer request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAuthorizerEvent {
    /// Authorizer type, `TOKEN`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Raw `Authorization` header value
    #[serde(default)]
    pub authorization_token: Option<String>,
    /// ARN of the invoked method
    #[serde(default)]
    pub method_arn: String,
}

/// Adapts gateway events to [`AuthorizationService`]
#[derive(Debug, Clone)]
pub struct GatewayAuthorizer {
    service: AuthorizationService,
}

impl GatewayAuthorizer {
    /// Wrap a service
    pub fn new(service: AuthorizationService) -> Self {
        Self { service }
    }

    /// The wrapped service
    pub fn service(&self) -> &AuthorizationService {
        &self.service
    }

    /// Authorize one event
    ///
    /// Events of a type other than `TOKEN` are denied without inspecting the token.
    pub async fn handle(&self, event: &TokenAuthorizerEvent) -> AuthorizerResponse {
        debug!(method_arn = %event.method_arn, "Token authorizer invoked");

        if event.event_type != TOKEN_EVENT_TYPE {
            warn!(event_type = %event.event_type, "Unsupported authorizer event type");
            return PolicyGenerator::deny(ErrorKind::MalformedHeader).to_authorizer_response();
        }

        self.service
            .authorize(event.authorization_token.as_deref())
            .await
            .to_authorizer_response()
    }

    /// Authorize a raw JSON event
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `event` is not a token-authorizer event.
    pub async fn handle_json(
        &self,
        event: serde_json::Value,
    ) -> Result<AuthorizerResponse, serde_json::Error> {
        let event: TokenAuthorizerEvent = serde_json::from_value(event)?;
        Ok(self.handle(&event).await)
    }
}
