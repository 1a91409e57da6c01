//! # Tower Middleware Integration
//!
//! Runs every HTTP request through [`AuthorizationService`](crate::AuthorizationService)
//! before it reaches the inner service.
//!
//! - [`AuthorizationLayer`] - Tower Layer that wraps services with authorization
//! - [`AuthorizationMiddleware`] - Tower Service that authorizes `http::Request`s
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use quillpad_auth::tower::AuthorizationLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(AuthorizationLayer::new(authorizer).bypass_path("/health"))
//!     .service(notes_api);
//! ```
//!
//! ## Responses
//!
//! A denied request never reaches the inner service. It is answered with
//! `401 Unauthorized`, `WWW-Authenticate: Bearer` and an empty body; the
//! failure class is only logged.
//!
//! ## Request Extensions
//!
//! On Allow, the caller's [`Principal`](crate::Principal) is inserted into the
//! request's extensions:
//!
//! ```rust,ignore
//! if let Some(principal) = req.extensions().get::<Principal>() {
//!     println!("notes for {}", principal.user_id());
//! }
//! ```

mod layer;
mod service;

pub use layer::AuthorizationLayer;
pub use service::{AuthorizationFuture, AuthorizationMiddleware};

/// Configuration for the authorization layer
#[derive(Debug, Clone, Default)]
pub struct AuthorizationLayerConfig {
    /// Request paths that skip authorization (e.g., health checks)
    pub bypass_paths: Vec<String>,
}

impl AuthorizationLayerConfig {
    /// Add a path to the bypass list
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.bypass_paths.push(path.into());
        self
    }

    /// Check if a path should bypass authorization
    #[must_use]
    pub fn should_bypass(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|p| p == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_bypasses_nothing() {
        let config = AuthorizationLayerConfig::default();
        assert!(!config.should_bypass("/"));
        assert!(!config.should_bypass("/health"));
    }

    #[test]
    fn test_bypass_paths_match_exactly() {
        let config = AuthorizationLayerConfig::default()
            .bypass_path("/health")
            .bypass_path("/ready");
        assert!(config.should_bypass("/health"));
        assert!(config.should_bypass("/ready"));
        assert!(!config.should_bypass("/health/deep"));
        assert!(!config.should_bypass("/notes"));
    }
}
