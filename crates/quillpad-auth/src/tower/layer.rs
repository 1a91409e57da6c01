//! Tower Layer implementation for authorization

use tower::Layer;

use crate::service::AuthorizationService;

use super::AuthorizationLayerConfig;
use super::service::AuthorizationMiddleware;

/// Tower Layer that adds bearer-token authorization to services
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceBuilder;
/// use quillpad_auth::tower::AuthorizationLayer;
///
/// let service = ServiceBuilder::new()
///     .layer(AuthorizationLayer::new(authorizer))
///     .service(my_inner_service);
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationLayer {
    authorizer: AuthorizationService,
    config: AuthorizationLayerConfig,
}

impl AuthorizationLayer {
    /// Create a new layer with default configuration
    pub fn new(authorizer: AuthorizationService) -> Self {
        Self {
            authorizer,
            config: AuthorizationLayerConfig::default(),
        }
    }

    /// Create a new layer with custom configuration
    pub fn with_config(authorizer: AuthorizationService, config: AuthorizationLayerConfig) -> Self {
        Self { authorizer, config }
    }

    /// Let requests to `path` through without authorization
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.config.bypass_paths.push(path.into());
        self
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = AuthorizationMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizationMiddleware::new(inner, self.authorizer.clone(), self.config.clone())
    }
}
