//! Tower Service implementation for authorization

use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};
use tower_service::Service;
use tracing::debug;

use crate::service::{AuthorizationService, Principal};

use super::AuthorizationLayerConfig;

/// Future returned by [`AuthorizationMiddleware`]
pub type AuthorizationFuture<T, E> = BoxFuture<'static, Result<T, E>>;

/// Tower Service that authorizes HTTP requests
///
/// Reads the `Authorization` header, runs it through the
/// [`AuthorizationService`], and either forwards the request with a
/// [`Principal`] in its extensions or answers `401 Unauthorized`.
#[derive(Debug, Clone)]
pub struct AuthorizationMiddleware<S> {
    inner: S,
    authorizer: AuthorizationService,
    config: AuthorizationLayerConfig,
}

impl<S> AuthorizationMiddleware<S> {
    /// Create a new middleware around `inner`
    pub fn new(inner: S, authorizer: AuthorizationService, config: AuthorizationLayerConfig) -> Self {
        Self {
            inner,
            authorizer,
            config,
        }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

fn unauthorized<ResBody: Default>() -> http::Response<ResBody> {
    let mut response = http::Response::new(ResBody::default());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

impl<S, B, ResBody> Service<http::Request<B>> for AuthorizationMiddleware<S>
where
    S: Service<http::Request<B>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = AuthorizationFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        // The clone may not be ready; keep the driven instance for this call
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        if self.config.should_bypass(req.uri().path()) {
            debug!(path = %req.uri().path(), "Authorization bypassed");
            return Box::pin(async move { inner.call(req).await });
        }

        // Non-UTF-8 bytes become replacement characters and fail token decoding
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
        let authorizer = self.authorizer.clone();

        Box::pin(async move {
            let authorization = authorizer.evaluate(header.as_deref()).await;
            match authorization.claims {
                Some(claims) => {
                    req.extensions_mut().insert(Principal::from(claims));
                    inner.call(req).await
                }
                None => Ok(unauthorized()),
            }
        })
    }
}
