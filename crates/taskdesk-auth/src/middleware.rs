//! Authentication and authorization middleware for Axum

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower::{Layer, Service};
use tracing::{debug, error};

use crate::error::AuthError;
use crate::jwt::{Claims, JwtManager};
use crate::ADMIN_ROLE;

/// Authenticated user information
///
/// Lives in the request extensions for the duration of one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    /// Token expiry (Unix timestamp)
    pub expires_at: i64,
}

impl AuthUser {
    /// Create from JWT claims
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            id: claims.id,
            name: claims.name.clone(),
            email: claims.email.clone(),
            role: claims.role.clone(),
            expires_at: claims.exp,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Admin, or the user identified by `user_id`
    pub fn is_admin_or_self(&self, user_id: i64) -> bool {
        self.is_admin() || self.id == user_id
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            error!("Handler requires an authenticated user but no token verifier ran");
            AuthError::MissingAuthContext
        })
    }
}

/// Extract bearer token from authorization header
///
/// The header must be exactly `Bearer <token>`: two parts separated by a
/// single space.
fn extract_bearer_token(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

fn reject(reason: &'static str, err: AuthError) -> AuthError {
    metrics::counter!("taskdesk_auth_rejections_total", "reason" => reason).increment(1);
    err
}

/// Authentication middleware
///
/// Validates the bearer token from the Authorization header and adds the
/// resulting [`AuthUser`] to the request extensions. Requests without a
/// valid token are rejected with 401 before reaching the handler.
pub async fn authenticate(
    State(jwt_manager): State<Arc<JwtManager>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = match request.headers().get(AUTHORIZATION) {
        Some(value) => value
            .to_str()
            .map_err(|_| reject("malformed_header", AuthError::InvalidAuthHeader))?,
        None => return Err(reject("missing_header", AuthError::MissingAuthHeader)),
    };

    let token =
        extract_bearer_token(header).map_err(|e| reject("malformed_header", e))?;
    let claims = jwt_manager
        .verify(token)
        .map_err(|e| reject("invalid_token", e))?;
    let user = AuthUser::from_claims(&claims);

    debug!("Authenticated user: {} ({})", user.id, user.role);

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Require an exact role on every request passing through the layer
pub fn require_role(role: impl Into<String>) -> RoleGateLayer {
    RoleGateLayer::new(role)
}

/// Layer that applies [`RoleGate`]
#[derive(Clone, Debug)]
pub struct RoleGateLayer {
    role: Arc<str>,
}

impl RoleGateLayer {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: Arc::from(role.into()),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }
}

impl<S> Layer<S> for RoleGateLayer {
    type Service = RoleGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RoleGate {
            inner,
            role: self.role.clone(),
        }
    }
}

/// Authorization middleware comparing the caller's role to a required one
#[derive(Clone, Debug)]
pub struct RoleGate<S> {
    inner: S,
    role: Arc<str>,
}

impl<S> Service<Request> for RoleGate<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let required = self.role.clone();
        // Swap in the clone so the instance that was polled ready handles this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let role = req.extensions().get::<AuthUser>().map(|u| (u.id, u.role.clone()));

            match role {
                Some((_, role)) if role == *required => inner.call(req).await,
                Some((user_id, role)) => {
                    debug!(
                        "User {} with role '{}' denied, route requires '{}'",
                        user_id, role, required
                    );
                    Ok(reject("forbidden", AuthError::InsufficientPermissions).into_response())
                }
                None => {
                    error!(
                        "Role gate for '{}' reached without an authenticated user; \
                         is the token verifier mounted?",
                        required
                    );
                    Ok(reject("missing_context", AuthError::MissingAuthContext).into_response())
                }
            }
        })
    }
}
