use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::{AuthConfig, AuthMode};

pub mod jwt;

pub use jwt::JwtValidator;

/// Identity extracted from a validated bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub display_name: String,
}

/// Request extension carrying the optional caller identity.
///
/// Attached by [`attach_identity`] so handlers receive context explicitly
/// instead of consulting ambient session state.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

pub struct AuthService {
    mode: AuthMode,
    validator: Option<JwtValidator>,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        let validator = match (&config.mode, &config.jwt) {
            (AuthMode::Jwt, Some(jwt)) => Some(JwtValidator::from_config(jwt)),
            (AuthMode::Jwt, None) => {
                anyhow::bail!("AUTH_MODE=jwt requires JWT configuration")
            }
            (AuthMode::None, _) => None,
        };

        Ok(Self {
            mode: config.mode.clone(),
            validator,
        })
    }

    pub fn mode(&self) -> &AuthMode {
        &self.mode
    }

    /// Identify the caller from the Authorization header, if possible.
    ///
    /// With auth disabled every caller is anonymous. An invalid token is
    /// treated as anonymous here; rejecting is [`require_auth`]'s job.
    pub fn identify(&self, headers: &HeaderMap) -> Option<CurrentUser> {
        let validator = self.validator.as_ref()?;
        let token = bearer_token(headers)?;

        match validator.validate(token) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring invalid bearer token");
                None
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Gate for mutating routes: 401 unless the caller presents a valid token
/// (or auth is disabled).
pub async fn require_auth(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service.mode() {
        AuthMode::None => next.run(request).await,
        AuthMode::Jwt => match auth_service.identify(&headers) {
            Some(user) => {
                request.extensions_mut().insert(MaybeUser(Some(user)));
                next.run(request).await
            }
            None => (StatusCode::UNAUTHORIZED, "Invalid or missing bearer token").into_response(),
        },
    }
}

/// Identity layer for the visit route: attaches `MaybeUser` and always lets
/// the request through, since anonymous visits are first-class.
pub async fn attach_identity(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let user = auth_service.identify(&headers);
    request.extensions_mut().insert(MaybeUser(user));
    next.run(request).await
}
