use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::{debug, error, warn};

use crate::{
    auth::{
        errors::AuthError,
        jwt::{TokenCodec, TokenError},
        repo::CredentialStore,
        repo_types::User,
    },
    state::AppState,
};

/// Why a request was not authenticated. Logged, never returned to clients.
#[derive(Debug)]
pub enum UnauthenticatedReason {
    Missing,
    Invalid(TokenError),
    SubjectNotFound,
    StoreUnavailable(anyhow::Error),
}

impl UnauthenticatedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnauthenticatedReason::Missing => "missing",
            UnauthenticatedReason::Invalid(e) => e.reason(),
            UnauthenticatedReason::SubjectNotFound => "subject_not_found",
            UnauthenticatedReason::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

#[derive(Debug)]
pub enum AuthResult {
    Authenticated(User),
    Unauthenticated(UnauthenticatedReason),
}

/// Resolves a bearer token to a user: decode, then one store lookup.
#[derive(Clone)]
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    store: Arc<dyn CredentialStore>,
}

impl FromRef<AppState> for Authenticator {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}

impl Authenticator {
    pub fn new(codec: Arc<TokenCodec>, store: Arc<dyn CredentialStore>) -> Self {
        Self { codec, store }
    }

    pub async fn authenticate(&self, token: Option<&str>) -> AuthResult {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return AuthResult::Unauthenticated(UnauthenticatedReason::Missing),
        };

        let claims = match self.codec.decode(token) {
            Ok(c) => c,
            Err(e) => return AuthResult::Unauthenticated(UnauthenticatedReason::Invalid(e)),
        };

        match self.store.find_by_id(claims.sub).await {
            Ok(Some(user)) => AuthResult::Authenticated(user),
            Ok(None) => AuthResult::Unauthenticated(UnauthenticatedReason::SubjectNotFound),
            Err(e) => {
                AuthResult::Unauthenticated(UnauthenticatedReason::StoreUnavailable(e.into()))
            }
        }
    }
}

/// Pulls the token out of `Authorization: Bearer <t>`, `Token <t>` or
/// `Token token="<t>"`. Any other shape counts as no token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, rest) = value.split_once(' ')?;
    let rest = rest.trim();

    if scheme.eq_ignore_ascii_case("bearer") {
        return Some(rest);
    }
    if scheme.eq_ignore_ascii_case("token") {
        let token = match rest.strip_prefix("token=") {
            Some(quoted) => {
                let quoted = quoted.split(',').next()?.trim();
                quoted.trim_matches('"')
            }
            None => rest,
        };
        return Some(token);
    }
    None
}

/// Gate for protected handlers: the authenticated user, or a generic 401.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Authenticator: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Authenticator::from_ref(state);
        match authenticator.authenticate(bearer_token(&parts.headers)).await {
            AuthResult::Authenticated(user) => {
                debug!(user_id = %user.id, "request authenticated");
                Ok(AuthUser(user))
            }
            AuthResult::Unauthenticated(UnauthenticatedReason::StoreUnavailable(e)) => {
                error!(error = %e, "credential store lookup failed");
                Err(AuthError::Internal(e))
            }
            AuthResult::Unauthenticated(reason) => {
                warn!(reason = reason.as_str(), "request rejected");
                Err(AuthError::Unauthenticated)
            }
        }
    }
}
