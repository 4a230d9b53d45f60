use std::sync::Arc;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::{
    errors::AuthError,
    jwt::TokenCodec,
    password::Hasher,
    repo::{CredentialStore, StoreError},
    repo_types::User,
};

/// Same shape as the HTML5 / RFC 5322 "valid e-mail address" production.
pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
        )
        .unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn validate_email(email: &str) -> Result<(), AuthError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail)
    }
}

pub(crate) fn validate_password(password: &str, min_len: usize) -> Result<(), AuthError> {
    if password.chars().count() < min_len {
        return Err(AuthError::WeakPassword { min: min_len });
    }
    Ok(())
}

/// Outcome of a successful sign-in.
#[derive(Debug)]
pub struct SignedIn {
    pub user: User,
    pub token: String,
}

/// Sign-up and sign-in over a credential store.
///
/// Holds no per-request state; clones share the store and the codec.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    hasher: Hasher,
    min_password_len: usize,
    // verified against when the email is unknown, to keep timing uniform
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        hasher: Hasher,
        min_password_len: usize,
    ) -> anyhow::Result<Self> {
        let dummy_hash = hasher
            .hash("authgate-timing-equalizer")
            .context("compute dummy password hash")?;
        Ok(Self {
            store,
            codec,
            hasher,
            min_password_len,
            dummy_hash: dummy_hash.into(),
        })
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = email.trim();
        validate_email(email)?;
        validate_password(password, self.min_password_len)?;

        if self.store.find_by_email(email).await.map_err(store_err)?.is_some() {
            warn!("sign-up for already registered email");
            return Err(AuthError::DuplicateEmail);
        }

        let hash = self.hasher.hash_blocking(password.to_string()).await?;

        // the store has the final word on uniqueness under concurrent sign-ups
        let user = self.store.create(email, &hash).await.map_err(store_err)?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        let email = email.trim();

        let user = if is_valid_email(email) {
            self.store.find_by_email(email).await.map_err(store_err)?
        } else {
            None
        };

        let Some(user) = user else {
            self.hasher
                .verify_blocking(password.to_string(), self.dummy_hash.to_string())
                .await?;
            warn!("sign-in rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let ok = self
            .hasher
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await?;
        if !ok {
            warn!(user_id = %user.id, "sign-in rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self
            .codec
            .issue(user.id, &user.email)
            .context("sign access token")?;

        info!(user_id = %user.id, "user signed in");
        Ok(SignedIn { user, token })
    }
}

fn store_err(e: StoreError) -> AuthError {
    match e {
        StoreError::Duplicate => AuthError::DuplicateEmail,
        StoreError::Backend(e) => AuthError::Internal(e),
    }
}

#[cfg(test)]
pub(crate) fn test_service() -> (AuthService, Arc<crate::auth::repo::MemoryCredentialStore>, Arc<TokenCodec>) {
    use std::time::Duration;

    let store = Arc::new(crate::auth::repo::MemoryCredentialStore::new());
    let codec = Arc::new(TokenCodec::new(
        b"test-secret",
        "test-issuer",
        "test-aud",
        Some(Duration::from_secs(600)),
    ));
    let service = AuthService::new(
        store.clone(),
        codec.clone(),
        crate::auth::password::cheap_hasher(),
        6,
    )
    .expect("service");
    (service, store, codec)
}
