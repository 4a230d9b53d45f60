use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::warn;

use crate::auth::{
    extractors::Authenticator,
    jwt::TokenCodec,
    password::Hasher,
    repo::{CredentialStore, MemoryCredentialStore, PgCredentialStore},
    services::AuthService,
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: Option<PgPool>,
    pub auth: AuthService,
    pub authenticator: Authenticator,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let (db, store): (Option<PgPool>, Arc<dyn CredentialStore>) = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                let store = Arc::new(PgCredentialStore::new(db.clone())) as Arc<dyn CredentialStore>;
                (Some(db), store)
            }
            None => {
                warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
                (None, Arc::new(MemoryCredentialStore::new()) as Arc<dyn CredentialStore>)
            }
        };

        let hasher = Hasher::from_config(&config.password)?;
        Self::from_parts(db, &config, store, hasher)
    }

    pub fn from_parts(
        db: Option<PgPool>,
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
        hasher: Hasher,
    ) -> anyhow::Result<Self> {
        // secret is read once here and never mutated afterwards
        let codec = Arc::new(TokenCodec::from_config(&config.jwt));
        let auth = AuthService::new(
            store.clone(),
            codec.clone(),
            hasher,
            config.password.min_len,
        )?;
        let authenticator = Authenticator::new(codec, store);
        Ok(Self {
            db,
            auth,
            authenticator,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{JwtConfig, PasswordConfig};

        let config = AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: Some(5),
            },
            password: PasswordConfig {
                min_len: 6,
                argon2_memory_kib: None,
                argon2_iterations: None,
                argon2_parallelism: None,
            },
        };
        let store = Arc::new(MemoryCredentialStore::new()) as Arc<dyn CredentialStore>;
        Self::from_parts(None, &config, store, crate::auth::password::cheap_hasher())
            .expect("fake state")
    }
}
