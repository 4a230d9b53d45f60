use std::fmt;

use anyhow::{bail, Context};
use serde::Deserialize;

/// Upper bound for `JWT_TTL_MINUTES`: ten years.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// `None` issues tokens without an `exp` claim.
    pub ttl_minutes: Option<i64>,
}

// The secret must never reach a log line.
impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub min_len: usize,
    pub argon2_memory_kib: Option<u32>,
    pub argon2_iterations: Option<u32>,
    pub argon2_parallelism: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres is used when present, the in-memory store otherwise.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let ttl_minutes = match parse_var::<i64, _>(&lookup, "JWT_TTL_MINUTES")?.unwrap_or(60) {
            0 => None,
            m if m < 0 => bail!("JWT_TTL_MINUTES must not be negative"),
            m if m > MAX_TTL_MINUTES => {
                bail!("JWT_TTL_MINUTES must be at most {MAX_TTL_MINUTES}")
            }
            m => Some(m),
        };

        let jwt = JwtConfig {
            secret,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "authgate".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "authgate-users".into()),
            ttl_minutes,
        };

        let password = PasswordConfig {
            min_len: parse_var(&lookup, "MIN_PASSWORD_LEN")?.unwrap_or(6),
            argon2_memory_kib: parse_var(&lookup, "ARGON2_MEMORY_KIB")?,
            argon2_iterations: parse_var(&lookup, "ARGON2_ITERATIONS")?,
            argon2_parallelism: parse_var(&lookup, "ARGON2_PARALLELISM")?,
        };

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url,
            jwt,
            password,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().parse::<T>().with_context(|| format!("invalid {key}")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = load(&[("JWT_SECRET", "s3cret")]).expect("config should load");
        assert_eq!(cfg.jwt.issuer, "authgate");
        assert_eq!(cfg.jwt.audience, "authgate-users");
        assert_eq!(cfg.jwt.ttl_minutes, Some(60));
        assert_eq!(cfg.password.min_len, 6);
        assert!(cfg.database_url.is_none());
        assert!(cfg.password.argon2_memory_kib.is_none());
    }

    #[test]
    fn missing_or_blank_secret_is_rejected() {
        assert!(load(&[]).is_err());
        assert!(load(&[("JWT_SECRET", "   ")]).is_err());
    }

    #[test]
    fn zero_ttl_disables_expiry() {
        let cfg = load(&[("JWT_SECRET", "x"), ("JWT_TTL_MINUTES", "0")]).expect("config");
        assert_eq!(cfg.jwt.ttl_minutes, None);
    }

    #[test]
    fn malformed_numbers_fail_startup() {
        let err = load(&[("JWT_SECRET", "x"), ("MIN_PASSWORD_LEN", "six")]).unwrap_err();
        assert!(err.to_string().contains("MIN_PASSWORD_LEN"));
        assert!(load(&[("JWT_SECRET", "x"), ("JWT_TTL_MINUTES", "-5")]).is_err());
    }

    #[test]
    fn ttl_above_ten_years_is_rejected() {
        let max = MAX_TTL_MINUTES.to_string();
        let cfg = load(&[("JWT_SECRET", "x"), ("JWT_TTL_MINUTES", &max)]).expect("config");
        assert_eq!(cfg.jwt.ttl_minutes, Some(MAX_TTL_MINUTES));

        let err = load(&[("JWT_SECRET", "x"), ("JWT_TTL_MINUTES", "307445734561825000")])
            .unwrap_err();
        assert!(err.to_string().contains("JWT_TTL_MINUTES"));
        let over = (MAX_TTL_MINUTES + 1).to_string();
        assert!(load(&[("JWT_SECRET", "x"), ("JWT_TTL_MINUTES", &over)]).is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let cfg = load(&[("JWT_SECRET", "do-not-print-me")]).expect("config");
        let dbg = format!("{:?}", cfg);
        assert!(!dbg.contains("do-not-print-me"));
        assert!(dbg.contains("<redacted>"));
    }
}
