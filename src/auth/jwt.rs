use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::{auth::claims::Claims, config::JwtConfig};

/// The only algorithm written or accepted.
const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token issuer or audience is invalid")]
    InvalidClaims,
    #[error("token encoding failed: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
}

impl TokenError {
    /// Short label for diagnostics. Never sent to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::Expired => "expired",
            TokenError::InvalidClaims => "invalid_claims",
            TokenError::Encode(_) => "encode",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            // a header naming another algorithm is never used to pick the verifier
            ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidClaims,
            _ => TokenError::Malformed,
        }
    }
}

/// Signs and verifies compact HS256 tokens with the server secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Option<Duration>,
}

impl TokenCodec {
    pub fn new(secret: &[u8], issuer: &str, audience: &str, ttl: Option<Duration>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl,
        }
    }

    pub fn from_config(cfg: &JwtConfig) -> Self {
        let ttl = cfg
            .ttl_minutes
            .map(|m| Duration::from_secs((m as u64).saturating_mul(60)));
        Self::new(cfg.secret.as_bytes(), &cfg.issuer, &cfg.audience, ttl)
    }

    /// Builds claims for `user_id` stamped with issuance time and, when a TTL
    /// is configured, an expiry.
    pub fn claims_for(&self, user_id: Uuid, email: &str) -> Claims {
        let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
        Claims {
            sub: user_id,
            email: email.to_string(),
            iat: Some(now),
            exp: self.ttl.map(|ttl| now.saturating_add(ttl.as_secs())),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, TokenError> {
        let token = self.encode(&self.claims_for(user_id, email))?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding).map_err(TokenError::Encode)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        // exp is optional; when present it is still enforced
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_codec(secret: &str) -> TokenCodec {
        TokenCodec::new(
            secret.as_bytes(),
            "test-issuer",
            "test-aud",
            Some(Duration::from_secs(300)),
        )
    }

    fn now() -> u64 {
        OffsetDateTime::now_utc().unix_timestamp() as u64
    }

    fn flip_char(token: &str, idx: usize) -> String {
        let mut bytes = token.as_bytes().to_vec();
        bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).expect("ascii token")
    }

    #[test]
    fn issue_and_decode() {
        let codec = make_codec("dev-secret");
        let user_id = Uuid::new_v4();
        let token = codec.issue(user_id, "a@x.com").expect("sign");
        assert_eq!(token.split('.').count(), 3);

        let claims = codec.decode(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        let (iat, exp) = (claims.iat.expect("iat"), claims.exp.expect("exp"));
        assert_eq!(exp - iat, 300);
    }

    #[test]
    fn roundtrip_preserves_claims_with_and_without_timestamps() {
        let codec = make_codec("dev-secret");
        let mut claims = codec.claims_for(Uuid::new_v4(), "b@x.com");
        assert_eq!(codec.decode(&codec.encode(&claims).expect("sign")).expect("verify"), claims);

        claims.iat = None;
        claims.exp = None;
        assert_eq!(codec.decode(&codec.encode(&claims).expect("sign")).expect("verify"), claims);
    }

    #[test]
    fn codec_without_ttl_issues_non_expiring_tokens() {
        let codec = TokenCodec::new(b"k", "i", "a", None);
        let claims = codec.decode(&codec.issue(Uuid::new_v4(), "c@x.com").expect("sign")).expect("verify");
        assert!(claims.exp.is_none());
        assert!(claims.iat.is_some());
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let token = make_codec("secret-one").issue(Uuid::new_v4(), "a@x.com").expect("sign");
        let err = make_codec("secret-two").decode(&token).unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = make_codec("dev-secret");
        let mut claims = codec.claims_for(Uuid::new_v4(), "a@x.com");
        claims.iat = Some(now() - 7200);
        claims.exp = Some(now() - 3600);
        let token = codec.encode(&claims).expect("sign");
        assert!(matches!(codec.decode(&token).unwrap_err(), TokenError::Expired));
    }

    #[test]
    fn token_just_past_expiry_is_rejected() {
        let codec = make_codec("dev-secret");
        let mut claims = codec.claims_for(Uuid::new_v4(), "a@x.com");
        claims.iat = Some(now() - 330);
        claims.exp = Some(now() - 30);
        let token = codec.encode(&claims).expect("sign");
        assert!(matches!(codec.decode(&token).unwrap_err(), TokenError::Expired));
    }

    #[test]
    fn huge_ttl_does_not_overflow() {
        let codec = TokenCodec::from_config(&JwtConfig {
            secret: "k".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: Some(i64::MAX),
        });
        let claims = codec.claims_for(Uuid::new_v4(), "a@x.com");
        assert_eq!(claims.exp, Some(u64::MAX));
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let token = make_codec("same").issue(Uuid::new_v4(), "a@x.com").expect("sign");
        let other = TokenCodec::new(b"same", "other-iss", "other-aud", None);
        assert!(matches!(other.decode(&token).unwrap_err(), TokenError::InvalidClaims));
    }

    #[test]
    fn structural_garbage_is_malformed() {
        let codec = make_codec("dev-secret");
        for bad in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(
                matches!(codec.decode(bad).unwrap_err(), TokenError::Malformed),
                "{bad:?} should be malformed"
            );
        }
    }

    #[test]
    fn tampering_with_any_payload_or_signature_char_never_verifies() {
        let codec = make_codec("dev-secret");
        let token = codec.issue(Uuid::new_v4(), "a@x.com").expect("sign");
        let header_end = token.find('.').expect("header");

        for idx in (header_end + 1)..token.len() {
            if token.as_bytes()[idx] == b'.' {
                continue;
            }
            match codec.decode(&flip_char(&token, idx)) {
                Err(TokenError::InvalidSignature) | Err(TokenError::Malformed) => {}
                other => panic!("tamper at {idx} gave {other:?}"),
            }
        }
    }

    #[test]
    fn appended_garbage_is_rejected() {
        let codec = make_codec("dev-secret");
        let token = codec.issue(Uuid::new_v4(), "a@x.com").expect("sign");
        assert!(codec.decode(&format!("{token}x")).is_err());
    }

    #[test]
    fn other_algorithms_in_header_are_not_trusted() {
        let codec = make_codec("dev-secret");
        let claims = codec.claims_for(Uuid::new_v4(), "a@x.com");

        let hs384 = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(b"dev-secret"),
        )
        .expect("sign hs384");
        assert!(matches!(codec.decode(&hs384).unwrap_err(), TokenError::InvalidSignature));

        // {"alg":"none","typ":"JWT"} with a valid payload and an empty signature
        let payload = codec.encode(&claims).expect("sign");
        let payload = payload.split('.').nth(1).expect("payload");
        let unsigned = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{payload}.");
        assert!(codec.decode(&unsigned).is_err());
    }

    #[test]
    fn error_reasons_are_stable() {
        assert_eq!(TokenError::Malformed.reason(), "malformed");
        assert_eq!(TokenError::InvalidSignature.reason(), "invalid_signature");
        assert_eq!(TokenError::Expired.reason(), "expired");
    }
}
