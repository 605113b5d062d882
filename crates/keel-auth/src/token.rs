//! HS256 bearer tokens.
//!
//! Expiry is checked against the injected clock rather than the system
//! clock, so `exp` validation inside `jsonwebtoken` is turned off and done
//! here instead.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;
use crate::session::SessionSubject;

/// Claims carried by a session token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// User id.
    pub sub: String,
    /// Display name.
    pub username: String,
    /// Profile id.
    pub profile_id: String,
    /// Plan tier.
    pub plan_level: String,
    /// Session the token is bound to.
    pub sid: String,
    /// Token id.
    pub jti: String,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expires at, Unix seconds.
    pub exp: i64,
}

/// Issues and verifies session tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Issuer signing with `secret`.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issuer with a fresh random secret; its tokens die with the process.
    pub fn with_random_secret(ttl: Duration) -> Self {
        let secret: [u8; 32] = rand::rng().random();
        Self::new(&secret, ttl)
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `subject` bound to `session_id`.
    pub fn issue(&self, subject: &SessionSubject, session_id: &str, now_ms: i64) -> Result<String, AuthError> {
        let iat = now_ms / 1000;
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            sub: subject.user_id.clone(),
            username: subject.username.clone(),
            profile_id: subject.profile_id.clone(),
            plan_level: subject.plan_level.clone(),
            sid: session_id.to_string(),
            jti: uuid::Uuid::now_v7().to_string(),
            iat,
            exp: iat.saturating_add(ttl_secs),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify signature and expiry at `now_ms`.
    pub fn verify(&self, token: &str, now_ms: i64) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let data = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|e| AuthError::TokenInvalidOrExpired(e.to_string()))?;
        if data.claims.exp.saturating_mul(1000) <= now_ms {
            return Err(AuthError::TokenInvalidOrExpired("token expired".to_string()));
        }
        Ok(data.claims)
    }

    /// Seconds-resolution expiry of a token, without verifying it.
    pub fn expiry_ms(&self, token: &str) -> Option<i64> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        decode::<TokenClaims>(token, &self.decoding, &validation)
            .ok()
            .map(|d| d.claims.exp.saturating_mul(1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn subject() -> SessionSubject {
        SessionSubject {
            user_id: "u1".into(),
            username: "alice".into(),
            profile_id: "p1".into(),
            plan_level: "explorer_member".into(),
        }
    }

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn issue_then_verify() {
        let issuer = TokenIssuer::new(b"secret", Duration::from_secs(3600));
        let token = issuer.issue(&subject(), "session-1", NOW).unwrap();
        let claims = issuer.verify(&token, NOW + 1000).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.sid, "session-1");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn expired_token_rejected() {
        let issuer = TokenIssuer::new(b"secret", Duration::from_secs(60));
        let token = issuer.issue(&subject(), "s", NOW).unwrap();
        assert_matches!(
            issuer.verify(&token, NOW + 60_000),
            Err(AuthError::TokenInvalidOrExpired(_))
        );
        assert_eq!(issuer.expiry_ms(&token), Some(NOW + 60_000));
    }

    #[test]
    fn wrong_secret_rejected() {
        let a = TokenIssuer::new(b"secret-a", Duration::from_secs(60));
        let b = TokenIssuer::new(b"secret-b", Duration::from_secs(60));
        let token = a.issue(&subject(), "s", NOW).unwrap();
        assert_matches!(b.verify(&token, NOW), Err(AuthError::TokenInvalidOrExpired(_)));
    }

    #[test]
    fn garbage_rejected() {
        let issuer = TokenIssuer::with_random_secret(Duration::from_secs(60));
        assert_matches!(issuer.verify("not.a.jwt", NOW), Err(AuthError::TokenInvalidOrExpired(_)));
        assert!(issuer.expiry_ms("not.a.jwt").is_none());
    }
}
