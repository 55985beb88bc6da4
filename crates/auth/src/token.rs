//! Signed session tokens.
//!
//! A token is an HS256 JWT whose subject is the user's public id. Resolving a
//! token never touches the database: the username travels in the claims.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use relaychat_config::AuthConfig;
use serde::{Deserialize, Serialize};

use crate::{AuthError, Identity};

const LEEWAY_SECONDS: u64 = 5;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let ttl_seconds = i64::try_from(config.token_ttl_seconds).unwrap_or(i64::MAX);
        Self::with_secret(
            config.jwt_secret.as_bytes(),
            config.issuer.clone(),
            Duration::try_seconds(ttl_seconds).unwrap_or(Duration::MAX),
        )
    }

    pub fn with_secret(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.sign(identity, now, expires_at)
    }

    /// Resolve a presented token into the identity it was issued for.
    pub fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidCredential("missing token".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.leeway = LEEWAY_SECONDS;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|error| {
            let reason = match error.kind() {
                ErrorKind::ExpiredSignature => "token expired",
                ErrorKind::InvalidSignature => "signature mismatch",
                ErrorKind::InvalidIssuer => "unexpected issuer",
                _ => "malformed token",
            };
            AuthError::InvalidCredential(reason.into())
        })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidCredential("token has no subject".into()));
        }

        Ok(Identity {
            id: claims.sub,
            username: claims.username,
        })
    }

    fn sign(
        &self,
        identity: &Identity,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: identity.id.clone(),
            username: identity.username.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::TokenEncoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::with_secret(secret.as_bytes(), "relaychat-test", Duration::hours(1))
    }

    fn alice() -> Identity {
        Identity {
            id: "u1".into(),
            username: "alice".into(),
        }
    }

    fn assert_invalid(result: Result<Identity, AuthError>, expected_reason: &str) {
        match result {
            Err(AuthError::InvalidCredential(reason)) => assert_eq!(reason, expected_reason),
            other => panic!("expected InvalidCredential({expected_reason}), got {other:?}"),
        }
    }

    #[test]
    fn issued_token_resolves_to_same_identity() {
        let issuer = issuer("secret");
        let token = issuer.issue(&alice()).unwrap();

        assert_eq!(issuer.resolve(&token).unwrap(), alice());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let issuer = issuer("secret");
        let token = issuer.issue(&alice()).unwrap();

        let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
        let forged = issuer
            .issue(&Identity {
                id: "u2".into(),
                username: "mallory".into(),
            })
            .unwrap();
        parts[1] = forged.split('.').nth(1).unwrap().to_owned();

        assert_invalid(issuer.resolve(&parts.join(".")), "signature mismatch");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issuer("other").issue(&alice()).unwrap();
        assert_invalid(issuer("secret").resolve(&token), "signature mismatch");
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer("secret");
        let issued_at = Utc::now() - Duration::hours(2);
        let token = issuer
            .sign(&alice(), issued_at, issued_at + Duration::hours(1))
            .unwrap();

        assert_invalid(issuer.resolve(&token), "token expired");
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let token = TokenIssuer::with_secret(b"secret", "someone-else", Duration::hours(1))
            .issue(&alice())
            .unwrap();
        assert_invalid(issuer("secret").resolve(&token), "unexpected issuer");
    }

    #[test]
    fn garbage_and_empty_tokens_are_rejected() {
        let issuer = issuer("secret");
        assert_invalid(issuer.resolve("not.a.jwt"), "malformed token");
        assert_invalid(issuer.resolve("   "), "missing token");
    }
}
