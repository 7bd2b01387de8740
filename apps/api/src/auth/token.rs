use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::user::UserRole;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Not authenticated")]
    Missing,

    #[error("Could not validate credentials")]
    Malformed,

    #[error("Token has expired")]
    Expired,

    #[error("Could not validate credentials")]
    Invalid,

    #[error("token encoding failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

/// JWT claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until expiry.
    pub expires_in: i64,
}

/// HS256 signer/verifier bound to the configured secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        username: &str,
        role: UserRole,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.sign(&claims).map(|access_token| IssuedToken {
            access_token,
            token_type: "bearer",
            expires_in: self.ttl.num_seconds(),
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(TokenError::Encode)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact; jsonwebtoken otherwise allows 60s of leeway.
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => TokenError::Malformed,
                _ => TokenError::Invalid,
            })
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, TokenError> {
    let value = header.ok_or(TokenError::Missing)?;
    let (scheme, token) = value.split_once(' ').ok_or(TokenError::Missing)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::Missing);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Missing);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("unit-test-secret", 60)
    }

    #[test]
    fn test_issue_then_verify() {
        let id = Uuid::new_v4();
        let issued = service().issue(id, "vera", UserRole::Researcher).unwrap();
        assert_eq!(issued.token_type, "bearer");
        assert_eq!(issued.expires_in, 3600);

        let claims = service().verify(&issued.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), id);
        assert_eq!(claims.username, "vera");
        assert_eq!(claims.role, "researcher");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_rejected() {
        let svc = service();
        let now = Utc::now().timestamp();
        let token = svc
            .sign(&Claims {
                sub: Uuid::new_v4().to_string(),
                username: "old".into(),
                role: "researcher".into(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(matches!(svc.verify(&token), Err(TokenError::Expired)));

        let just_expired = svc
            .sign(&Claims {
                sub: Uuid::new_v4().to_string(),
                username: "recent".into(),
                role: "researcher".into(),
                iat: now - 600,
                exp: now - 5,
            })
            .unwrap();
        assert!(matches!(svc.verify(&just_expired), Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenService::new("other-secret", 60)
            .issue(Uuid::new_v4(), "mallory", UserRole::Admin)
            .unwrap()
            .access_token;
        assert!(matches!(service().verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(matches!(
            service().verify("not.a.jwt"),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            service().verify("garbage"),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(Some("bearer abc")).unwrap(), "abc");
        assert!(matches!(bearer_token(None), Err(TokenError::Missing)));
        assert!(matches!(
            bearer_token(Some("Basic dXNlcjpwYXNz")),
            Err(TokenError::Missing)
        ));
        assert!(matches!(bearer_token(Some("Bearer ")), Err(TokenError::Missing)));
    }
}
