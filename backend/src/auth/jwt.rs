use super::models::{AuthUser, Claims};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

const TOKEN_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("JWT decoding error: {0}")]
    Decoding(String),
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token revoked")]
    Revoked,
    #[error("Revocation list lock poisoned")]
    LockPoisoned,
}

/// Issues and checks HS256 tokens. Clones share one revocation list.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// jti -> exp of logged-out tokens that have not expired yet.
    revoked: Arc<RwLock<HashMap<String, usize>>>,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            revoked: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn generate_token(&self, user: &AuthUser) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::hours(TOKEN_LIFETIME_HOURS);

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key).map_err(JwtError::Encoding)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, JwtError> {
        if token.is_empty() {
            return Err(JwtError::InvalidToken);
        }

        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(JwtError::InvalidToken);
        }

        let validation = Validation::new(Algorithm::HS256);

        let claims = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => token_data.claims,
            Err(err) => {
                log::debug!("JWT token decode error: {:?}", err);
                return match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(JwtError::TokenExpired),
                    jsonwebtoken::errors::ErrorKind::InvalidToken
                    | jsonwebtoken::errors::ErrorKind::InvalidSignature => Err(JwtError::InvalidToken),
                    _ => Err(JwtError::Decoding(err.to_string())),
                };
            }
        };

        let now = Utc::now().timestamp() as usize;
        if claims.exp < now {
            log::debug!("JWT token expired. Exp: {}, Now: {}", claims.exp, now);
            return Err(JwtError::TokenExpired);
        }

        let revoked = self.revoked.read().map_err(|_| JwtError::LockPoisoned)?;
        if revoked.contains_key(&claims.jti) {
            return Err(JwtError::Revoked);
        }
        Ok(claims)
    }

    /// Invalidates a valid token for the rest of its lifetime.
    pub fn revoke_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.verify_token(token)?;
        let now = Utc::now().timestamp() as usize;

        let mut revoked = self.revoked.write().map_err(|_| JwtError::LockPoisoned)?;
        revoked.retain(|_, exp| *exp >= now);
        revoked.insert(claims.jti.clone(), claims.exp);
        log::debug!("Revoked token {} for user {}", claims.jti, claims.sub);
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            username: "petani".to_string(),
            email: "petani@example.com".to_string(),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let jwt = JwtService::new("secret");
        let user = user();
        let claims = jwt.verify_token(&jwt.generate_token(&user).unwrap()).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.username, "petani");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn every_token_gets_its_own_id() {
        let jwt = JwtService::new("secret");
        let user = user();
        let a = jwt.verify_token(&jwt.generate_token(&user).unwrap()).unwrap();
        let b = jwt.verify_token(&jwt.generate_token(&user).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = JwtService::new("one").generate_token(&user()).unwrap();
        assert!(matches!(
            JwtService::new("two").verify_token(&token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let jwt = JwtService::new("secret");
        assert!(matches!(jwt.verify_token(""), Err(JwtError::InvalidToken)));
        assert!(matches!(jwt.verify_token("abc"), Err(JwtError::InvalidToken)));
    }

    #[test]
    fn revocation_only_hits_that_token_and_is_shared_by_clones() {
        let jwt = JwtService::new("secret");
        let user = user();
        let first = jwt.generate_token(&user).unwrap();
        let second = jwt.generate_token(&user).unwrap();

        jwt.clone().revoke_token(&first).unwrap();

        assert!(matches!(jwt.verify_token(&first), Err(JwtError::Revoked)));
        assert!(jwt.verify_token(&second).is_ok());
        assert!(jwt.revoke_token(&first).is_err());
    }
}
