use actix_web::HttpRequest;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::models::Role;
use crate::error::{AppError, AuthError};

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // User ID
    pub role: Role,
    pub school_id: Uuid,
    pub exp: i64,        // Expiration time
    pub iat: i64,        // Issued at
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub role: Role,
    pub school_id: Uuid,
}

/// Identity resolved for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user: SessionUser,
}

impl Session {
    pub fn school_id(&self) -> Uuid {
        self.user.school_id
    }
}

pub struct SessionProvider {
    jwt_secret: String,
    token_expiry_hours: i64,
}

impl SessionProvider {
    pub fn new(jwt_secret: String, token_expiry_hours: i64) -> Self {
        Self {
            jwt_secret,
            token_expiry_hours,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.clone(), config.token_expiry_hours)
    }

    pub fn issue_token(&self, user: &SessionUser) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            school_id: user.school_id,
            exp: (now + Duration::hours(self.token_expiry_hours)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::InternalError(format!("failed to sign session token: {}", e)))
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(data.claims)
    }

    /// Bearer header first, then the session cookie.
    fn extract_token(req: &HttpRequest) -> Result<String, AuthError> {
        if let Some(token) = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            return Ok(token.trim().to_string());
        }

        req.cookie(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or(AuthError::MissingToken)
    }

    /// `None` for any missing, malformed, expired or forged token.
    pub fn resolve_session(&self, req: &HttpRequest) -> Option<Session> {
        let claims = Self::extract_token(req)
            .and_then(|token| self.decode_token(&token))
            .map_err(|e| debug!("No session for {} {}: {}", req.method(), req.path(), e))
            .ok()?;

        Some(Session {
            user: SessionUser {
                id: claims.sub,
                role: claims.role,
                school_id: claims.school_id,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    fn provider() -> SessionProvider {
        SessionProvider::new("test_secret".to_string(), 1)
    }

    fn admin() -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
            school_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_bearer_token_resolves_session() {
        let provider = provider();
        let user = admin();
        let token = provider.issue_token(&user).unwrap();

        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();

        let session = provider.resolve_session(&req).expect("session");
        assert_eq!(session.user, user);
        assert_eq!(session.school_id(), user.school_id);
    }

    #[test]
    fn test_cookie_token_resolves_session() {
        let provider = provider();
        let user = admin();
        let token = provider.issue_token(&user).unwrap();

        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE, token))
            .to_http_request();

        assert_eq!(provider.resolve_session(&req).map(|s| s.user), Some(user));
    }

    #[test]
    fn test_missing_or_forged_token_has_no_session() {
        let provider = provider();
        let req = TestRequest::default().to_http_request();
        assert!(provider.resolve_session(&req).is_none());

        let forged = SessionProvider::new("another_secret".to_string(), 1)
            .issue_token(&admin())
            .unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", forged)))
            .to_http_request();
        assert!(provider.resolve_session(&req).is_none());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let provider = SessionProvider::new("test_secret".to_string(), -2);
        let token = provider.issue_token(&admin()).unwrap();
        assert!(matches!(provider.decode_token(&token), Err(AuthError::TokenExpired)));
    }
}
