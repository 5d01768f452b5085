/// Bearer token issuing, verification, and request extractors
use crate::{account::Role, context::AppContext, error::ApiError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Token lifetime in seconds (1 hour)
pub const TOKEN_TTL_SECS: i64 = 3600;

/// Claims carried by every issued bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Sign a bearer token embedding identity and role
pub fn issue_token(
    account_id: &str,
    email: &str,
    role: Role,
    secret: &str,
) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: account_id.to_string(),
        email: email.to_string(),
        role: role.as_str().to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
}

/// Verify a bearer token with full validation
///
/// This performs signature verification, expiration checking, and claims
/// decoding, with a small leeway for clock skew.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 300;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("token verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Authentication("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    ApiError::Authentication("Invalid token signature".to_string())
                }
                _ => ApiError::Authentication("Invalid token".to_string()),
            }
        })
}

/// Extract bearer token from an Authorization header value set
pub fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Authenticated account context - extracts and validates the bearer token
#[derive(Debug, Clone)]
pub struct AuthAccount {
    pub id: String,
    pub email: String,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Authentication("No token provided".to_string()))?;

        let claims = verify_token(&token, &state.config.authentication.jwt_secret)?;
        let role = Role::from_str(&claims.role)
            .map_err(|_| ApiError::Authentication("Invalid token role".to_string()))?;

        Ok(AuthAccount {
            id: claims.sub,
            email: claims.email,
            role,
        })
    }
}

impl AuthAccount {
    /// Enforce a route's role allow-list; distinct "forbidden" outcome from
    /// the unauthenticated case
    pub fn require_any(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Authorization(
                "Insufficient permissions".to_string(),
            ))
        }
    }

    /// True for administrative roles
    pub fn is_admin(&self) -> bool {
        self.role.can_act_as(Role::Admin)
    }
}

/// Macro to require a minimum role on a handler
/// Usage: require_role!(auth, Role::SuperAdmin);
#[macro_export]
macro_rules! require_role {
    ($auth:expr, $required:expr) => {
        if !$auth.role.can_act_as($required) {
            return Err($crate::error::ApiError::Authorization(format!(
                "Requires {} role or higher",
                $required.as_str()
            )));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-testing-only-0123456789";

    #[test]
    fn test_token_round_trip() {
        let token = issue_token("acc-1", "a@x.com", Role::User, SECRET).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, "acc-1");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, "USER");
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token("acc-1", "a@x.com", Role::Admin, SECRET).unwrap();
        let result = verify_token(&token, "another-secret-entirely-0123456789abc");

        assert!(matches!(result, Err(ApiError::Authentication(_))));
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(verify_token("not.a.token", SECRET).is_err());
        assert!(verify_token("", SECRET).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));

        let mut bad = axum::http::HeaderMap::new();
        bad.insert("authorization", "Basic abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&bad), None);

        assert_eq!(extract_bearer_token(&axum::http::HeaderMap::new()), None);
    }

    #[test]
    fn test_require_any() {
        let auth = AuthAccount {
            id: "acc-1".to_string(),
            email: "a@x.com".to_string(),
            role: Role::Director,
        };

        assert!(auth.require_any(&[Role::Admin, Role::Director]).is_ok());
        assert!(auth.require_any(&[Role::Admin]).is_err());
    }
}
