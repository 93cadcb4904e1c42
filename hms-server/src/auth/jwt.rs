//! Access and refresh token issuing / verification (HMAC JWTs)

use crate::config::AuthConfig;
use crate::core::{HmsError, HmsResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Claims carried by both token kinds. Refresh tokens have no permissions and `type = "refresh"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Claims {
    pub fn permissions(&self) -> &[String] {
        self.permissions.as_deref().unwrap_or(&[])
    }
}

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    BadSignature,
    Malformed,
    Invalid,
}

impl TokenError {
    /// Client-facing message for a rejected access token
    pub fn message(&self) -> &'static str {
        match self {
            TokenError::Expired => "Token has expired. Please log in again.",
            TokenError::BadSignature => "Invalid token signature. Please log in again.",
            TokenError::Malformed => "Invalid token format. Please log in again.",
            TokenError::Invalid => "Invalid token. Please log in again.",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed,
            _ => TokenError::Invalid,
        }
    }
}

/// A freshly minted token together with the claims the caller may need to persist
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: i64,
}

pub struct JwtService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    pub fn new(config: &AuthConfig) -> HmsResult<Self> {
        let algorithm = Algorithm::from_str(&config.jwt_algorithm)
            .map_err(|e| HmsError::Configuration(format!("JWT algorithm: {}", e)))?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(HmsError::Configuration(format!(
                "JWT algorithm {} is not an HMAC algorithm",
                config.jwt_algorithm
            )));
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(config.jwt_secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret_key.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
        })
    }

    pub fn issue_access_token(&self, user_id: i32, permissions: Vec<String>) -> HmsResult<IssuedToken> {
        self.issue(user_id, self.access_ttl, Some(permissions), None)
    }

    pub fn issue_refresh_token(&self, user_id: i32) -> HmsResult<IssuedToken> {
        self.issue(user_id, self.refresh_ttl, None, Some(REFRESH_TOKEN_TYPE.to_string()))
    }

    fn issue(
        &self,
        user_id: i32,
        ttl: Duration,
        permissions: Option<Vec<String>>,
        token_type: Option<String>,
    ) -> HmsResult<IssuedToken> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let claims = Claims {
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            sub: Some(user_id.to_string()),
            jti: Some(jti.clone()),
            permissions,
            token_type,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| HmsError::Other(anyhow::anyhow!("token encoding failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at: claims.exp,
        })
    }

    /// Verify signature and expiry. Blacklist checks happen at the caller.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.required_spec_claims.clear();
        validation.required_spec_claims.insert("exp".to_string());

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Verify a refresh token; anything that is not `type = "refresh"` is invalid
    pub fn decode_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.token_type.as_deref() != Some(REFRESH_TOKEN_TYPE) {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}

/// Parse the numeric user id out of the `sub` claim
pub fn subject_user_id(claims: &Claims) -> Option<Result<i32, ()>> {
    claims
        .sub
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i32>().map_err(|_| ()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_with(secret: &str, minutes: i64) -> JwtService {
        let config = AuthConfig {
            jwt_secret_key: secret.to_string(),
            access_token_minutes: minutes,
            ..AuthConfig::default()
        };
        JwtService::new(&config).unwrap()
    }

    #[test]
    fn access_token_round_trip_keeps_permissions() {
        let service = service_with("test-secret-key-for-jwt-validation", 5);
        let issued = service
            .issue_access_token(7, vec!["patient:read".into(), "note:create".into()])
            .unwrap();

        let claims = service.decode(&issued.token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("7"));
        assert_eq!(claims.jti.as_deref(), Some(issued.jti.as_str()));
        assert_eq!(claims.permissions(), ["patient:read", "note:create"]);
        assert!(claims.token_type.is_none());
        assert_eq!(subject_user_id(&claims), Some(Ok(7)));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let service = service_with("test-secret", -5);
        let issued = service.issue_access_token(1, vec![]).unwrap();
        assert_eq!(service.decode(&issued.token).unwrap_err(), TokenError::Expired);
        assert_eq!(
            TokenError::Expired.message(),
            "Token has expired. Please log in again."
        );
    }

    #[test]
    fn wrong_secret_is_a_signature_error() {
        let issuer = service_with("secret-one", 5);
        let verifier = service_with("secret-two", 5);
        let issued = issuer.issue_access_token(1, vec![]).unwrap();
        assert_eq!(
            verifier.decode(&issued.token).unwrap_err(),
            TokenError::BadSignature
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let service = service_with("secret", 5);
        assert_eq!(service.decode("not-a-jwt").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn access_token_is_not_a_refresh_token() {
        let service = service_with("secret", 5);
        let access = service.issue_access_token(3, vec![]).unwrap();
        assert_eq!(
            service.decode_refresh(&access.token).unwrap_err(),
            TokenError::Invalid
        );

        let refresh = service.issue_refresh_token(3).unwrap();
        let claims = service.decode_refresh(&refresh.token).unwrap();
        assert_eq!(claims.token_type.as_deref(), Some("refresh"));
        assert!(claims.permissions().is_empty());
    }
}
