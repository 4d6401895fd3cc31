use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// Roles carried inside access tokens and checked by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "PERSON_DI")]
    PersonDi,
    #[serde(rename = "HELPER")]
    Helper,
    #[serde(rename = "ADMINISTRATOR")]
    Administrator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::PersonDi => "PERSON_DI",
            UserRole::Helper => "HELPER",
            UserRole::Administrator => "ADMINISTRATOR",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PERSON_DI" => Ok(UserRole::PersonDi),
            "HELPER" => Ok(UserRole::Helper),
            "ADMINISTRATOR" => Ok(UserRole::Administrator),
            other => anyhow::bail!("Unknown role: {}", other),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub role: UserRole,
    pub username: String,
    pub email: String,
    pub jti: String, // JWT ID (unique per token)
    pub iat: i64,    // Issued at
    pub exp: i64,    // Expiration time
    pub iss: String, // Issuer
}

/// Verification failure classes. Callers map all three to 401 at the edge
/// but logout treats Expired differently from the other two.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,
    #[error("Token expired")]
    Expired,
    #[error("Bad token signature")]
    BadSignature,
}

/// Signs and verifies HS256 access tokens. Shared verbatim between the
/// gateway and the credential authority so both sides agree on claims.
#[derive(Clone)]
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl_secs: i64,
    issuer: String,
}

impl AuthManager {
    pub fn new(jwt: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt.secret.as_bytes()),
            access_token_ttl_secs: jwt.access_token_ttl_secs,
            issuer: jwt.issuer.clone(),
        }
    }

    pub fn access_token_ttl_secs(&self) -> i64 {
        self.access_token_ttl_secs
    }

    /// Create a short-lived access token. Returns (token, jti, exp).
    pub fn create_token(
        &self,
        user_id: &Uuid,
        role: UserRole,
        username: &str,
        email: &str,
    ) -> Result<(String, String, i64)> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_ttl_secs);
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            username: username.to_string(),
            email: email.to_string(),
            jti: jti.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to encode JWT token")?;

        Ok((token, jti, exp.timestamp()))
    }

    /// Verify a token's signature, issuer and expiry.
    ///
    /// A token whose exp equals the current second is already expired.
    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(classify_jwt_error)?;

        // jsonwebtoken treats exp == now as still valid; the boundary here
        // is exclusive.
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Verify signature and issuer but ignore expiry.
    ///
    /// Used by logout so a client holding an expired access token can still
    /// revoke its refresh token.
    pub fn verify_signature_only(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.validate_exp = false;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(classify_jwt_error)
    }
}

fn classify_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;

    fn test_config(ttl_secs: i64) -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-0123456789".to_string(),
            issuer: "codistrib-auth".to_string(),
            access_token_ttl_secs: ttl_secs,
            refresh_token_ttl_secs: 7 * 86_400,
            header: "authorization".to_string(),
            prefix: "Bearer ".to_string(),
        }
    }

    #[test]
    fn sign_then_verify_round_trip() {
        let manager = AuthManager::new(&test_config(900));
        let user_id = Uuid::new_v4();
        let (token, jti, exp) = manager
            .create_token(&user_id, UserRole::Helper, "alice", "alice@example.com")
            .unwrap();

        let claims = manager.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, UserRole::Helper);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.jti, jti);
        assert_eq!(claims.exp, exp);
        assert_eq!(claims.iss, "codistrib-auth");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let manager = AuthManager::new(&test_config(900));
        let (token, _, _) = manager
            .create_token(&Uuid::new_v4(), UserRole::PersonDi, "bob", "bob@example.com")
            .unwrap();

        // The signature covers the raw header.payload text and is checked
        // before any claim decoding, so changing any one payload character
        // must fail as a signature mismatch, never as anything weaker.
        let parts: Vec<&str> = token.split('.').collect();
        for i in 0..parts[1].len() {
            let mut payload = parts[1].as_bytes().to_vec();
            payload[i] = if payload[i] == b'A' { b'B' } else { b'A' };
            let tampered = format!(
                "{}.{}.{}",
                parts[0],
                String::from_utf8(payload).unwrap(),
                parts[2]
            );
            assert_eq!(
                manager.verify_token(&tampered).unwrap_err(),
                TokenError::BadSignature
            );
        }
    }

    #[test]
    fn wrong_secret_is_bad_signature() {
        let manager = AuthManager::new(&test_config(900));
        let mut other_config = test_config(900);
        other_config.secret = "another-secret-that-is-also-long-enough".to_string();
        let other = AuthManager::new(&other_config);

        let (token, _, _) = manager
            .create_token(&Uuid::new_v4(), UserRole::PersonDi, "bob", "bob@example.com")
            .unwrap();

        assert_eq!(
            other.verify_token(&token).unwrap_err(),
            TokenError::BadSignature
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let manager = AuthManager::new(&test_config(-10));
        let (token, _, _) = manager
            .create_token(&Uuid::new_v4(), UserRole::PersonDi, "bob", "bob@example.com")
            .unwrap();

        assert_eq!(manager.verify_token(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn exactly_at_expiry_is_expired() {
        // TTL of zero puts exp at the current second. The boundary is
        // exclusive, so the token is already invalid.
        let manager = AuthManager::new(&test_config(0));
        let (token, _, _) = manager
            .create_token(&Uuid::new_v4(), UserRole::PersonDi, "bob", "bob@example.com")
            .unwrap();

        assert_eq!(manager.verify_token(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn garbage_token_is_malformed() {
        let manager = AuthManager::new(&test_config(900));
        assert_eq!(
            manager.verify_token("not-a-jwt").unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(
            manager.verify_token("").unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let mut config = test_config(900);
        config.issuer = "someone-else".to_string();
        let other_issuer = AuthManager::new(&config);
        let manager = AuthManager::new(&test_config(900));

        let (token, _, _) = other_issuer
            .create_token(&Uuid::new_v4(), UserRole::PersonDi, "bob", "bob@example.com")
            .unwrap();

        assert_eq!(
            manager.verify_token(&token).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn signature_only_verify_accepts_expired_tokens() {
        let manager = AuthManager::new(&test_config(-10));
        let user_id = Uuid::new_v4();
        let (token, _, _) = manager
            .create_token(&user_id, UserRole::Administrator, "root", "root@example.com")
            .unwrap();

        let claims = manager.verify_signature_only(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
    }

    #[test]
    fn jti_is_unique_per_token() {
        let manager = AuthManager::new(&test_config(900));
        let user_id = Uuid::new_v4();
        let (_, jti1, _) = manager
            .create_token(&user_id, UserRole::PersonDi, "bob", "bob@example.com")
            .unwrap();
        let (_, jti2, _) = manager
            .create_token(&user_id, UserRole::PersonDi, "bob", "bob@example.com")
            .unwrap();
        assert_ne!(jti1, jti2);
    }

    #[test]
    fn role_wire_strings_round_trip() {
        for (role, wire) in [
            (UserRole::PersonDi, "\"PERSON_DI\""),
            (UserRole::Helper, "\"HELPER\""),
            (UserRole::Administrator, "\"ADMINISTRATOR\""),
        ] {
            assert_eq!(serde_json::to_string(&role).unwrap(), wire);
            let parsed: UserRole = serde_json::from_str(wire).unwrap();
            assert_eq!(parsed, role);
        }
        assert!("PERSON_DI".parse::<UserRole>().is_ok());
        assert!("ROLE_PERSON_DI".parse::<UserRole>().is_err());
    }
}
