use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::UserRole;

// ============================================================================
// Database rows
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserAuth {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub active: bool,
    pub locked: bool,
    pub failed_attempts: i32,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserAuth {
    pub fn role(&self) -> UserRole {
        // Unknown strings cannot appear through the API; treat a corrupted
        // row as the least-privileged role.
        self.role.parse().unwrap_or(UserRole::PersonDi)
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Defaults to PERSON_DI when omitted.
    pub role: Option<UserRole>,
}

/// Login accepts either a username or an email as the identifier.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user_id: String,
    pub role: UserRole,
    pub username: String,
    pub email: String,
}

/// Result of token validation. Never an error: invalid tokens come back as
/// `valid: false` with the claim fields absent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaimsResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

impl TokenClaimsResponse {
    pub fn valid(user_id: String, username: String, email: String, role: UserRole) -> Self {
        Self {
            valid: true,
            user_id: Some(user_id),
            username: Some(username),
            email: Some(email),
            role: Some(role),
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            user_id: None,
            username: None,
            email: None,
            role: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_pair_serializes_camel_case() {
        let pair = TokenPair {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 900,
            user_id: "u".to_string(),
            role: UserRole::PersonDi,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        };
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["accessToken"], "at");
        assert_eq!(json["tokenType"], "Bearer");
        assert_eq!(json["expiresIn"], 900);
        assert_eq!(json["role"], "PERSON_DI");
    }

    #[test]
    fn invalid_claims_omit_fields() {
        let json = serde_json::to_value(TokenClaimsResponse::invalid()).unwrap();
        assert_eq!(json["valid"], false);
        assert!(json.get("userId").is_none());
        assert!(json.get("role").is_none());
    }

    #[test]
    fn corrupted_role_falls_back_to_least_privilege() {
        let user = UserAuth {
            id: Uuid::new_v4(),
            username: "x".to_string(),
            email: "x@example.com".to_string(),
            password_hash: String::new(),
            role: "SUPERUSER".to_string(),
            active: true,
            locked: false,
            failed_attempts: 0,
            last_login_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(user.role(), UserRole::PersonDi);
    }
}
