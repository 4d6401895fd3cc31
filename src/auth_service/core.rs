//! Credential lifecycle logic
//!
//! All token issuance flows through `issue_tokens_for`, so the token pair
//! shape and the refresh token format are identical for register, login and
//! refresh.

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{AuthManager, UserRole};
use crate::blacklist::RevocationStore;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::utils::{validate_email, validate_password_strength, validate_username};

use super::models::{
    LoginRequest, RegisterRequest, TokenClaimsResponse, TokenPair, UserAuth,
};
use super::repo;

pub struct AuthDomainService {
    db: DbPool,
    auth_manager: AuthManager,
    blacklist: RevocationStore,
    refresh_token_ttl_secs: i64,
    max_failed_attempts: i32,
}

impl AuthDomainService {
    pub fn new(
        db: DbPool,
        auth_manager: AuthManager,
        blacklist: RevocationStore,
        refresh_token_ttl_secs: i64,
        max_failed_attempts: i32,
    ) -> Self {
        Self {
            db,
            auth_manager,
            blacklist,
            refresh_token_ttl_secs,
            max_failed_attempts,
        }
    }

    pub fn auth_manager(&self) -> &AuthManager {
        &self.auth_manager
    }

    /// Create a new account and sign it in.
    pub async fn register(&self, cmd: RegisterRequest) -> AppResult<TokenPair> {
        validate_username(&cmd.username)?;
        validate_email(&cmd.email)?;
        validate_password_strength(&cmd.password)?;

        if repo::find_by_email(&self.db, &cmd.email).await?.is_some() {
            return Err(AppError::conflict("email already used"));
        }
        if repo::find_by_username(&self.db, &cmd.username)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("username already used"));
        }

        let password_hash = hash(&cmd.password, DEFAULT_COST)?;
        let role = cmd.role.unwrap_or(UserRole::PersonDi);

        let user =
            repo::insert_user(&self.db, &cmd.username, &cmd.email, &password_hash, role).await?;

        tracing::info!(user_id = %user.id, role = %role, "User registered");
        self.issue_tokens_for(&user).await
    }

    /// Authenticate with a username or email plus password.
    ///
    /// Unknown identifier and wrong password produce the same response so
    /// login cannot be used as an account-existence oracle. Disabled and
    /// locked accounts are rejected before the password is checked.
    pub async fn login(&self, cmd: LoginRequest) -> AppResult<TokenPair> {
        let user = match repo::find_by_email(&self.db, &cmd.identifier).await? {
            Some(user) => Some(user),
            None => repo::find_by_username(&self.db, &cmd.identifier).await?,
        }
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

        if !user.active || user.locked {
            return Err(AppError::forbidden("account disabled or locked"));
        }

        if !verify(&cmd.password, &user.password_hash)? {
            repo::record_failed_attempt(&self.db, user.id, self.max_failed_attempts).await?;
            tracing::warn!(user_id = %user.id, "Failed login attempt");
            return Err(AppError::unauthorized("invalid credentials"));
        }

        repo::record_successful_login(&self.db, user.id).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        self.issue_tokens_for(&user).await
    }

    /// Rotate a refresh token: the presented token is consumed and a fresh
    /// pair is issued. A token can be rotated exactly once.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let mut tx = self.db.begin().await?;

        let user_id = repo::consume_refresh_token(&mut tx, refresh_token)
            .await?
            .ok_or_else(|| AppError::unauthorized("refresh token expired or revoked"))?;

        let user = repo::find_by_id(&self.db, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        let new_refresh = new_refresh_token();
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_ttl_secs);
        repo::insert_refresh_token_tx(&mut tx, &new_refresh, user.id, expires_at).await?;

        tx.commit().await?;

        let (access_token, _, _) = self.auth_manager.create_token(
            &user.id,
            user.role(),
            &user.username,
            &user.email,
        )?;

        tracing::info!(user_id = %user.id, "Refresh token rotated");
        Ok(self.token_pair(&user, access_token, new_refresh))
    }

    /// Revoke both halves of a session.
    ///
    /// The access token only needs a valid signature, not a live expiry, so
    /// a client whose access token already lapsed can still kill its refresh
    /// token. Revoking an unknown refresh token is a no-op, which makes
    /// logout idempotent.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> AppResult<()> {
        let claims = self
            .auth_manager
            .verify_signature_only(access_token)
            .map_err(|e| {
                tracing::warn!(error = %e, "Logout with invalid access token");
                AppError::unauthorized("invalid access token")
            })?;

        self.blacklist.revoke(&claims.jti, claims.exp).await?;
        repo::revoke_refresh_token(&self.db, refresh_token).await?;

        tracing::info!(user_id = %claims.sub, "User logged out");
        Ok(())
    }

    /// Revoke every live refresh token for one user. Returns how many were
    /// revoked.
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> AppResult<u64> {
        let revoked = repo::revoke_all_for_user(&self.db, user_id).await?;
        tracing::info!(user_id = %user_id, revoked = revoked, "All user sessions revoked");
        Ok(revoked)
    }

    /// Inspect an access token. Never errors: any failure, including a
    /// revoked jti, comes back as an invalid result.
    pub async fn validate(&self, access_token: &str) -> TokenClaimsResponse {
        let claims = match self.auth_manager.verify_token(access_token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Token validation failed");
                return TokenClaimsResponse::invalid();
            }
        };

        if self.blacklist.is_revoked(&claims.jti).await {
            return TokenClaimsResponse::invalid();
        }

        TokenClaimsResponse::valid(claims.sub, claims.username, claims.email, claims.role)
    }

    async fn issue_tokens_for(&self, user: &UserAuth) -> AppResult<TokenPair> {
        let (access_token, _, _) = self.auth_manager.create_token(
            &user.id,
            user.role(),
            &user.username,
            &user.email,
        )?;

        let refresh_token = new_refresh_token();
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_ttl_secs);
        repo::insert_refresh_token(&self.db, &refresh_token, user.id, expires_at).await?;

        Ok(self.token_pair(user, access_token, refresh_token))
    }

    fn token_pair(&self, user: &UserAuth, access_token: String, refresh_token: String) -> TokenPair {
        TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.auth_manager.access_token_ttl_secs(),
            user_id: user.id.to_string(),
            role: user.role(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// Refresh tokens are opaque: two random UUIDs joined by a dot. They carry
/// no claims; everything lives in the refresh_tokens table.
fn new_refresh_token() -> String {
    format!("{}.{}", Uuid::new_v4(), Uuid::new_v4())
}
