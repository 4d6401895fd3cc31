//! Edge gateway and credential authority for the codistrib platform.
//!
//! Two binaries share this crate:
//! - `gateway`: the single entry point for clients. Rate limits, verifies
//!   access tokens, authorizes roles and forwards to downstream services.
//! - `auth-service`: the credential authority. Owns registration, login,
//!   token refresh, logout and token validation.

pub mod auth;
pub mod auth_service;
pub mod blacklist;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod rate_limit;
pub mod redis;
pub mod route_policy;
pub mod utils;
