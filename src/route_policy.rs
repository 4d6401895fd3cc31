//! Route classification for the gateway
//!
//! Decides which paths skip authentication entirely and which paths are
//! restricted to a specific role. Patterns are segment globs: a literal
//! segment matches itself, `*` matches exactly one segment, and a trailing
//! `**` matches any remaining suffix (including none).

use crate::auth::UserRole;
use crate::config::RoutesConfig;

#[derive(Clone)]
pub struct RoutePolicy {
    public_routes: Vec<String>,
    role_routes: Vec<(UserRole, Vec<String>)>,
}

impl RoutePolicy {
    pub fn new(routes: &RoutesConfig) -> Self {
        Self {
            public_routes: routes.public_routes.clone(),
            role_routes: routes.role_routes.clone(),
        }
    }

    /// Public paths bypass authentication at the gateway.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_routes.iter().any(|p| matches_pattern(p, path))
    }

    /// Resolve the role a path is restricted to, if any.
    ///
    /// Lists are checked in configuration order and the first matching
    /// pattern wins. Paths in no list are open to any authenticated user.
    pub fn required_role(&self, path: &str) -> Option<UserRole> {
        for (role, patterns) in &self.role_routes {
            if patterns.iter().any(|p| matches_pattern(p, path)) {
                return Some(*role);
            }
        }
        None
    }

    /// Check whether a caller with `role` may access `path`.
    ///
    /// Administrators pass every role restriction.
    pub fn authorize(&self, path: &str, role: UserRole) -> bool {
        match self.required_role(path) {
            None => true,
            Some(_) if role == UserRole::Administrator => true,
            Some(required) => role == required,
        }
    }

    /// Roles permitted on `path`, used to word the Forbidden rejection.
    ///
    /// Restricted paths admit their required role plus Administrator.
    /// Unlisted paths admit every authenticated role.
    pub fn allowed_roles(&self, path: &str) -> Vec<UserRole> {
        match self.required_role(path) {
            None => vec![
                UserRole::PersonDi,
                UserRole::Helper,
                UserRole::Administrator,
            ],
            Some(UserRole::Administrator) => vec![UserRole::Administrator],
            Some(required) => vec![required, UserRole::Administrator],
        }
    }
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // A trailing ** swallows any remaining suffix.
    if let Some((last, prefix)) = pattern_segments.split_last() {
        if *last == "**" {
            return prefix.len() <= path_segments.len()
                && prefix
                    .iter()
                    .zip(path_segments.iter())
                    .all(|(p, s)| segment_matches(p, s));
        }
    }

    pattern_segments.len() == path_segments.len()
        && pattern_segments
            .iter()
            .zip(path_segments.iter())
            .all(|(p, s)| segment_matches(p, s))
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    pattern == "*" || pattern == segment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RoutePolicy {
        RoutePolicy::new(&RoutesConfig {
            public_routes: vec![
                "/api/v1/auth/login".to_string(),
                "/api/v1/auth/register".to_string(),
                "/api/v1/auth/refresh".to_string(),
                "/api/v1/auth/logout".to_string(),
                "/health/**".to_string(),
            ],
            role_routes: vec![
                (
                    UserRole::Administrator,
                    vec!["/api/v1/admin/**".to_string()],
                ),
                (UserRole::Helper, vec!["/api/v1/helpers/**".to_string()]),
                (UserRole::PersonDi, vec!["/api/v1/persons/**".to_string()]),
            ],
        })
    }

    #[test]
    fn literal_public_routes_match_exactly() {
        let p = policy();
        assert!(p.is_public("/api/v1/auth/login"));
        assert!(p.is_public("/api/v1/auth/logout"));
        assert!(!p.is_public("/api/v1/auth/login/extra"));
        assert!(!p.is_public("/api/v1/auth/validate"));
    }

    #[test]
    fn trailing_double_star_matches_any_suffix() {
        let p = policy();
        assert!(p.is_public("/health"));
        assert!(p.is_public("/health/ready"));
        assert!(p.is_public("/health/ready/deep"));
        assert!(!p.is_public("/healthz"));
    }

    #[test]
    fn single_star_matches_one_segment() {
        assert!(matches_pattern("/api/v1/users/*", "/api/v1/users/42"));
        assert!(!matches_pattern("/api/v1/users/*", "/api/v1/users"));
        assert!(!matches_pattern("/api/v1/users/*", "/api/v1/users/42/posts"));
    }

    #[test]
    fn role_restrictions_resolve_in_order() {
        let p = policy();
        assert_eq!(
            p.required_role("/api/v1/admin/users"),
            Some(UserRole::Administrator)
        );
        assert_eq!(
            p.required_role("/api/v1/helpers/me"),
            Some(UserRole::Helper)
        );
        assert_eq!(p.required_role("/api/v1/alerts"), None);
    }

    #[test]
    fn administrator_passes_every_restriction() {
        let p = policy();
        assert!(p.authorize("/api/v1/helpers/me", UserRole::Administrator));
        assert!(p.authorize("/api/v1/persons/42", UserRole::Administrator));
        assert!(p.authorize("/api/v1/admin/users", UserRole::Administrator));
    }

    #[test]
    fn non_matching_role_is_denied() {
        let p = policy();
        assert!(!p.authorize("/api/v1/admin/users", UserRole::Helper));
        assert!(!p.authorize("/api/v1/helpers/me", UserRole::PersonDi));
        assert!(p.authorize("/api/v1/helpers/me", UserRole::Helper));
    }

    #[test]
    fn unlisted_paths_allow_any_authenticated_user() {
        let p = policy();
        assert!(p.authorize("/api/v1/alerts", UserRole::PersonDi));
        assert!(p.authorize("/api/v1/users/42", UserRole::Helper));
    }

    #[test]
    fn allowed_roles_always_include_administrator() {
        let p = policy();
        assert_eq!(
            p.allowed_roles("/api/v1/admin/users"),
            vec![UserRole::Administrator]
        );
        assert_eq!(
            p.allowed_roles("/api/v1/helpers/me"),
            vec![UserRole::Helper, UserRole::Administrator]
        );
        assert_eq!(
            p.allowed_roles("/api/v1/alerts"),
            vec![
                UserRole::PersonDi,
                UserRole::Helper,
                UserRole::Administrator
            ]
        );
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let p = policy();
        assert!(p.is_public("/api/v1/auth/login/"));
        assert_eq!(
            p.required_role("/api/v1/admin/"),
            Some(UserRole::Administrator)
        );
    }
}
