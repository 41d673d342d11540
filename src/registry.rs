//! Project registry
//!
//! Resolves incoming requests to the configured project owning the longest
//! matching URL path prefix.
//!
//! # Resolution rules
//!
//! A prefix matches a path when the path equals the prefix, or when the path
//! continues past the prefix at a segment boundary (`prefix + "/..."`).
//! `/shop` therefore matches `/shop` and `/shop/items` but not `/shopping`.
//! With nested configurations the longest matching prefix wins, so `/a/b/x`
//! resolves to `/a/b` rather than `/a`.
//!
//! # Performance
//!
//! O(n) over the configured projects per request; the registry is built once
//! at startup and never mutated.

use crate::config::ProjectConfig;

pub struct ProjectRegistry {
    projects: Vec<ProjectConfig>,
}

impl ProjectRegistry {
    pub fn new(projects: Vec<ProjectConfig>) -> Self {
        ProjectRegistry { projects }
    }

    /// Find the project with the longest prefix matching the path
    pub fn resolve(&self, path: &str) -> Option<&ProjectConfig> {
        self.projects
            .iter()
            .filter(|project| prefix_matches(path, &project.prefix))
            .max_by_key(|project| project.prefix.len())
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// True when `path` equals `prefix` or continues past it at a `/` boundary
fn prefix_matches(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Strip the project prefix from a request path for the upstream request.
///
/// An empty remainder becomes `/` so the upstream always sees an absolute
/// path.
pub fn downstream_path(path: &str, prefix: &str) -> String {
    let rest = path.strip_prefix(prefix).unwrap_or(path);
    if rest.is_empty() {
        "/".to_string()
    } else {
        rest.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthType;

    fn project(prefix: &str) -> ProjectConfig {
        ProjectConfig {
            prefix: prefix.to_string(),
            target_url: format!("http://upstream{}:8080", prefix.replace('/', "-")),
            auth_type: AuthType::Token,
            token_secret: None,
            token_public_key: None,
            token_cookie_name: None,
            session_cookie_name: "SESSION".to_string(),
            csrf_required: false,
            public_paths: Vec::new(),
            rate_limit: None,
            circuit_breaker: None,
            time_limiter: None,
        }
    }

    #[test]
    fn test_resolves_matching_prefix() {
        let registry = ProjectRegistry::new(vec![project("/shop")]);
        let resolved = registry.resolve("/shop/items").unwrap();
        assert_eq!(resolved.prefix, "/shop");
    }

    #[test]
    fn test_bare_prefix_matches() {
        let registry = ProjectRegistry::new(vec![project("/shop")]);
        assert!(registry.resolve("/shop").is_some());
    }

    #[test]
    fn test_no_match_yields_none() {
        let registry = ProjectRegistry::new(vec![project("/shop")]);
        assert!(registry.resolve("/api/items").is_none());
    }

    #[test]
    fn test_prefix_does_not_match_mid_segment() {
        let registry = ProjectRegistry::new(vec![project("/shop")]);
        assert!(
            registry.resolve("/shopping/cart").is_none(),
            "/shop must not match /shopping"
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = ProjectRegistry::new(vec![project("/a"), project("/a/b")]);
        let resolved = registry.resolve("/a/b/x").unwrap();
        assert_eq!(resolved.prefix, "/a/b");

        let outer = registry.resolve("/a/c").unwrap();
        assert_eq!(outer.prefix, "/a");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let registry = ProjectRegistry::new(vec![project("/a"), project("/a/b")]);
        let first = registry.resolve("/a/b/x").map(|p| p.prefix.clone());
        let second = registry.resolve("/a/b/x").map(|p| p.prefix.clone());
        assert_eq!(first, second);
    }

    #[test]
    fn test_downstream_path_strips_prefix() {
        assert_eq!(downstream_path("/shop/items", "/shop"), "/items");
        assert_eq!(downstream_path("/shop/items/42", "/shop"), "/items/42");
    }

    #[test]
    fn test_downstream_path_empty_remainder_becomes_root() {
        assert_eq!(downstream_path("/shop", "/shop"), "/");
    }

    #[test]
    fn test_downstream_path_without_prefix_is_unchanged() {
        assert_eq!(downstream_path("/other/x", "/shop"), "/other/x");
    }
}
