//! Upstream target parsing
//!
//! A project's `target_url` is an absolute base URL. It is parsed into the
//! connection facts Pingora needs (host, port, TLS) plus an optional base
//! path that is prepended to the stripped downstream path when composing
//! the upstream URI.

/// Parsed upstream endpoint for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Base path from the target URL, without a trailing slash ("" if none)
    pub base_path: String,
}

impl UpstreamTarget {
    /// Parse an absolute http(s) base URL
    pub fn parse(target_url: &str) -> Result<Self, String> {
        let (use_tls, rest) = if let Some(rest) = target_url.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = target_url.strip_prefix("http://") {
            (false, rest)
        } else {
            return Err(format!("target URL must be http(s): {}", target_url));
        };

        let (authority, base_path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, format!("/{}", path)),
            None => (rest, String::new()),
        };

        if authority.is_empty() {
            return Err(format!("target URL has no host: {}", target_url));
        }

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port in target URL: {}", target_url))?;
                (host.to_string(), port)
            }
            None => (authority.to_string(), if use_tls { 443 } else { 80 }),
        };

        if host.is_empty() {
            return Err(format!("target URL has no host: {}", target_url));
        }

        Ok(Self {
            host,
            port,
            use_tls,
            base_path: base_path.trim_end_matches('/').to_string(),
        })
    }

    /// Compose the upstream request URI from the stripped downstream path
    /// and the original raw query
    pub fn upstream_uri(&self, downstream_path: &str, query: Option<&str>) -> String {
        let mut uri = format!("{}{}", self.base_path, downstream_path);
        if let Some(query) = query {
            uri.push('?');
            uri.push_str(query);
        }
        uri
    }

    /// Host:port authority for the upstream Host header
    pub fn authority(&self) -> String {
        let default_port = if self.use_tls { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_plain_http_host() {
        let target = UpstreamTarget::parse("http://shop-backend").unwrap();
        assert_eq!(target.host, "shop-backend");
        assert_eq!(target.port, 80);
        assert!(!target.use_tls);
        assert_eq!(target.base_path, "");
    }

    #[test]
    fn test_parses_https_with_port() {
        let target = UpstreamTarget::parse("https://api.internal:8443").unwrap();
        assert_eq!(target.host, "api.internal");
        assert_eq!(target.port, 8443);
        assert!(target.use_tls);
    }

    #[test]
    fn test_parses_base_path_without_trailing_slash() {
        let target = UpstreamTarget::parse("http://backend:8081/api/v2/").unwrap();
        assert_eq!(target.base_path, "/api/v2");
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        assert!(UpstreamTarget::parse("ftp://backend").is_err());
        assert!(UpstreamTarget::parse("backend:8080").is_err());
    }

    #[test]
    fn test_rejects_missing_host() {
        assert!(UpstreamTarget::parse("http://").is_err());
        assert!(UpstreamTarget::parse("http://:8080").is_err());
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(UpstreamTarget::parse("http://backend:notaport").is_err());
        assert!(UpstreamTarget::parse("http://backend:99999").is_err());
    }

    #[test]
    fn test_upstream_uri_composition() {
        let target = UpstreamTarget::parse("http://backend:8081").unwrap();
        assert_eq!(target.upstream_uri("/items", None), "/items");
        assert_eq!(
            target.upstream_uri("/items", Some("page=2&sort=asc")),
            "/items?page=2&sort=asc"
        );
    }

    #[test]
    fn test_upstream_uri_includes_base_path() {
        let target = UpstreamTarget::parse("http://backend:8081/api").unwrap();
        assert_eq!(target.upstream_uri("/items", None), "/api/items");
        assert_eq!(target.upstream_uri("/", None), "/api/");
    }

    #[test]
    fn test_authority_omits_default_ports() {
        assert_eq!(
            UpstreamTarget::parse("http://backend").unwrap().authority(),
            "backend"
        );
        assert_eq!(
            UpstreamTarget::parse("https://backend:443").unwrap().authority(),
            "backend"
        );
        assert_eq!(
            UpstreamTarget::parse("http://backend:8081").unwrap().authority(),
            "backend:8081"
        );
    }
}
