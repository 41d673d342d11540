//! Ant-style public path matching
//!
//! Projects may exempt paths from authentication with Ant-style glob
//! patterns matched against the full request path:
//!
//! - `?` matches one character within a segment
//! - `*` matches any run of characters within a segment
//! - `**` matches any run of characters across segments
//!
//! A trailing `/**` also matches the bare base path, so `/shop/public/**`
//! covers `/shop/public` itself. Patterns are compiled to anchored regexes
//! once at startup; an invalid pattern is logged and skipped rather than
//! failing the whole project.

use regex::Regex;

pub struct PublicPathMatcher {
    patterns: Vec<Regex>,
}

impl PublicPathMatcher {
    pub fn new(patterns: &[String]) -> Self {
        let compiled = patterns
            .iter()
            .filter(|pattern| !pattern.trim().is_empty())
            .filter_map(|pattern| match compile_ant_pattern(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(
                        pattern = %pattern,
                        error = %e,
                        "Invalid public-path pattern, skipping"
                    );
                    None
                }
            })
            .collect();

        PublicPathMatcher { patterns: compiled }
    }

    /// True when the path matches any configured pattern
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|regex| regex.is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Translate an Ant-style glob into an anchored regex
fn compile_ant_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');

    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if bytes.get(i + 1) == Some(&b'*') {
                    // "/**" also covers the bare base path
                    if i > 0 && bytes[i - 1] == b'/' && i + 2 == bytes.len() {
                        translated.pop(); // drop the literal '/'
                        translated.push_str("(/.*)?");
                    } else {
                        translated.push_str(".*");
                    }
                    i += 2;
                } else {
                    translated.push_str("[^/]*");
                    i += 1;
                }
            }
            b'?' => {
                translated.push_str("[^/]");
                i += 1;
            }
            other => {
                let ch = other as char;
                translated.push_str(&regex::escape(&ch.to_string()));
                i += 1;
            }
        }
    }

    translated.push('$');
    Regex::new(&translated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> PublicPathMatcher {
        let owned: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        PublicPathMatcher::new(&owned)
    }

    #[test]
    fn test_literal_pattern_matches_exactly() {
        let m = matcher(&["/shop/health"]);
        assert!(m.matches("/shop/health"));
        assert!(!m.matches("/shop/healthz"));
        assert!(!m.matches("/shop/health/deep"));
    }

    #[test]
    fn test_single_star_stays_within_segment() {
        let m = matcher(&["/shop/*.png"]);
        assert!(m.matches("/shop/logo.png"));
        assert!(!m.matches("/shop/img/logo.png"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let m = matcher(&["/shop/public/**"]);
        assert!(m.matches("/shop/public/a"));
        assert!(m.matches("/shop/public/a/b/c"));
        assert!(m.matches("/shop/public"), "trailing /** covers the base path");
        assert!(!m.matches("/shop/private/a"));
    }

    #[test]
    fn test_question_mark_matches_one_char() {
        let m = matcher(&["/v?/status"]);
        assert!(m.matches("/v1/status"));
        assert!(m.matches("/v2/status"));
        assert!(!m.matches("/v10/status"));
        assert!(!m.matches("/v//status"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let m = matcher(&["/api/v1.0/health"]);
        assert!(m.matches("/api/v1.0/health"));
        assert!(!m.matches("/api/v1x0/health"));
    }

    #[test]
    fn test_empty_and_blank_patterns_skipped() {
        let m = matcher(&["", "   "]);
        assert!(m.is_empty());
        assert!(!m.matches("/anything"));
    }

    #[test]
    fn test_no_patterns_matches_nothing() {
        let m = matcher(&[]);
        assert!(!m.matches("/shop/health"));
    }
}
