// Identity model - the standardized representation of an authenticated caller

use serde::{Deserialize, Serialize};

/// Identity asserted by authentication and propagated to upstreams.
///
/// Every request that reaches the proxy forwarder carries exactly one
/// identity: either one extracted from a verified token, the fixed
/// session-user identity, or the anonymous sentinel for public paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Unique user id (e.g. "u_12345")
    pub id: String,
    /// Role (e.g. "ROLE_USER", "ROLE_ADMIN")
    pub role: String,
    /// Subscription plan (e.g. "FREE", "PRO")
    pub plan: String,
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        plan: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            plan: plan.into(),
        }
    }

    /// Sentinel identity for requests admitted by a public-path rule.
    pub fn anonymous() -> Self {
        Self::new("anonymous", "ROLE_ANONYMOUS", "FREE")
    }

    /// Fixed identity for requests authenticated by a server-held session.
    pub fn session_user() -> Self {
        Self::new("session-user", "ROLE_USER", "FREE")
    }

    /// True when this is the anonymous sentinel (or has no usable id).
    ///
    /// The rate limiter falls back to IP-keyed buckets for such identities.
    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty() || self.id == "anonymous"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_sentinel_values() {
        let identity = Identity::anonymous();
        assert_eq!(identity.id, "anonymous");
        assert_eq!(identity.role, "ROLE_ANONYMOUS");
        assert_eq!(identity.plan, "FREE");
        assert!(identity.is_anonymous());
    }

    #[test]
    fn test_session_user_values() {
        let identity = Identity::session_user();
        assert_eq!(identity.id, "session-user");
        assert_eq!(identity.role, "ROLE_USER");
        assert_eq!(identity.plan, "FREE");
        assert!(!identity.is_anonymous());
    }

    #[test]
    fn test_empty_id_counts_as_anonymous() {
        let identity = Identity::new("", "ROLE_USER", "PRO");
        assert!(identity.is_anonymous());
    }

    #[test]
    fn test_authenticated_identity_is_not_anonymous() {
        let identity = Identity::new("u_123", "ROLE_USER", "PRO");
        assert!(!identity.is_anonymous());
    }
}
