// Request pipeline module - per-request context threaded through the proxy

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::config::ProjectConfig;
use crate::identity::Identity;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Request context carried through the pipeline stages.
///
/// Created per request with a fresh request id; stages fill in the matched
/// project, the asserted identity and the upstream-attempt flag as the
/// request advances.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    client_ip: String,
    origin: Option<String>,
    received_at_ms: u64,
    project: Option<ProjectConfig>,
    identity: Option<Identity>,
    upstream_attempted: bool,
}

impl RequestContext {
    /// Create a fresh context with a unique request ID (UUID v4)
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method: String::new(),
            path: String::new(),
            client_ip: String::new(),
            origin: None,
            received_at_ms: now_ms(),
            project: None,
            identity: None,
            upstream_attempted: false,
        }
    }

    /// Capture the request line and caller facts once they are known
    pub fn set_request_info(
        &mut self,
        method: String,
        path: String,
        client_ip: String,
        origin: Option<String>,
    ) {
        self.method = method;
        self.path = path;
        self.client_ip = client_ip;
        self.origin = origin;
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Milliseconds elapsed since the context was created
    pub fn elapsed_ms(&self) -> u64 {
        now_ms().saturating_sub(self.received_at_ms)
    }

    pub fn set_project(&mut self, project: ProjectConfig) {
        self.project = Some(project);
    }

    pub fn project(&self) -> Option<&ProjectConfig> {
        self.project.as_ref()
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Mark that an upstream call was attempted; only such requests feed
    /// the circuit breaker
    pub fn set_upstream_attempted(&mut self) {
        self.upstream_attempted = true;
    }

    pub fn upstream_attempted(&self) -> bool {
        self.upstream_attempted
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
