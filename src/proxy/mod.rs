// Proxy module - Pingora ProxyHttp implementation
// Carries the request pipeline: CORS -> Resolve -> CSRF -> Auth -> RateLimit
// -> Breaker(Forward), with the JSON error envelope on every failure path.

pub mod headers;
pub mod upstream;

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::{ErrorType, Result};
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::{ProxyHttp, Session};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthOutcome, Authenticator};
use crate::circuit_breaker::{BreakerPool, CircuitBreakerConfig, CircuitState};
use crate::config::{Config, ProjectConfig};
use crate::constants::{CSRF_HEADER, UPSTREAM_CONNECT_TIMEOUT_MS};
use crate::cors::CorsPolicy;
use crate::error::{ErrorEnvelope, GatewayError};
use crate::identity::Identity;
use crate::metrics::Metrics;
use crate::pipeline::RequestContext;
use crate::public_path::PublicPathMatcher;
use crate::rate_limit::RateLimiter;
use crate::registry::{downstream_path, ProjectRegistry};
use crate::store::GatewayStore;

use upstream::UpstreamTarget;

/// True for methods that must carry a CSRF token on protected projects
fn is_write_method(method: &str) -> bool {
    matches!(method, "POST" | "PUT" | "PATCH" | "DELETE")
}

/// Map a transport-level upstream failure onto the gateway error taxonomy
fn classify_upstream_error(e: &pingora_core::Error, prefix: &str) -> GatewayError {
    match e.etype() {
        ErrorType::ConnectTimedout
        | ErrorType::ConnectRefused
        | ErrorType::ConnectNoRoute
        | ErrorType::ConnectError => GatewayError::upstream_unreachable(prefix),
        ErrorType::ReadTimedout | ErrorType::WriteTimedout => {
            GatewayError::upstream_timeout(prefix)
        }
        ErrorType::HTTPStatus(code) if *code >= 500 => GatewayError::UpstreamServerError {
            prefix: prefix.to_string(),
            status: *code,
        },
        _ => GatewayError::internal(format!("Upstream call failed: {}", e)),
    }
}

/// ApiGateway implements the Pingora ProxyHttp trait
///
/// Collaborators (authenticator, limiter, breaker pool) are owned here and
/// passed in at construction; the only process-wide state is the immutable
/// configuration snapshot and the lazily-populated breaker pool.
pub struct ApiGateway {
    registry: ProjectRegistry,
    authenticator: Authenticator,
    rate_limiter: RateLimiter,
    breakers: BreakerPool,
    /// Compiled public-path matchers, keyed by project prefix
    public_paths: HashMap<String, PublicPathMatcher>,
    cors: CorsPolicy,
    metrics: Arc<Metrics>,
}

impl ApiGateway {
    pub fn new(config: &Config) -> std::result::Result<Self, GatewayError> {
        let store = Arc::new(
            GatewayStore::new(&config.server.redis_url)
                .map_err(|e| GatewayError::config_invalid(e.to_string()))?,
        );

        let projects: Vec<ProjectConfig> = config.projects.values().cloned().collect();

        let public_paths = projects
            .iter()
            .map(|project| {
                (
                    project.prefix.clone(),
                    PublicPathMatcher::new(&project.public_paths),
                )
            })
            .collect();

        Ok(Self {
            registry: ProjectRegistry::new(projects),
            authenticator: Authenticator::new(Arc::clone(&store)),
            rate_limiter: RateLimiter::new(store),
            breakers: BreakerPool::new(),
            public_paths,
            cors: CorsPolicy::from_config(&config.cors),
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Export gateway counters and breaker states in Prometheus text format
    pub fn export_metrics(&self) -> String {
        let mut output = self.metrics.export_text();

        output.push_str(
            "\n# HELP gateway_breaker_state Circuit breaker state per project (0=closed, 1=open, 2=half-open)\n",
        );
        output.push_str("# TYPE gateway_breaker_state gauge\n");
        for (prefix, state) in self.breakers.snapshot() {
            output.push_str(&format!(
                "gateway_breaker_state{{project=\"{}\"}} {}\n",
                prefix, state as u8
            ));
        }

        output
    }

    /// Breaker settings for a project; every project gets a breaker, the
    /// explicit config only overrides the defaults
    fn breaker_config(project: &ProjectConfig) -> CircuitBreakerConfig {
        project
            .circuit_breaker
            .as_ref()
            .map(|cb| cb.to_breaker_config())
            .unwrap_or_default()
    }

    /// Resolve the client IP: first X-Forwarded-For entry, else the remote
    /// address, else "unknown"
    fn get_client_ip(&self, session: &Session) -> String {
        if let Some(forwarded_for) = session
            .req_header()
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            // X-Forwarded-For can contain multiple IPs: "client, proxy1, proxy2"
            if let Some(client_ip) = forwarded_for.split(',').next() {
                let client_ip = client_ip.trim();
                if !client_ip.is_empty() {
                    return client_ip.to_string();
                }
            }
        }

        session
            .client_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn extract_headers(req: &RequestHeader) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        for (name, value) in req.headers.iter() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(name.to_string(), value_str.to_string());
            }
        }
        headers
    }

    /// Write the standard JSON envelope for a terminal outcome
    async fn send_envelope(
        &self,
        session: &mut Session,
        ctx: &RequestContext,
        error: &GatewayError,
    ) -> Result<()> {
        let status = error.status();
        let envelope = ErrorEnvelope::from_error(error, ctx.path());
        let body = envelope.to_json();

        let mut header = ResponseHeader::build(status, None)?;
        header.insert_header("Content-Type", "application/json")?;
        if let Some(origin) = ctx.origin() {
            if self.cors.origin_allowed(origin) {
                for (name, value) in self.cors.response_headers(origin) {
                    header.insert_header(name, value)?;
                }
            }
        }
        header.insert_header("Content-Length", body.len().to_string())?;

        session
            .write_response_header(Box::new(header), false)
            .await?;
        session
            .write_response_body(Some(body.into()), true)
            .await?;
        Ok(())
    }

    /// Log and answer a terminal pipeline outcome; 4xx logs at warn, 5xx at
    /// error, stack detail never leaves the gateway
    async fn write_error(
        &self,
        session: &mut Session,
        ctx: &RequestContext,
        error: GatewayError,
    ) -> Result<bool> {
        let status = error.status();
        if status >= 500 {
            tracing::error!(
                request_id = %ctx.request_id(),
                path = %ctx.path(),
                status = status,
                error = %error,
                "Gateway error"
            );
        } else {
            tracing::warn!(
                request_id = %ctx.request_id(),
                path = %ctx.path(),
                status = status,
                error = %error,
                "Gateway error"
            );
        }

        self.send_envelope(session, ctx, &error).await?;
        Ok(true) // Request handled
    }

    /// Answer a CORS preflight directly, before the pipeline runs
    async fn write_preflight(&self, session: &mut Session, origin: &str) -> Result<bool> {
        let mut header = ResponseHeader::build(204, None)?;
        for (name, value) in self.cors.preflight_headers(origin) {
            header.insert_header(name, value)?;
        }
        session.write_response_header(Box::new(header), true).await?;
        Ok(true)
    }
}

#[async_trait]
impl ProxyHttp for ApiGateway {
    type CTX = RequestContext;

    /// Create a new request context for each incoming request
    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new()
    }

    /// Run the pipeline stages that can short-circuit before any upstream
    /// work: CORS preflight, project resolution, CSRF, authentication,
    /// rate limiting and breaker admission, in that fixed order.
    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let (method, path, origin) = {
            let req = session.req_header();
            (
                req.method.to_string(),
                req.uri.path().to_string(),
                req.headers
                    .get("origin")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string()),
            )
        };
        let client_ip = self.get_client_ip(session);
        ctx.set_request_info(method.clone(), path.clone(), client_ip.clone(), origin.clone());
        self.metrics.increment_request_count();

        // CORS front filter: preflight is answered here, never proxied
        if method == "OPTIONS" {
            if let Some(origin) = origin.as_deref() {
                if self.cors.origin_allowed(origin) {
                    return self.write_preflight(session, origin).await;
                }

                tracing::warn!(
                    request_id = %ctx.request_id(),
                    origin = %origin,
                    "Preflight from disallowed origin"
                );
                let mut header = ResponseHeader::build(403, None)?;
                header.insert_header("Content-Type", "text/plain")?;
                let body = "Invalid CORS request";
                header.insert_header("Content-Length", body.len().to_string())?;
                session
                    .write_response_header(Box::new(header), false)
                    .await?;
                session
                    .write_response_body(Some(body.into()), true)
                    .await?;
                return Ok(true);
            }
        }

        // 1. Resolve the project by longest matching prefix
        let Some(project) = self.registry.resolve(&path) else {
            return self
                .write_error(session, ctx, GatewayError::routing(&path))
                .await;
        };
        let project = project.clone();
        ctx.set_project(project.clone());

        // 2. CSRF: write methods on protected projects need a token
        if project.csrf_required && is_write_method(&method) {
            let csrf_token = {
                let req = session.req_header();
                req.headers
                    .get(CSRF_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.trim().to_string())
            };
            if csrf_token.as_deref().map_or(true, str::is_empty) {
                return self
                    .write_error(session, ctx, GatewayError::csrf_missing(&path))
                    .await;
            }
        }

        // 3. Authenticate; Absent falls through to the public-path check
        let headers_map = Self::extract_headers(session.req_header());
        let identity = match self.authenticator.authenticate(&headers_map, &project).await {
            AuthOutcome::Authenticated(identity) => {
                self.metrics.increment_auth_success();
                identity
            }
            AuthOutcome::Absent => {
                let is_public = self
                    .public_paths
                    .get(&project.prefix)
                    .map_or(false, |matcher| matcher.matches(&path));

                if is_public {
                    self.metrics.increment_auth_bypassed();
                    Identity::anonymous()
                } else {
                    self.metrics.increment_auth_failure();
                    return self
                        .write_error(session, ctx, GatewayError::auth_missing(&path))
                        .await;
                }
            }
        };
        ctx.set_identity(identity.clone());

        // 4. Rate limit on the (project, subject) fingerprint
        if !self
            .rate_limiter
            .is_allowed(&project, &identity, &client_ip)
            .await
        {
            self.metrics.increment_rate_limited();
            let key = RateLimiter::limiter_key(&project.prefix, &identity, &client_ip);
            return self
                .write_error(session, ctx, GatewayError::rate_limited(key))
                .await;
        }

        // 5. Breaker admission; the forwarder below runs inside the breaker
        let breaker = self
            .breakers
            .get_or_create(&project.prefix, Self::breaker_config(&project));
        if !breaker.should_allow_request() {
            self.metrics.increment_breaker_rejection();
            return self
                .write_error(session, ctx, GatewayError::breaker_open(&project.prefix))
                .await;
        }
        if breaker.state() == CircuitState::HalfOpen {
            breaker.begin_trial();
        }

        Ok(false) // Continue to upstream
    }

    /// Select the upstream peer for the matched project
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let (prefix, target, response_deadline) = {
            let project = ctx.project().ok_or_else(|| {
                pingora_core::Error::explain(
                    ErrorType::InternalError,
                    "No project in request context",
                )
            })?;

            if project.prefix.is_empty() || project.target_url.is_empty() {
                return Err(pingora_core::Error::explain(
                    ErrorType::InternalError,
                    "Project prefix or target URL is empty",
                ));
            }

            let target = UpstreamTarget::parse(&project.target_url).map_err(|e| {
                pingora_core::Error::explain(
                    ErrorType::InternalError,
                    format!("Invalid target URL: {}", e),
                )
            })?;

            let response_deadline = project
                .time_limiter
                .as_ref()
                .map(|tl| Duration::from_millis(tl.timeout_ms));

            (project.prefix.clone(), target, response_deadline)
        };

        let mut peer = Box::new(HttpPeer::new(
            (target.host.clone(), target.port),
            target.use_tls,
            target.host.clone(),
        ));

        // Fixed connect timeout; the response deadline is per-project
        peer.options.connection_timeout =
            Some(Duration::from_millis(UPSTREAM_CONNECT_TIMEOUT_MS));
        if let Some(deadline) = response_deadline {
            peer.options.read_timeout = Some(deadline);
            peer.options.write_timeout = Some(deadline);
        }

        ctx.set_upstream_attempted();

        tracing::debug!(
            request_id = %ctx.request_id(),
            prefix = %prefix,
            upstream = %target.authority(),
            "Selected upstream peer"
        );

        Ok(peer)
    }

    /// Rewrite the upstream request: strip the project prefix, sanitize
    /// headers and inject the verified identity
    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        let project = ctx
            .project()
            .ok_or_else(|| {
                pingora_core::Error::explain(
                    ErrorType::InternalError,
                    "No project in request context",
                )
            })?
            .clone();
        let identity = ctx.identity().cloned().unwrap_or_else(Identity::anonymous);

        let target = UpstreamTarget::parse(&project.target_url).map_err(|e| {
            pingora_core::Error::explain(
                ErrorType::InternalError,
                format!("Invalid target URL: {}", e),
            )
        })?;

        let stripped = downstream_path(ctx.path(), &project.prefix);
        let query = upstream_request.uri.query().map(|q| q.to_string());
        let uri_string = target.upstream_uri(&stripped, query.as_deref());
        let uri = uri_string.parse().map_err(|e: http::uri::InvalidUri| {
            pingora_core::Error::explain(
                ErrorType::InternalError,
                format!("Invalid upstream URI '{}': {}", uri_string, e),
            )
        })?;
        upstream_request.set_uri(uri);

        headers::sanitize_request(upstream_request);
        headers::inject_identity(upstream_request, &identity)?;
        upstream_request.insert_header("Host", target.authority())?;

        tracing::debug!(
            request_id = %ctx.request_id(),
            path = %ctx.path(),
            upstream_uri = %uri_string,
            user = %identity.id,
            "Proxying request upstream"
        );

        Ok(())
    }

    /// Filter response headers streaming back to the client
    fn upstream_response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        headers::sanitize_response(upstream_response);

        if let Some(origin) = ctx.origin() {
            if self.cors.origin_allowed(origin) {
                for (name, value) in self.cors.response_headers(origin) {
                    upstream_response.insert_header(name, value)?;
                }
            }
        }

        Ok(())
    }

    /// Convert transport failures into envelope responses: connect errors
    /// surface as 502, deadline overruns as 504, the rest as 500. A
    /// committed response propagates the error without writing.
    async fn fail_to_proxy(
        &self,
        session: &mut Session,
        e: &pingora_core::Error,
        ctx: &mut Self::CTX,
    ) -> u16 {
        let prefix = ctx
            .project()
            .map(|project| project.prefix.clone())
            .unwrap_or_default();
        let error = classify_upstream_error(e, &prefix);
        let status = error.status();

        tracing::error!(
            request_id = %ctx.request_id(),
            path = %ctx.path(),
            status = status,
            error = %e,
            "Upstream call failed"
        );

        if session.response_written().is_none() {
            if let Err(write_err) = self.send_envelope(session, ctx, &error).await {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    error = %write_err,
                    "Failed to write error envelope"
                );
            }
        } else {
            tracing::warn!(
                request_id = %ctx.request_id(),
                path = %ctx.path(),
                "Response already committed, propagating error without writing"
            );
        }

        status
    }

    /// Record the terminal outcome: feed the breaker for attempted upstream
    /// calls and emit the request completion log line
    async fn logging(
        &self,
        session: &mut Session,
        e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);

        self.metrics.increment_status_count(status_code);

        // Only attempted upstream calls are breaker outcomes; short-circuited
        // requests (404/401/429/breaker-open) never touch the window.
        if ctx.upstream_attempted() {
            if let Some(project) = ctx.project() {
                let breaker = self
                    .breakers
                    .get_or_create(&project.prefix, Self::breaker_config(project));

                // Failures: transport errors, cancellations, deadline overruns
                // and upstream 5xx responses streamed through untouched.
                let failure = e.is_some() || status_code >= 500;
                if failure {
                    breaker.record_failure();
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        prefix = %project.prefix,
                        status_code = status_code,
                        "Circuit breaker recorded failure"
                    );
                } else {
                    breaker.record_success();
                }
            }
        }

        tracing::info!(
            request_id = %ctx.request_id(),
            client_ip = %ctx.client_ip(),
            method = %ctx.method(),
            path = %ctx.path(),
            status_code = status_code,
            duration_ms = ctx.elapsed_ms(),
            "Request completed"
        );
    }
}
