// Metrics module - counters for gateway observability
// Thread-safe via atomic operations and mutexes

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Metrics struct tracks request and pipeline outcome counters
pub struct Metrics {
    // Request counters
    request_count: AtomicU64,

    // Status code counters (e.g., 200, 401, 503)
    status_counts: Mutex<HashMap<u16, u64>>,

    // Authentication metrics
    auth_success: AtomicU64,
    auth_failure: AtomicU64,
    auth_bypassed: AtomicU64,

    // Pipeline rejection counters
    rate_limited: AtomicU64,
    breaker_rejections: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            request_count: AtomicU64::new(0),
            status_counts: Mutex::new(HashMap::new()),
            auth_success: AtomicU64::new(0),
            auth_failure: AtomicU64::new(0),
            auth_bypassed: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            breaker_rejections: AtomicU64::new(0),
        }
    }

    /// Increment the total request count
    pub fn increment_request_count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment counter for a specific HTTP status code
    pub fn increment_status_count(&self, status_code: u16) {
        if let Ok(mut counts) = self.status_counts.lock() {
            *counts.entry(status_code).or_insert(0) += 1;
        }
    }

    pub fn increment_auth_success(&self) {
        self.auth_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_auth_failure(&self) {
        self.auth_failure.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a request admitted anonymously through a public path
    pub fn increment_auth_bypassed(&self) {
        self.auth_bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_breaker_rejection(&self) {
        self.breaker_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn status_count(&self, status_code: u16) -> u64 {
        self.status_counts
            .lock()
            .map(|counts| counts.get(&status_code).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn auth_success_count(&self) -> u64 {
        self.auth_success.load(Ordering::Relaxed)
    }

    pub fn auth_failure_count(&self) -> u64 {
        self.auth_failure.load(Ordering::Relaxed)
    }

    pub fn auth_bypassed_count(&self) -> u64 {
        self.auth_bypassed.load(Ordering::Relaxed)
    }

    pub fn rate_limited_count(&self) -> u64 {
        self.rate_limited.load(Ordering::Relaxed)
    }

    pub fn breaker_rejection_count(&self) -> u64 {
        self.breaker_rejections.load(Ordering::Relaxed)
    }

    /// Export counters in Prometheus text format
    pub fn export_text(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP gateway_requests_total Total requests received\n");
        output.push_str("# TYPE gateway_requests_total counter\n");
        output.push_str(&format!(
            "gateway_requests_total {}\n",
            self.request_count()
        ));

        output.push_str("\n# HELP gateway_responses_total Responses by status code\n");
        output.push_str("# TYPE gateway_responses_total counter\n");
        if let Ok(counts) = self.status_counts.lock() {
            let mut entries: Vec<_> = counts.iter().collect();
            entries.sort();
            for (status, count) in entries {
                output.push_str(&format!(
                    "gateway_responses_total{{status=\"{}\"}} {}\n",
                    status, count
                ));
            }
        }

        output.push_str("\n# HELP gateway_auth_outcomes_total Authentication outcomes\n");
        output.push_str("# TYPE gateway_auth_outcomes_total counter\n");
        output.push_str(&format!(
            "gateway_auth_outcomes_total{{outcome=\"success\"}} {}\n",
            self.auth_success_count()
        ));
        output.push_str(&format!(
            "gateway_auth_outcomes_total{{outcome=\"failure\"}} {}\n",
            self.auth_failure_count()
        ));
        output.push_str(&format!(
            "gateway_auth_outcomes_total{{outcome=\"bypassed\"}} {}\n",
            self.auth_bypassed_count()
        ));

        output.push_str("\n# HELP gateway_rate_limited_total Requests rejected by the rate limiter\n");
        output.push_str("# TYPE gateway_rate_limited_total counter\n");
        output.push_str(&format!(
            "gateway_rate_limited_total {}\n",
            self.rate_limited_count()
        ));

        output.push_str("\n# HELP gateway_breaker_rejections_total Requests rejected by open circuit breakers\n");
        output.push_str("# TYPE gateway_breaker_rejections_total counter\n");
        output.push_str(&format!(
            "gateway_breaker_rejections_total {}\n",
            self.breaker_rejection_count()
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = Metrics::new();
        assert_eq!(metrics.request_count(), 0);
        assert_eq!(metrics.status_count(200), 0);
        assert_eq!(metrics.rate_limited_count(), 0);
    }

    #[test]
    fn test_increments_accumulate() {
        let metrics = Metrics::new();
        metrics.increment_request_count();
        metrics.increment_request_count();
        metrics.increment_status_count(401);
        metrics.increment_status_count(401);
        metrics.increment_status_count(200);
        metrics.increment_auth_failure();
        metrics.increment_rate_limited();
        metrics.increment_breaker_rejection();

        assert_eq!(metrics.request_count(), 2);
        assert_eq!(metrics.status_count(401), 2);
        assert_eq!(metrics.status_count(200), 1);
        assert_eq!(metrics.auth_failure_count(), 1);
        assert_eq!(metrics.rate_limited_count(), 1);
        assert_eq!(metrics.breaker_rejection_count(), 1);
    }

    #[test]
    fn test_export_text_contains_counters() {
        let metrics = Metrics::new();
        metrics.increment_request_count();
        metrics.increment_status_count(503);

        let text = metrics.export_text();
        assert!(text.contains("gateway_requests_total 1"));
        assert!(text.contains("gateway_responses_total{status=\"503\"} 1"));
        assert!(text.contains("# TYPE gateway_requests_total counter"));
    }
}
