//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `enrollment_requests_total` - Enrollment requests accepted
//! - `enrollment_withdrawals_total` - Enrollments withdrawn
//! - `enrollment_lottery_runs_total` - Course lotteries committed
//! - `enrollment_seats_granted_total` - Seats granted by lotteries
//! - `enrollment_seats_denied_total` - Requests denied by lotteries
//! - `enrollment_scores_recorded_total` - Scores entered or updated

use prometheus::{IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Enrollment requests accepted
    pub requests_total: IntCounter,

    /// Enrollments withdrawn
    pub withdrawals_total: IntCounter,

    /// Course lotteries committed
    pub lottery_runs_total: IntCounter,

    /// Seats granted
    pub seats_granted_total: IntCounter,

    /// Requests denied
    pub seats_denied_total: IntCounter,

    /// Scores entered or updated
    pub scores_recorded_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        Ok(Self {
            requests_total: counter("enrollment_requests_total", "Enrollment requests accepted")?,
            withdrawals_total: counter("enrollment_withdrawals_total", "Enrollments withdrawn")?,
            lottery_runs_total: counter("enrollment_lottery_runs_total", "Course lotteries committed")?,
            seats_granted_total: counter("enrollment_seats_granted_total", "Seats granted by lotteries")?,
            seats_denied_total: counter("enrollment_seats_denied_total", "Requests denied by lotteries")?,
            scores_recorded_total: counter("enrollment_scores_recorded_total", "Scores entered or updated")?,
            registry,
        })
    }

    /// Record a committed lottery
    pub fn record_lottery(&self, granted: usize, denied: usize) {
        self.lottery_runs_total.inc();
        self.seats_granted_total.inc_by(granted as u64);
        self.seats_denied_total.inc_by(denied as u64);
    }

    /// Render all metrics in the Prometheus text format
    pub fn export(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("requests_total", &self.requests_total.get())
            .field("lottery_runs_total", &self.lottery_runs_total.get())
            .finish_non_exhaustive()
    }
}
