use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for the calls a draft service makes against the chain
#[derive(Debug, Default)]
pub struct SubmissionMetrics {
    pub deploy_calls: AtomicU64,
    pub start_calls: AtomicU64,
    pub deploy_failures: AtomicU64,
    pub start_failures: AtomicU64,
    pub completions: AtomicU64,
}

impl SubmissionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deploy(&self) {
        self.deploy_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start(&self) {
        self.start_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deploy_failure(&self) {
        self.deploy_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start_failure(&self) {
        self.start_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> SubmissionStats {
        SubmissionStats {
            deploy_calls: self.deploy_calls.load(Ordering::Relaxed),
            start_calls: self.start_calls.load(Ordering::Relaxed),
            deploy_failures: self.deploy_failures.load(Ordering::Relaxed),
            start_failures: self.start_failures.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Submission metrics: deploys={}, starts={}, deploy_failures={}, start_failures={}, completions={}",
            stats.deploy_calls,
            stats.start_calls,
            stats.deploy_failures,
            stats.start_failures,
            stats.completions
        );
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStats {
    pub deploy_calls: u64,
    pub start_calls: u64,
    pub deploy_failures: u64,
    pub start_failures: u64,
    pub completions: u64,
}

/// Time a chain call and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self, success: bool) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            success,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_accumulate() {
        let metrics = SubmissionMetrics::new();
        metrics.record_deploy();
        metrics.record_deploy();
        metrics.record_deploy_failure();
        metrics.record_start();
        metrics.record_completion();

        let stats = metrics.get_stats();
        assert_eq!(stats.deploy_calls, 2);
        assert_eq!(stats.deploy_failures, 1);
        assert_eq!(stats.start_calls, 1);
        assert_eq!(stats.start_failures, 0);
        assert_eq!(stats.completions, 1);
    }
}
