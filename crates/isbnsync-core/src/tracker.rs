use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, warn};

/// Periodic progress lines and a closing summary for long loops
/// (catalog pages, sheet rows).
pub struct ProgressTracker {
    total: usize,
    unit: &'static str,
    succeeded: usize,
    unchanged: usize,
    failed: usize,
    start_time: Instant,
    progress_interval: usize,
    last_progress_log: usize,
    error_counts: HashMap<String, usize>,
}

impl ProgressTracker {
    /// * `unit` - what is being counted, e.g. "pages" or "rows"
    /// * `progress_interval` - log progress every N items
    pub fn new(total: usize, unit: &'static str, progress_interval: usize) -> Self {
        if total > 10 || progress_interval < total {
            info!("Starting: {} {} to process", total, unit);
        }
        Self {
            total,
            unit,
            succeeded: 0,
            unchanged: 0,
            failed: 0,
            start_time: Instant::now(),
            progress_interval: progress_interval.max(1),
            last_progress_log: 0,
            error_counts: HashMap::new(),
        }
    }

    pub fn record_succeeded(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_unchanged(&mut self) {
        self.unchanged += 1;
    }

    /// Count a failure grouped under `error_category` in the summary
    pub fn record_failed_with_error(&mut self, error_category: &str) {
        self.failed += 1;
        *self.error_counts.entry(error_category.to_string()).or_insert(0) += 1;
    }

    /// `current` is 1-based
    pub fn log_progress(&mut self, current: usize) {
        if current - self.last_progress_log < self.progress_interval && current != self.total {
            return;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        // Nothing worth reporting for loops that finish instantly
        if elapsed < 0.5 && current < self.total {
            return;
        }
        let rate = if elapsed > 0.0 { current as f64 / elapsed } else { 0.0 };

        info!(
            "Progress: {}/{} {} ({:.2}/sec) | OK: {} | Unchanged: {} | Failed: {}",
            current, self.total, self.unit, rate, self.succeeded, self.unchanged, self.failed
        );
        self.last_progress_log = current;
    }

    pub fn log_summary(&self, operation_name: &str) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if self.failed > 0 {
            warn!(
                "{} completed: {} {} in {:.1}s | OK: {} | Unchanged: {} | Failed: {}",
                operation_name, self.total, self.unit, elapsed, self.succeeded, self.unchanged, self.failed
            );
            let mut entries: Vec<_> = self.error_counts.iter().collect();
            entries.sort_by(|a, b| b.1.cmp(a.1));
            let breakdown: Vec<String> = entries
                .iter()
                .map(|(category, count)| format!("{}: {}", category, count))
                .collect();
            if !breakdown.is_empty() {
                info!("Error breakdown: {}", breakdown.join(", "));
            }
        } else {
            info!(
                "{} completed: {} {} in {:.1}s | OK: {} | Unchanged: {}",
                operation_name, self.total, self.unit, elapsed, self.succeeded, self.unchanged
            );
        }
    }
}
