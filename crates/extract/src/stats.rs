use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Running counters for model calls made by an `Extractor`.
#[derive(Default)]
pub struct ExtractionStats {
    ai_extractions: AtomicUsize,
    ai_errors: AtomicUsize,
    partial_extractions: AtomicUsize,
    consolidations: AtomicUsize,
    consolidation_errors: AtomicUsize,
    records_extracted: AtomicUsize,

    // Timing (in microseconds)
    total_extract_time_us: AtomicU64,
}

impl ExtractionStats {
    pub fn record_success(&self, duration: Duration, records: usize, partial: bool) {
        self.ai_extractions.fetch_add(1, Ordering::Relaxed);
        self.records_extracted.fetch_add(records, Ordering::Relaxed);
        if partial {
            self.partial_extractions.fetch_add(1, Ordering::Relaxed);
        }
        self.add_time(duration);
    }

    pub fn record_error(&self, duration: Duration) {
        self.ai_errors.fetch_add(1, Ordering::Relaxed);
        self.add_time(duration);
    }

    pub fn record_consolidation(&self, success: bool) {
        if success {
            self.consolidations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.consolidation_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn add_time(&self, duration: Duration) {
        self.total_extract_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let calls = self.ai_extractions.load(Ordering::Relaxed) + self.ai_errors.load(Ordering::Relaxed);
        let total_us = self.total_extract_time_us.load(Ordering::Relaxed) as f64;

        StatsSnapshot {
            ai_extractions: self.ai_extractions.load(Ordering::Relaxed),
            ai_errors: self.ai_errors.load(Ordering::Relaxed),
            partial_extractions: self.partial_extractions.load(Ordering::Relaxed),
            consolidations: self.consolidations.load(Ordering::Relaxed),
            consolidation_errors: self.consolidation_errors.load(Ordering::Relaxed),
            records_extracted: self.records_extracted.load(Ordering::Relaxed),
            avg_extract_time_ms: if calls > 0 {
                total_us / calls as f64 / 1000.0 // Convert to ms
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub ai_extractions: usize,
    pub ai_errors: usize,
    pub partial_extractions: usize,
    pub consolidations: usize,
    pub consolidation_errors: usize,
    pub records_extracted: usize,
    pub avg_extract_time_ms: f64,
}
