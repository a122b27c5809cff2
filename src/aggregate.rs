//! Regroups persisted reports from provider-major to bar-count-major.

use std::collections::BTreeMap;

use crate::schema::{BenchmarkEntry, PersistedReport};

/// Results for one bar-count, keyed by provider id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportBucket {
    pub bars: usize,
    pub providers: BTreeMap<String, Vec<BenchmarkEntry>>,
}

impl ReportBucket {
    pub fn new(bars: usize) -> Self {
        Self {
            bars,
            providers: BTreeMap::new(),
        }
    }

    pub fn contains_provider(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }

    pub fn entry(&self, provider: &str, case: &str) -> Option<&BenchmarkEntry> {
        self.providers.get(provider)?.iter().find(|e| e.id == case)
    }

    /// Mean latency of `case` for `provider`; `None` if absent or never run.
    pub fn mean(&self, provider: &str, case: &str) -> Option<f64> {
        self.entry(provider, case)?.mean
    }

    pub fn entry_count(&self) -> usize {
        self.providers.values().map(Vec::len).sum()
    }
}

/// Group every benchmark entry by its bar-count, then by originating provider.
pub fn bucket_by_bars(reports: &[PersistedReport]) -> BTreeMap<usize, ReportBucket> {
    let mut buckets: BTreeMap<usize, ReportBucket> = BTreeMap::new();
    for report in reports {
        for entry in &report.benchmarks {
            buckets
                .entry(entry.bars)
                .or_insert_with(|| ReportBucket::new(entry.bars))
                .providers
                .entry(report.id.clone())
                .or_default()
                .push(entry.clone());
        }
    }
    buckets
}
