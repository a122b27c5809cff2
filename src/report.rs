//! Comparative charts for one bar-count bucket.
//!
//! Two views are produced per bucket: mean latency per case across providers (raw or
//! `log10(v + 1)` compressed) and the latency differential of each comparator against
//! the baseline provider. Providers and cases not listed in [`ReportConfig`] are left
//! out of both views, and any missing or never-run value is simply not drawn.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::aggregate::ReportBucket;
use crate::chart::{Bar, BarChart, Series, Span};
use crate::error::ReportError;

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStyle {
    pub id: String,
    pub label: String,
    pub color: String,
}

impl ProviderStyle {
    pub fn new(id: &str, label: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseLabel {
    pub id: String,
    pub label: String,
}

impl CaseLabel {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
        }
    }
}

/// Lower bound a maximum must clear for a tick rule to apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    Above(f64),
    AtLeast(f64),
}

impl Threshold {
    pub fn admits(&self, value: f64) -> bool {
        match *self {
            Threshold::Above(t) => value > t,
            Threshold::AtLeast(t) => value >= t,
        }
    }
}

/// Ordered `(threshold, increment)` rules; the first rule admitting the maximum plotted
/// value wins.
#[derive(Debug, Clone, PartialEq)]
pub struct TickTable {
    pub rules: Vec<(Threshold, f64)>,
    pub fallback: f64,
}

impl TickTable {
    pub fn increment(&self, max_value: f64) -> f64 {
        self.rules
            .iter()
            .find(|(threshold, _)| threshold.admits(max_value))
            .map(|(_, inc)| *inc)
            .unwrap_or(self.fallback)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scale {
    Linear,
    /// `log10(v + 1)`: zero stays zero, long tails are compressed.
    Log10,
}

impl Scale {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Scale::Linear => value,
            Scale::Log10 => (value + 1.0).log10(),
        }
    }
}

/// Labels, colors, whitelists and axis rules for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Registration order fixes bar order within a group.
    pub providers: Vec<ProviderStyle>,
    /// Displayed cases, in axis order.
    pub cases: Vec<CaseLabel>,
    pub baseline: String,
    pub comparators: Vec<String>,
    pub bar_width: f64,
    pub width: u32,
    pub height: u32,
    pub linear_ticks: TickTable,
    pub log_ticks: TickTable,
    pub diff_ticks: TickTable,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderStyle::new("incremental", "Incremental", "red"),
                ProviderStyle::new("batch", "Batch", "green"),
                ProviderStyle::new("naive", "Naive", "blue"),
            ],
            cases: vec![
                CaseLabel::new("sma_14", "SMA(14)"),
                CaseLabel::new("ema_14", "EMA(14)"),
                CaseLabel::new("rsi_14", "RSI(14)"),
                CaseLabel::new("stoch_14", "STOCH(14)"),
                CaseLabel::new("atr_14", "ATR(14)"),
                CaseLabel::new("macd_12_26", "MACD(12, 26)"),
                CaseLabel::new("macd_12_26_rsi_14", "MACD(12, 26) + RSI(14)"),
            ],
            baseline: "incremental".to_string(),
            comparators: vec!["batch".to_string(), "naive".to_string()],
            bar_width: 0.1,
            width: 3000,
            height: 1200,
            linear_ticks: TickTable {
                rules: vec![
                    (Threshold::Above(100.0), 250.0),
                    (Threshold::Above(5.0), 0.25),
                ],
                fallback: 1.0,
            },
            // Same raw-ms thresholds as the linear table, expressed in log10(v + 1).
            log_ticks: TickTable {
                rules: vec![
                    (Threshold::Above(101f64.log10()), 0.1),
                    (Threshold::Above(6f64.log10()), 0.025),
                ],
                fallback: 1.0,
            },
            diff_ticks: TickTable {
                rules: vec![(Threshold::AtLeast(10.0), 2.5)],
                fallback: 0.025,
            },
        }
    }
}

impl ReportConfig {
    pub fn provider(&self, id: &str) -> Option<&ProviderStyle> {
        self.providers.iter().find(|p| p.id == id)
    }

    fn case_ticks(&self, groups: usize, series: usize) -> Vec<f64> {
        let offset = self.bar_width * series.saturating_sub(1) as f64 / 2.0;
        (0..groups).map(|g| g as f64 + offset).collect()
    }
}

/// Registered providers present in the bucket, in registration order.
fn drawn_providers<'a>(bucket: &ReportBucket, config: &'a ReportConfig) -> Vec<&'a ProviderStyle> {
    for id in bucket.providers.keys() {
        if config.provider(id).is_none() {
            debug!(provider = %id, bars = bucket.bars, "provider not registered, skipped");
        }
    }
    config
        .providers
        .iter()
        .filter(|p| bucket.contains_provider(&p.id))
        .collect()
}

fn defined_mean(bucket: &ReportBucket, provider: &str, case: &str) -> Option<f64> {
    let mean = bucket.mean(provider, case);
    if mean.is_none() {
        debug!(provider, case, bars = bucket.bars, "no data, omitted");
    }
    mean
}

/// Grouped bar chart of mean latency per displayed case.
pub fn mean_chart(bucket: &ReportBucket, config: &ReportConfig, scale: Scale) -> BarChart {
    let providers = drawn_providers(bucket, config);

    // provider id -> case id -> mean, defined values only
    let mut means: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    for p in &providers {
        for case in &config.cases {
            if let Some(m) = defined_mean(bucket, &p.id, &case.id) {
                means.entry(p.id.as_str()).or_default().insert(case.id.as_str(), m);
            }
        }
    }

    let providers: Vec<&ProviderStyle> = providers
        .into_iter()
        .filter(|p| means.contains_key(p.id.as_str()))
        .collect();

    let groups: Vec<&CaseLabel> = config
        .cases
        .iter()
        .filter(|c| means.values().any(|m| m.contains_key(c.id.as_str())))
        .collect();

    let mut max_plotted: f64 = 0.0;
    let series: Vec<Series> = providers
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let bars = groups
                .iter()
                .enumerate()
                .filter_map(|(g, case)| {
                    let raw = means.get(p.id.as_str())?.get(case.id.as_str())?;
                    let value = scale.apply(*raw);
                    max_plotted = max_plotted.max(value);
                    Some(Bar {
                        group: g,
                        x: g as f64 + i as f64 * config.bar_width,
                        value,
                    })
                })
                .collect();
            Series {
                id: p.id.clone(),
                label: p.label.clone(),
                color: p.color.clone(),
                bars,
            }
        })
        .collect();

    let (ticks, y_label) = match scale {
        Scale::Linear => (&config.linear_ticks, "Mean Time (ms)"),
        Scale::Log10 => (&config.log_ticks, "log10 Mean Time (ms)"),
    };

    BarChart {
        title: format!("Mean time for {} bars", bucket.bars),
        y_label: y_label.to_string(),
        group_labels: groups.iter().map(|c| c.label.clone()).collect(),
        group_ticks: config.case_ticks(groups.len(), series.len()),
        bar_width: config.bar_width,
        series,
        tick_increment: ticks.increment(max_plotted),
        spans: Vec::new(),
        reference_line: None,
        width: config.width,
        height: config.height,
    }
}

/// Grouped bar chart of `comparator_mean - baseline_mean` per displayed case.
///
/// Fails when the baseline provider has no results in the bucket.
pub fn diff_chart(bucket: &ReportBucket, config: &ReportConfig) -> Result<BarChart, ReportError> {
    if !bucket.contains_provider(&config.baseline) {
        return Err(ReportError::MissingBaseline {
            baseline: config.baseline.clone(),
            bars: bucket.bars,
        });
    }

    let comparators: Vec<&ProviderStyle> = config
        .comparators
        .iter()
        .filter(|id| **id != config.baseline)
        .filter_map(|id| match config.provider(id) {
            Some(style) if bucket.contains_provider(id) => Some(style),
            Some(_) => {
                debug!(provider = %id, bars = bucket.bars, "comparator absent, omitted");
                None
            }
            None => {
                debug!(provider = %id, "comparator not registered, skipped");
                None
            }
        })
        .collect();

    // comparator id -> case id -> diff, comparators without any diff dropped
    let mut per_comparator: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    for p in &comparators {
        for case in &config.cases {
            let Some(base) = defined_mean(bucket, &config.baseline, &case.id) else {
                continue;
            };
            if let Some(m) = defined_mean(bucket, &p.id, &case.id) {
                per_comparator
                    .entry(p.id.as_str())
                    .or_default()
                    .insert(case.id.as_str(), m - base);
            }
        }
    }
    let comparators: Vec<&ProviderStyle> = comparators
        .into_iter()
        .filter(|p| per_comparator.contains_key(p.id.as_str()))
        .collect();

    // (comparator index, case id) -> diff
    let mut diffs: BTreeMap<(usize, &str), f64> = BTreeMap::new();
    for (i, p) in comparators.iter().enumerate() {
        if let Some(cases) = per_comparator.get(p.id.as_str()) {
            for (case, d) in cases {
                diffs.insert((i, *case), *d);
            }
        }
    }

    let groups: Vec<&CaseLabel> = config
        .cases
        .iter()
        .filter(|c| diffs.keys().any(|(_, id)| *id == c.id))
        .collect();

    let series: Vec<Series> = comparators
        .iter()
        .enumerate()
        .map(|(i, p)| Series {
            id: p.id.clone(),
            label: p.label.clone(),
            color: p.color.clone(),
            bars: groups
                .iter()
                .enumerate()
                .filter_map(|(g, case)| {
                    diffs.get(&(i, case.id.as_str())).map(|d| Bar {
                        group: g,
                        x: g as f64 + i as f64 * config.bar_width,
                        value: *d,
                    })
                })
                .collect(),
        })
        .collect();

    let min = diffs.values().copied().fold(f64::INFINITY, f64::min);
    let max = diffs.values().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut spans = Vec::new();
    if max > 0.0 {
        spans.push(Span {
            from: 0.0,
            to: max,
            color: "green".to_string(),
            opacity: 0.08,
        });
    }
    if min < 0.0 {
        spans.push(Span {
            from: min,
            to: 0.0,
            color: "red".to_string(),
            opacity: 0.08,
        });
    }

    Ok(BarChart {
        title: format!("Time difference for {} bars", bucket.bars),
        y_label: "Time difference (ms)".to_string(),
        group_labels: groups.iter().map(|c| c.label.clone()).collect(),
        group_ticks: config.case_ticks(groups.len(), series.len()),
        bar_width: config.bar_width,
        series,
        tick_increment: config.diff_ticks.increment(if max.is_finite() { max } else { 0.0 }),
        spans,
        reference_line: Some(0.0),
        width: config.width,
        height: config.height,
    })
}

/// Artifact file name for a bucket and chart kind.
pub fn chart_file_name(bars: usize, kind: &str) -> String {
    format!("{bars}_{kind}.svg")
}

/// Files written for one bucket. The differential chart fails on its own.
#[derive(Debug)]
pub struct RenderedBucket {
    pub bars: usize,
    pub mean: PathBuf,
    pub mean_log10: PathBuf,
    pub diff: Result<PathBuf, ReportError>,
}

pub fn render(
    bucket: &ReportBucket,
    out_dir: &Path,
    config: &ReportConfig,
) -> Result<RenderedBucket, ReportError> {
    std::fs::create_dir_all(out_dir)?;

    let mean = out_dir.join(chart_file_name(bucket.bars, "mean_time"));
    mean_chart(bucket, config, Scale::Linear).save(&mean)?;

    let mean_log10 = out_dir.join(chart_file_name(bucket.bars, "mean_time_log10"));
    mean_chart(bucket, config, Scale::Log10).save(&mean_log10)?;

    let diff = diff_chart(bucket, config).and_then(|chart| {
        let path = out_dir.join(chart_file_name(bucket.bars, "time_diff"));
        chart.save(&path)?;
        Ok(path)
    });
    if let Err(e) = &diff {
        warn!(bars = bucket.bars, error = %e, "differential chart not produced");
    }

    info!(bars = bucket.bars, dir = %out_dir.display(), "rendered bucket");
    Ok(RenderedBucket {
        bars: bucket.bars,
        mean,
        mean_log10,
        diff,
    })
}

/// Render every bucket in bar-count order.
pub fn render_all(
    buckets: &BTreeMap<usize, ReportBucket>,
    out_dir: &Path,
    config: &ReportConfig,
) -> Result<Vec<RenderedBucket>, ReportError> {
    buckets
        .values()
        .map(|bucket| render(bucket, out_dir, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BenchmarkEntry;

    fn bucket(bars: usize, rows: &[(&str, &str, Option<f64>)]) -> ReportBucket {
        let mut b = ReportBucket::new(bars);
        for (provider, case, mean) in rows {
            b.providers
                .entry(provider.to_string())
                .or_default()
                .push(BenchmarkEntry {
                    id: case.to_string(),
                    runs: if mean.is_some() { 5 } else { 0 },
                    bars,
                    mean: *mean,
                    stdev: mean.map(|_| 0.0),
                    options: BTreeMap::new(),
                });
        }
        b
    }

    #[test]
    fn test_log_scale_compression() {
        let out: Vec<f64> = [0.0, 9.0, 99.0].iter().map(|v| Scale::Log10.apply(*v)).collect();
        assert_eq!(out, vec![0.0, 1.0, 2.0]);
        assert_eq!(Scale::Linear.apply(42.5), 42.5);
    }

    #[test]
    fn test_mean_chart_orders_by_registration() {
        let b = bucket(
            100,
            &[
                ("naive", "sma_14", Some(3.0)),
                ("incremental", "sma_14", Some(1.0)),
                ("incremental", "ema_14", Some(1.5)),
                ("batch", "ema_14", Some(0.5)),
            ],
        );
        let chart = mean_chart(&b, &ReportConfig::default(), Scale::Linear);

        let ids: Vec<&str> = chart.series.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["incremental", "batch", "naive"]);
        assert_eq!(chart.group_labels, vec!["SMA(14)", "EMA(14)"]);

        let naive = chart.series("naive").unwrap();
        assert_eq!(naive.bars.len(), 1);
        assert_eq!(naive.bars[0].value, 3.0);
        assert!((naive.bars[0].x - 0.2).abs() < 1e-12);
        assert_eq!(chart.series("batch").unwrap().value_for_group(0), None);
        assert_eq!(chart.tick_increment, 1.0);
    }

    #[test]
    fn test_mean_chart_skips_unregistered_and_undefined() {
        let b = bucket(
            100,
            &[
                ("incremental", "sma_14", Some(1.0)),
                ("incremental", "atr_14", None),
                ("mystery", "sma_14", Some(0.1)),
                ("incremental", "dmi_14", Some(7.0)),
            ],
        );
        let chart = mean_chart(&b, &ReportConfig::default(), Scale::Linear);
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.group_labels, vec!["SMA(14)"]);
        assert_eq!(chart.bar_count(), 1);
    }

    #[test]
    fn test_adaptive_ticks() {
        let config = ReportConfig::default();
        let big = bucket(1, &[("incremental", "sma_14", Some(150.0))]);
        let mid = bucket(1, &[("incremental", "sma_14", Some(50.0))]);
        let small = bucket(1, &[("incremental", "sma_14", Some(2.0))]);

        assert_eq!(mean_chart(&big, &config, Scale::Linear).tick_increment, 250.0);
        assert_eq!(mean_chart(&big, &config, Scale::Log10).tick_increment, 0.1);
        assert_eq!(mean_chart(&mid, &config, Scale::Linear).tick_increment, 0.25);
        assert_eq!(mean_chart(&mid, &config, Scale::Log10).tick_increment, 0.025);
        assert_eq!(mean_chart(&small, &config, Scale::Linear).tick_increment, 1.0);
        assert_eq!(mean_chart(&small, &config, Scale::Log10).tick_increment, 1.0);
    }

    #[test]
    fn test_diff_chart_values_and_shading() {
        let b = bucket(
            100,
            &[
                ("incremental", "sma_14", Some(2.0)),
                ("incremental", "ema_14", Some(3.0)),
                ("batch", "sma_14", Some(5.0)),
                ("batch", "ema_14", Some(1.0)),
                ("naive", "sma_14", Some(14.0)),
            ],
        );
        let chart = diff_chart(&b, &ReportConfig::default()).unwrap();

        let ids: Vec<&str> = chart.series.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["batch", "naive"]);
        let batch = chart.series("batch").unwrap();
        assert_eq!(batch.value_for_group(0), Some(3.0));
        assert_eq!(batch.value_for_group(1), Some(-2.0));
        assert_eq!(chart.series("naive").unwrap().value_for_group(0), Some(12.0));

        assert_eq!(chart.reference_line, Some(0.0));
        assert_eq!(chart.spans.len(), 2);
        assert_eq!((chart.spans[0].from, chart.spans[0].to), (0.0, 12.0));
        assert_eq!((chart.spans[1].from, chart.spans[1].to), (-2.0, 0.0));
        assert_eq!(chart.tick_increment, 2.5);
    }

    #[test]
    fn test_diff_chart_never_includes_baseline() {
        let mut config = ReportConfig::default();
        config.comparators.push("incremental".to_string());
        let b = bucket(
            10,
            &[
                ("incremental", "sma_14", Some(1.0)),
                ("batch", "sma_14", Some(1.25)),
            ],
        );
        let chart = diff_chart(&b, &config).unwrap();
        assert!(chart.series("incremental").is_none());
        assert_eq!(chart.tick_increment, 0.025);
    }

    #[test]
    fn test_diff_ticks_inclusive_at_ten() {
        let at_ten = bucket(
            10,
            &[
                ("incremental", "sma_14", Some(1.0)),
                ("batch", "sma_14", Some(11.0)),
            ],
        );
        let below = bucket(
            10,
            &[
                ("incremental", "sma_14", Some(1.0)),
                ("batch", "sma_14", Some(10.5)),
            ],
        );
        let config = ReportConfig::default();
        assert_eq!(diff_chart(&at_ten, &config).unwrap().tick_increment, 2.5);
        assert_eq!(diff_chart(&below, &config).unwrap().tick_increment, 0.025);
        assert_eq!(config.linear_ticks.increment(100.0), 0.25);
    }

    #[test]
    fn test_providers_without_values_get_no_series() {
        let b = bucket(
            10,
            &[
                ("incremental", "sma_14", Some(1.0)),
                ("batch", "sma_14", None),
                ("naive", "sma_14", Some(2.0)),
                ("naive", "ema_14", Some(3.0)),
            ],
        );
        let config = ReportConfig::default();
        let chart = mean_chart(&b, &config, Scale::Linear);
        let ids: Vec<&str> = chart.series.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["incremental", "naive"]);
        assert!((chart.series("naive").unwrap().bars[0].x - 0.1).abs() < 1e-12);
        assert!((chart.group_ticks[0] - 0.05).abs() < 1e-12);

        let diff = diff_chart(&b, &config).unwrap();
        let ids: Vec<&str> = diff.series.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["naive"]);
        assert_eq!(diff.group_ticks, vec![0.0]);
        assert_eq!(diff.series[0].bars[0].x, 0.0);
    }

    #[test]
    fn test_missing_baseline() {
        let b = bucket(10, &[("batch", "sma_14", Some(1.0))]);
        let err = diff_chart(&b, &ReportConfig::default()).unwrap_err();
        assert!(matches!(err, ReportError::MissingBaseline { bars: 10, .. }));
        assert_eq!(mean_chart(&b, &ReportConfig::default(), Scale::Linear).bar_count(), 1);
    }

    #[test]
    fn test_render_writes_named_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let b = bucket(
            250,
            &[
                ("incremental", "sma_14", Some(1.0)),
                ("batch", "sma_14", Some(0.5)),
            ],
        );
        let rendered = render(&b, dir.path(), &ReportConfig::default()).unwrap();
        assert_eq!(rendered.mean, dir.path().join("250_mean_time.svg"));
        assert_eq!(rendered.mean_log10, dir.path().join("250_mean_time_log10.svg"));
        assert_eq!(
            rendered.diff.as_ref().unwrap(),
            &dir.path().join("250_time_diff.svg")
        );
        assert!(rendered.mean.exists() && rendered.mean_log10.exists());
    }
}
