//! End-to-end runs: suite -> persisted report -> buckets -> charts.

use std::hint::black_box;

use ta_latency_bench::aggregate::bucket_by_bars;
use ta_latency_bench::dataset::{generate_linear, Dataset};
use ta_latency_bench::error::ReportError;
use ta_latency_bench::harness::Harness;
use ta_latency_bench::provider::{CaseSpec, Operation, Provider};
use ta_latency_bench::providers::batch;
use ta_latency_bench::report::{
    diff_chart, mean_chart, render, CaseLabel, ProviderStyle, ReportConfig, Scale,
};
use ta_latency_bench::schema;
use ta_latency_bench::suite::run_suite;
use tempfile::tempdir;

/// Test provider computing batch indicators under an arbitrary id.
struct Named {
    id: &'static str,
    specs: Vec<CaseSpec>,
}

impl Named {
    fn sma_only(id: &'static str) -> Self {
        Self {
            id,
            specs: vec![CaseSpec::new("sma_14").option("length", "14")],
        }
    }
}

impl Provider for Named {
    fn id(&self) -> &str {
        self.id
    }

    fn cases(&self) -> Vec<CaseSpec> {
        self.specs.clone()
    }

    fn operation<'a>(&self, case_id: &str, ds: &'a Dataset) -> Option<Operation<'a>> {
        match case_id {
            "sma_14" => Some(Box::new(move || {
                black_box(batch::sma(&ds.close, 14));
            })),
            "atr_14" => Some(Box::new(move || {
                black_box(batch::atr(&ds.high, &ds.low, &ds.close, 14));
            })),
            _ => None,
        }
    }
}

fn config(baseline: &str, comparators: &[&str]) -> ReportConfig {
    ReportConfig {
        providers: vec![
            ProviderStyle::new("alpha", "Alpha", "red"),
            ProviderStyle::new("beta", "Beta", "green"),
        ],
        cases: vec![
            CaseLabel::new("sma_14", "SMA(14)"),
            CaseLabel::new("atr_14", "ATR(14)"),
        ],
        baseline: baseline.to_string(),
        comparators: comparators.iter().map(|s| s.to_string()).collect(),
        ..ReportConfig::default()
    }
}

#[test]
fn two_providers_share_one_bucket() {
    let dir = tempdir().unwrap();
    let ds = generate_linear(500);
    let harness = Harness::new();

    for provider in [Named::sma_only("alpha"), Named::sma_only("beta")] {
        let result = run_suite(&provider, &ds, 100.0, &harness).unwrap();
        assert_eq!(result.cases[0].runs(), 100);
        schema::save(&result.provider, &result.cases, dir.path()).unwrap();
    }

    let reports = schema::load_all(dir.path()).unwrap();
    assert_eq!(reports.len(), 2);

    let buckets = bucket_by_bars(&reports);
    assert_eq!(buckets.len(), 1);
    let bucket = &buckets[&500];
    assert!(bucket.contains_provider("alpha"));
    assert!(bucket.contains_provider("beta"));

    let chart = mean_chart(bucket, &config("alpha", &["beta"]), Scale::Linear);
    assert_eq!(chart.group_labels, vec!["SMA(14)"]);
    assert_eq!(chart.series.len(), 2);
    assert!(chart.series.iter().all(|s| s.value_for_group(0).is_some()));

    let diff = diff_chart(bucket, &config("alpha", &["beta"])).unwrap();
    let expected = bucket.mean("beta", "sma_14").unwrap() - bucket.mean("alpha", "sma_14").unwrap();
    assert_eq!(diff.series("beta").unwrap().value_for_group(0), Some(expected));
}

#[test]
fn zero_trial_case_is_persisted_and_omitted() {
    let dir = tempdir().unwrap();
    let ds = generate_linear(200);
    let provider = Named {
        id: "alpha",
        specs: vec![CaseSpec::new("sma_14"), CaseSpec::new("atr_14").scaled(100.0)],
    };

    let result = run_suite(&provider, &ds, 1.0, &Harness::new()).unwrap();
    let atr = result.cases.iter().find(|c| c.id == "atr_14").unwrap();
    assert_eq!(atr.runs(), 0);
    assert_eq!(atr.mean(), None);
    assert_eq!(atr.bars, 200);

    let path = schema::save(&result.provider, &result.cases, dir.path()).unwrap();
    let reloaded = schema::load(&path).unwrap();
    let entry = reloaded.benchmarks.iter().find(|e| e.id == "atr_14").unwrap();
    assert_eq!(entry.runs, 0);
    assert_eq!(entry.mean, None);

    let buckets = bucket_by_bars(&[reloaded]);
    let bucket = &buckets[&200];
    let cfg = config("alpha", &["beta"]);
    let chart = mean_chart(bucket, &cfg, Scale::Log10);
    assert_eq!(chart.group_labels, vec!["SMA(14)"]);
    assert_eq!(chart.bar_count(), 1);

    let rendered = render(bucket, &dir.path().join("charts"), &cfg).unwrap();
    assert!(rendered.mean.exists());
    assert!(rendered.diff.is_ok());
}

#[test]
fn missing_baseline_only_fails_the_differential() {
    let dir = tempdir().unwrap();
    let ds = generate_linear(300);
    let result = run_suite(&Named::sma_only("beta"), &ds, 5.0, &Harness::new()).unwrap();
    schema::save(&result.provider, &result.cases, dir.path()).unwrap();

    let buckets = bucket_by_bars(&schema::load_all(dir.path()).unwrap());
    let bucket = &buckets[&300];
    let cfg = config("alpha", &["beta"]);

    assert!(matches!(
        diff_chart(bucket, &cfg),
        Err(ReportError::MissingBaseline { bars: 300, .. })
    ));
    assert_eq!(mean_chart(bucket, &cfg, Scale::Linear).bar_count(), 1);

    let out = dir.path().join("charts");
    let rendered = render(bucket, &out, &cfg).unwrap();
    assert!(out.join("300_mean_time.svg").exists());
    assert!(out.join("300_mean_time_log10.svg").exists());
    assert!(!out.join("300_time_diff.svg").exists());
    assert!(matches!(rendered.diff, Err(ReportError::MissingBaseline { .. })));
}

#[test]
fn log_compression_of_known_means() {
    let values: Vec<f64> = [0.0, 9.0, 99.0].into_iter().map(|v| Scale::Log10.apply(v)).collect();
    assert_eq!(values, vec![0.0, 1.0, 2.0]);
}

#[test]
fn unregistered_provider_is_ignored() {
    let dir = tempdir().unwrap();
    let ds = generate_linear(100);
    for id in ["alpha", "gamma"] {
        let result = run_suite(&Named::sma_only(id), &ds, 2.0, &Harness::new()).unwrap();
        schema::save(&result.provider, &result.cases, dir.path()).unwrap();
    }

    let buckets = bucket_by_bars(&schema::load_all(dir.path()).unwrap());
    let bucket = &buckets[&100];
    assert!(bucket.contains_provider("gamma"));

    let chart = mean_chart(bucket, &config("alpha", &["beta"]), Scale::Linear);
    let ids: Vec<&str> = chart.series.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["alpha"]);
}
