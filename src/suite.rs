//! Runs a provider's declared cases against shared datasets.

use std::collections::HashSet;

use tracing::info;

use crate::dataset::Dataset;
use crate::error::BenchError;
use crate::harness::{BenchmarkCase, Harness};
use crate::provider::Provider;

/// Cases produced by benchmarking one provider.
#[derive(Clone, Debug, PartialEq)]
pub struct SuiteResult {
    pub provider: String,
    pub cases: Vec<BenchmarkCase>,
}

impl SuiteResult {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            cases: Vec::new(),
        }
    }

    /// Checks sample signs and that no `(bars, case)` pair repeats.
    pub fn validate(&self) -> Result<(), BenchError> {
        let mut seen = HashSet::new();
        for case in &self.cases {
            if let Some(&sample_ms) = case.samples.iter().find(|s| !(**s >= 0.0)) {
                return Err(BenchError::NegativeSample {
                    case: case.id.clone(),
                    sample_ms,
                });
            }
            if !seen.insert((case.bars, case.id.as_str())) {
                return Err(BenchError::BarCountConflict {
                    provider: self.provider.clone(),
                    case: case.id.clone(),
                    bars: case.bars,
                });
            }
        }
        Ok(())
    }
}

/// Benchmark every declared case of `provider` against one dataset.
///
/// Cases run one after another in declaration order. Each case's trial count is its
/// iteration expression evaluated against `nominal`.
pub fn run_suite(
    provider: &dyn Provider,
    dataset: &Dataset,
    nominal: f64,
    harness: &Harness,
) -> Result<SuiteResult, BenchError> {
    let specs = provider.cases();

    let mut ids = HashSet::new();
    for spec in &specs {
        if !ids.insert(spec.id.as_str()) {
            return Err(BenchError::DuplicateCase {
                provider: provider.id().to_string(),
                case: spec.id.clone(),
            });
        }
    }

    let bars = dataset.bars();
    info!(provider = provider.id(), bars, cases = specs.len(), "running suite");

    let mut result = SuiteResult::new(provider.id());
    for spec in specs {
        let operation =
            provider
                .operation(&spec.id, dataset)
                .ok_or_else(|| BenchError::UnknownCase {
                    provider: provider.id().to_string(),
                    case: spec.id.clone(),
                })?;

        let mut case = harness.run(&spec.id, spec.iterations(nominal), operation)?;
        case.options = spec.options;

        info!(
            provider = provider.id(),
            case = %case.id,
            runs = case.runs(),
            mean_ms = case.mean(),
            stdev_ms = case.stdev(),
            "case done"
        );
        result.cases.push(case);
    }

    for case in &mut result.cases {
        case.bars = bars;
    }

    result.validate()?;
    Ok(result)
}

/// Run the suite once per dataset and concatenate the cases.
pub fn run_sizes(
    provider: &dyn Provider,
    datasets: &[Dataset],
    nominal: f64,
    harness: &Harness,
) -> Result<SuiteResult, BenchError> {
    let mut combined = SuiteResult::new(provider.id());
    for dataset in datasets {
        let result = run_suite(provider, dataset, nominal, harness)?;
        combined.cases.extend(result.cases);
    }
    combined.validate()?;
    Ok(combined)
}
