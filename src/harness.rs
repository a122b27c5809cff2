use std::collections::BTreeMap;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use crate::error::BenchError;

/// Samples preallocated per case; longer runs grow the buffer as they go.
const MAX_RESERVED_SAMPLES: u64 = 1 << 16;

/// Nominal repeat budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }

    /// Nominal trial count before per-case divisors are applied.
    pub fn nominal_count(&self) -> f64 {
        match self {
            Profile::Quick => 100.0,
            Profile::Full => 1_000.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
    pub seed: u64,
    pub progress: bool,
}

impl BenchConfig {
    pub fn harness(&self) -> Harness {
        Harness {
            progress: self.progress,
        }
    }
}

/// One named benchmarked operation and its latency samples in milliseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BenchmarkCase {
    pub id: String,
    pub samples: Vec<f64>,
    pub bars: usize,
    pub options: BTreeMap<String, String>,
}

impl BenchmarkCase {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn runs(&self) -> usize {
        self.samples.len()
    }

    /// Arithmetic mean, `None` when no trial ran.
    pub fn mean(&self) -> Option<f64> {
        mean(&self.samples)
    }

    /// Population standard deviation, `None` when no trial ran.
    pub fn stdev(&self) -> Option<f64> {
        stdev(&self.samples)
    }
}

pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Square root of the mean squared deviation (divides by N).
pub fn stdev(samples: &[f64]) -> Option<f64> {
    let m = mean(samples)?;
    let var = samples.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / samples.len() as f64;
    Some(var.sqrt())
}

/// Truncate a fractional iteration count toward zero.
pub fn trial_count(case_id: &str, iterations: f64) -> Result<u64, BenchError> {
    if !iterations.is_finite() || iterations < 0.0 || iterations >= u64::MAX as f64 {
        return Err(BenchError::InvalidIterations {
            case: case_id.to_string(),
            count: iterations,
        });
    }
    Ok(iterations.trunc() as u64)
}

/// Runs a callback back-to-back and records one wall-clock sample per run.
#[derive(Clone, Debug, Default)]
pub struct Harness {
    pub progress: bool,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(progress: bool) -> Self {
        Self { progress }
    }

    fn progress_bar(&self, case_id: &str, trials: u64) -> Result<ProgressBar, BenchError> {
        if !self.progress {
            return Ok(ProgressBar::hidden());
        }
        let pb = ProgressBar::new(trials);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg:>28} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("=>-"),
        );
        pb.set_message(case_id.to_string());
        Ok(pb)
    }

    /// Time `operation` `trunc(iterations)` times.
    ///
    /// A count that truncates to zero is not an error: the case comes back with no samples
    /// and undefined statistics.
    pub fn run<F>(
        &self,
        case_id: &str,
        iterations: f64,
        mut operation: F,
    ) -> Result<BenchmarkCase, BenchError>
    where
        F: FnMut(),
    {
        let trials = trial_count(case_id, iterations)?;
        let mut case = BenchmarkCase::new(case_id);

        if trials == 0 {
            warn!(case = case_id, iterations, "iteration count truncates to zero trials");
            return Ok(case);
        }

        case.samples.reserve(trials.min(MAX_RESERVED_SAMPLES) as usize);
        let pb = self.progress_bar(case_id, trials)?;

        for _ in 0..trials {
            let start = Instant::now();
            operation();
            let end = Instant::now();

            let sample_ms = end.duration_since(start).as_secs_f64() * 1000.0;
            if sample_ms < 0.0 || sample_ms.is_nan() {
                return Err(BenchError::NegativeSample {
                    case: case_id.to_string(),
                    sample_ms,
                });
            }
            case.samples.push(sample_ms);
            pb.inc(1);
        }
        pb.finish_and_clear();

        debug!(
            case = case_id,
            runs = case.runs(),
            mean_ms = case.mean(),
            stdev_ms = case.stdev(),
            "case finished"
        );
        Ok(case)
    }
}
