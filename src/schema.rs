use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::SchemaError;
use crate::harness::BenchmarkCase;

pub const SCHEMA_VERSION: u32 = 1;

/// Provenance of a run. Older reports may not carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u64,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

/// One persisted case. `mean` and `stdev` are `null` when the case ran zero times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    pub id: String,
    pub runs: usize,
    pub bars: usize,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl From<&BenchmarkCase> for BenchmarkEntry {
    fn from(case: &BenchmarkCase) -> Self {
        Self {
            id: case.id.clone(),
            runs: case.runs(),
            bars: case.bars,
            mean: case.mean(),
            stdev: case.stdev(),
            options: case.options.clone(),
        }
    }
}

impl BenchmarkEntry {
    /// Statistics are null exactly when `runs == 0`, otherwise finite and non-negative.
    pub fn check(&self) -> Result<(), String> {
        if self.runs == 0 {
            return match (self.mean, self.stdev) {
                (None, None) => Ok(()),
                _ => Err("zero-run entry carries statistics".to_string()),
            };
        }
        for (name, value) in [("mean", self.mean), ("stdev", self.stdev)] {
            match value {
                None => return Err(format!("{name} missing for {} runs", self.runs)),
                Some(v) if !v.is_finite() || v < 0.0 => {
                    return Err(format!("{name} {v} is not a non-negative latency"))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedReport {
    pub id: String,
    pub benchmarks: Vec<BenchmarkEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunMeta>,
}

impl PersistedReport {
    pub fn from_cases(id: impl Into<String>, cases: &[BenchmarkCase]) -> Self {
        Self {
            id: id.into(),
            benchmarks: cases.iter().map(BenchmarkEntry::from).collect(),
            run: None,
        }
    }

    pub fn with_run(mut self, run: RunMeta) -> Self {
        self.run = Some(run);
        self
    }
}

/// Artifact location for a provider: one file per provider id.
pub fn report_path(dir: &Path, provider_id: &str) -> PathBuf {
    dir.join(format!("{provider_id}.json"))
}

/// Write `report` to its provider's artifact inside `dir`, replacing any previous one.
pub fn save_report(report: &PersistedReport, dir: &Path) -> Result<PathBuf, SchemaError> {
    fs::create_dir_all(dir)?;
    let path = report_path(dir, &report.id);
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json)?;
    debug!(path = %path.display(), entries = report.benchmarks.len(), "saved report");
    Ok(path)
}

pub fn save(provider_id: &str, cases: &[BenchmarkCase], dir: &Path) -> Result<PathBuf, SchemaError> {
    save_report(&PersistedReport::from_cases(provider_id, cases), dir)
}

pub fn load(path: &Path) -> Result<PersistedReport, SchemaError> {
    let text = fs::read_to_string(path)?;
    let report: PersistedReport =
        serde_json::from_str(&text).map_err(|source| SchemaError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    for entry in &report.benchmarks {
        entry.check().map_err(|reason| SchemaError::InvalidEntry {
            path: path.to_path_buf(),
            case: entry.id.clone(),
            reason,
        })?;
    }
    Ok(report)
}

/// Load every `*.json` report directly inside `dir`, ordered by path.
pub fn load_all(dir: &Path) -> Result<Vec<PersistedReport>, SchemaError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1).follow_links(false) {
        let entry = entry?;
        let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
        if entry.file_type().is_file() && is_json {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();

    paths.iter().map(|p| load(p)).collect()
}
