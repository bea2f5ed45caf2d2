use crate::error::ReportError;
use crate::stats::{empty_object, StatsSummary};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Outcome of one load test at one concurrency level. Field names and units
/// are consumed by comparison tooling and must not change.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoadTestResult {
    pub concurrency: usize,
    pub duration_s: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize: Option<String>,
    pub success: u64,
    pub fail: u64,
    pub rps: f64,
    #[serde(default, with = "empty_object")]
    pub latency_stats: Option<StatsSummary>,
}

impl LoadTestResult {
    pub fn total(&self) -> u64 {
        self.success + self.fail
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<LoadTestResult>),
    One(Box<LoadTestResult>),
}

pub fn write_results(path: impl AsRef<Path>, results: &[LoadTestResult]) -> Result<(), ReportError> {
    fs::write(path, serde_json::to_string_pretty(results)?)?;
    Ok(())
}

/// Accepts both a sweep (array) and a single result object.
pub fn load_results(path: impl AsRef<Path>) -> Result<Vec<LoadTestResult>, ReportError> {
    let content = fs::read_to_string(path)?;
    let results = match serde_json::from_str::<OneOrMany>(&content)? {
        OneOrMany::Many(results) => results,
        OneOrMany::One(result) => vec![*result],
    };
    Ok(results)
}

/// Results of one file, labelled by their mode or, failing that, the file stem.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub rows: Vec<LoadTestResult>,
}

pub fn load_datasets<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Dataset>, ReportError> {
    paths
        .iter()
        .map(|p| {
            let path = p.as_ref();
            let rows = load_results(path)?;
            let label = rows
                .iter()
                .rev()
                .find_map(|r| r.mode.clone())
                .unwrap_or_else(|| {
                    path.file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default()
                });
            Ok(Dataset { label, rows })
        })
        .collect()
}

pub const CSV_HEADER: &str = "dataset,concurrency,rps,avg_ms,p90_ms,p99_ms";

/// One row per result; absent latency figures are left empty. Numbers keep
/// their decimal point (`99.0`, not `99`).
pub fn to_csv(datasets: &[Dataset]) -> String {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');
    for ds in datasets {
        for r in &ds.rows {
            let stats = r.latency_stats.as_ref();
            let _ = writeln!(
                out,
                "{},{},{:?},{},{},{}",
                ds.label,
                r.concurrency,
                r.rps,
                cell(stats.map(|s| s.avg_ms)),
                cell(stats.map(|s| s.p90_ms)),
                cell(stats.and_then(|s| s.p99_ms)),
            );
        }
    }
    out
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:?}")).unwrap_or_default()
}

pub fn write_csv(datasets: &[Dataset], out_path: impl AsRef<Path>) -> Result<(), ReportError> {
    if let Some(parent) = out_path.as_ref().parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(out_path, to_csv(datasets))?;
    Ok(())
}
