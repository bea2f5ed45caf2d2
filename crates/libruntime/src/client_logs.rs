//! Summary of client performance logs exported by the web front end.
//!
//! Entries are grouped by (mode, resize target, network type). For each group
//! the client total, server total, network time and end-to-end time are
//! summarized separately, each over the entries that reported it.

use crate::error::ReportError;
use crate::stats::{median, percentile};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClientLogEntry {
    pub mode: Option<String>,
    pub client_meta: ClientMeta,
    pub network_info: NetworkInfo,
    pub client_timing: ClientTiming,
    pub server_timing: ServerTiming,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClientMeta {
    /// A size such as `512`, or a label.
    pub resize_target: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NetworkInfo {
    #[serde(rename = "effectiveType")]
    pub effective_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClientTiming {
    pub total_client_ms: Option<f64>,
    pub network_ms: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerTiming {
    pub total_ms: Option<f64>,
    pub predict_ms: Option<f64>,
}

impl ClientLogEntry {
    fn group_key(&self) -> (String, String, String) {
        let resize = match &self.client_meta.resize_target {
            None | Some(Value::Null) => "none".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        (
            self.mode.clone().unwrap_or_else(|| "unknown".to_string()),
            resize,
            self.network_info.effective_type.clone().unwrap_or_else(|| "unknown".to_string()),
        )
    }

    fn server_ms(&self) -> Option<f64> {
        self.server_timing.total_ms.or(self.server_timing.predict_ms)
    }
}

/// Like `StatsSummary`, plus the population standard deviation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MetricStats {
    pub count: usize,
    pub avg: f64,
    pub median: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

impl MetricStats {
    pub fn summarize(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len() as f64;
        let avg = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / n;
        Some(Self {
            count: sorted.len(),
            avg,
            median: median(&sorted)?,
            p90: percentile(&sorted, 90.0)?,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            std: variance.sqrt(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GroupSummary {
    pub mode: String,
    pub resize_target: String,
    pub network_type: String,
    pub samples: usize,
    #[serde(default, with = "empty_metric")]
    pub client_total_stats: Option<MetricStats>,
    #[serde(default, with = "empty_metric")]
    pub server_total_stats: Option<MetricStats>,
    #[serde(default, with = "empty_metric")]
    pub network_ms_stats: Option<MetricStats>,
    #[serde(default, with = "empty_metric")]
    pub end_to_end_stats: Option<MetricStats>,
}

impl GroupSummary {
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.mode, self.resize_target, self.network_type)
    }
}

/// Groups in key order.
pub fn summarize_logs(entries: &[ClientLogEntry]) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<(String, String, String), Vec<&ClientLogEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.group_key()).or_default().push(entry);
    }

    groups
        .into_iter()
        .map(|((mode, resize_target, network_type), entries)| {
            let mut client = Vec::new();
            let mut server = Vec::new();
            let mut network = Vec::new();
            let mut end_to_end = Vec::new();
            for e in &entries {
                let client_ms = e.client_timing.total_client_ms;
                let server_ms = e.server_ms();
                client.extend(client_ms);
                server.extend(server_ms);
                network.extend(e.client_timing.network_ms);
                if let (Some(c), Some(s)) = (client_ms, server_ms) {
                    end_to_end.push(c + s);
                }
            }
            GroupSummary {
                mode,
                resize_target,
                network_type,
                samples: entries.len(),
                client_total_stats: MetricStats::summarize(&client),
                server_total_stats: MetricStats::summarize(&server),
                network_ms_stats: MetricStats::summarize(&network),
                end_to_end_stats: MetricStats::summarize(&end_to_end),
            }
        })
        .collect()
}

pub fn load_logs(path: impl AsRef<Path>) -> Result<Vec<ClientLogEntry>, ReportError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// JSON object keyed by `mode|resize_target|network_type`.
pub fn to_json(groups: &[GroupSummary]) -> Result<String, ReportError> {
    let keyed: BTreeMap<String, &GroupSummary> = groups.iter().map(|g| (g.key(), g)).collect();
    Ok(serde_json::to_string_pretty(&keyed)?)
}

pub const LOGS_CSV_HEADER: &str =
    "mode,resize_target,network_type,samples,avg_client_ms,avg_server_ms,avg_end_to_end_ms,p90_end_to_end_ms";

pub fn to_csv(groups: &[GroupSummary]) -> String {
    let mut out = String::new();
    out.push_str(LOGS_CSV_HEADER);
    out.push('\n');
    for g in groups {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            g.mode,
            g.resize_target,
            g.network_type,
            g.samples,
            cell(g.client_total_stats.map(|s| s.avg)),
            cell(g.server_total_stats.map(|s| s.avg)),
            cell(g.end_to_end_stats.map(|s| s.avg)),
            cell(g.end_to_end_stats.map(|s| s.p90)),
        );
    }
    out
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:?}")).unwrap_or_default()
}

mod empty_metric {
    use super::MetricStats;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<MetricStats>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(stats) => stats.serialize(serializer),
            None => serde_json::Map::new().serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<MetricStats>, D::Error> {
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
            Some(other) => MetricStats::deserialize(other).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LOGS: &str = r#"[
        {"mode": "full_remote", "client_meta": {"resize_target": 512}, "network_info": {"effectiveType": "4g"},
         "client_timing": {"total_client_ms": 100.0, "network_ms": 40.0}, "server_timing": {"total_ms": 50.0}},
        {"mode": "full_remote", "client_meta": {"resize_target": 512}, "network_info": {"effectiveType": "4g"},
         "client_timing": {"total_client_ms": 300.0}, "server_timing": {"predict_ms": 30.0}},
        {"mode": "classify_only", "client_timing": {"total_client_ms": 20.0}},
        {}
    ]"#;

    fn entries() -> Vec<ClientLogEntry> {
        serde_json::from_str(LOGS).unwrap()
    }

    #[test]
    fn it_group_by_mode_resize_and_network() {
        let groups = summarize_logs(&entries());
        let keys: Vec<String> = groups.iter().map(GroupSummary::key).collect();
        assert_eq!(keys, vec!["classify_only|none|unknown", "full_remote|512|4g", "unknown|none|unknown"]);
        assert_eq!(groups[1].samples, 2);
        assert_eq!(groups[2].samples, 1);
        assert!(groups[2].client_total_stats.is_none());
    }

    #[test]
    fn it_fall_back_to_predict_time_and_pair_end_to_end() {
        let groups = summarize_logs(&entries());
        let full = &groups[1];

        let server = full.server_total_stats.unwrap();
        assert_eq!((server.count, server.avg), (2, 40.0));

        let e2e = full.end_to_end_stats.unwrap();
        assert_eq!((e2e.count, e2e.min, e2e.max, e2e.p90), (2, 150.0, 330.0, 150.0));
        assert_eq!(e2e.std, 90.0);

        let network = full.network_ms_stats.unwrap();
        assert_eq!(network.count, 1);
        assert_eq!(network.std, 0.0);
    }

    #[test]
    fn it_write_group_csv() {
        let csv = to_csv(&summarize_logs(&entries()));
        insta::assert_snapshot!(csv.trim_end(), @r"
        mode,resize_target,network_type,samples,avg_client_ms,avg_server_ms,avg_end_to_end_ms,p90_end_to_end_ms
        classify_only,none,unknown,1,20.0,,,
        full_remote,512,4g,2,200.0,40.0,240.0,150.0
        unknown,none,unknown,1,,,,
        ");
    }

    #[test]
    fn it_key_json_summary_and_read_log_file() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("mobile_perf_logs.json");
        fs::write(&path, LOGS)?;

        let groups = summarize_logs(&load_logs(&path)?);
        let json: Value = serde_json::from_str(&to_json(&groups)?)?;
        assert_eq!(json["full_remote|512|4g"]["samples"], 2);
        assert_eq!(json["unknown|none|unknown"]["end_to_end_stats"], serde_json::json!({}));

        fs::write(&path, r#"{"mode": "auto"}"#)?;
        assert!(matches!(load_logs(&path), Err(ReportError::Json(_))));
        Ok(())
    }
}
