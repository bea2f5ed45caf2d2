use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Latency summary of one run, in milliseconds.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct StatsSummary {
    pub count: usize,
    pub avg_ms: f64,
    pub median_ms: f64,
    pub p90_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p99_ms: Option<f64>,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl StatsSummary {
    /// `None` for an empty sample set.
    pub fn summarize(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Some(StatsSummary {
            count,
            avg_ms: sum / count as f64,
            median_ms: median(&sorted)?,
            p90_ms: percentile(&sorted, 90.0)?,
            p99_ms: percentile(&sorted, 99.0),
            min_ms: sorted[0],
            max_ms: sorted[count - 1],
        })
    }
}

/// Nearest-rank percentile over an ascending slice: `sorted[floor(p/100 * (n-1))]`,
/// index clamped into the slice. No interpolation, so recorded baselines stay comparable.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let last = sorted.len() - 1;
    let rank = (p / 100.0 * last as f64).floor();
    let idx = if rank.is_nan() || rank < 0.0 {
        0
    } else {
        (rank as usize).min(last)
    };
    Some(sorted[idx])
}

pub fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// (De)serializes an absent summary as `{}`, the shape downstream tooling expects.
pub mod empty_object {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<StatsSummary>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(summary) => summary.serialize(serializer),
            None => serde_json::Map::new().serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<StatsSummary>, D::Error> {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        match value {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
            Some(other) => StatsSummary::deserialize(other)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
