use crate::executor::RequestExecutor;
use crate::inputs::InputSet;
use crate::stats::{empty_object, StatsSummary};
use libprotocol::RequestMode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Sequential latency of one mode: every input, `repeat` times, one request at a time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModeReport {
    pub mode: String,
    pub fail: u64,
    /// End-to-end latency of successful requests.
    #[serde(default, with = "empty_object")]
    pub latency_stats: Option<StatsSummary>,
    /// Processing time reported by the server, for responses that carry one.
    #[serde(default, with = "empty_object")]
    pub server_stats: Option<StatsSummary>,
}

pub struct ModeBenchmark {
    repeat: usize,
}

impl ModeBenchmark {
    /// A repeat count of 0 is treated as 1.
    pub fn new(repeat: usize) -> Self {
        Self { repeat: repeat.max(1) }
    }

    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// Modes run one after another, in the given order.
    pub async fn run(&self, modes: &[(RequestMode, Arc<dyn RequestExecutor>)], inputs: &InputSet) -> Vec<ModeReport> {
        let mut reports = Vec::with_capacity(modes.len());
        for (mode, executor) in modes {
            reports.push(self.run_mode(*mode, executor.as_ref(), inputs).await);
        }
        reports
    }

    async fn run_mode(&self, mode: RequestMode, executor: &dyn RequestExecutor, inputs: &InputSet) -> ModeReport {
        info!(%mode, inputs = inputs.len(), repeat = self.repeat, "benchmarking mode");
        let mut latencies = Vec::new();
        let mut server = Vec::new();
        let mut fail = 0u64;

        for item in inputs.iter() {
            for _ in 0..self.repeat {
                match executor.execute(item).await {
                    Ok(m) if m.ok => {
                        debug!(%mode, input = %item.name(), latency_ms = m.latency_ms, server_ms = ?m.server_ms, "measured");
                        latencies.push(m.latency_ms);
                        server.extend(m.server_ms);
                    }
                    Ok(m) => {
                        debug!(%mode, input = %item.name(), latency_ms = m.latency_ms, "non-ok response");
                        fail += 1;
                    }
                    Err(e) => {
                        debug!(%mode, input = %item.name(), error = %e, "request failed");
                        fail += 1;
                    }
                }
            }
        }

        let report = ModeReport {
            mode: mode.to_string(),
            fail,
            latency_stats: StatsSummary::summarize(&latencies),
            server_stats: StatsSummary::summarize(&server),
        };
        info!(
            %mode,
            success = latencies.len(),
            fail,
            avg_ms = ?report.latency_stats.as_ref().map(|s| s.avg_ms),
            "mode finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use crate::executor::{Measurement, MockExecutor};
    use crate::inputs::InputItem;
    use async_trait::async_trait;

    fn inputs(n: usize) -> InputSet {
        InputSet::new(
            (0..n)
                .map(|i| InputItem::Features { name: format!("f{i}"), values: vec![i as f64] })
                .collect(),
        )
        .unwrap()
    }

    /// Reports a fixed server time, and fails every input named `f1`.
    struct Timed;

    #[async_trait]
    impl RequestExecutor for Timed {
        async fn execute(&self, item: &InputItem) -> Result<Measurement, ExecutorError> {
            if item.name() == "f1" {
                return Err(ExecutorError::Timeout(10));
            }
            Ok(Measurement { latency_ms: 20.0, ok: true, server_ms: Some(15.0) })
        }
    }

    #[tokio::test]
    async fn it_run_every_input_repeat_times_per_mode() {
        let full = Arc::new(MockExecutor::new("full"));
        let auto = Arc::new(MockExecutor::new("auto"));
        let modes = vec![
            (RequestMode::FullRemote, full.clone() as Arc<dyn RequestExecutor>),
            (RequestMode::Auto, auto.clone() as Arc<dyn RequestExecutor>),
        ];

        let reports = ModeBenchmark::new(3).run(&modes, &inputs(4)).await;

        assert_eq!(reports.iter().map(|r| r.mode.as_str()).collect::<Vec<_>>(), vec!["full_remote", "auto"]);
        assert_eq!(full.calls(), 12);
        assert_eq!(auto.calls(), 12);
        assert_eq!(reports[0].latency_stats.unwrap().count, 12);
        assert!(reports[0].server_stats.is_none());
    }

    #[tokio::test]
    async fn it_split_failures_and_server_timing() {
        let modes = vec![(RequestMode::FullRemote, Arc::new(Timed) as Arc<dyn RequestExecutor>)];
        let reports = ModeBenchmark::new(2).run(&modes, &inputs(3)).await;

        let report = &reports[0];
        assert_eq!(report.fail, 2);
        assert_eq!(report.latency_stats.unwrap().count, 4);
        let server = report.server_stats.unwrap();
        assert_eq!((server.count, server.avg_ms), (4, 15.0));
    }

    #[test]
    fn it_treat_zero_repeat_as_one() {
        assert_eq!(ModeBenchmark::new(0).repeat(), 1);
    }
}
