pub mod advisor;
pub mod benchmark;
pub mod client_logs;
pub mod coordinator;
pub mod cpu;
pub mod error;
pub mod events;
pub mod executor;
pub mod inputs;
pub mod report;
pub mod stats;
pub mod sweep;
pub mod telemetry;
pub mod window;
mod worker;

use crate::events::{Event, EventSink};
use crate::executor::{HttpExecutor, MockExecutor, RequestExecutor};
use libprotocol::{LoadTest, Profile, RequestMode};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use crate::advisor::{AdvisoryDecision, Advisor, RoutingMode};
pub use crate::benchmark::{ModeBenchmark, ModeReport};
pub use crate::coordinator::LoadTestCoordinator;
pub use crate::cpu::{CpuProbe, FixedCpuProbe, SysinfoCpuProbe};
pub use crate::error::{ExecutorError, ReportError, RunError};
pub use crate::inputs::{InputItem, InputSet};
pub use crate::report::LoadTestResult;
pub use crate::stats::StatsSummary;
pub use crate::sweep::SweepRunner;
pub use crate::telemetry::TelemetryState;
pub use crate::window::RollingWindow;

pub fn executor_for(load_test: &LoadTest, seed: &str, is_mock: bool) -> Result<Arc<dyn RequestExecutor>, RunError> {
    if is_mock {
        return Ok(Arc::new(MockExecutor::new(seed).with_delay()));
    }
    Ok(Arc::new(HttpExecutor::new(&load_test.target, load_test.mode)?))
}

/// Runs every concurrency level of the profile. Relative input paths resolve
/// against `base_dir`.
pub async fn run_sweep(
    profile: &Profile,
    base_dir: &Path,
    is_mock: bool,
    sink: EventSink<Event>,
) -> Result<Vec<LoadTestResult>, RunError> {
    let load_test = &profile.load_test;
    let inputs = InputSet::load(&load_test.inputs, base_dir)?;
    info!(
        profile = %profile.name,
        inputs = inputs.len(),
        mode = %load_test.mode,
        mock = is_mock,
        "inputs loaded"
    );

    let executor = executor_for(load_test, &profile.name, is_mock)?;
    let coordinator = LoadTestCoordinator::new(executor)
        .with_join_timeout(Duration::from_millis(load_test.join_timeout_ms()))
        .with_labels(load_test.mode.as_str(), Some(load_test.resize().to_string()))
        .with_events(sink.clone());

    let levels: Vec<usize> = load_test.concurrency.iter().map(|&c| c as usize).collect();
    let duration = Duration::from_secs(u64::from(load_test.duration_sec));

    SweepRunner::new(coordinator)
        .with_events(sink)
        .run(&levels, duration, &inputs)
        .await
}

/// Benchmarks each mode in turn, one request at a time, against the profile's
/// target and inputs.
pub async fn compare_modes(
    profile: &Profile,
    base_dir: &Path,
    modes: &[RequestMode],
    repeat: usize,
    is_mock: bool,
) -> Result<Vec<ModeReport>, RunError> {
    let inputs = InputSet::load(&profile.load_test.inputs, base_dir)?;
    info!(profile = %profile.name, inputs = inputs.len(), modes = modes.len(), repeat, "comparing modes");

    let mut executors = Vec::with_capacity(modes.len());
    for &mode in modes {
        let mut load_test = profile.load_test.clone();
        load_test.mode = mode;
        let seed = format!("{}-{}", profile.name, mode);
        executors.push((mode, executor_for(&load_test, &seed, is_mock)?));
    }

    Ok(ModeBenchmark::new(repeat).run(&executors, &inputs).await)
}
