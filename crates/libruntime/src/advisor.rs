//! Routing advisory: which execution path the next request should take.
//!
//! The decision reads the shared telemetry windows without locking them as a
//! group, so it may already be stale when the caller acts on it.

use crate::cpu::CpuProbe;
use crate::telemetry::TelemetryState;
use libprotocol::AdvisorPolicy;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    FullRemote,
    ClassifyOnly,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::FullRemote => "full_remote",
            RoutingMode::ClassifyOnly => "classify_only",
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AdvisoryDecision {
    pub recommended_mode: RoutingMode,
    pub reason: String,
    pub avg_file_size: f64,
    pub avg_server_ms: f64,
    pub cpu_percent: f64,
}

/// Pure rule: classify-only when a large payload meets CPU pressure, or when
/// the server is already slow. All comparisons are strict.
pub fn decide(policy: &AdvisorPolicy, avg_file_size: f64, avg_server_ms: f64, cpu_percent: f64) -> AdvisoryDecision {
    let heavy_payload = avg_file_size > policy.file_size_threshold_bytes as f64
        && cpu_percent > policy.cpu_threshold_percent;
    let slow_server = avg_server_ms > policy.server_latency_threshold_ms;

    let (recommended_mode, reason) = match (heavy_payload, slow_server) {
        (true, true) => (
            RoutingMode::ClassifyOnly,
            format!(
                "avg file size {:.0} B > {} B with cpu {:.1}% > {:.1}%, and avg server latency {:.1} ms > {:.1} ms",
                avg_file_size,
                policy.file_size_threshold_bytes,
                cpu_percent,
                policy.cpu_threshold_percent,
                avg_server_ms,
                policy.server_latency_threshold_ms
            ),
        ),
        (true, false) => (
            RoutingMode::ClassifyOnly,
            format!(
                "avg file size {:.0} B > {} B with cpu {:.1}% > {:.1}%",
                avg_file_size, policy.file_size_threshold_bytes, cpu_percent, policy.cpu_threshold_percent
            ),
        ),
        (false, true) => (
            RoutingMode::ClassifyOnly,
            format!(
                "avg server latency {:.1} ms > {:.1} ms",
                avg_server_ms, policy.server_latency_threshold_ms
            ),
        ),
        (false, false) => (RoutingMode::FullRemote, "load within thresholds".to_string()),
    };

    AdvisoryDecision {
        recommended_mode,
        reason,
        avg_file_size,
        avg_server_ms,
        cpu_percent,
    }
}

#[derive(Debug, Clone)]
pub struct Advisor {
    telemetry: Arc<TelemetryState>,
    policy: AdvisorPolicy,
}

impl Advisor {
    pub fn new(telemetry: Arc<TelemetryState>, policy: AdvisorPolicy) -> Self {
        Self { telemetry, policy }
    }

    /// Telemetry sized from the policy's window capacity.
    pub fn from_policy(policy: AdvisorPolicy) -> Self {
        Self::new(Arc::new(TelemetryState::new(policy.window_capacity)), policy)
    }

    pub fn telemetry(&self) -> &Arc<TelemetryState> {
        &self.telemetry
    }

    pub fn policy(&self) -> &AdvisorPolicy {
        &self.policy
    }

    pub fn record(&self, server_latency_ms: f64, file_size_bytes: Option<u64>) {
        self.telemetry.record(server_latency_ms, file_size_bytes);
    }

    /// Read-only with respect to the windows. With no size history the current
    /// request's size stands in for the average.
    pub fn advise(&self, current_file_size: Option<u64>, cpu_percent: f64) -> AdvisoryDecision {
        let avg_file = self
            .telemetry
            .request_size()
            .average(current_file_size.unwrap_or(0) as f64);
        let avg_server = self.telemetry.server_latency().average(0.0);
        decide(&self.policy, avg_file, avg_server, cpu_percent)
    }

    pub fn advise_with_probe(&self, current_file_size: Option<u64>, probe: &dyn CpuProbe) -> AdvisoryDecision {
        self.advise(current_file_size, probe.cpu_percent())
    }
}
