use parking_lot::Mutex;
use sysinfo::System;
use tracing::trace;

/// Instantaneous CPU utilization, in percent.
pub trait CpuProbe: Send + Sync {
    fn cpu_percent(&self) -> f64;
}

/// Host CPU usage via sysinfo. Each call reports usage since the previous call.
pub struct SysinfoCpuProbe {
    sys: Mutex<System>,
}

impl SysinfoCpuProbe {
    /// Blocks for `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` so that the first
    /// sample already covers a measurable interval.
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        Self { sys: Mutex::new(sys) }
    }
}

impl Default for SysinfoCpuProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuProbe for SysinfoCpuProbe {
    fn cpu_percent(&self) -> f64 {
        let mut sys = self.sys.lock();
        sys.refresh_cpu_usage();
        let usage = sys.global_cpu_usage() as f64;
        trace!(cpu_percent = usage, "cpu sample");
        usage
    }
}

/// Operator override or test double.
#[derive(Debug, Clone, Copy)]
pub struct FixedCpuProbe(pub f64);

impl CpuProbe for FixedCpuProbe {
    fn cpu_percent(&self) -> f64 {
        self.0
    }
}
