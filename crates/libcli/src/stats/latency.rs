use hdrhistogram::{CreationError, Histogram};

pub const LOWEST_MS: u64 = 1;
pub const HIGHEST_MS: u64 = 120_000;
pub const SIGFIG: u8 = 3;

/// Approximate latency distribution for progress output. Exact figures for
/// the report come from the raw samples, not from here.
#[derive(Debug)]
pub struct LatencyStats {
    pub level: Histogram<u64>,   // current concurrency level
    pub per_sec: Histogram<u64>, // current second
}

impl LatencyStats {
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            level: Histogram::new_with_bounds(LOWEST_MS, HIGHEST_MS, SIGFIG)?,
            per_sec: Histogram::new_with_bounds(LOWEST_MS, HIGHEST_MS, SIGFIG)?,
        })
    }

    pub fn record(&mut self, latency_ms: f64) {
        let v = (latency_ms.ceil() as u64).clamp(LOWEST_MS, HIGHEST_MS);
        self.level.saturating_record(v);
        self.per_sec.saturating_record(v);
    }

    pub fn reset_level(&mut self) {
        self.level.reset();
        self.per_sec.reset();
    }

    pub fn roll_second(&mut self) {
        self.per_sec.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_clamp_sub_millisecond_latency() {
        let mut stats = LatencyStats::new().unwrap();
        stats.record(0.2);
        stats.record(250_000.0);
        assert_eq!(stats.level.min(), LOWEST_MS);
        assert_eq!(stats.level.len(), 2);
        assert!(stats.level.max() >= HIGHEST_MS);
    }
}
