use crate::stats::latency::LatencyStats;
use hdrhistogram::CreationError;
use libruntime::events::Event;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub requests_ok: u64,
    pub requests_err: u64,
    pub levels_finished: u32,
}

#[derive(Debug)]
pub struct LiveStats {
    pub totals: Totals,
    pub latency: LatencyStats,
    pub level: Option<usize>,
    level_ok: u64,
    level_err: u64,
    sec_ok: u64,
    level_started_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSnapshot {
    pub concurrency: usize,
    pub elapsed_s: u64,
    pub ok: u64,
    pub err: u64,
    pub err_rate: f64,
    pub rps_1s: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
}

impl LiveStats {
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            totals: Totals::default(),
            latency: LatencyStats::new()?,
            level: None,
            level_ok: 0,
            level_err: 0,
            sec_ok: 0,
            level_started_at: Instant::now(),
        })
    }

    pub fn consume(&mut self, ev: &Event) {
        match ev {
            Event::LevelStarted { concurrency } => {
                self.level = Some(*concurrency);
                self.level_ok = 0;
                self.level_err = 0;
                self.sec_ok = 0;
                self.latency.reset_level();
                self.level_started_at = Instant::now();
            }
            Event::RequestFinished { ok: true, latency_ms } => {
                self.level_ok += 1;
                self.sec_ok += 1;
                self.totals.requests_ok += 1;
                if let Some(ms) = latency_ms {
                    self.latency.record(*ms);
                }
            }
            Event::RequestFinished { ok: false, .. } => {
                self.level_err += 1;
                self.totals.requests_err += 1;
            }
            Event::CancelRequested { .. } => {}
            Event::LevelFinished { .. } => {
                self.totals.levels_finished += 1;
                self.level = None;
            }
            Event::SweepFinished => {}
        }
    }

    /// Figures for the current level, then starts a new one-second bucket.
    pub fn roll_second(&mut self) -> Option<LiveSnapshot> {
        let concurrency = self.level?;
        let total = self.level_ok + self.level_err;
        let snapshot = LiveSnapshot {
            concurrency,
            elapsed_s: self.level_started_at.elapsed().as_secs(),
            ok: self.level_ok,
            err: self.level_err,
            err_rate: if total == 0 { 0.0 } else { self.level_err as f64 / total as f64 },
            rps_1s: self.sec_ok,
            p50_ms: self.latency.level.value_at_quantile(0.50),
            p95_ms: self.latency.level.value_at_quantile(0.95),
        };
        self.sec_ok = 0;
        self.latency.roll_second();
        Some(snapshot)
    }
}

/// Consumes events until the sweep finishes or every sender is gone, logging
/// one progress line per second while a level is running.
pub async fn report_progress(mut rx: UnboundedReceiver<Event>) -> Result<LiveStats, CreationError> {
    let mut stats = LiveStats::new()?;
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tick.tick().await;

    loop {
        tokio::select! {
            ev = rx.recv() => match ev {
                Some(Event::SweepFinished) | None => break,
                Some(ev) => stats.consume(&ev),
            },
            _ = tick.tick() => {
                if let Some(s) = stats.roll_second() {
                    info!(
                        concurrency = s.concurrency,
                        elapsed_s = s.elapsed_s,
                        ok = s.ok,
                        err = s.err,
                        err_rate = format!("{:.3}", s.err_rate),
                        rps_1s = s.rps_1s,
                        p50_ms = s.p50_ms,
                        p95_ms = s.p95_ms,
                        "progress"
                    );
                }
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn finished(ok: bool, ms: f64) -> Event {
        Event::RequestFinished { ok, latency_ms: Some(ms) }
    }

    #[test]
    fn it_snapshot_only_running_level() {
        let mut stats = LiveStats::new().unwrap();
        assert!(stats.roll_second().is_none());

        stats.consume(&Event::LevelStarted { concurrency: 5 });
        for ms in [10.0, 20.0, 30.0, 40.0] {
            stats.consume(&finished(true, ms));
        }
        stats.consume(&Event::RequestFinished { ok: false, latency_ms: None });

        let snap = stats.roll_second().unwrap();
        assert_eq!(snap.concurrency, 5);
        assert_eq!((snap.ok, snap.err, snap.rps_1s), (4, 1, 4));
        assert_eq!(snap.err_rate, 0.2);
        assert_eq!(snap.p95_ms, 40);

        // the next bucket starts empty but level totals carry on
        let snap = stats.roll_second().unwrap();
        assert_eq!((snap.ok, snap.rps_1s), (4, 0));

        stats.consume(&Event::LevelFinished { concurrency: 5, success: 4, fail: 1 });
        assert!(stats.roll_second().is_none());
    }

    #[test]
    fn it_reset_level_figures_on_new_level() {
        let mut stats = LiveStats::new().unwrap();
        stats.consume(&Event::LevelStarted { concurrency: 1 });
        stats.consume(&finished(true, 500.0));
        stats.consume(&Event::LevelFinished { concurrency: 1, success: 1, fail: 0 });
        stats.consume(&Event::LevelStarted { concurrency: 2 });
        stats.consume(&finished(true, 5.0));

        let snap = stats.roll_second().unwrap();
        assert_eq!(snap.ok, 1);
        assert_eq!(snap.p95_ms, 5);
        assert_eq!(stats.totals, Totals { requests_ok: 2, requests_err: 0, levels_finished: 1 });
    }

    #[tokio::test]
    async fn it_stop_on_sweep_finished() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Event::LevelStarted { concurrency: 1 }).unwrap();
        tx.send(finished(true, 3.0)).unwrap();
        tx.send(Event::LevelFinished { concurrency: 1, success: 1, fail: 0 }).unwrap();
        tx.send(Event::SweepFinished).unwrap();

        let stats = report_progress(rx).await.unwrap();
        assert_eq!(stats.totals.levels_finished, 1);
        assert_eq!(stats.totals.requests_ok, 1);
    }

    #[tokio::test]
    async fn it_stop_when_senders_are_gone() {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();
        drop(tx);
        let stats = report_progress(rx).await.unwrap();
        assert_eq!(stats.totals, Totals::default());
    }
}
