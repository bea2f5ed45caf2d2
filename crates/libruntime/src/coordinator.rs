use crate::error::RunError;
use crate::events::{Event, EventSink};
use crate::executor::RequestExecutor;
use crate::inputs::InputSet;
use crate::report::LoadTestResult;
use crate::stats::StatsSummary;
use crate::worker::{LoadWorker, Sample};
use libprotocol::schema::DEFAULT_JOIN_TIMEOUT_MS;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs `concurrency` workers against one executor for a fixed wall-clock
/// duration and reduces what they measured.
pub struct LoadTestCoordinator {
    executor: Arc<dyn RequestExecutor>,
    join_timeout: Duration,
    mode: Option<String>,
    resize: Option<String>,
    events: EventSink<Event>,
}

impl LoadTestCoordinator {
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            executor,
            join_timeout: Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS),
            mode: None,
            resize: None,
            events: EventSink::noop(),
        }
    }

    /// Upper bound on waiting for workers after cancellation.
    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    /// Labels copied into every result.
    pub fn with_labels(mut self, mode: impl Into<String>, resize: Option<String>) -> Self {
        self.mode = Some(mode.into());
        self.resize = resize;
        self
    }

    pub fn with_events(mut self, events: EventSink<Event>) -> Self {
        self.events = events;
        self
    }

    pub async fn run(&self, concurrency: usize, duration: Duration, inputs: &InputSet) -> Result<LoadTestResult, RunError> {
        if concurrency == 0 {
            return Err(RunError::InvalidConcurrency);
        }

        let started = Instant::now();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (tx, mut rx) = mpsc::unbounded_channel::<Sample>();

        self.events.send(Event::LevelStarted { concurrency });
        let mut handles = Vec::with_capacity(concurrency);
        for id in 0..concurrency {
            let worker = LoadWorker::new(
                id,
                inputs.clone(),
                self.executor.clone(),
                tx.clone(),
                cancel_rx.clone(),
                self.events.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }
        drop(tx);

        // ---- RUN WINDOW ----
        tokio::time::sleep_until(started + duration).await;
        cancel_tx.send_replace(true);
        self.events.send(Event::CancelRequested { concurrency });
        debug!(concurrency, "cancellation signalled");

        // ---- JOIN ----
        let deadline = Instant::now() + self.join_timeout;
        let mut stuck = 0usize;
        for handle in handles.iter_mut() {
            match tokio::time::timeout_at(deadline, &mut *handle).await {
                Ok(Ok(stats)) => debug!(worker = stats.worker_id, iterations = stats.iterations, "worker joined"),
                Ok(Err(e)) => warn!(error = %e, "worker task ended abnormally"),
                Err(_) => {
                    handle.abort();
                    stuck += 1;
                }
            }
        }
        if stuck > 0 {
            let timeout_ms = self.join_timeout.as_millis() as u64;
            error!(concurrency, stuck, timeout_ms, "workers did not stop after cancellation");
            return Err(RunError::JoinTimeout { concurrency, stuck, timeout_ms });
        }
        let elapsed = started.elapsed();

        // ---- DRAIN ----
        // producers are joined, so this sees every sample exactly once
        let mut latencies = Vec::new();
        let mut fail = 0u64;
        while let Ok(sample) = rx.try_recv() {
            match sample.latency_ms {
                Some(latency) if sample.success => latencies.push(latency),
                _ => fail += 1,
            }
        }
        let success = latencies.len() as u64;

        let secs = elapsed.as_secs_f64();
        let rps = if secs > 0.0 { success as f64 / secs } else { 0.0 };

        let result = LoadTestResult {
            concurrency,
            duration_s: duration.as_secs(),
            mode: self.mode.clone(),
            resize: self.resize.clone(),
            success,
            fail,
            rps,
            latency_stats: StatsSummary::summarize(&latencies),
        };

        self.events.send(Event::LevelFinished { concurrency, success, fail });
        info!(
            concurrency,
            success,
            fail,
            rps = format!("{rps:.2}"),
            elapsed_ms = elapsed.as_millis() as u64,
            "load test finished"
        );

        Ok(result)
    }
}
