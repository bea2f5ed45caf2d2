use crate::events::{Event, EventSink};
use crate::executor::RequestExecutor;
use crate::inputs::InputSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// One measured request. A request that errored out has no latency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub latency_ms: Option<f64>,
    pub success: bool,
}

impl Sample {
    pub fn failed() -> Self {
        Self { latency_ms: None, success: false }
    }

    /// Only answered, successful requests count towards throughput and latency.
    pub fn is_success(&self) -> bool {
        self.success && self.latency_ms.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub iterations: u64,
}

pub struct LoadWorker {
    id: usize,
    inputs: InputSet,
    executor: Arc<dyn RequestExecutor>,
    results: mpsc::UnboundedSender<Sample>,
    cancel: watch::Receiver<bool>,
    events: EventSink<Event>,
}

impl LoadWorker {
    pub fn new(
        id: usize,
        inputs: InputSet,
        executor: Arc<dyn RequestExecutor>,
        results: mpsc::UnboundedSender<Sample>,
        cancel: watch::Receiver<bool>,
        events: EventSink<Event>,
    ) -> Self {
        Self { id, inputs, executor, results, cancel, events }
    }

    /// Loops over the inputs round-robin until cancellation is observed at an
    /// iteration boundary. An in-flight request is always allowed to finish.
    pub async fn run(self) -> WorkerStats {
        let mut cursor = 0usize;
        let mut iterations = 0u64;

        while !*self.cancel.borrow() {
            let item = self.inputs.get(cursor);
            cursor = cursor.wrapping_add(1);

            let sample = match self.executor.execute(item).await {
                Ok(m) => Sample { latency_ms: Some(m.latency_ms), success: m.ok },
                Err(e) => {
                    debug!(worker = self.id, input = %item.name(), error = %e, "request failed");
                    Sample::failed()
                }
            };
            iterations += 1;

            self.events.send(Event::RequestFinished { ok: sample.is_success(), latency_ms: sample.latency_ms });
            if self.results.send(sample).is_err() {
                // nobody is collecting anymore
                break;
            }

            tokio::task::yield_now().await;
        }

        debug!(worker = self.id, iterations, "worker stopped");
        WorkerStats { worker_id: self.id, iterations }
    }
}
