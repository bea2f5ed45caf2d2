use crate::coordinator::LoadTestCoordinator;
use crate::error::RunError;
use crate::events::{Event, EventSink};
use crate::inputs::InputSet;
use crate::report::LoadTestResult;
use std::time::Duration;
use tracing::info;

pub struct SweepRunner {
    coordinator: LoadTestCoordinator,
    events: EventSink<Event>,
}

impl SweepRunner {
    pub fn new(coordinator: LoadTestCoordinator) -> Self {
        Self { coordinator, events: EventSink::noop() }
    }

    /// Only the `SweepFinished` event goes here; level events come from the coordinator.
    pub fn with_events(mut self, events: EventSink<Event>) -> Self {
        self.events = events;
        self
    }

    /// Levels run one after another in the given order. A level is fully joined
    /// before the next starts; the first fatal error ends the sweep.
    pub async fn run(&self, levels: &[usize], duration: Duration, inputs: &InputSet) -> Result<Vec<LoadTestResult>, RunError> {
        let mut results = Vec::with_capacity(levels.len());
        for (idx, &concurrency) in levels.iter().enumerate() {
            info!(
                level = idx + 1,
                of = levels.len(),
                concurrency,
                duration_s = duration.as_secs_f64(),
                "starting load test"
            );
            results.push(self.coordinator.run(concurrency, duration, inputs).await?);
        }
        self.events.send(Event::SweepFinished);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockExecutor;
    use crate::inputs::InputItem;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn inputs() -> InputSet {
        InputSet::new(vec![InputItem::Features { name: "x".to_string(), values: vec![0.5] }]).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn it_run_levels_in_order_without_overlap() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        let executor = Arc::new(MockExecutor::new("sweep").with_max_latency_ms(3).with_delay());
        let coordinator = LoadTestCoordinator::new(executor).with_events(sink.clone());

        let results = SweepRunner::new(coordinator)
            .with_events(sink)
            .run(&[1, 5, 2], Duration::from_millis(80), &inputs())
            .await
            .unwrap();

        let levels: Vec<usize> = results.iter().map(|r| r.concurrency).collect();
        assert_eq!(levels, vec![1, 5, 2]);

        let mut lifecycle = vec![];
        while let Ok(ev) = rx.try_recv() {
            match ev {
                Event::RequestFinished { .. } => {}
                other => lifecycle.push(other),
            }
        }
        assert_eq!(
            lifecycle,
            vec![
                Event::LevelStarted { concurrency: 1 },
                Event::CancelRequested { concurrency: 1 },
                Event::LevelFinished { concurrency: 1, success: results[0].success, fail: 0 },
                Event::LevelStarted { concurrency: 5 },
                Event::CancelRequested { concurrency: 5 },
                Event::LevelFinished { concurrency: 5, success: results[1].success, fail: 0 },
                Event::LevelStarted { concurrency: 2 },
                Event::CancelRequested { concurrency: 2 },
                Event::LevelFinished { concurrency: 2, success: results[2].success, fail: 0 },
                Event::SweepFinished,
            ]
        );
    }

    #[tokio::test]
    async fn it_stop_at_first_fatal_level() {
        let coordinator = LoadTestCoordinator::new(Arc::new(MockExecutor::new("stop")));
        let err = SweepRunner::new(coordinator)
            .run(&[0, 1], Duration::from_millis(10), &inputs())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidConcurrency));
    }
}
