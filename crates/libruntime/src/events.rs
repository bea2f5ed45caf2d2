use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LevelStarted { concurrency: usize },
    RequestFinished { ok: bool, latency_ms: Option<f64> },
    CancelRequested { concurrency: usize },
    LevelFinished { concurrency: usize, success: u64, fail: u64 },
    SweepFinished,
}

#[derive(Debug)]
pub struct EventSink<E> {
    tx: Option<UnboundedSender<E>>,
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<E> EventSink<E> {
    /// No-op sink
    pub fn noop() -> Self {
        Self { tx: None }
    }

    /// Real sink
    pub fn new(tx: UnboundedSender<E>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Best-effort send
    #[inline]
    pub fn send(&self, ev: E) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ev);
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_drop_events_on_noop_sink() {
        let sink = EventSink::<Event>::noop();
        assert!(!sink.is_enabled());
        sink.send(Event::SweepFinished);
    }

    #[test]
    fn it_ignore_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        drop(rx);
        sink.send(Event::SweepFinished);
        assert!(sink.is_enabled());
    }
}
