use parking_lot::Mutex;
use std::collections::VecDeque;

/// Bounded FIFO of recent samples. Safe to share between request handlers;
/// each call takes the window's own lock and never holds it across calls.
#[derive(Debug)]
pub struct RollingWindow {
    capacity: usize,
    samples: Mutex<VecDeque<f64>>,
}

impl RollingWindow {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, value: f64) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(value);
    }

    /// Mean of the held samples, `default` when empty.
    pub fn average(&self, default: f64) -> f64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return default;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.lock().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn it_evict_oldest_at_capacity() {
        let window = RollingWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            window.push(v);
        }
        assert_eq!(window.snapshot(), vec![2.0, 3.0, 4.0]);
        assert_eq!(window.len(), 3);
        assert_eq!(window.average(0.0), 3.0);
    }

    #[test]
    fn it_return_default_when_empty() {
        let window = RollingWindow::new(50);
        assert!(window.is_empty());
        assert_eq!(window.average(42.5), 42.5);
    }

    #[test]
    fn it_clamp_zero_capacity() {
        let window = RollingWindow::new(0);
        window.push(7.0);
        window.push(9.0);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.snapshot(), vec![9.0]);
    }

    #[test]
    fn it_keep_every_push_under_contention() {
        let window = Arc::new(RollingWindow::new(10_000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let window = window.clone();
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        window.push((t * 1000 + i) as f64);
                        let _ = window.average(0.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(window.len(), 8000);
        let mut values = window.snapshot();
        values.sort_by(f64::total_cmp);
        values.dedup();
        assert_eq!(values.len(), 8000);
    }

    #[test]
    fn it_never_exceed_capacity_under_contention() {
        let window = Arc::new(RollingWindow::new(50));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let window = window.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        window.push(i as f64);
                        assert!(window.len() <= 50);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(window.len(), 50);
    }
}
