use crate::window::RollingWindow;
use libprotocol::schema::DEFAULT_WINDOW_CAPACITY;

/// Recent serving measurements. Built once at startup and handed to every
/// request handler behind an `Arc`.
#[derive(Debug)]
pub struct TelemetryState {
    server_latency: RollingWindow,
    request_size: RollingWindow,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl TelemetryState {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            server_latency: RollingWindow::new(window_capacity),
            request_size: RollingWindow::new(window_capacity),
        }
    }

    /// Called once per completed request. The size window only moves when the
    /// handler knows the uploaded file size.
    pub fn record(&self, server_latency_ms: f64, file_size_bytes: Option<u64>) {
        self.server_latency.push(server_latency_ms);
        if let Some(size) = file_size_bytes {
            self.request_size.push(size as f64);
        }
    }

    pub fn server_latency(&self) -> &RollingWindow {
        &self.server_latency
    }

    pub fn request_size(&self) -> &RollingWindow {
        &self.request_size
    }
}
