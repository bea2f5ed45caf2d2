use crate::error::{ExecutorError, RunError};
use crate::inputs::InputItem;
use async_trait::async_trait;
use libprotocol::{RequestMode, Target};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub latency_ms: f64,
    pub ok: bool,
    /// Server-side processing time, when the response body reports one.
    pub server_ms: Option<f64>,
}

/// Performs one request for one input item and measures it. Implementations
/// must bound every call with their own timeout.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, item: &InputItem) -> Result<Measurement, ExecutorError>;
}

pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
    mode: RequestMode,
    timeout_ms: u64,
}

impl HttpExecutor {
    pub fn new(target: &Target, mode: RequestMode) -> Result<Self, RunError> {
        let timeout_ms = target.timeout_ms();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: target.base_url.trim_end_matches('/').to_string(),
            mode,
            timeout_ms,
        })
    }

    fn map_error(&self, e: reqwest::Error) -> ExecutorError {
        if e.is_timeout() {
            ExecutorError::Timeout(self.timeout_ms)
        } else {
            e.into()
        }
    }

    async fn upload(&self, path: &std::path::Path, file_name: String) -> Result<Measurement, ExecutorError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| ExecutorError::Input {
            path: path.display().to_string(),
            source: e,
        })?;
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .part("file", part)
            .text("mode", self.mode.as_str());

        let started = Instant::now();
        let resp = self
            .client
            .post(format!("{}/predict", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| self.map_error(e))?;
        Ok(measured(started, status, &body))
    }

    async fn classify(&self, name: &str, values: &[f64]) -> Result<Measurement, ExecutorError> {
        let payload = serde_json::json!({ "features": values, "name": name });

        let started = Instant::now();
        let resp = self
            .client
            .post(format!("{}/classify", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| self.map_error(e))?;
        Ok(measured(started, status, &body))
    }
}

/// The clock stops once the whole body has arrived.
fn measured(started: Instant, status: StatusCode, body: &[u8]) -> Measurement {
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    let ok = status == StatusCode::OK;
    Measurement {
        latency_ms,
        ok,
        server_ms: if ok { server_timing(body) } else { None },
    }
}

/// `timing.total_ms`, falling back to `timing.predict_ms`.
fn server_timing(body: &[u8]) -> Option<f64> {
    let payload: serde_json::Value = serde_json::from_slice(body).ok()?;
    let timing = payload.get("timing")?;
    timing
        .get("total_ms")
        .or_else(|| timing.get("predict_ms"))
        .and_then(serde_json::Value::as_f64)
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, item: &InputItem) -> Result<Measurement, ExecutorError> {
        match (self.mode, item) {
            (RequestMode::FullRemote | RequestMode::Auto, InputItem::Image { path }) => {
                self.upload(path, item.name()).await
            }
            (RequestMode::ClassifyOnly, InputItem::Features { name, values }) => {
                self.classify(name, values).await
            }
            (mode, item) => Err(ExecutorError::Unsupported {
                mode: mode.to_string(),
                input: item.kind().to_string(),
            }),
        }
    }
}

/// Deterministic stand-in for a server: latency is derived from a hash of the
/// item name and the call number.
pub struct MockExecutor {
    seed: String,
    max_latency_ms: u64,
    simulate_delay: bool,
    fail_every: Option<u64>,
    calls: AtomicU64,
}

impl MockExecutor {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            max_latency_ms: 100,
            simulate_delay: false,
            fail_every: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_max_latency_ms(mut self, max_latency_ms: u64) -> Self {
        self.max_latency_ms = max_latency_ms.max(1);
        self
    }

    /// Actually wait for the computed latency.
    pub fn with_delay(mut self) -> Self {
        self.simulate_delay = true;
        self
    }

    /// Every n-th call fails with a connection error.
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn latency_for(&self, name: &str, call: u64) -> u64 {
        let stable_key = format!("{}-{}-{}", self.seed, name, call);
        let digest = Sha256::digest(stable_key.as_bytes());
        let mut first8 = [0u8; 8];
        first8.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(first8) % self.max_latency_ms + 1
    }
}

#[async_trait]
impl RequestExecutor for MockExecutor {
    async fn execute(&self, item: &InputItem) -> Result<Measurement, ExecutorError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let latency_ms = self.latency_for(&item.name(), call);
        if self.simulate_delay {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        }
        if let Some(n) = self.fail_every
            && call % n == n - 1
        {
            return Err(ExecutorError::Connection("mock failure".to_string()));
        }
        Ok(Measurement { latency_ms: latency_ms as f64, ok: true, server_ms: None })
    }
}
