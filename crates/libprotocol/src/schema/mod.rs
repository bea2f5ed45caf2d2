use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::ValidationError;

pub const DEFAULT_WINDOW_CAPACITY: usize = 50;
pub const DEFAULT_FILE_SIZE_THRESHOLD_BYTES: u64 = 600_000;
pub const DEFAULT_CPU_THRESHOLD_PERCENT: f64 = 55.0;
pub const DEFAULT_SERVER_LATENCY_THRESHOLD_MS: f64 = 250.0;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 45_000;

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
pub struct Profile {
    pub version: u16,
    pub name: String,
    pub description: Option<String>,
    pub advisor: AdvisorPolicy,
    pub load_test: LoadTest,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            version: 1,
            name: "default_profile".to_string(),
            description: None,
            advisor: AdvisorPolicy::default(),
            load_test: LoadTest::default(),
        }
    }
}

impl Profile {
    pub fn set_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }
}

/// Thresholds of the routing advisory. The defaults are carried over as-is and
/// are meant to be overridden per deployment.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq)]
pub struct AdvisorPolicy {
    pub window_capacity: usize,
    pub file_size_threshold_bytes: u64,
    pub cpu_threshold_percent: f64,
    pub server_latency_threshold_ms: f64,
}

impl Default for AdvisorPolicy {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            file_size_threshold_bytes: DEFAULT_FILE_SIZE_THRESHOLD_BYTES,
            cpu_threshold_percent: DEFAULT_CPU_THRESHOLD_PERCENT,
            server_latency_threshold_ms: DEFAULT_SERVER_LATENCY_THRESHOLD_MS,
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
pub struct LoadTest {
    pub target: Target,
    pub mode: RequestMode,
    pub resize: Option<String>,
    pub concurrency: Vec<u32>,
    pub duration_sec: u32,
    pub join_timeout_ms: Option<u64>,
    pub inputs: InputSource,
}

impl Default for LoadTest {
    fn default() -> Self {
        Self {
            target: Target::default(),
            mode: RequestMode::FullRemote,
            resize: Some("none".to_string()),
            concurrency: vec![1, 5, 10],
            duration_sec: 20,
            join_timeout_ms: Some(DEFAULT_JOIN_TIMEOUT_MS),
            inputs: InputSource::default(),
        }
    }
}

impl LoadTest {
    pub fn join_timeout_ms(&self) -> u64 {
        self.join_timeout_ms.unwrap_or(DEFAULT_JOIN_TIMEOUT_MS)
    }

    pub fn resize(&self) -> &str {
        self.resize.as_deref().unwrap_or("none")
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
pub struct Target {
    pub base_url: String,
    pub timeout_ms: Option<u64>,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_ms: Some(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl Target {
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS)
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Upload the image; the server extracts features and classifies.
    FullRemote,
    /// Send pre-extracted features; the server only classifies.
    ClassifyOnly,
    /// Upload the image and let the server pick a path.
    Auto,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::FullRemote => "full_remote",
            RequestMode::ClassifyOnly => "classify_only",
            RequestMode::Auto => "auto",
        }
    }
}

impl std::fmt::Display for RequestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RequestMode {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "full_remote" => Ok(RequestMode::FullRemote),
            "classify_only" => Ok(RequestMode::ClassifyOnly),
            "auto" => Ok(RequestMode::Auto),
            _ => Err(ValidationError {
                path: "/load_test/mode".to_string(),
                code: "invalid_value".to_string(),
                message: format!("unknown mode: {value}"),
            }),
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputSource {
    /// Image files found by walking `dir`.
    Images {
        dir: String,
        limit: Option<usize>,
        extensions: Option<Vec<String>>,
    },
    /// Pre-extracted feature vectors: a JSON array of `{name, features}`.
    Features {
        path: String,
        limit: Option<usize>,
    },
}

impl Default for InputSource {
    fn default() -> Self {
        InputSource::Images {
            dir: "dataset/train".to_string(),
            limit: Some(20),
            extensions: Some(default_extensions()),
        }
    }
}

impl InputSource {
    pub fn limit(&self) -> Option<usize> {
        match self {
            InputSource::Images { limit, .. } => *limit,
            InputSource::Features { limit, .. } => *limit,
        }
    }
}

pub fn default_extensions() -> Vec<String> {
    vec![".png".to_string(), ".jpg".to_string(), ".jpeg".to_string()]
}
