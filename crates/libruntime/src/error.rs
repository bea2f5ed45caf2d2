use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no inputs found in {0}")]
    NoInputs(String),

    #[error("failed to read inputs from {path}: {source}")]
    InputIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse feature file {path}: {source}")]
    InputFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    /// A worker ignored cancellation past the grace period, which means an
    /// executor call is blocking beyond its own timeout.
    #[error("{stuck} of {concurrency} workers did not stop within {timeout_ms} ms after cancellation")]
    JoinTimeout {
        concurrency: usize,
        stuck: usize,
        timeout_ms: u64,
    },

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Failure of a single request. Workers record it and move on.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("failed to read input {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mode {mode} cannot send {input}")]
    Unsupported { mode: String, input: String },

    #[error(transparent)]
    Http(reqwest::Error),
}

impl From<reqwest::Error> for ExecutorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            ExecutorError::Connection(e.to_string())
        } else {
            ExecutorError::Http(e)
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to access report file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize report: {0}")]
    Json(#[from] serde_json::Error),
}
