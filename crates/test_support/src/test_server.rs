use axum::extract::{Multipart, OriginalUri};
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use http::Method;
use serde_json::{json, Value};
use std::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};

/// Latency added by the `/slow/*` routes.
pub const SLOW_ROUTE_DELAY_MS: u64 = 200;

/// Processing time `/predict` reports as `timing.total_ms`.
pub const PREDICT_TOTAL_MS: f64 = 12.5;

/// Processing time `/classify` reports as `timing.predict_ms`, without a total.
pub const CLASSIFY_PREDICT_MS: f64 = 4.0;

async fn ok() -> impl IntoResponse {
    "ok"
}

async fn err() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "fail")
}

async fn predict(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    let mut file_bytes = 0usize;
    let mut mode: Option<String> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => file_bytes = field.bytes().await.map(|b| b.len()).unwrap_or(0),
            "mode" => mode = field.text().await.ok(),
            _ => {}
        }
    }
    if file_bytes == 0 {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "file is required" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "label": "cat",
            "mode": mode.unwrap_or_else(|| "full_remote".to_string()),
            "bytes": file_bytes,
            "timing": { "predict_ms": 10.0, "total_ms": PREDICT_TOTAL_MS },
        })),
    )
}

async fn classify(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let Some(features) = body.get("features").and_then(Value::as_array) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "features are required" })));
    };
    (
        StatusCode::OK,
        Json(json!({
            "label": "dog",
            "name": body.get("name").cloned().unwrap_or(Value::Null),
            "features": features.len(),
            "timing": { "predict_ms": CLASSIFY_PREDICT_MS },
        })),
    )
}

async fn slow_predict(multipart: Multipart) -> (StatusCode, Json<Value>) {
    sleep(Duration::from_millis(SLOW_ROUTE_DELAY_MS)).await;
    predict(multipart).await
}

async fn slow_classify(body: Json<Value>) -> (StatusCode, Json<Value>) {
    sleep(Duration::from_millis(SLOW_ROUTE_DELAY_MS)).await;
    classify(body).await
}

/// Returns (base_url, shutdown_sender, join_handle).
///
/// `{base_url}/predict` and `{base_url}/classify` answer like the classifier,
/// `{base_url}/slow` and `{base_url}/err` can be used as base urls for slow
/// and failing servers. Successful answers carry a `timing` object.
pub fn spawn_test_server() -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    async fn fallback(method: Method, uri: OriginalUri) -> (StatusCode, String) {
        (StatusCode::NOT_FOUND, format!("fallback: {} {}", method, uri.0))
    }

    let app = Router::new()
        .route("/ok", get(ok))
        .route("/predict", post(predict))
        .route("/classify", post(classify))
        .route("/slow/predict", post(slow_predict))
        .route("/slow/classify", post(slow_classify))
        .route("/err/predict", post(err))
        .route("/err/classify", post(err))
        .fallback(fallback);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let server = axum::serve(
            tokio::net::TcpListener::from_std(listener).unwrap(),
            app,
        )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });

        // a crashed server must fail the test
        server.await.unwrap();
    });

    (base_url, shutdown_tx, handle)
}

pub async fn wait_until_ready(url: &str) {
    let client = reqwest::Client::new();
    for _ in 0..20 {
        if client.get(format!("{}/ok", url)).send().await.is_ok() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("test server not ready");
}
