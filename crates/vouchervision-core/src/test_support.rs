//! In-process stand-in for the VoucherVision service, used by unit tests.
//!
//! Behavior is keyed on the image's file name prefix:
//! `fail` → 500 with a JSON error, `plain` → 502 with a text body,
//! `garbled` → 200 with a non-JSON body, `slow` → 300ms delay,
//! `hang` → 30s delay. Anything else succeeds and echoes what was received.

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct MockState {
    pub requests: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockState {
    fn enter(&self) -> InFlight<'_> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        InFlight(self)
    }
}

struct InFlight<'a>(&'a MockState);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) struct MockServer {
    pub url: String,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/process", post(process))
            .route("/process-url", post(process_url))
            .route("/images/:name", get(image))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, state }
    }

    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

fn auth_echo(headers: &HeaderMap) -> Value {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    json!({
        "authorization": header("authorization"),
        "x_api_key": header("x-api-key"),
    })
}

async fn respond(name: &str, echo: Value) -> Response {
    if name.starts_with("hang") {
        tokio::time::sleep(Duration::from_secs(30)).await;
    } else if name.starts_with("slow") {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    if name.starts_with("fail") {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "simulated engine failure"})),
        )
            .into_response()
    } else if name.starts_with("plain") {
        (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response()
    } else if name.starts_with("garbled") {
        (StatusCode::OK, "this is not json").into_response()
    } else {
        Json(echo).into_response()
    }
}

async fn process(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let _guard = state.enter();

    let mut filename = String::new();
    let mut file_size = 0usize;
    let mut engines: Vec<String> = Vec::new();
    let mut fields = serde_json::Map::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            filename = field.file_name().unwrap_or_default().to_string();
            file_size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        } else {
            let value = field.text().await.unwrap_or_default();
            if name == "engines" {
                engines.push(value);
            } else {
                fields.insert(name, Value::String(value));
            }
        }
    }

    let echo = json!({
        "endpoint": "/process",
        "filename": filename,
        "file_size": file_size,
        "engines": engines,
        "fields": fields,
        "auth": auth_echo(&headers),
        "formatted_json": {"catalogNumber": filename},
    });
    respond(&filename, echo).await
}

async fn process_url(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let _guard = state.enter();

    let image_url = body["image_url"].as_str().unwrap_or_default().to_string();
    let name = image_url.rsplit('/').next().unwrap_or_default().to_string();
    let echo = json!({
        "endpoint": "/process-url",
        "image_url": image_url,
        "body": body,
        "auth": auth_echo(&headers),
        "formatted_json": {"catalogNumber": name},
    });
    respond(&name, echo).await
}

async fn image(State(state): State<Arc<MockState>>, Path(name): Path<String>) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if name.starts_with("missing") {
        return (StatusCode::NOT_FOUND, "no such image").into_response();
    }
    (
        StatusCode::OK,
        [("content-type", "image/jpeg")],
        b"remote image bytes".to_vec(),
    )
        .into_response()
}
