//! Mock museum server for integration tests
//!
//! Serves `/search`, `/objects/:id` and `/images/:name` on an ephemeral local
//! port. Image routes follow a scripted [`ImageBehavior`] and record every hit
//! together with the `User-Agent` it carried.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use kiln_harvest::HarvestConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How an image route answers
#[derive(Debug, Clone)]
pub enum ImageBehavior {
    /// 200 with a payload of this many bytes
    Serve(usize),
    /// `failures` times 503, then 200 with `bytes`
    FailThenServe { failures: usize, bytes: usize },
    /// Always this status
    AlwaysStatus(u16),
    /// Hold the request this long before answering with 50 KiB
    Stall(Duration),
}

#[derive(Default)]
struct MuseumState {
    searches: HashMap<String, Vec<u64>>,
    objects: HashMap<u64, Value>,
    images: HashMap<String, ImageBehavior>,
    image_hits: Mutex<HashMap<String, usize>>,
    user_agents: Mutex<Vec<String>>,
}

/// Builder for [`MockMuseum`]
#[derive(Default)]
pub struct MockMuseumBuilder {
    state: MuseumState,
}

impl MockMuseumBuilder {
    pub fn search(mut self, query: &str, ids: &[u64]) -> Self {
        self.state.searches.insert(query.to_string(), ids.to_vec());
        self
    }

    /// Object document; `image` is an image route name or `None` for no image
    pub fn object(mut self, id: u64, title: &str, period: &str, image: Option<&str>) -> Self {
        self.state.objects.insert(
            id,
            json!({
                "objectID": id,
                "title": title,
                "culture": "Iran",
                "period": period,
                "objectDate": "",
                "classification": "Ceramics",
                "isPublicDomain": true,
                "primaryImage": image.map(|name| format!("{{BASE}}/images/{}", name)).unwrap_or_default(),
                "primaryImageSmall": "",
            }),
        );
        self
    }

    pub fn image(mut self, name: &str, behavior: ImageBehavior) -> Self {
        self.state.images.insert(name.to_string(), behavior);
        self
    }

    pub async fn start(mut self) -> MockMuseum {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        // Image URLs in documents point back at this server
        for document in self.state.objects.values_mut() {
            if let Some(url) = document["primaryImage"].as_str() {
                let resolved = url.replace("{BASE}", &base_url);
                document["primaryImage"] = Value::String(resolved);
            }
        }

        let state = Arc::new(self.state);
        let app = Router::new()
            .route("/search", get(search))
            .route("/objects/:id", get(object))
            .route("/images/:name", get(image))
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockMuseum { base_url, state }
    }
}

/// Running mock server
pub struct MockMuseum {
    pub base_url: String,
    state: Arc<MuseumState>,
}

impl MockMuseum {
    pub fn builder() -> MockMuseumBuilder {
        MockMuseumBuilder::default()
    }

    pub fn image_url(&self, name: &str) -> String {
        format!("{}/images/{}", self.base_url, name)
    }

    pub fn image_hits(&self, name: &str) -> usize {
        self.state
            .image_hits
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// `User-Agent` of every image request, in arrival order
    pub fn image_user_agents(&self) -> Vec<String> {
        self.state.user_agents.lock().unwrap().clone()
    }

    /// Harvest configuration pointed at this server with short timings
    pub fn config(&self) -> HarvestConfig {
        let mut config = HarvestConfig::default();
        config.api.base_url = self.base_url.clone();
        config.api.timeout_secs = 5;
        config.api.requests_per_second = 1000;
        config.api.search_delay_ms = 0;
        config.api.fetch_backoff_ms = 5;
        config.download.timeout_secs = 1;
        config.download.max_retries = 2;
        config.download.backoff_base_ms = 10;
        config.download.skip_existing = false;
        config.run.workers = 4;
        config
    }
}

async fn search(
    State(state): State<Arc<MuseumState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let query = params.get("q").cloned().unwrap_or_default();
    match state.searches.get(&query) {
        Some(ids) => Json(json!({ "total": ids.len(), "objectIDs": ids })),
        None => Json(json!({ "total": 0, "objectIDs": null })),
    }
}

async fn object(State(state): State<Arc<MuseumState>>, Path(id): Path<u64>) -> Response {
    match state.objects.get(&id) {
        Some(document) => Json(document.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "ObjectID not found" })),
        )
            .into_response(),
    }
}

async fn image(
    State(state): State<Arc<MuseumState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let hit = {
        let mut hits = state.image_hits.lock().unwrap();
        let count = hits.entry(name.clone()).or_insert(0);
        *count += 1;
        *count
    };
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.user_agents.lock().unwrap().push(user_agent);

    let jpeg = |bytes: usize| ([(header::CONTENT_TYPE, "image/jpeg")], vec![0xAB_u8; bytes]).into_response();

    match state.images.get(&name) {
        Some(ImageBehavior::Serve(bytes)) => jpeg(*bytes),
        Some(ImageBehavior::FailThenServe { failures, bytes }) => {
            if hit <= *failures {
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            } else {
                jpeg(*bytes)
            }
        }
        Some(ImageBehavior::AlwaysStatus(code)) => {
            StatusCode::from_u16(*code).unwrap().into_response()
        }
        Some(ImageBehavior::Stall(delay)) => {
            tokio::time::sleep(*delay).await;
            jpeg(50 * 1024)
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
