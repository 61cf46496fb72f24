//! HTTP server for the random wallpaper endpoint
//!
//! Provides /, /wallpaper/random and /health. Each request runs the same
//! linear pipeline: classify the device, read that partition's key index,
//! pick a key, open the blob, stream it back. Request handling holds no
//! mutable state; the stores are the only shared resources.

use crate::device::{classify, DeviceClass};
use crate::error::{ApiError, ServeError};
use crate::index::KeyIndex;
use crate::partition::PartitionSet;
use crate::selector::{KeySelector, RandomSelector};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};
use wallpaper_store::{BlobObject, BlobStore, KeyIndexStore};

/// Downstream and browser caching window for served images
pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=300";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Shared state for the HTTP server
pub struct ServerState {
    pub index_store: Arc<dyn KeyIndexStore>,
    pub blob_store: Arc<dyn BlobStore>,
    pub selector: Arc<dyn KeySelector>,
    pub partitions: PartitionSet,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(
        index_store: Arc<dyn KeyIndexStore>,
        blob_store: Arc<dyn BlobStore>,
        partitions: PartitionSet,
    ) -> Self {
        Self {
            index_store,
            blob_store,
            selector: Arc::new(RandomSelector),
            partitions,
            started_at: Utc::now(),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn KeySelector>) -> Self {
        self.selector = selector;
        self
    }
}

pub type SharedState = Arc<ServerState>;

/// Terminal outcome of a request that did not hit an unexpected fault
#[derive(Debug)]
pub enum Served {
    Image(BlobObject),
    /// The partition's index is absent or empty
    ColdCache { index_name: String },
    /// The selected key is gone from the blob store
    IndexInconsistent { key: String },
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: i64,
    pub partitions: Vec<PartitionHealth>,
}

#[derive(Debug, Serialize)]
pub struct PartitionHealth {
    pub class: DeviceClass,
    pub index_name: String,
    pub prefix: String,
    /// Current index length; `None` if absent or unreadable
    pub entries: Option<usize>,
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(random_wallpaper))
        .route("/wallpaper/random", get(random_wallpaper))
        .route("/health", get(health))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn handle_panic(_err: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::Internal("request handler panicked".to_string()).into_response()
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Pick and open a random image for a client with the given user agent.
///
/// Cold caches and index/store divergence are ordinary outcomes; only store
/// faults and undecodable index values come back as errors.
pub async fn serve_random(
    state: &ServerState,
    user_agent: &str,
) -> Result<Served, ServeError> {
    let class = classify(user_agent);
    let partition = state.partitions.for_class(class);

    let index = read_index(state.index_store.as_ref(), &partition.index_name).await?;
    let Some(index) = index.filter(|index| !index.is_empty()) else {
        error!(
            class = %class,
            index = %partition.index_name,
            "Key index missing or empty"
        );
        return Ok(Served::ColdCache {
            index_name: partition.index_name.clone(),
        });
    };

    let key = state.selector.select(index.keys());
    match state.blob_store.get(key).await? {
        Some(object) => {
            debug!(class = %class, key, size = object.size, "Serving wallpaper");
            Ok(Served::Image(object))
        }
        None => {
            error!(
                class = %class,
                index = %partition.index_name,
                key,
                "Indexed key not found in blob store"
            );
            Ok(Served::IndexInconsistent {
                key: key.to_string(),
            })
        }
    }
}

async fn read_index(
    store: &dyn KeyIndexStore,
    index_name: &str,
) -> Result<Option<KeyIndex>, ServeError> {
    let Some(raw) = store.get(index_name).await? else {
        return Ok(None);
    };
    KeyIndex::from_json(&raw).map_err(|source| ServeError::MalformedIndex {
        index_name: index_name.to_string(),
        source,
    })
}

/// Random wallpaper endpoint
async fn random_wallpaper(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let user_agent = headers
        .get(header::USER_AGENT)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();

    match serve_random(&state, &user_agent).await {
        Ok(Served::Image(object)) => image_response(object),
        Ok(Served::ColdCache { .. }) => ApiError::ColdCache.into_response(),
        Ok(Served::IndexInconsistent { .. }) => ApiError::IndexInconsistent.into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn image_response(object: BlobObject) -> Response {
    let content_type = object
        .content_type
        .clone()
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
    let etag = object.http_etag();
    let key = object.key.clone();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, object.size)
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, IMAGE_CACHE_CONTROL)
        .body(Body::from_stream(object.body))
        .unwrap_or_else(|e| {
            ApiError::Internal(format!("invalid response metadata for {}: {}", key, e))
                .into_response()
        })
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let mut partitions = Vec::new();
    for partition in state.partitions.iter() {
        let index = read_index(state.index_store.as_ref(), &partition.index_name).await;
        let entries = match index {
            Ok(index) => index.map(|index| index.len()),
            Err(e) => {
                warn!(index = %partition.index_name, error = %e, "Failed to read key index");
                None
            }
        };
        partitions.push(PartitionHealth {
            class: partition.class,
            index_name: partition.index_name.clone(),
            prefix: partition.prefix.clone(),
            entries,
        });
    }

    Json(HealthResponse {
        status: "ok",
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        partitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresher::IndexRefresher;
    use async_trait::async_trait;
    use axum::http::Request;
    use std::collections::HashSet;
    use tower::ServiceExt;
    use wallpaper_store::{ListPage, MemoryBlobStore, MemoryKeyIndexStore, StoreError};

    const DESKTOP_UA: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0";
    const MOBILE_UA: &str =
        "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Mobile Safari/537.36";

    /// Always picks the same position
    struct FixedSelector(usize);

    impl KeySelector for FixedSelector {
        fn pick(&self, len: usize) -> usize {
            self.0 % len
        }
    }

    /// Blob store that is unreachable for reads
    struct UnreachableBlobStore;

    #[async_trait]
    impl BlobStore for UnreachableBlobStore {
        async fn list(
            &self,
            _prefix: &str,
            _cursor: Option<&str>,
        ) -> wallpaper_store::Result<ListPage> {
            Err(StoreError::Backend("connection reset".to_string()))
        }

        async fn get(&self, _key: &str) -> wallpaper_store::Result<Option<BlobObject>> {
            Err(StoreError::Backend("connection reset".to_string()))
        }
    }

    struct Fixture {
        index: Arc<MemoryKeyIndexStore>,
        blobs: Arc<MemoryBlobStore>,
    }

    impl Fixture {
        async fn new() -> Self {
            let blobs = MemoryBlobStore::new();
            blobs.insert("a.jpg", &b"image a"[..], Some("image/jpeg")).await;
            blobs.insert("b.jpg", &b"image bb"[..], Some("image/png")).await;
            blobs.insert("m.jpg", &b"mobile"[..], Some("image/jpeg")).await;
            Self {
                index: Arc::new(MemoryKeyIndexStore::new()),
                blobs: Arc::new(blobs),
            }
        }

        async fn with_index(self, name: &str, value: &str) -> Self {
            self.index.put(name, value.to_string()).await.unwrap();
            self
        }

        fn state(&self) -> ServerState {
            ServerState::new(
                self.index.clone(),
                self.blobs.clone(),
                PartitionSet::default(),
            )
        }

        fn router(&self, selector: Arc<dyn KeySelector>) -> Router {
            create_router(Arc::new(self.state().with_selector(selector)))
        }
    }

    fn request(uri: &str, user_agent: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(ua) = user_agent {
            builder = builder.header(header::USER_AGENT, ua);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> bytes::Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_desktop_request_serves_indexed_image() {
        let fixture = Fixture::new()
            .await
            .with_index("PC_IMAGE_KEYS", r#"["a.jpg","b.jpg"]"#)
            .await;
        let router = fixture.router(Arc::new(RandomSelector));

        let response = router.oneshot(request("/", Some(DESKTOP_UA))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=300"
        );
        let content_type = response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .to_string();
        let etag = response.headers()[header::ETAG].to_str().unwrap().to_string();
        assert!(etag.starts_with('"') && etag.ends_with('"'));

        let body = body_bytes(response).await;
        match &body[..] {
            b"image a" => assert_eq!(content_type, "image/jpeg"),
            b"image bb" => assert_eq!(content_type, "image/png"),
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fixed_selector_picks_position() {
        let fixture = Fixture::new()
            .await
            .with_index("PC_IMAGE_KEYS", r#"["a.jpg","b.jpg"]"#)
            .await;
        let router = fixture.router(Arc::new(FixedSelector(1)));

        let response = router
            .oneshot(request("/wallpaper/random", Some(DESKTOP_UA)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "8");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(&body_bytes(response).await[..], b"image bb");
    }

    #[tokio::test]
    async fn test_selected_key_is_always_in_index() {
        let fixture = Fixture::new()
            .await
            .with_index("PC_IMAGE_KEYS", r#"["a.jpg","b.jpg"]"#)
            .await;
        let state = fixture.state();

        let mut seen = HashSet::new();
        for _ in 0..200 {
            match serve_random(&state, DESKTOP_UA).await.unwrap() {
                Served::Image(object) => {
                    assert!(object.key == "a.jpg" || object.key == "b.jpg");
                    seen.insert(object.key);
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_mobile_request_uses_mobile_index() {
        let fixture = Fixture::new()
            .await
            .with_index("PC_IMAGE_KEYS", r#"["a.jpg"]"#)
            .await
            .with_index("MOBILE_IMAGE_KEYS", r#"["m.jpg"]"#)
            .await;
        let router = fixture.router(Arc::new(RandomSelector));

        let response = router.oneshot(request("/", Some(MOBILE_UA))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&body_bytes(response).await[..], b"mobile");
    }

    #[tokio::test]
    async fn test_missing_user_agent_is_desktop() {
        let fixture = Fixture::new()
            .await
            .with_index("PC_IMAGE_KEYS", r#"["a.jpg"]"#)
            .await;
        let router = fixture.router(Arc::new(RandomSelector));

        let response = router.oneshot(request("/", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&body_bytes(response).await[..], b"image a");
    }

    #[tokio::test]
    async fn test_empty_index_is_cold_cache() {
        let fixture = Fixture::new()
            .await
            .with_index("MOBILE_IMAGE_KEYS", "[]")
            .await;
        let router = fixture.router(Arc::new(RandomSelector));

        let response = router.oneshot(request("/", Some(MOBILE_UA))).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            &body_bytes(response).await[..],
            b"Image service is warming up, please retry later."
        );
        assert_eq!(fixture.blobs.get_count(), 0);
    }

    #[tokio::test]
    async fn test_absent_or_null_index_is_cold_cache() {
        let fixture = Fixture::new().await;
        let state = fixture.state();

        let outcome = serve_random(&state, DESKTOP_UA).await.unwrap();
        assert!(matches!(
            outcome,
            Served::ColdCache { ref index_name } if index_name == "PC_IMAGE_KEYS"
        ));

        fixture.index.put("PC_IMAGE_KEYS", "null".to_string()).await.unwrap();
        let outcome = serve_random(&state, DESKTOP_UA).await.unwrap();
        assert!(matches!(outcome, Served::ColdCache { .. }));

        assert_eq!(fixture.blobs.get_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_object_is_index_inconsistent() {
        let fixture = Fixture::new()
            .await
            .with_index("PC_IMAGE_KEYS", r#"["missing.jpg"]"#)
            .await;
        let router = fixture.router(Arc::new(RandomSelector));

        let response = router.oneshot(request("/", Some(DESKTOP_UA))).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            &body_bytes(response).await[..],
            b"The selected image could not be retrieved."
        );
    }

    #[tokio::test]
    async fn test_store_changes_after_refresh() {
        let fixture = Fixture::new().await;
        fixture.blobs.insert("pc_img/a.jpg", &b"pc a"[..], Some("image/jpeg")).await;
        let refresher = IndexRefresher::new(
            fixture.index.clone(),
            fixture.blobs.clone(),
            PartitionSet::default(),
        );
        assert!(!refresher.refresh_all().await.has_failures());
        let state = fixture.state();

        assert!(matches!(
            serve_random(&state, DESKTOP_UA).await.unwrap(),
            Served::Image(_)
        ));

        // Blob deleted out of band before the next refresh
        assert!(fixture.blobs.remove("pc_img/a.jpg").await);
        assert!(matches!(
            serve_random(&state, DESKTOP_UA).await.unwrap(),
            Served::IndexInconsistent { ref key } if key == "pc_img/a.jpg"
        ));

        // Index entry gone entirely
        assert!(fixture.index.remove("PC_IMAGE_KEYS").await.is_some());
        assert!(matches!(
            serve_random(&state, DESKTOP_UA).await.unwrap(),
            Served::ColdCache { .. }
        ));
    }

    #[tokio::test]
    async fn test_malformed_index_is_internal_error() {
        let fixture = Fixture::new()
            .await
            .with_index("PC_IMAGE_KEYS", r#"{"keys":["a.jpg"]}"#)
            .await;
        let router = fixture.router(Arc::new(RandomSelector));

        let response = router.oneshot(request("/", Some(DESKTOP_UA))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body_bytes(response).await[..], b"Internal server error.");
        assert_eq!(fixture.blobs.get_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_blob_store_is_internal_error() {
        let index = Arc::new(MemoryKeyIndexStore::new());
        index
            .put("PC_IMAGE_KEYS", r#"["a.jpg"]"#.to_string())
            .await
            .unwrap();
        let state = ServerState::new(
            index,
            Arc::new(UnreachableBlobStore),
            PartitionSet::default(),
        );
        let router = create_router(Arc::new(state));

        let response = router.oneshot(request("/", Some(DESKTOP_UA))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_bytes(response).await;
        assert!(!String::from_utf8_lossy(&body).contains("connection reset"));
    }

    #[tokio::test]
    async fn test_missing_content_type_falls_back() {
        let fixture = Fixture::new()
            .await
            .with_index("PC_IMAGE_KEYS", r#"["raw"]"#)
            .await;
        fixture.blobs.insert("raw", &b"bytes"[..], None).await;
        let router = fixture.router(Arc::new(RandomSelector));

        let response = router.oneshot(request("/", Some(DESKTOP_UA))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let fixture = Fixture::new()
            .await
            .with_index("PC_IMAGE_KEYS", r#"["a.jpg","b.jpg"]"#)
            .await;
        let router = fixture.router(Arc::new(RandomSelector));

        let response = router.oneshot(request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_bytes(response).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_i64().is_some());
        assert_eq!(json["partitions"][0]["class"], "desktop");
        assert_eq!(json["partitions"][0]["entries"], 2);
        assert_eq!(json["partitions"][1]["prefix"], "mobile_img/");
        assert!(json["partitions"][1]["entries"].is_null());
    }

    #[test]
    fn test_server_state_new() {
        let state = ServerState::new(
            Arc::new(MemoryKeyIndexStore::new()),
            Arc::new(MemoryBlobStore::new()),
            PartitionSet::default(),
        );

        let diff = (Utc::now() - state.started_at).num_seconds();
        assert!((0..5).contains(&diff));
    }
}
