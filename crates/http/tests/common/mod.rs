//! Throwaway storage nodes for integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_RANGE, RANGE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use ns_core::Config;
use ns_http::StorageClient;
use serde_json::json;
use tokio::task::JoinHandle;

pub const BUCKET: &str = "photos";

/// In-memory state of one fake storage node
#[derive(Default)]
pub struct NodeState {
    /// Objects keyed by `bucket/key`
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    buckets: Mutex<BTreeSet<String>>,
    /// Hosts handed out by `/v4/query`
    discovered: Mutex<Vec<String>>,
    last_headers: Mutex<Option<HeaderMap>>,
    last_query: Mutex<HashMap<String, String>>,
    requests: AtomicUsize,
    fail_puts: AtomicBool,
}

impl NodeState {
    pub fn insert(&self, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{BUCKET}/{key}"), data.to_vec());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{BUCKET}/{key}"))
            .cloned()
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn last_headers(&self) -> HeaderMap {
        self.last_headers.lock().unwrap().clone().unwrap_or_default()
    }

    pub fn last_query(&self) -> HashMap<String, String> {
        self.last_query.lock().unwrap().clone()
    }

    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn set_discovered(&self, hosts: Vec<String>) {
        *self.discovered.lock().unwrap() = hosts;
    }

    fn record(&self, headers: &HeaderMap) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.last_headers.lock().unwrap() = Some(headers.clone());
    }
}

/// A storage node listening on an ephemeral local port
pub struct TestNode {
    pub addr: String,
    pub state: Arc<NodeState>,
    handle: JoinHandle<()>,
}

impl TestNode {
    pub async fn start() -> Self {
        let state = Arc::new(NodeState::default());
        let app = Router::new()
            .route("/objects/getfile/{bucket}/{*key}", get(get_file))
            .route("/objects/put/{bucket}/{*key}", put(put_file))
            .route("/objects/deletefile/{bucket}/{*key}", delete(delete_file))
            .route("/objects/rename/{bucket}/{*key}", put(rename_file))
            .route("/objects/metadetail", get(meta_detail))
            .route("/objects/listobject/{bucket}", get(list_objects))
            .route("/objects/makebucket/{bucket}", put(make_bucket))
            .route("/objects/deletebucket/{bucket}", delete(delete_bucket))
            .route("/objects/getbucket/{bucket}", get(get_bucket))
            .route("/objects/listbucket", get(list_buckets))
            .route("/v4/query", get(query))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Address nothing listens on
pub fn dead_host() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

pub fn config(hosts: Vec<String>) -> Config {
    let mut config = Config::new(hosts, BUCKET);
    config.base_timeout_ms = 500;
    config.request_timeout_secs = 5;
    config.retry_backoff_ms = 0;
    config
}

pub fn client(hosts: Vec<String>) -> StorageClient {
    StorageClient::new(&config(hosts)).unwrap()
}

type NodeRef = State<Arc<NodeState>>;

/// Parse `bytes=a-b`, `bytes=a-` or `bytes=-n` into a half-open span
fn parse_range(value: &str, total: u64) -> Option<(u64, u64)> {
    let range = value.strip_prefix("bytes=")?;
    let (start, end) = range.split_once('-')?;
    if start.is_empty() {
        let n: u64 = end.parse().ok()?;
        return Some((total.saturating_sub(n), total));
    }
    let start: u64 = start.parse().ok()?;
    let end = if end.is_empty() {
        total
    } else {
        end.parse::<u64>().ok()?.min(total)
    };
    Some((start, end))
}

async fn get_file(
    State(state): NodeRef,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    state.record(&headers);
    let Some(data) = state.objects.lock().unwrap().get(&format!("{bucket}/{key}")).cloned()
    else {
        return (StatusCode::NOT_FOUND, "no such file").into_response();
    };

    let total = data.len() as u64;
    let range = headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, total));
    match range {
        None => (StatusCode::OK, data).into_response(),
        Some((start, _)) if start >= total => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(CONTENT_RANGE, format!("bytes */{total}"))],
        )
            .into_response(),
        Some((start, end)) => (
            StatusCode::PARTIAL_CONTENT,
            [(CONTENT_RANGE, format!("bytes {start}-{}/{total}", end - 1))],
            data[start as usize..end as usize].to_vec(),
        )
            .into_response(),
    }
}

async fn put_file(
    State(state): NodeRef,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record(&headers);
    if state.fail_puts.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "disk full").into_response();
    }
    state
        .objects
        .lock()
        .unwrap()
        .insert(format!("{bucket}/{key}"), body.to_vec());
    StatusCode::OK.into_response()
}

async fn delete_file(
    State(state): NodeRef,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    state.record(&headers);
    match state.objects.lock().unwrap().remove(&format!("{bucket}/{key}")) {
        Some(_) => StatusCode::OK.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn rename_file(
    State(state): NodeRef,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    state.record(&headers);
    let Some(new_name) = headers.get("newname").and_then(|v| v.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "missing newname").into_response();
    };
    let mut objects = state.objects.lock().unwrap();
    match objects.remove(&format!("{bucket}/{key}")) {
        Some(data) => {
            objects.insert(format!("{bucket}/{new_name}"), data);
            StatusCode::OK.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn meta_detail(State(state): NodeRef, headers: HeaderMap) -> Response {
    state.record(&headers);
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let (bucket, object) = (header("bucket"), header("object"));
    match state.objects.lock().unwrap().get(&format!("{bucket}/{object}")) {
        Some(data) => axum::Json(json!({
            "name": object,
            "size": data.len(),
            "type": 1,
            "time": 1_700_000_000,
            "url": "",
            "isDir": false,
            "extern-headers": {}
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_objects(
    State(state): NodeRef,
    Path(bucket): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.record(&headers);
    let objects = state.objects.lock().unwrap();
    let in_bucket = objects
        .iter()
        .filter_map(|(k, v)| Some((k.strip_prefix(&format!("{bucket}/"))?.to_string(), v.len())));

    // Prefix listings page through names; bucket listings return raw records
    if let Some(prefix) = headers.get("prefix").and_then(|v| v.to_str().ok()) {
        let limit: usize = headers
            .get("size")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(usize::MAX);
        let data: Vec<_> = in_bucket
            .filter(|(name, _)| name.starts_with(prefix))
            .take(limit)
            .map(|(name, size)| {
                json!({"name": name, "size": size, "type": 1, "time": 0, "url": "", "isDir": false})
            })
            .collect();
        axum::Json(json!({"Len": data.len(), "Data": data})).into_response()
    } else {
        let data: Vec<_> = in_bucket
            .map(|(name, size)| {
                json!({"bucket": bucket, "name": name, "version": 1, "size": size, "time": 0})
            })
            .collect();
        axum::Json(data).into_response()
    }
}

async fn make_bucket(State(state): NodeRef, Path(bucket): Path<String>, headers: HeaderMap) -> Response {
    state.record(&headers);
    if state.buckets.lock().unwrap().insert(bucket) {
        StatusCode::OK.into_response()
    } else {
        (StatusCode::CONFLICT, "bucket exists").into_response()
    }
}

async fn delete_bucket(
    State(state): NodeRef,
    Path(bucket): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.record(&headers);
    if state.buckets.lock().unwrap().remove(&bucket) {
        StatusCode::OK.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn get_bucket(State(state): NodeRef, Path(bucket): Path<String>, headers: HeaderMap) -> Response {
    state.record(&headers);
    if state.buckets.lock().unwrap().contains(&bucket) {
        StatusCode::OK.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn list_buckets(State(state): NodeRef, headers: HeaderMap) -> Response {
    state.record(&headers);
    let buckets: Vec<_> = state
        .buckets
        .lock()
        .unwrap()
        .iter()
        .map(|name| json!({"Name": name, "SizeLimit": 0, "Time": 1_700_000_000}))
        .collect();
    axum::Json(buckets).into_response()
}

async fn query(
    State(state): NodeRef,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.record(&headers);
    *state.last_query.lock().unwrap() = params;
    let domains = state.discovered.lock().unwrap().clone();
    axum::Json(json!({"hosts": [{"ttl": 3600, "io": {"domains": domains}}]})).into_response()
}
