//! Runs `HttpConnection` against an in-process server speaking the deploy
//! keys endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use futures::StreamExt;
use serde_json::json;

use deploykeys_client::{
    ApiError, ApiOptions, DeployKey, DeployKeysClient, HttpConnection, NewDeployKey, RepositoryRef,
};

const TOKEN: &str = "test-token";
const OWNER: &str = "octocat";
const NAME: &str = "hello-world";
const REPO_ID: u64 = 42;
const KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAABAgMEBQYHCAkKCwwNDg8QERITFBUWFxgZGhscHR4f ci@example";

struct AppState {
    base_url: String,
    keys: Mutex<Vec<DeployKey>>,
    next_id: Mutex<u64>,
}

type Shared = Arc<AppState>;

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"message": message}))).into_response()
}

/// Maps both addressing schemes onto the single known repository.
fn resolve(repo: &RepositoryRef) -> Result<(), Response> {
    match repo {
        RepositoryRef::Name { owner, name } if owner == OWNER && name == NAME => Ok(()),
        RepositoryRef::Id(REPO_ID) => Ok(()),
        _ => Err(error(StatusCode::NOT_FOUND, "Not Found")),
    }
}

fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    if headers.get(header::USER_AGENT).is_none() {
        return Err(error(StatusCode::FORBIDDEN, "missing user agent"));
    }
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(v) if v == format!("Bearer {TOKEN}") => Ok(()),
        _ => Err(error(StatusCode::UNAUTHORIZED, "Bad credentials")),
    }
}

fn list(state: &AppState, repo: RepositoryRef, query: HashMap<String, String>) -> Response {
    if let Err(resp) = resolve(&repo) {
        return resp;
    }
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let per_page: usize = query.get("per_page").and_then(|p| p.parse().ok()).unwrap_or(2);

    let keys = state.keys.lock().unwrap();
    let items: Vec<DeployKey> = keys.iter().skip((page - 1) * per_page).take(per_page).cloned().collect();

    let mut headers = HeaderMap::new();
    if page * per_page < keys.len() {
        let link = format!(
            "<{}/{}/keys?per_page={per_page}&page={}>; rel=\"next\", <{}/{}/keys?per_page={per_page}&page=1>; rel=\"first\"",
            state.base_url,
            repo.path(),
            page + 1,
            state.base_url,
            repo.path(),
        );
        headers.insert(header::LINK, HeaderValue::from_str(&link).unwrap());
    }
    (headers, Json(items)).into_response()
}

fn create(state: &AppState, repo: RepositoryRef, new_key: NewDeployKey) -> Response {
    if let Err(resp) = resolve(&repo) {
        return resp;
    }
    let mut keys = state.keys.lock().unwrap();
    if keys.iter().any(|k| k.key == new_key.key) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Validation Failed",
                "errors": [{"resource": "PublicKey", "field": "key", "code": "custom", "message": "key is already in use"}]
            })),
        )
            .into_response();
    }

    let mut next_id = state.next_id.lock().unwrap();
    let key = DeployKey {
        id: *next_id,
        key: new_key.key,
        url: Some(format!("{}/repositories/{REPO_ID}/keys/{}", state.base_url, *next_id)),
        title: new_key.title,
        verified: true,
        created_at: Utc::now(),
        read_only: new_key.read_only.unwrap_or(false),
        added_by: Some(OWNER.to_string()),
        last_used: None,
    };
    *next_id += 1;
    keys.push(key.clone());
    (StatusCode::CREATED, Json(key)).into_response()
}

fn find(state: &AppState, repo: RepositoryRef, key_id: u64) -> Response {
    if let Err(resp) = resolve(&repo) {
        return resp;
    }
    let keys = state.keys.lock().unwrap();
    match keys.iter().find(|k| k.id == key_id) {
        Some(key) => Json(key.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "Not Found"),
    }
}

fn remove(state: &AppState, repo: RepositoryRef, key_id: u64) -> Response {
    if let Err(resp) = resolve(&repo) {
        return resp;
    }
    let mut keys = state.keys.lock().unwrap();
    let before = keys.len();
    keys.retain(|k| k.id != key_id);
    if keys.len() == before {
        return error(StatusCode::NOT_FOUND, "Not Found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_by_name(
    State(state): State<Shared>,
    Path((owner, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    list(&state, RepositoryRef::by_name(owner, name), query)
}

async fn list_by_id(
    State(state): State<Shared>,
    Path(id): Path<u64>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    list(&state, RepositoryRef::by_id(id), query)
}

async fn create_by_name(
    State(state): State<Shared>,
    Path((owner, name)): Path<(String, String)>,
    headers: HeaderMap,
    Json(new_key): Json<NewDeployKey>,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    create(&state, RepositoryRef::by_name(owner, name), new_key)
}

async fn create_by_id(
    State(state): State<Shared>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(new_key): Json<NewDeployKey>,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    create(&state, RepositoryRef::by_id(id), new_key)
}

async fn get_by_name(
    State(state): State<Shared>,
    Path((owner, name, key_id)): Path<(String, String, u64)>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    find(&state, RepositoryRef::by_name(owner, name), key_id)
}

async fn get_by_id(
    State(state): State<Shared>,
    Path((id, key_id)): Path<(u64, u64)>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    find(&state, RepositoryRef::by_id(id), key_id)
}

async fn delete_by_name(
    State(state): State<Shared>,
    Path((owner, name, key_id)): Path<(String, String, u64)>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    remove(&state, RepositoryRef::by_name(owner, name), key_id)
}

async fn delete_by_id(
    State(state): State<Shared>,
    Path((id, key_id)): Path<(u64, u64)>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    remove(&state, RepositoryRef::by_id(id), key_id)
}

async fn serve() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");

    let state = Arc::new(AppState {
        base_url: base_url.clone(),
        keys: Mutex::new(Vec::new()),
        next_id: Mutex::new(1),
    });

    let app = Router::new()
        .route("/repos/{owner}/{name}/keys", get(list_by_name).post(create_by_name))
        .route(
            "/repos/{owner}/{name}/keys/{key_id}",
            get(get_by_name).delete(delete_by_name),
        )
        .route("/repositories/{id}/keys", get(list_by_id).post(create_by_id))
        .route(
            "/repositories/{id}/keys/{key_id}",
            get(get_by_id).delete(delete_by_id),
        )
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base_url
}

fn client_for(base_url: &str) -> DeployKeysClient {
    let connection = HttpConnection::builder(base_url).token(TOKEN).build().unwrap();
    DeployKeysClient::new(Arc::new(connection))
}

fn numbered_key(n: u8) -> String {
    // valid ed25519 blob whose key bytes are all `n`
    use base64::Engine;
    let mut blob = Vec::new();
    blob.extend_from_slice(&11u32.to_be_bytes());
    blob.extend_from_slice(b"ssh-ed25519");
    blob.extend_from_slice(&32u32.to_be_bytes());
    blob.extend_from_slice(&[n; 32]);
    format!(
        "ssh-ed25519 {}",
        base64::engine::general_purpose::STANDARD.encode(blob)
    )
}

#[tokio::test]
async fn full_lifecycle_over_http() {
    let base_url = serve().await;
    let client = client_for(&base_url);
    let by_name = RepositoryRef::by_name(OWNER, NAME);
    let by_id = RepositoryRef::by_id(REPO_ID);

    let created = client
        .create(&by_name, &NewDeployKey::new("ci", KEY).read_only(true))
        .await
        .unwrap();
    assert_eq!(created.id, 1);
    assert_eq!(created.title, "ci");
    assert_eq!(created.key, KEY);
    assert!(created.read_only);

    let fetched = client.get(&by_id, created.id).await.unwrap();
    assert_eq!(fetched, created);

    client.delete(&by_id, created.id).await.unwrap();
    let err = client.get(&by_name, created.id).await.unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[tokio::test]
async fn listing_follows_link_headers() {
    let base_url = serve().await;
    let client = client_for(&base_url);
    let repo = RepositoryRef::by_id(REPO_ID);

    for n in 1..=5u8 {
        client
            .create(&repo, &NewDeployKey::new(format!("key-{n}"), numbered_key(n)))
            .await
            .unwrap();
    }

    let all = client.get_all(RepositoryRef::by_name(OWNER, NAME)).collect().await.unwrap();
    let titles: Vec<&str> = all.iter().map(|k| k.title.as_str()).collect();
    assert_eq!(titles, vec!["key-1", "key-2", "key-3", "key-4", "key-5"]);

    let bounded = client
        .get_all_with_options(repo.clone(), ApiOptions::default().page_size(1).page_count(1))
        .collect()
        .await
        .unwrap();
    assert_eq!(bounded.len(), 1);

    let mut stream = client.get_all(repo).stream();
    let mut count = 0;
    while let Some(item) = stream.next().await {
        item.unwrap();
        count += 1;
    }
    assert_eq!(count, 5);
}

#[tokio::test]
async fn service_errors_are_classified() {
    let base_url = serve().await;
    let client = client_for(&base_url);
    let repo = RepositoryRef::by_name(OWNER, NAME);

    client.create(&repo, &NewDeployKey::new("one", KEY)).await.unwrap();
    let err = client.create(&repo, &NewDeployKey::new("two", KEY)).await.unwrap_err();
    assert!(matches!(err, ApiError::UnprocessableEntity { .. }), "{err:?}");

    let err = client
        .get(&RepositoryRef::by_name(OWNER, "other"), 1)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let anonymous = DeployKeysClient::new(Arc::new(HttpConnection::new(&base_url).unwrap()));
    let err = anonymous.get(&repo, 1).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized { .. }), "{err:?}");
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"));
    let err = client.get(&RepositoryRef::by_id(REPO_ID), 1).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "{err:?}");
}
