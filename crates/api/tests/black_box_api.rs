use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::SET_COOKIE;
use serde_json::json;

use sessiongate_api::app::AppServices;
use sessiongate_auth::{
    AuthProvider, BcryptHasher, FixedUserDirectory, InMemorySessionStore, SessionManager,
    SessionRecord, SessionStore, SessionStoreError, SessionToken,
};
use sessiongate_core::{CatalogItem, DataEntry, Identity, UserId};
use sessiongate_infra::repository::{
    CatalogRepository, DataRepository, InMemoryCatalogRepository, InMemoryDataRepository,
    RepositoryError,
};

/// bcrypt("hunter2", cost 4): keeps the suite fast.
const HUNTER2: &str = "$2b$04$NAjqOEnbIAhqF4dElf/URu0.chUDbb/4MOIuT//JFSv9H8SSeiz3i";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(services: AppServices) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = sessiongate_api::app::build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    async fn spawn_default() -> Self {
        Self::spawn(alice_services()).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn alice() -> Identity {
    Identity::new(UserId::new(), "alice@example.com", HUNTER2, Utc::now())
}

fn alice_services() -> AppServices {
    AppServices::in_memory(Arc::new(FixedUserDirectory::with_identity(alice())))
}

fn browser() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().unwrap()
}

async fn login(client: &reqwest::Client, srv: &TestServer) -> reqwest::Response {
    client
        .post(srv.url("/api/v1/auth/login"))
        .json(&json!({ "email": "alice@example.com", "password": "hunter2" }))
        .send()
        .await
        .unwrap()
}

/// The raw `name=value` pair of the session cookie a response set.
fn session_cookie(res: &reqwest::Response) -> Option<String> {
    res.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn_default().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_endpoints_require_a_session() {
    let srv = TestServer::spawn_default().await;
    let client = reqwest::Client::new();

    let me = client.get(srv.url("/api/v1/auth/me")).send().await.unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = me.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let data = client
        .post(srv.url("/api/v1/data"))
        .json(&json!({ "key": "k", "value": "v" }))
        .send()
        .await
        .unwrap();
    assert_eq!(data.status(), StatusCode::UNAUTHORIZED);

    let logout = client.post(srv.url("/api/v1/auth/logout")).send().await.unwrap();
    assert_eq!(logout.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_me_data_logout_lifecycle() {
    let srv = TestServer::spawn_default().await;
    let client = browser();

    let res = login(&client, &srv).await;
    assert_eq!(res.status(), StatusCode::OK);
    let set_cookie = res
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Max-Age="));

    let user: serde_json::Value = res.json().await.unwrap();
    assert_eq!(user["email"], "alice@example.com");
    assert!(user["id"].as_str().is_some());
    assert!(user["created_at"].as_str().is_some());
    assert!(user.get("password_hash").is_none());

    let me = client.get(srv.url("/api/v1/auth/me")).send().await.unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    let me: serde_json::Value = me.json().await.unwrap();
    assert_eq!(me["email"], "alice@example.com");
    assert_eq!(me["id"], user["id"]);

    let data = client
        .post(srv.url("/api/v1/data"))
        .json(&json!({ "key": "color", "value": "blue" }))
        .send()
        .await
        .unwrap();
    assert_eq!(data.status(), StatusCode::CREATED);

    let logout = client.post(srv.url("/api/v1/auth/logout")).send().await.unwrap();
    assert_eq!(logout.status(), StatusCode::OK);
    let cleared = session_cookie(&logout).unwrap();
    assert_eq!(cleared, "session=");

    let me = client.get(srv.url("/api/v1/auth/me")).send().await.unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_rejected_without_a_cookie() {
    let srv = TestServer::spawn_default().await;
    let client = reqwest::Client::new();

    for (email, password) in [
        ("alice@example.com", "wrong"),
        ("mallory@example.com", "hunter2"),
    ] {
        let res = client
            .post(srv.url("/api/v1/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.headers().get(SET_COOKIE).is_none());
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_credentials");
    }
}

#[tokio::test]
async fn built_in_identity_can_log_in() {
    let srv = TestServer::spawn(AppServices::in_memory(Arc::new(FixedUserDirectory::new()))).await;
    let res = reqwest::Client::new()
        .post(srv.url("/api/v1/auth/login"))
        .json(&json!({ "email": "test@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(session_cookie(&res).is_some());
    let user: serde_json::Value = res.json().await.unwrap();
    assert_eq!(user["email"], "test@example.com");
}

#[tokio::test]
async fn login_rotates_the_token_and_old_token_is_dead() {
    let srv = TestServer::spawn_default().await;
    let client = reqwest::Client::new();

    let first = session_cookie(&login(&client, &srv).await).unwrap();

    // Log in again presenting the first token.
    let second_res = client
        .post(srv.url("/api/v1/auth/login"))
        .header(reqwest::header::COOKIE, &first)
        .json(&json!({ "email": "alice@example.com", "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    let second = session_cookie(&second_res).unwrap();
    assert_ne!(first, second);

    let with_old = client
        .get(srv.url("/api/v1/auth/me"))
        .header(reqwest::header::COOKIE, &first)
        .send()
        .await
        .unwrap();
    assert_eq!(with_old.status(), StatusCode::UNAUTHORIZED);

    let with_new = client
        .get(srv.url("/api/v1/auth/me"))
        .header(reqwest::header::COOKIE, &second)
        .send()
        .await
        .unwrap();
    assert_eq!(with_new.status(), StatusCode::OK);
}

#[tokio::test]
async fn forged_session_cookie_is_rejected() {
    let srv = TestServer::spawn_default().await;
    let res = reqwest::Client::new()
        .get(srv.url("/api/v1/auth/me"))
        .header(reqwest::header::COOKIE, "session=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

/// Persists the first attribute of a batch, then reports an outage.
struct TornWrites(InMemorySessionStore);

#[async_trait]
impl SessionStore for TornWrites {
    async fn create(&self, ttl: Duration) -> Result<SessionToken, SessionStoreError> {
        self.0.create(ttl).await
    }

    async fn load(&self, token: &SessionToken) -> Result<Option<SessionRecord>, SessionStoreError> {
        self.0.load(token).await
    }

    async fn put_many(
        &self,
        token: &SessionToken,
        attributes: &[(&str, &str)],
    ) -> Result<(), SessionStoreError> {
        if let Some((key, value)) = attributes.first() {
            self.0.put(token, key, value).await?;
        }
        Err(SessionStoreError::Unavailable("connection reset".into()))
    }

    async fn destroy(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        self.0.destroy(token).await
    }
}

#[tokio::test]
async fn failed_login_never_leaves_an_authenticated_cookie() {
    let store = Arc::new(TornWrites(InMemorySessionStore::new()));
    let services = AppServices::new(
        AuthProvider::new(
            Arc::new(FixedUserDirectory::with_identity(alice())),
            Arc::new(BcryptHasher::new()),
        ),
        SessionManager::new(store.clone()),
        Arc::new(InMemoryDataRepository::new()),
        Arc::new(InMemoryCatalogRepository::new()),
    );
    let srv = TestServer::spawn(services).await;
    let client = reqwest::Client::new();

    let res = login(&client, &srv).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    // The only cookie sent is the one that clears the session.
    assert_eq!(session_cookie(&res).as_deref(), Some("session="));
    assert!(store.0.is_empty());

    let me = client.get(srv.url("/api/v1/auth/me")).send().await.unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    let data = client
        .post(srv.url("/api/v1/data"))
        .json(&json!({ "key": "k", "value": "v" }))
        .send()
        .await
        .unwrap();
    assert_eq!(data.status(), StatusCode::UNAUTHORIZED);
}

struct StalledDataRepo;

#[async_trait]
impl DataRepository for StalledDataRepo {
    async fn save_data(&self, _entry: &DataEntry) -> Result<(), RepositoryError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

#[tokio::test]
async fn slow_requests_time_out() {
    let services = AppServices::new(
        AuthProvider::new(
            Arc::new(FixedUserDirectory::with_identity(alice())),
            Arc::new(BcryptHasher::new()),
        ),
        SessionManager::new(Arc::new(InMemorySessionStore::new())),
        Arc::new(StalledDataRepo),
        Arc::new(InMemoryCatalogRepository::new()),
    )
    .with_request_timeout(Duration::from_millis(500));
    let srv = TestServer::spawn(services).await;
    let client = browser();
    assert_eq!(login(&client, &srv).await.status(), StatusCode::OK);

    let res = client
        .post(srv.url("/api/v1/data"))
        .json(&json!({ "key": "k", "value": "v" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
}

struct PanickingCatalog;

#[async_trait]
impl CatalogRepository for PanickingCatalog {
    async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        panic!("catalog exploded");
    }
}

#[tokio::test]
async fn handler_panic_becomes_a_500_and_the_server_keeps_serving() {
    let services = AppServices::new(
        AuthProvider::new(
            Arc::new(FixedUserDirectory::with_identity(alice())),
            Arc::new(BcryptHasher::new()),
        ),
        SessionManager::new(Arc::new(InMemorySessionStore::new())),
        Arc::new(InMemoryDataRepository::new()),
        Arc::new(PanickingCatalog),
    );
    let srv = TestServer::spawn(services).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/api/v1/catalog")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "internal_error");

    let health = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let srv = TestServer::spawn_default().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    let generated = res.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(!generated.is_empty());

    let res = client
        .get(srv.url("/health"))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers().get("x-request-id").unwrap(), "req-123");
}

#[derive(Default)]
struct CountingDataRepo {
    calls: AtomicUsize,
}

#[async_trait]
impl DataRepository for CountingDataRepo {
    async fn save_data(&self, _entry: &DataEntry) -> Result<(), RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn empty_key_is_a_bad_request_and_never_stored() {
    let repo = Arc::new(CountingDataRepo::default());
    let services = AppServices::new(
        AuthProvider::new(
            Arc::new(FixedUserDirectory::with_identity(alice())),
            Arc::new(BcryptHasher::new()),
        ),
        SessionManager::new(Arc::new(InMemorySessionStore::new())),
        repo.clone(),
        Arc::new(InMemoryCatalogRepository::new()),
    );
    let srv = TestServer::spawn(services).await;
    let client = browser();
    assert_eq!(login(&client, &srv).await.status(), StatusCode::OK);

    let res = client
        .post(srv.url("/api/v1/data"))
        .json(&json!({ "key": "", "value": "v" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "key cannot be empty");
    assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn data_save_is_an_upsert() {
    let repo = Arc::new(InMemoryDataRepository::new());
    let services = AppServices::new(
        AuthProvider::new(
            Arc::new(FixedUserDirectory::with_identity(alice())),
            Arc::new(BcryptHasher::new()),
        ),
        SessionManager::new(Arc::new(InMemorySessionStore::new())),
        repo.clone(),
        Arc::new(InMemoryCatalogRepository::new()),
    );
    let srv = TestServer::spawn(services).await;
    let client = browser();
    login(&client, &srv).await;

    for value in ["red", "green"] {
        let res = client
            .post(srv.url("/api/v1/data"))
            .json(&json!({ "key": "color", "value": value }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }
    assert_eq!(repo.get("color").as_deref(), Some("green"));
    assert_eq!(repo.len(), 1);
}

#[tokio::test]
async fn empty_catalog_is_an_empty_array() {
    let srv = TestServer::spawn_default().await;
    let res = reqwest::get(srv.url("/api/v1/catalog")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn catalog_is_public_and_complete() {
    let items = vec![
        CatalogItem::new("Lamp", "Desk lamp"),
        CatalogItem::new("Chair", "").disabled(),
    ];
    let services = AppServices::new(
        AuthProvider::new(
            Arc::new(FixedUserDirectory::with_identity(alice())),
            Arc::new(BcryptHasher::new()),
        ),
        SessionManager::new(Arc::new(InMemorySessionStore::new())),
        Arc::new(InMemoryDataRepository::new()),
        Arc::new(InMemoryCatalogRepository::with_items(items)),
    );
    let srv = TestServer::spawn(services).await;

    let body: serde_json::Value = reqwest::get(srv.url("/api/v1/catalog"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 2);

    let chair = listed.iter().find(|i| i["title"] == "Chair").unwrap();
    assert_eq!(chair["description"], "");
    assert_eq!(chair["disabled"], true);
    assert!(chair["id"].as_str().is_some());
}

#[tokio::test]
async fn unknown_routes_are_not_found_not_unauthorized() {
    let srv = TestServer::spawn_default().await;
    let res = reqwest::get(srv.url("/api/v1/nope")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
