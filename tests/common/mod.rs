//! Fake storefront REST API for integration tests.
//!
//! Serves the auth/profile/orders endpoints on `127.0.0.1:0` with in-memory
//! state the tests can inspect and steer (expire tokens, break the refresh
//! endpoint, slow it down).

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use labcart::{MemoryCredentialStore, SessionConfig, SessionManager};
use serde_json::{Value, json};
use url::Url;

pub const PASSWORD: &str = "secret";
pub const OTP_CODE: &str = "123456";

/// How the refresh endpoint behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Issue a new access token and rotate the refresh token.
    Rotate,
    /// Answer 401: the refresh token has expired.
    Expired,
    /// Answer 503 with a message.
    Unavailable,
    /// Answer 200 with an access token the API will not accept.
    IssueRejected,
}

#[derive(Debug)]
pub struct FakeState {
    pub valid_access: Mutex<HashSet<String>>,
    pub valid_refresh: Mutex<HashSet<String>>,
    pub refresh_calls: AtomicUsize,
    pub refresh_mode: Mutex<RefreshMode>,
    pub refresh_delay: Mutex<Duration>,
    /// Bearer tokens presented to `GET /users/profile`, in arrival order.
    pub profile_tokens: Mutex<Vec<String>>,
    pub profile_cache_headers: Mutex<Vec<String>>,
    pub forced_profile_status: Mutex<Option<StatusCode>>,
    pub profile: Mutex<Value>,
    pub otp_required: AtomicBool,
    /// Accept OTP codes without issuing tokens.
    pub otp_withholds_tokens: AtomicBool,
    pub reject_orders: AtomicBool,
    pub orders: Mutex<Vec<Value>>,
    pub logout_calls: AtomicUsize,
    pub requests: AtomicUsize,
    counter: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct FakeApi {
    pub state: Arc<FakeState>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            state: Arc::new(FakeState {
                valid_access: Mutex::new(HashSet::new()),
                valid_refresh: Mutex::new(HashSet::new()),
                refresh_calls: AtomicUsize::new(0),
                refresh_mode: Mutex::new(RefreshMode::Rotate),
                refresh_delay: Mutex::new(Duration::ZERO),
                profile_tokens: Mutex::new(Vec::new()),
                profile_cache_headers: Mutex::new(Vec::new()),
                forced_profile_status: Mutex::new(None),
                profile: Mutex::new(json!({
                    "id": "user-1",
                    "fullName": "Ada Lovelace",
                    "email": "ada@example.com",
                    "phone": "+15550100",
                })),
                otp_required: AtomicBool::new(false),
                otp_withholds_tokens: AtomicBool::new(false),
                reject_orders: AtomicBool::new(false),
                orders: Mutex::new(Vec::new()),
                logout_calls: AtomicUsize::new(0),
                requests: AtomicUsize::new(0),
                counter: AtomicUsize::new(0),
            }),
        }
    }

    fn next_id(&self) -> usize {
        self.state.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn issue_access(&self) -> String {
        let token = format!("access-{}", self.next_id());
        self.state.valid_access.lock().unwrap().insert(token.clone());
        token
    }

    pub fn issue_refresh(&self) -> String {
        let token = format!("refresh-{}", self.next_id());
        self.state.valid_refresh.lock().unwrap().insert(token.clone());
        token
    }

    /// Make every issued access token invalid, as if they timed out.
    pub fn expire_access_tokens(&self) {
        self.state.valid_access.lock().unwrap().clear();
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.state.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock().unwrap() = delay;
    }

    pub fn force_profile_status(&self, status: StatusCode) {
        *self.state.forced_profile_status.lock().unwrap() = Some(status);
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn profile_tokens(&self) -> Vec<String> {
        self.state.profile_tokens.lock().unwrap().clone()
    }

    fn authorized(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
            .to_string();
        self.state
            .valid_access
            .lock()
            .unwrap()
            .contains(&token)
            .then_some(token)
    }
}

pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labcart=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Serve `api` on an ephemeral port; returns the API base URL.
pub async fn spawn(api: FakeApi) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(api);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api").parse().unwrap()
}

pub fn session_for(base_url: Url) -> SessionManager<MemoryCredentialStore> {
    init_test_logging();
    let config = SessionConfig::new(base_url)
        .unwrap()
        .with_secure_cookies(false)
        .with_request_timeout(Duration::from_secs(5));
    SessionManager::new(config, MemoryCredentialStore::new()).unwrap()
}

/// Fake API plus a session already holding a valid token pair.
pub async fn logged_in() -> (FakeApi, SessionManager<MemoryCredentialStore>) {
    let api = FakeApi::new();
    let session = session_for(spawn(api.clone()).await);
    let access = api.issue_access();
    let refresh = api.issue_refresh();
    session.establish(&access, Some(refresh.as_str()));
    (api, session)
}

fn router(api: FakeApi) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/verify-otp", post(verify_otp))
        .route("/api/auth/register", post(register))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/change-password", put(change_password))
        .route("/api/auth/refresh-token", post(refresh_token))
        .route("/api/auth/logout", post(logout))
        .route("/api/users/profile", get(get_profile).put(update_profile))
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/{id}", get(get_order))
        .with_state(api)
}

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn refresh_set_cookie(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "refreshToken={token}; HttpOnly; Path=/; Max-Age=604800; SameSite=Lax"
    ))
    .unwrap()
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

async fn login(State(api): State<FakeApi>, Json(body): Json<Value>) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    if body["password"] != PASSWORD {
        return message(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    if api.state.otp_required.load(Ordering::SeqCst) {
        return Json(json!({ "data": null, "message": "OTP sent to your email" })).into_response();
    }
    let access = api.issue_access();
    let refresh = api.issue_refresh();
    let mut response = Json(json!({ "data": { "accessToken": access } })).into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, refresh_set_cookie(&refresh));
    response
}

async fn verify_otp(State(api): State<FakeApi>, Json(body): Json<Value>) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    if body["otp"] != OTP_CODE {
        return message(StatusCode::BAD_REQUEST, "Invalid OTP");
    }
    if api.state.otp_withholds_tokens.load(Ordering::SeqCst) {
        return message(StatusCode::OK, "Verification pending");
    }
    let access = api.issue_access();
    let refresh = api.issue_refresh();
    Json(json!({ "data": { "accessToken": access, "refreshToken": refresh } })).into_response()
}

async fn register(State(api): State<FakeApi>, Json(body): Json<Value>) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    if body["email"] == "taken@example.com" {
        return message(StatusCode::CONFLICT, "Email already registered");
    }
    (StatusCode::CREATED, Json(json!({ "message": "Registered" }))).into_response()
}

async fn forgot_password(State(api): State<FakeApi>) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "message": "Reset link sent" })).into_response()
}

async fn reset_password(State(api): State<FakeApi>, Json(body): Json<Value>) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    if body["token"] != "reset-ok" {
        return message(StatusCode::BAD_REQUEST, "Reset link expired");
    }
    Json(json!({ "message": "Password updated" })).into_response()
}

async fn change_password(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    if api.authorized(&headers).is_none() {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    if body["currentPassword"] != PASSWORD {
        return message(StatusCode::BAD_REQUEST, "Current password is incorrect");
    }
    Json(json!({ "message": "Password changed" })).into_response()
}

async fn refresh_token(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    api.state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = *api.state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mode = *api.state.refresh_mode.lock().unwrap();
    match mode {
        RefreshMode::Expired => return message(StatusCode::UNAUTHORIZED, "Refresh token expired"),
        RefreshMode::Unavailable => {
            return message(StatusCode::SERVICE_UNAVAILABLE, "Auth service unavailable");
        }
        RefreshMode::IssueRejected => {
            return Json(json!({ "data": { "accessToken": "never-valid" } })).into_response();
        }
        RefreshMode::Rotate => {}
    }

    let Some(presented) = cookie_value(&headers, "refreshToken") else {
        return message(StatusCode::UNAUTHORIZED, "Missing refresh token");
    };
    if !api.state.valid_refresh.lock().unwrap().remove(&presented) {
        return message(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }

    let access = api.issue_access();
    let refresh = api.issue_refresh();
    let mut response = Json(json!({ "data": { "accessToken": access } })).into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, refresh_set_cookie(&refresh));
    response
}

async fn logout(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    let Some(token) = api.authorized(&headers) else {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    api.state.valid_access.lock().unwrap().remove(&token);
    api.state.logout_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "message": "Logged out" })).into_response()
}

async fn get_profile(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    if let Some(bearer) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let token = bearer.trim_start_matches("Bearer ").to_string();
        api.state.profile_tokens.lock().unwrap().push(token);
    }
    if let Some(cache) = headers.get(CACHE_CONTROL).and_then(|v| v.to_str().ok()) {
        api.state
            .profile_cache_headers
            .lock()
            .unwrap()
            .push(cache.to_string());
    }

    if api.authorized(&headers).is_none() {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    if let Some(status) = *api.state.forced_profile_status.lock().unwrap() {
        return message(status, "Profile service failure");
    }
    let profile = api.state.profile.lock().unwrap().clone();
    Json(json!({ "data": profile })).into_response()
}

async fn update_profile(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    if api.authorized(&headers).is_none() {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let mut profile = api.state.profile.lock().unwrap();
    if let (Some(current), Some(update)) = (profile.as_object_mut(), body.as_object()) {
        for (k, v) in update {
            current.insert(k.clone(), v.clone());
        }
    }
    Json(json!({ "data": profile.clone() })).into_response()
}

async fn list_orders(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    if api.authorized(&headers).is_none() {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let orders = api.state.orders.lock().unwrap().clone();
    Json(json!({ "data": orders })).into_response()
}

async fn create_order(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    if api.authorized(&headers).is_none() {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    if api.state.reject_orders.load(Ordering::SeqCst) {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "Collection slot unavailable");
    }

    let order = json!({
        "id": format!("ord-{}", api.next_id()),
        "status": "pending",
        "items": body["items"],
        "promoCode": body["promoCode"],
        "subtotal": body["subtotal"],
        "discount": body["discount"],
        "total": body["total"],
        "createdAt": "2026-10-16T09:30:00Z",
        "results": [],
        "patientName": body["patientName"],
    });
    api.state.orders.lock().unwrap().push(order.clone());
    (StatusCode::CREATED, Json(json!({ "data": order }))).into_response()
}

async fn get_order(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    api.state.requests.fetch_add(1, Ordering::SeqCst);
    if api.authorized(&headers).is_none() {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let orders: HashMap<String, Value> = api
        .state
        .orders
        .lock()
        .unwrap()
        .iter()
        .filter_map(|o| Some((o["id"].as_str()?.to_string(), o.clone())))
        .collect();
    match orders.get(&id) {
        Some(order) => Json(json!({ "data": order })).into_response(),
        None => message(StatusCode::NOT_FOUND, "Order not found"),
    }
}
