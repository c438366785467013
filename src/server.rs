//! JSON HTTP API server.
//!
//! Exposes upload, chat, document, and dashboard functionality over a JSON
//! API consumed by the web client. Handlers talk to storage through the
//! injected [`Store`] trait object, so the in-memory and sqlite backends
//! serve identically.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`/`POST` | `/api/auth` | Session state / login, signup, logout |
//! | `POST` | `/api/upload` | Multipart file upload (requires session) |
//! | `POST` | `/api/chat/complete` | Retrieval-grounded completion |
//! | `GET`/`POST` | `/api/chats` | List / create chats |
//! | `PATCH`/`DELETE` | `/api/chats/{id}` | Rename / delete (requires session) |
//! | `GET`/`POST` | `/api/chats/{id}/messages` | List / append messages |
//! | `GET`  | `/api/documents` | Paged document listing |
//! | `GET`/`PUT`/`DELETE` | `/api/documents/{id}` | Fetch / update / delete |
//! | `GET`  | `/api/summary` | Dashboard aggregates |
//! | `GET`/`PUT` | `/api/settings` | Branding settings (PUT requires session) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `completion_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients during development.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::completion;
use crate::config::Config;
use crate::ingest;
use crate::models::{format_ts_iso, Document, Role, Sender, User};
use crate::session::{self, SessionClaims};
use crate::settings::{Settings, SettingsUpdate};
use crate::stats;
use crate::store::{create_store, DocumentUpdate, Store};

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    session_secret: String,
    settings: Arc<std::sync::RwLock<Settings>>,
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = create_store(config).await?;
    run_server_with_store(config, store).await
}

/// Like [`run_server`] but with a caller-provided storage backend, which
/// is how tests inject a pre-seeded store.
pub async fn run_server_with_store(
    config: &Config,
    store: Arc<dyn Store>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let (session_secret, is_default) = config.session_secret();
    if is_default {
        warn!("no session secret configured, using the built-in dev secret");
    }

    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        session_secret,
        settings: Arc::new(std::sync::RwLock::new(Settings::default())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/auth", get(handle_auth_state).post(handle_auth))
        .route("/api/upload", axum::routing::post(handle_upload))
        .route("/api/chat/complete", axum::routing::post(handle_complete))
        .route("/api/chats", get(handle_list_chats).post(handle_create_chat))
        .route(
            "/api/chats/{id}",
            axum::routing::patch(handle_rename_chat).delete(handle_delete_chat),
        )
        .route(
            "/api/chats/{id}/messages",
            get(handle_list_messages).post(handle_append_message),
        )
        .route("/api/documents", get(handle_list_documents))
        .route(
            "/api/documents/{id}",
            get(handle_get_document)
                .put(handle_update_document)
                .delete(handle_delete_document),
        )
        .route("/api/summary", get(handle_summary))
        .route(
            "/api/settings",
            get(handle_get_settings).put(handle_update_settings),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state);

    info!("API server listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn completion_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "completion_failed".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ Sessions ============

/// Extracts and verifies the session cookie, if any.
fn current_session(state: &AppState, headers: &HeaderMap) -> Option<SessionClaims> {
    let cookie = headers.get(header::COOKIE)?.to_str().ok()?;
    let token = session::token_from_cookie_header(cookie)?;
    session::verify(&state.session_secret, token)
}

/// Guard for mutating endpoints.
fn require_session(state: &AppState, headers: &HeaderMap) -> Result<SessionClaims, AppError> {
    current_session(state, headers).ok_or_else(|| unauthorized("authentication required"))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /api/auth ============

#[derive(Deserialize)]
struct AuthRequest {
    action: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthState {
    is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

impl AuthState {
    fn anonymous() -> Self {
        Self {
            is_authenticated: false,
            id: None,
            email: None,
            role: None,
        }
    }

    fn for_claims(claims: &SessionClaims) -> Self {
        Self {
            is_authenticated: true,
            id: Some(claims.user_id.clone()),
            email: Some(claims.email.clone()),
            role: Some(claims.role.as_str().to_string()),
        }
    }
}

/// Handler for `GET /api/auth`: reports whether the caller holds a valid
/// session. Never errors; a missing or forged cookie is just anonymous.
async fn handle_auth_state(State(state): State<AppState>, headers: HeaderMap) -> Json<AuthState> {
    match current_session(&state, &headers) {
        Some(claims) => Json(AuthState::for_claims(&claims)),
        None => Json(AuthState::anonymous()),
    }
}

/// Handler for `POST /api/auth`: login, signup, or logout. Login and
/// signup set the signed session cookie; logout clears it.
async fn handle_auth(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<Response, AppError> {
    match req.action.as_str() {
        "login" => {
            let username = req
                .username
                .or(req.email)
                .ok_or_else(|| bad_request("username or email is required"))?;
            let password = req
                .password
                .ok_or_else(|| bad_request("password is required"))?;

            let user = match state.store.find_user_by_username(&username).await {
                Ok(Some(u)) => Some(u),
                Ok(None) => state
                    .store
                    .find_user_by_email(&username)
                    .await
                    .map_err(internal)?,
                Err(e) => return Err(internal(e)),
            };
            let user = user.filter(|u| {
                session::verify_password(&password, &u.password_digest, &u.password_salt)
            });
            let user = user.ok_or_else(|| unauthorized("invalid credentials"))?;

            info!(username = %user.username, "login");
            Ok(login_response(&state, &user))
        }
        "signup" => {
            let username = req
                .username
                .ok_or_else(|| bad_request("username is required"))?;
            let email = req.email.ok_or_else(|| bad_request("email is required"))?;
            let password = req
                .password
                .ok_or_else(|| bad_request("password is required"))?;
            if password.len() < 4 {
                return Err(bad_request("password must be at least 4 characters"));
            }

            let (digest, salt) = session::hash_password(&password);
            let user = User {
                id: uuid::Uuid::new_v4().to_string(),
                email,
                username,
                role: Role::User,
                password_digest: digest,
                password_salt: salt,
            };
            state
                .store
                .create_user(&user)
                .await
                .map_err(|e| bad_request(e.to_string()))?;

            info!(username = %user.username, "signup");
            Ok(login_response(&state, &user))
        }
        "logout" => {
            let mut response = Json(AuthState::anonymous()).into_response();
            if let Ok(value) = session::clear_cookie().parse() {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
            Ok(response)
        }
        other => Err(bad_request(format!("unknown auth action: {}", other))),
    }
}

fn login_response(state: &AppState, user: &User) -> Response {
    let claims = SessionClaims::new(&user.id, &user.email, user.role);
    let token = session::sign(&state.session_secret, &claims);
    let mut response = Json(AuthState::for_claims(&claims)).into_response();
    if let Ok(value) = session::session_cookie(&token).parse() {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

// ============ POST /api/upload ============

#[derive(Serialize)]
struct UploadResponse {
    results: Vec<ingest::UploadResult>,
}

/// Handler for `POST /api/upload`. Accepts a multipart form with one or
/// more `files` fields; each file is processed independently so one bad
/// file never fails the batch.
async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    require_session(&state, &headers)?;

    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = field
            .file_name()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "upload".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(e.to_string()))?;
        files.push((name, bytes.to_vec()));
    }
    if files.is_empty() {
        return Err(bad_request("no files provided"));
    }

    let results = ingest::process_uploads(&files, &state.config, state.store.as_ref()).await;
    Ok(Json(UploadResponse { results }))
}

// ============ POST /api/chat/complete ============

#[derive(Deserialize)]
struct CompleteRequest {
    message: String,
    #[serde(default)]
    model: Option<String>,
}

/// Handler for `POST /api/chat/complete`. Retrieves relevant documents,
/// dispatches to the resolved provider, and returns `{content, citations}`.
/// A provider failure maps to 502 rather than a silent mock answer.
async fn handle_complete(
    State(state): State<AppState>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<completion::Completion>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let model = req
        .model
        .unwrap_or_else(|| state.config.llm.default_model.clone());

    let result = completion::complete_chat(
        &state.config,
        state.store.as_ref(),
        &req.message,
        &model,
    )
    .await
    .map_err(|e| completion_failed(e.to_string()))?;
    Ok(Json(result))
}

// ============ /api/chats ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatView {
    id: String,
    title: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ChatView {
    fn from(chat: &crate::models::Chat) -> Self {
        Self {
            id: chat.id.clone(),
            title: chat.title.clone(),
            created_at: format_ts_iso(chat.created_at),
            updated_at: format_ts_iso(chat.updated_at),
        }
    }
}

#[derive(Deserialize, Default)]
struct ChatBody {
    #[serde(default)]
    title: Option<String>,
}

async fn handle_list_chats(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatView>>, AppError> {
    let chats = state.store.list_chats().await.map_err(internal)?;
    Ok(Json(chats.iter().map(ChatView::from).collect()))
}

async fn handle_create_chat(
    State(state): State<AppState>,
    body: Option<Json<ChatBody>>,
) -> Result<Json<ChatView>, AppError> {
    let title = body.and_then(|Json(b)| b.title);
    let chat = state.store.create_chat(title).await.map_err(internal)?;
    Ok(Json(ChatView::from(&chat)))
}

async fn handle_rename_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatView>, AppError> {
    require_session(&state, &headers)?;
    let chat = state
        .store
        .rename_chat(&id, body.title)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("no chat with id: {}", id)))?;
    Ok(Json(ChatView::from(&chat)))
}

async fn handle_delete_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_session(&state, &headers)?;
    let deleted = state.store.delete_chat(&id).await.map_err(internal)?;
    if !deleted {
        return Err(not_found(format!("no chat with id: {}", id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ============ /api/chats/{id}/messages ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageView {
    id: String,
    chat_id: String,
    sender: Sender,
    content: String,
    created_at: String,
}

impl MessageView {
    fn from(m: &crate::models::Message) -> Self {
        Self {
            id: m.id.clone(),
            chat_id: m.chat_id.clone(),
            sender: m.sender,
            content: m.content.clone(),
            created_at: format_ts_iso(m.created_at),
        }
    }
}

#[derive(Deserialize)]
struct AppendRequest {
    sender: Sender,
    content: String,
}

async fn handle_list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageView>>, AppError> {
    if state
        .store
        .get_chat(&id)
        .await
        .map_err(internal)?
        .is_none()
    {
        return Err(not_found(format!("no chat with id: {}", id)));
    }
    let messages = state.store.list_messages(&id).await.map_err(internal)?;
    Ok(Json(messages.iter().map(MessageView::from).collect()))
}

async fn handle_append_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AppendRequest>,
) -> Result<Json<MessageView>, AppError> {
    if req.content.trim().is_empty() {
        return Err(bad_request("content must not be empty"));
    }
    if state
        .store
        .get_chat(&id)
        .await
        .map_err(internal)?
        .is_none()
    {
        return Err(not_found(format!("no chat with id: {}", id)));
    }
    // The chat exists, so any remaining failure is the store itself.
    let message = state
        .store
        .append_message(&id, req.sender, &req.content)
        .await
        .map_err(internal)?;
    Ok(Json(MessageView::from(&message)))
}

// ============ /api/documents ============

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

/// Listing shape consumed by the document manager UI.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentListItem {
    id: String,
    title: String,
    version: u32,
    status: String,
    uploaded_at: String,
    tags: Vec<String>,
}

impl DocumentListItem {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            version: 1,
            status: "Embedded".to_string(),
            uploaded_at: format_ts_iso(doc.created_at),
            tags: doc.tags(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentListResponse {
    items: Vec<DocumentListItem>,
    total_pages: u32,
}

async fn handle_list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    let page = state
        .store
        .list_documents(page, limit)
        .await
        .map_err(internal)?;
    Ok(Json(DocumentListResponse {
        items: page.items.iter().map(DocumentListItem::from).collect(),
        total_pages: page.total_pages,
    }))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let doc = state
        .store
        .get_document(&id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("no document with id: {}", id)))?;
    Ok(Json(doc))
}

#[derive(Deserialize)]
struct DocumentUpdateRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

async fn handle_update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DocumentUpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.title.is_none() && req.tags.is_none() {
        return Err(bad_request("nothing to update"));
    }
    let update = DocumentUpdate {
        title: req.title,
        tags: req.tags,
    };
    let updated = state
        .store
        .update_document(&id, &update)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(not_found(format!("no document with id: {}", id)));
    }
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state
        .store
        .delete_document(&id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(not_found(format!("no document with id: {}", id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ============ GET /api/summary ============

async fn handle_summary(
    State(state): State<AppState>,
) -> Result<Json<stats::Summary>, AppError> {
    let summary = stats::summarize(state.store.as_ref())
        .await
        .map_err(internal)?;
    Ok(Json(summary))
}

// ============ GET/PUT /api/settings ============

async fn handle_get_settings(State(state): State<AppState>) -> Result<Json<Settings>, AppError> {
    let settings = state
        .settings
        .read()
        .map_err(|_| internal(anyhow::anyhow!("settings lock poisoned")))?;
    Ok(Json(settings.clone()))
}

async fn handle_update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<Settings>, AppError> {
    require_session(&state, &headers)?;
    let mut settings = state
        .settings
        .write()
        .map_err(|_| internal(anyhow::anyhow!("settings lock poisoned")))?;
    settings.apply(update);
    Ok(Json(settings.clone()))
}
