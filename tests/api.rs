//! HTTP API integration tests.
//!
//! Each test boots the server in-process on a free port against an
//! in-memory store and drives it with a real HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use askdocs::config::Config;
use askdocs::models::{Chat, Document, Message, Sender, User};
use askdocs::server::run_server_with_store;
use askdocs::store::memory::MemoryStore;
use askdocs::store::{create_store, DocumentPage, DocumentUpdate, Store};

fn test_config(port: u16) -> Config {
    let config_content = format!(
        r#"
[server]
bind = "127.0.0.1:{}"

[ocr]
enabled = false
"#,
        port
    );
    toml::from_str(&config_content).unwrap()
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn start_server() -> (u16, JoinHandle<()>) {
    let port = find_free_port();
    let cfg = test_config(port);
    let store = create_store(&cfg).await.unwrap();
    let handle = tokio::spawn(async move {
        run_server_with_store(&cfg, store).await.ok();
    });
    wait_for_server(port).await;
    (port, handle)
}

fn url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{}{}", port, path)
}

/// Logs in as the seeded admin and returns the session cookie value.
async fn login(client: &reqwest::Client, port: u16) -> String {
    let resp = client
        .post(url(port, "/api/auth"))
        .json(&json!({"action": "login", "username": "admin", "password": "admin"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let set_cookie = resp
        .headers()
        .get("set-cookie")
        .expect("login should set a cookie")
        .to_str()
        .unwrap();
    set_cookie
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let (port, handle) = start_server().await;
    let resp = reqwest::get(url(port, "/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some());
    handle.abort();
}

#[tokio::test]
async fn test_auth_login_and_session_state() {
    let (port, handle) = start_server().await;
    let client = reqwest::Client::new();

    // Anonymous by default.
    let body: Value = client
        .get(url(port, "/api/auth"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["isAuthenticated"], false);

    // Wrong password is rejected.
    let resp = client
        .post(url(port, "/api/auth"))
        .json(&json!({"action": "login", "username": "admin", "password": "wrong"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Valid login yields a session cookie that authenticates.
    let cookie = login(&client, port).await;
    let body: Value = client
        .get(url(port, "/api/auth"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["isAuthenticated"], true);
    assert_eq!(body["role"], "admin");
    assert_eq!(body["email"], "admin@example.com");

    // A tampered cookie is just anonymous, not an error.
    let forged = format!("{}x", cookie);
    let body: Value = client
        .get(url(port, "/api/auth"))
        .header("cookie", &forged)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["isAuthenticated"], false);

    handle.abort();
}

#[tokio::test]
async fn test_auth_signup_and_logout() {
    let (port, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(url(port, "/api/auth"))
        .json(&json!({
            "action": "signup",
            "username": "casey",
            "email": "casey@example.com",
            "password": "hunter2"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["isAuthenticated"], true);
    assert_eq!(body["role"], "user");

    // Duplicate username is a client error.
    let resp = client
        .post(url(port, "/api/auth"))
        .json(&json!({
            "action": "signup",
            "username": "casey",
            "email": "other@example.com",
            "password": "hunter2"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Logout clears the cookie.
    let resp = client
        .post(url(port, "/api/auth"))
        .json(&json!({"action": "logout"}))
        .send()
        .await
        .unwrap();
    let set_cookie = resp.headers().get("set-cookie").unwrap().to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=0"));

    handle.abort();
}

#[tokio::test]
async fn test_upload_requires_session() {
    let (port, handle) = start_server().await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().part(
        "files",
        reqwest::multipart::Part::bytes(b"some text".to_vec()).file_name("notes.txt"),
    );
    let resp = client
        .post(url(port, "/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");

    handle.abort();
}

#[tokio::test]
async fn test_upload_and_list_documents() {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        return;
    }
    let (port, handle) = start_server().await;
    let client = reqwest::Client::new();
    let cookie = login(&client, port).await;

    // One good file, one unsupported; results are independent.
    let form = reqwest::multipart::Form::new()
        .part(
            "files",
            reqwest::multipart::Part::bytes(b"Revenue grew 40% in Q3.".to_vec())
                .file_name("notes.txt"),
        )
        .part(
            "files",
            reqwest::multipart::Part::bytes(b"binary".to_vec()).file_name("photo.png"),
        );
    let resp = client
        .post(url(port, "/api/upload"))
        .header("cookie", &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[0]["name"], "notes.txt");
    assert_eq!(results[1]["status"], "error");

    // The processed file appears in the listing.
    let body: Value = client
        .get(url(port, "/api/documents?page=1&limit=10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "notes.txt");
    assert_eq!(items[0]["status"], "Embedded");
    assert_eq!(items[0]["version"], 1);
    assert_eq!(body["totalPages"], 1);

    // Full fetch includes the content sections.
    let id = items[0]["id"].as_str().unwrap();
    let doc: Value = client
        .get(url(port, &format!("/api/documents/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(doc["sections"][0]["heading"], "Content");

    handle.abort();
}

#[tokio::test]
async fn test_document_update_and_delete() {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        return;
    }
    let (port, handle) = start_server().await;
    let client = reqwest::Client::new();
    let cookie = login(&client, port).await;

    let form = reqwest::multipart::Form::new().part(
        "files",
        reqwest::multipart::Part::bytes(b"runbook contents".to_vec()).file_name("runbook.txt"),
    );
    let body: Value = client
        .post(url(port, "/api/upload"))
        .header("cookie", &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = body["results"][0]["id"].as_str().unwrap().to_string();

    // Rename and tag.
    let resp = client
        .put(url(port, &format!("/api/documents/{}", id)))
        .json(&json!({"title": "Ops Runbook", "tags": ["ops"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let doc: Value = client
        .get(url(port, &format!("/api/documents/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(doc["title"], "Ops Runbook");

    // Delete, then it is gone.
    let resp = client
        .delete(url(port, &format!("/api/documents/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resp = client
        .get(url(port, &format!("/api/documents/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    handle.abort();
}

#[tokio::test]
async fn test_chat_complete_mock() {
    if std::env::var("OPENAI_API_KEY").is_ok() || std::env::var("ANTHROPIC_API_KEY").is_ok() {
        return;
    }
    let (port, handle) = start_server().await;
    let client = reqwest::Client::new();

    // Empty message is rejected.
    let resp = client
        .post(url(port, "/api/chat/complete"))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Without provider credentials the mock answers deterministically.
    let resp = client
        .post(url(port, "/api/chat/complete"))
        .json(&json!({"message": "what grew?", "model": "gpt-4o"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["content"], "Mock response (gpt-4o): what grew?");
    assert!(body["citations"].as_array().unwrap().is_empty());

    // Unknown model names fall back to the auto entry.
    let body: Value = client
        .post(url(port, "/api/chat/complete"))
        .json(&json!({"message": "hi", "model": "gpt-99"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["content"], "Mock response (gpt-4o-mini): hi");

    handle.abort();
}

#[tokio::test]
async fn test_chat_lifecycle() {
    let (port, handle) = start_server().await;
    let client = reqwest::Client::new();
    let cookie = login(&client, port).await;

    // Create with no title.
    let chat: Value = client
        .post(url(port, "/api/chats"))
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let chat_id = chat["id"].as_str().unwrap().to_string();
    assert!(chat["title"].is_null());

    // Append both sides of an exchange.
    for (sender, content) in [("user", "what grew?"), ("assistant", "revenue")] {
        let resp = client
            .post(url(port, &format!("/api/chats/{}/messages", chat_id)))
            .json(&json!({"sender": sender, "content": content}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let messages: Value = client
        .get(url(port, &format!("/api/chats/{}/messages", chat_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["sender"], "user");
    assert_eq!(messages[1]["sender"], "assistant");

    // Appending to an unknown chat is a 404.
    let resp = client
        .post(url(port, "/api/chats/nope/messages"))
        .json(&json!({"sender": "user", "content": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Rename requires a session.
    let resp = client
        .patch(url(port, &format!("/api/chats/{}", chat_id)))
        .json(&json!({"title": "Q3 review"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let renamed: Value = client
        .patch(url(port, &format!("/api/chats/{}", chat_id)))
        .header("cookie", &cookie)
        .json(&json!({"title": "Q3 review"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(renamed["title"], "Q3 review");

    // Delete cascades to messages.
    let resp = client
        .delete(url(port, &format!("/api/chats/{}", chat_id)))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resp = client
        .get(url(port, &format!("/api/chats/{}/messages", chat_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    handle.abort();
}

#[tokio::test]
async fn test_summary_shape() {
    let (port, handle) = start_server().await;
    let client = reqwest::Client::new();

    let chat: Value = client
        .post(url(port, "/api/chats"))
        .json(&json!({"title": "Budget"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let chat_id = chat["id"].as_str().unwrap();
    client
        .post(url(port, &format!("/api/chats/{}/messages", chat_id)))
        .json(&json!({"sender": "user", "content": "how much?"}))
        .send()
        .await
        .unwrap();

    let body: Value = client
        .get(url(port, "/api/summary"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["documents"], 0);
    assert_eq!(body["activeChats"], 1);
    assert_eq!(body["recentChats"][0]["name"], "Budget");
    let uploads = body["trends"]["uploadsPerDay"].as_array().unwrap();
    let queries = body["trends"]["queriesPerDay"].as_array().unwrap();
    assert_eq!(uploads.len(), 7);
    assert_eq!(queries.len(), 7);
    // Today's bucket counts the user message we just sent.
    assert_eq!(queries[6]["count"], 1);

    handle.abort();
}

#[tokio::test]
async fn test_settings_get_and_update() {
    let (port, handle) = start_server().await;
    let client = reqwest::Client::new();

    // Defaults are served until someone changes them.
    let body: Value = client
        .get(url(port, "/api/settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["organizationName"], "Acme Corp");
    assert_eq!(body["primaryColor"], "#3b82f6");
    assert_eq!(body["tokenLimit"], 100000);

    // Updating requires a session.
    let resp = client
        .put(url(port, "/api/settings"))
        .json(&json!({"organizationName": "Initech"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // A partial update merges into the current values.
    let cookie = login(&client, port).await;
    let body: Value = client
        .put(url(port, "/api/settings"))
        .header("cookie", &cookie)
        .json(&json!({"organizationName": "Initech", "tokenLimit": 50000}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["organizationName"], "Initech");
    assert_eq!(body["tokenLimit"], 50000);
    assert_eq!(body["secondaryColor"], "#10b981");

    // Subsequent reads see the merged state.
    let body: Value = client
        .get(url(port, "/api/settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["organizationName"], "Initech");

    handle.abort();
}

/// In-memory backend whose message appends always fail, for exercising
/// how handlers map storage errors.
struct FailingAppendStore {
    inner: MemoryStore,
}

#[async_trait]
impl Store for FailingAppendStore {
    async fn insert_document(&self, doc: &Document) -> anyhow::Result<()> {
        self.inner.insert_document(doc).await
    }

    async fn get_document(&self, id: &str) -> anyhow::Result<Option<Document>> {
        self.inner.get_document(id).await
    }

    async fn list_documents(&self, page: u32, limit: u32) -> anyhow::Result<DocumentPage> {
        self.inner.list_documents(page, limit).await
    }

    async fn recent_documents(&self, limit: i64) -> anyhow::Result<Vec<Document>> {
        self.inner.recent_documents(limit).await
    }

    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> anyhow::Result<bool> {
        self.inner.update_document(id, update).await
    }

    async fn delete_document(&self, id: &str) -> anyhow::Result<bool> {
        self.inner.delete_document(id).await
    }

    async fn create_chat(&self, title: Option<String>) -> anyhow::Result<Chat> {
        self.inner.create_chat(title).await
    }

    async fn list_chats(&self) -> anyhow::Result<Vec<Chat>> {
        self.inner.list_chats().await
    }

    async fn get_chat(&self, id: &str) -> anyhow::Result<Option<Chat>> {
        self.inner.get_chat(id).await
    }

    async fn rename_chat(&self, id: &str, title: Option<String>) -> anyhow::Result<Option<Chat>> {
        self.inner.rename_chat(id, title).await
    }

    async fn delete_chat(&self, id: &str) -> anyhow::Result<bool> {
        self.inner.delete_chat(id).await
    }

    async fn append_message(
        &self,
        _chat_id: &str,
        _sender: Sender,
        _content: &str,
    ) -> anyhow::Result<Message> {
        anyhow::bail!("disk full")
    }

    async fn list_messages(&self, chat_id: &str) -> anyhow::Result<Vec<Message>> {
        self.inner.list_messages(chat_id).await
    }

    async fn messages_since(&self, since: i64) -> anyhow::Result<Vec<Message>> {
        self.inner.messages_since(since).await
    }

    async fn create_user(&self, user: &User) -> anyhow::Result<()> {
        self.inner.create_user(user).await
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.inner.find_user_by_username(username).await
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.inner.find_user_by_email(email).await
    }
}

#[tokio::test]
async fn test_append_failure_on_existing_chat_is_internal() {
    let port = find_free_port();
    let cfg = test_config(port);
    let store: Arc<dyn Store> = Arc::new(FailingAppendStore {
        inner: MemoryStore::new(),
    });
    let handle = tokio::spawn(async move {
        run_server_with_store(&cfg, store).await.ok();
    });
    wait_for_server(port).await;
    let client = reqwest::Client::new();

    let chat: Value = client
        .post(url(port, "/api/chats"))
        .json(&json!({"title": "Ops"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let chat_id = chat["id"].as_str().unwrap();

    // The chat exists, so a storage failure must surface as a 500,
    // not masquerade as a missing chat.
    let resp = client
        .post(url(port, &format!("/api/chats/{}/messages", chat_id)))
        .json(&json!({"sender": "user", "content": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "internal");

    handle.abort();
}
