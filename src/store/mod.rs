//! Storage abstraction for documents, chats, messages, and accounts.
//!
//! The [`Store`] trait is the injectable seam between the HTTP/CLI layers
//! and persistence. Two backends conform: [`sqlite::SqliteStore`] when a
//! `[db]` section is configured, and [`memory::MemoryStore`] as the
//! demo/dev fallback (and the test double). Neither is a module-level
//! singleton; callers receive an `Arc<dyn Store>` built by [`create_store`].

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::config::Config;
use crate::models::{Chat, Document, Message, Role, Sender, User};
use crate::session;

/// One page of the document listing.
#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub items: Vec<Document>,
    pub total_pages: u32,
}

/// Editable document fields. Content sections are immutable once stored.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Abstract storage backend.
///
/// All operations are async (`async-trait`); the in-memory backend returns
/// immediately-ready futures. Implementations must be `Send + Sync`.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- documents ----

    /// Persists a standardized document.
    async fn insert_document(&self, doc: &Document) -> Result<()>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// Recency-ordered page; `page` is 1-based.
    async fn list_documents(&self, page: u32, limit: u32) -> Result<DocumentPage>;

    /// The `limit` most recently created documents, newest first. This is
    /// the retriever's read path and never mutates state.
    async fn recent_documents(&self, limit: i64) -> Result<Vec<Document>>;

    /// Applies a metadata update. Returns false when the id is unknown.
    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> Result<bool>;

    /// Returns false when the id is unknown.
    async fn delete_document(&self, id: &str) -> Result<bool>;

    // ---- chats ----

    async fn create_chat(&self, title: Option<String>) -> Result<Chat>;

    /// All chats, most recently updated first.
    async fn list_chats(&self) -> Result<Vec<Chat>>;

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>>;

    /// Renames a chat and bumps its `updated_at`.
    async fn rename_chat(&self, id: &str, title: Option<String>) -> Result<Option<Chat>>;

    /// Deletes a chat and all of its messages.
    async fn delete_chat(&self, id: &str) -> Result<bool>;

    // ---- messages ----

    /// Appends a message and bumps the parent chat's `updated_at` to a
    /// value >= its previous one. Errors when the chat does not exist.
    async fn append_message(&self, chat_id: &str, sender: Sender, content: &str)
        -> Result<Message>;

    /// Messages for a chat, ordered by creation time.
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>>;

    /// All messages created at or after `since` (unix seconds), for the
    /// dashboard trend buckets.
    async fn messages_since(&self, since: i64) -> Result<Vec<Message>>;

    // ---- users ----

    /// Errors when the username or email is already taken.
    async fn create_user(&self, user: &User) -> Result<()>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Builds the configured backend and seeds the admin account.
pub async fn create_store(config: &Config) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match &config.db {
        Some(_) => {
            info!("using sqlite store");
            Arc::new(sqlite::SqliteStore::connect(config).await?)
        }
        None => {
            info!("no [db] configured, using in-memory store");
            Arc::new(memory::MemoryStore::new())
        }
    };
    seed_admin(store.as_ref(), config).await?;
    Ok(store)
}

/// Creates the configured admin account if it does not exist yet.
pub async fn seed_admin(store: &dyn Store, config: &Config) -> Result<()> {
    if store
        .find_user_by_username(&config.auth.admin_username)
        .await?
        .is_some()
    {
        return Ok(());
    }
    let (digest, salt) = session::hash_password(&config.auth.admin_password);
    store
        .create_user(&User {
            id: uuid::Uuid::new_v4().to_string(),
            email: config.auth.admin_email.clone(),
            username: config.auth.admin_username.clone(),
            role: Role::Admin,
            password_digest: digest,
            password_salt: salt,
        })
        .await?;
    info!(username = %config.auth.admin_username, "seeded admin account");
    Ok(())
}
