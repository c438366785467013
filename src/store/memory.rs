//! In-memory [`Store`] used when no `[db]` is configured, and by tests.
//!
//! All tables live behind a single `std::sync::RwLock`, so chat deletion
//! removes the chat and its messages under one write guard.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{now_ts, Chat, Document, Message, Sender, User};

use super::{DocumentPage, DocumentUpdate, Store};

#[derive(Default)]
struct Inner {
    docs: Vec<Document>,
    chats: Vec<Chat>,
    messages: Vec<Message>,
    users: Vec<User>,
}

/// Demo/dev storage backend. Never intended for concurrent production load.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        // Newest first, matching the recency-ordered read paths.
        inner.docs.insert(0, doc.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.docs.iter().find(|d| d.id == id).cloned())
    }

    async fn list_documents(&self, page: u32, limit: u32) -> Result<DocumentPage> {
        let inner = self.inner.read().unwrap();
        let limit = limit.max(1) as usize;
        let start = (page.max(1) as usize - 1) * limit;
        let items: Vec<Document> = inner.docs.iter().skip(start).take(limit).cloned().collect();
        let total_pages = (inner.docs.len().div_ceil(limit)).max(1) as u32;
        Ok(DocumentPage { items, total_pages })
    }

    async fn recent_documents(&self, limit: i64) -> Result<Vec<Document>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .docs
            .iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let Some(doc) = inner.docs.iter_mut().find(|d| d.id == id) else {
            return Ok(false);
        };
        if let Some(title) = &update.title {
            doc.title = title.clone();
        }
        if let Some(tags) = &update.tags {
            if !doc.metadata.is_object() {
                doc.metadata = serde_json::json!({});
            }
            doc.metadata["tags"] = serde_json::json!(tags);
        }
        Ok(true)
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.docs.len();
        inner.docs.retain(|d| d.id != id);
        Ok(inner.docs.len() < before)
    }

    async fn create_chat(&self, title: Option<String>) -> Result<Chat> {
        let now = now_ts();
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            title,
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.write().unwrap();
        inner.chats.insert(0, chat.clone());
        Ok(chat)
    }

    async fn list_chats(&self) -> Result<Vec<Chat>> {
        let inner = self.inner.read().unwrap();
        let mut chats = inner.chats.clone();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.chats.iter().find(|c| c.id == id).cloned())
    }

    async fn rename_chat(&self, id: &str, title: Option<String>) -> Result<Option<Chat>> {
        let mut inner = self.inner.write().unwrap();
        let Some(chat) = inner.chats.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        chat.title = title;
        chat.updated_at = now_ts().max(chat.updated_at);
        Ok(Some(chat.clone()))
    }

    async fn delete_chat(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.chats.len();
        inner.chats.retain(|c| c.id != id);
        if inner.chats.len() == before {
            return Ok(false);
        }
        inner.messages.retain(|m| m.chat_id != id);
        Ok(true)
    }

    async fn append_message(
        &self,
        chat_id: &str,
        sender: Sender,
        content: &str,
    ) -> Result<Message> {
        let mut inner = self.inner.write().unwrap();
        let Some(chat) = inner.chats.iter_mut().find(|c| c.id == chat_id) else {
            anyhow::bail!("chat not found: {}", chat_id);
        };
        let created_at = now_ts().max(chat.updated_at);
        chat.updated_at = created_at;
        let msg = Message {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            sender,
            content: content.to_string(),
            created_at,
        };
        inner.messages.push(msg.clone());
        Ok(msg)
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let inner = self.inner.read().unwrap();
        let mut msgs: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order within the same second.
        msgs.sort_by_key(|m| m.created_at);
        Ok(msgs)
    }

    async fn messages_since(&self, since: i64) -> Result<Vec<Message>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.created_at >= since)
            .cloned()
            .collect())
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            anyhow::bail!("user already exists: {}", user.username);
        }
        inner.users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }
}
