//! SQLite [`Store`] backend over sqlx.
//!
//! Document sections and metadata are stored as a JSON column
//! (`content_json`), mirroring the standardized schema. Chat deletion runs
//! messages-then-chat inside one transaction so a crash cannot orphan
//! messages.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::models::{now_ts, Chat, Document, Message, Role, Sender, Section, User};

use super::{DocumentPage, DocumentUpdate, Store};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens the configured database. Schema must already exist
    /// (`askd init`).
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self { pool })
    }
}

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct ContentJson {
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    metadata: serde_json::Value,
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    let content: ContentJson =
        serde_json::from_str(row.get::<String, _>("content_json").as_str()).unwrap_or_default();
    Document {
        id: row.get("id"),
        title: row.get("title"),
        sections: content.sections,
        metadata: content.metadata,
        created_at: row.get("created_at"),
    }
}

fn row_to_chat(row: &sqlx::sqlite::SqliteRow) -> Chat {
    Chat {
        id: row.get("id"),
        title: row.get("title"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Message {
    let sender: String = row.get("sender");
    Message {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        sender: Sender::parse(&sender).unwrap_or(Sender::User),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        role: Role::parse(&role).unwrap_or(Role::User),
        password_digest: row.get("password_digest"),
        password_salt: row.get("password_salt"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        let content = serde_json::to_string(&ContentJson {
            sections: doc.sections.clone(),
            metadata: doc.metadata.clone(),
        })?;
        sqlx::query(
            "INSERT INTO documents (id, title, content_json, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(content)
        .bind(doc.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, title, content_json, created_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_document))
    }

    async fn list_documents(&self, page: u32, limit: u32) -> Result<DocumentPage> {
        let limit = limit.max(1) as i64;
        let offset = (page.max(1) as i64 - 1) * limit;
        let rows = sqlx::query(
            "SELECT id, title, content_json, created_at FROM documents \
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let total_pages = ((count + limit - 1) / limit).max(1) as u32;
        Ok(DocumentPage {
            items: rows.iter().map(row_to_document).collect(),
            total_pages,
        })
    }

    async fn recent_documents(&self, limit: i64) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, title, content_json, created_at FROM documents \
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> Result<bool> {
        let Some(mut doc) = self.get_document(id).await? else {
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
        let content = serde_json::to_string(&ContentJson {
            sections: doc.sections,
            metadata: doc.metadata,
        })?;
        sqlx::query("UPDATE documents SET title = ?, content_json = ? WHERE id = ?")
            .bind(&doc.title)
            .bind(content)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_chat(&self, title: Option<String>) -> Result<Chat> {
        let now = now_ts();
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            title,
            created_at: now,
            updated_at: now,
        };
        sqlx::query("INSERT INTO chats (id, title, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&chat.id)
            .bind(&chat.title)
            .bind(chat.created_at)
            .bind(chat.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(chat)
    }

    async fn list_chats(&self) -> Result<Vec<Chat>> {
        let rows = sqlx::query(
            "SELECT id, title, created_at, updated_at FROM chats ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_chat).collect())
    }

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>> {
        let row = sqlx::query("SELECT id, title, created_at, updated_at FROM chats WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_chat))
    }

    async fn rename_chat(&self, id: &str, title: Option<String>) -> Result<Option<Chat>> {
        let result = sqlx::query("UPDATE chats SET title = ?, updated_at = ? WHERE id = ?")
            .bind(&title)
            .bind(now_ts())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_chat(id).await
    }

    async fn delete_chat(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE chat_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_message(
        &self,
        chat_id: &str,
        sender: Sender,
        content: &str,
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await?;
        let prev: Option<i64> = sqlx::query_scalar("SELECT updated_at FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(prev) = prev else {
            anyhow::bail!("chat not found: {}", chat_id);
        };
        let created_at = now_ts().max(prev);
        let msg = Message {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            sender,
            content: content.to_string(),
            created_at,
        };
        sqlx::query(
            "INSERT INTO messages (id, chat_id, sender, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&msg.id)
        .bind(&msg.chat_id)
        .bind(msg.sender.as_str())
        .bind(&msg.content)
        .bind(msg.created_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(msg)
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, chat_id, sender, content, created_at FROM messages \
             WHERE chat_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn messages_since(&self, since: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, chat_id, sender, content, created_at FROM messages WHERE created_at >= ?",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, username, role, password_digest, password_salt) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(user.role.as_str())
        .bind(&user.password_digest)
        .bind(&user.password_salt)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, username, role, password_digest, password_salt \
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, username, role, password_digest, password_salt \
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_user))
    }
}
