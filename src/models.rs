//! Core data models shared across the ingestion, retrieval, and chat layers.

use serde::{Deserialize, Serialize};

/// One heading/body pair inside a standardized document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub body: String,
}

/// A standardized document as stored. Content is immutable once written;
/// only title and metadata tags are editable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

impl Document {
    /// Concatenated section text in the form the retriever scores against.
    pub fn body_text(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("{}\n{}", s.heading, s.body))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Tags stored under `metadata.tags`, if any.
    pub fn tags(&self) -> Vec<String> {
        self.metadata
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A ranked context snippet handed to the completion service. Derived per
/// query and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSource {
    pub id: String,
    pub title: String,
    pub snippet: String,
}

/// A `{id, title}` reference to a source document cited by a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub title: String,
}

/// A chat session. `updated_at` is bumped on every message append.
#[derive(Debug, Clone, Serialize)]
pub struct Chat {
    pub id: String,
    pub title: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Sender::User),
            "assistant" => Some(Sender::Assistant),
            _ => None,
        }
    }
}

/// A single chat turn. Append-only, owned by its parent chat.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender: Sender,
    pub content: String,
    pub created_at: i64,
}

/// Account role. Admin unlocks the dashboard surface in the UI; the API
/// treats both the same apart from the reported role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

/// A registered account. Passwords are stored as salted SHA-256 digests.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub password_digest: String,
    pub password_salt: String,
}

/// Formats a unix-seconds timestamp as ISO-8601 UTC for API responses.
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Current time as unix seconds.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_text_joins_sections_with_headings() {
        let doc = Document {
            id: "d1".to_string(),
            title: "t".to_string(),
            sections: vec![
                Section {
                    heading: "Intro".to_string(),
                    body: "alpha".to_string(),
                },
                Section {
                    heading: "Detail".to_string(),
                    body: "beta".to_string(),
                },
            ],
            metadata: serde_json::json!({}),
            created_at: 0,
        };
        assert_eq!(doc.body_text(), "Intro\nalpha\n\nDetail\nbeta");
    }

    #[test]
    fn tags_read_from_metadata() {
        let doc = Document {
            id: "d1".to_string(),
            title: "t".to_string(),
            sections: vec![],
            metadata: serde_json::json!({ "tags": ["q1", "finance"] }),
            created_at: 0,
        };
        assert_eq!(doc.tags(), vec!["q1".to_string(), "finance".to_string()]);
    }

    #[test]
    fn sender_round_trips() {
        assert_eq!(Sender::parse("assistant"), Some(Sender::Assistant));
        assert_eq!(Sender::parse("nobody"), None);
        assert_eq!(Sender::User.as_str(), "user");
    }
}
