//! Dashboard summary: counts, recent activity, seven-day trends.

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use serde::Serialize;

use crate::models::{format_ts_iso, Sender};
use crate::store::Store;

const RECENT_LIMIT: usize = 5;
const TREND_DAYS: i64 = 7;

#[derive(Debug, Serialize)]
pub struct RecentItem {
    pub id: String,
    pub name: String,
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub uploads_per_day: Vec<TrendPoint>,
    pub queries_per_day: Vec<TrendPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub documents: u64,
    pub active_chats: u64,
    pub recent_docs: Vec<RecentItem>,
    pub recent_chats: Vec<RecentItem>,
    pub trends: Trends,
}

/// Buckets timestamps into per-day counts over the trailing window,
/// oldest day first. Days with no activity appear with a zero count.
fn daily_counts(timestamps: &[i64], now: i64) -> Vec<TrendPoint> {
    let today = Utc
        .timestamp_opt(now, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .date_naive();
    (0..TREND_DAYS)
        .rev()
        .map(|back| {
            let day = today - Duration::days(back);
            let count = timestamps
                .iter()
                .filter(|ts| {
                    Utc.timestamp_opt(**ts, 0)
                        .single()
                        .map(|t| t.date_naive() == day)
                        .unwrap_or(false)
                })
                .count() as u64;
            TrendPoint {
                date: day.format("%Y-%m-%d").to_string(),
                count,
            }
        })
        .collect()
}

/// Display name for a chat: its title, else `Chat {id prefix}`.
fn chat_name(id: &str, title: Option<&str>) -> String {
    match title {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => format!("Chat {}", &id[..id.len().min(4)]),
    }
}

/// Assembles the full dashboard summary from the store.
pub async fn summarize(store: &dyn Store) -> Result<Summary> {
    let now = crate::models::now_ts();
    let window_start = now - TREND_DAYS * 86_400;

    let docs = store.recent_documents(i64::MAX).await?;
    let chats = store.list_chats().await?;
    let recent_messages = store.messages_since(window_start).await?;

    let recent_docs = docs
        .iter()
        .take(RECENT_LIMIT)
        .map(|d| RecentItem {
            id: d.id.clone(),
            name: d.title.clone(),
            date: format_ts_iso(d.created_at),
        })
        .collect();

    let recent_chats = chats
        .iter()
        .take(RECENT_LIMIT)
        .map(|c| RecentItem {
            id: c.id.clone(),
            name: chat_name(&c.id, c.title.as_deref()),
            date: format_ts_iso(c.updated_at),
        })
        .collect();

    let upload_ts: Vec<i64> = docs
        .iter()
        .map(|d| d.created_at)
        .filter(|ts| *ts >= window_start)
        .collect();
    let query_ts: Vec<i64> = recent_messages
        .iter()
        .filter(|m| m.sender == Sender::User)
        .map(|m| m.created_at)
        .collect();

    Ok(Summary {
        documents: docs.len() as u64,
        active_chats: chats.len() as u64,
        recent_docs,
        recent_chats,
        trends: Trends {
            uploads_per_day: daily_counts(&upload_ts, now),
            queries_per_day: daily_counts(&query_ts, now),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{now_ts, Document};
    use crate::store::memory::MemoryStore;

    fn doc(title: &str) -> Document {
        Document {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            sections: Vec::new(),
            metadata: serde_json::json!({}),
            created_at: now_ts(),
        }
    }

    #[test]
    fn daily_counts_cover_the_full_window() {
        let now = now_ts();
        let points = daily_counts(&[now, now, now - 86_400], now);
        assert_eq!(points.len(), 7);
        assert_eq!(points[6].count, 2);
        assert_eq!(points[5].count, 1);
        assert_eq!(points[0].count, 0);
    }

    #[test]
    fn chat_name_falls_back_to_id_prefix() {
        assert_eq!(chat_name("abcd1234", Some("Budget")), "Budget");
        assert_eq!(chat_name("abcd1234", None), "Chat abcd");
        assert_eq!(chat_name("ab", Some("  ")), "Chat ab");
    }

    #[tokio::test]
    async fn summary_counts_docs_chats_and_queries() {
        let store = MemoryStore::new();
        store.insert_document(&doc("a.txt")).await.unwrap();
        store.insert_document(&doc("b.txt")).await.unwrap();
        let chat = store
            .create_chat(Some("Budget review".to_string()))
            .await
            .unwrap();
        store
            .append_message(&chat.id, Sender::User, "what grew?")
            .await
            .unwrap();
        store
            .append_message(&chat.id, Sender::Assistant, "revenue")
            .await
            .unwrap();

        let summary = summarize(&store).await.unwrap();
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.active_chats, 1);
        assert_eq!(summary.recent_docs.len(), 2);
        assert_eq!(summary.recent_chats[0].name, "Budget review");
        // Only user messages count as queries.
        let today = summary.trends.queries_per_day.last().unwrap();
        assert_eq!(today.count, 1);
    }
}
