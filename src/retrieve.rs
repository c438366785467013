//! Keyword-overlap retrieval over recently stored documents.
//!
//! Scoring is a linear term-overlap heuristic: per query term, +3 for a
//! title hit, +1 for a body hit, and +2 when the body contains the full
//! query phrase. The ranked cut is purely top-N by score — zero-score
//! documents fill out the cut when too few score positively, so the model
//! always gets some context. `doc_limit` and `max_sources` are the config
//! tunables around this behavior.
//!
//! Retrieval is read-only and deterministic: the same query over the same
//! stored set yields identical output.

use anyhow::Result;

use crate::config::RetrievalConfig;
use crate::models::{Document, ScoredSource};
use crate::store::Store;

/// A scored candidate, before the score is stripped for the public result.
#[derive(Debug, Clone)]
pub struct RankedSource {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub score: i64,
}

/// Fetches the most recent documents and returns the ranked snippet cut for
/// a query. The score field is stripped from the public result.
pub async fn retrieve(
    store: &dyn Store,
    config: &RetrievalConfig,
    query: &str,
) -> Result<Vec<ScoredSource>> {
    let ranked = retrieve_ranked(store, config, query).await?;
    Ok(ranked
        .into_iter()
        .map(|r| ScoredSource {
            id: r.id,
            title: r.title,
            snippet: r.snippet,
        })
        .collect())
}

/// Like [`retrieve`] but keeps scores, for the CLI search command.
pub async fn retrieve_ranked(
    store: &dyn Store,
    config: &RetrievalConfig,
    query: &str,
) -> Result<Vec<RankedSource>> {
    let docs = store.recent_documents(config.doc_limit).await?;
    Ok(rank_documents(query, &docs, config.max_sources))
}

/// Pure ranking over an already recency-sorted document slice. Stable sort
/// keeps recency order among equal scores.
pub fn rank_documents(query: &str, docs: &[Document], max_sources: usize) -> Vec<RankedSource> {
    let query_lower = query.to_lowercase();
    let terms: Vec<&str> = query_lower
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .collect();

    let mut ranked: Vec<RankedSource> = docs
        .iter()
        .map(|doc| {
            let body = doc.body_text();
            let title_lower = doc.title.to_lowercase();
            let body_lower = body.to_lowercase();

            let mut score = 0i64;
            for term in &terms {
                if title_lower.contains(term) {
                    score += 3;
                }
                if body_lower.contains(term) {
                    score += 1;
                }
                // Phrase bonus applies once per term, as the scorer always has.
                if body_lower.contains(&query_lower) {
                    score += 2;
                }
            }

            RankedSource {
                id: doc.id.clone(),
                title: doc.title.clone(),
                snippet: select_snippet(doc, &body, &terms),
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(max_sources);
    ranked
}

/// The section richest in query terms wins (first match, capped at 2000
/// chars); otherwise the first 3000 chars of the whole body.
fn select_snippet(doc: &Document, body: &str, terms: &[&str]) -> String {
    for section in &doc.sections {
        let section_text = format!("{}\n{}", section.heading, section.body);
        let section_lower = section_text.to_lowercase();
        if terms.iter().any(|t| section_lower.contains(t)) {
            return truncate_chars(&section_text, 2000);
        }
    }
    truncate_chars(body, 3000)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
