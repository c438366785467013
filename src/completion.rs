//! Chat completion: prompt assembly and provider dispatch.
//!
//! A logical model name is resolved through a static registry to a provider
//! and concrete model. Providers implement [`CompletionProvider`]; when the
//! selected provider's credential is absent the [`MockProvider`] answers
//! instead, so a missing key degrades rather than failing the request. A
//! provider that fails mid-call surfaces as an error to the caller.
//!
//! Stateless per invocation: retrieval reads the store, the provider call
//! goes out, nothing is written here.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::models::{Citation, ScoredSource};
use crate::retrieve;
use crate::store::Store;

/// Completion output: answer text plus `{id, title}` source citations.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Completion {
    pub content: String,
    pub citations: Vec<Citation>,
}

/// Which upstream vendor serves a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

/// Logical model names the API accepts, mapped to provider + concrete
/// model. Unknown names fall back to the `auto` entry.
const MODEL_REGISTRY: &[(&str, ProviderKind, &str)] = &[
    ("auto", ProviderKind::OpenAi, "gpt-4o-mini"),
    ("gpt-4o", ProviderKind::OpenAi, "gpt-4o"),
    ("gpt-4o-mini", ProviderKind::OpenAi, "gpt-4o-mini"),
    (
        "claude-3.5-sonnet",
        ProviderKind::Anthropic,
        "claude-3-5-sonnet-20241022",
    ),
    (
        "claude-3-haiku",
        ProviderKind::Anthropic,
        "claude-3-haiku-20240307",
    ),
];

/// Resolves a requested logical model, falling back to `auto`.
pub fn resolve_model(requested: &str) -> (ProviderKind, &'static str) {
    match MODEL_REGISTRY
        .iter()
        .find(|(name, _, _)| *name == requested)
    {
        Some((_, kind, model)) => (*kind, *model),
        None => (MODEL_REGISTRY[0].1, MODEL_REGISTRY[0].2),
    }
}

/// A completion backend. All variants share the same prompt contract and
/// return the same `{content, citations}` shape.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn complete(&self, message: &str, sources: &[ScoredSource]) -> Result<Completion>;
}

/// Selects the provider for a logical model: the registry entry's vendor
/// when its credential is present, otherwise the mock.
pub fn provider_for(config: &Config, requested: &str) -> Box<dyn CompletionProvider> {
    let (kind, model) = resolve_model(requested);
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    match kind {
        ProviderKind::OpenAi => match std::env::var("OPENAI_API_KEY") {
            Ok(key) => Box::new(OpenAiProvider {
                api_key: key,
                model: model.to_string(),
                timeout,
            }),
            Err(_) => Box::new(MockProvider {
                model: model.to_string(),
            }),
        },
        ProviderKind::Anthropic => match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) => Box::new(AnthropicProvider {
                api_key: key,
                model: model.to_string(),
                timeout,
            }),
            Err(_) => Box::new(MockProvider {
                model: model.to_string(),
            }),
        },
    }
}

/// Runs the full completion flow for a user message: retrieval, provider
/// selection, outbound call.
pub async fn complete_chat(
    config: &Config,
    store: &dyn Store,
    message: &str,
    requested_model: &str,
) -> Result<Completion> {
    let sources = retrieve::retrieve(store, &config.retrieval, message).await?;
    let provider = provider_for(config, requested_model);
    info!(
        provider = provider.name(),
        sources = sources.len(),
        "dispatching completion"
    );
    provider.complete(message, &sources).await
}

// ============ Prompts ============

const SYSTEM_PROMPT: &str = r#"You are an intelligent business and data analysis assistant. Provide comprehensive, well-formatted responses that help users understand complex topics.

## Response Guidelines:
1. **Natural Intelligence**: Never mention "documents provided" or "knowledge base" - respond as if you naturally know this information
2. **Professional Formatting**: Use markdown formatting extensively: **bold** for key terms, bullet points for lists, code blocks for technical content, headers (##, ###) for structure
3. **Visual Structure**: Organize information with clear sections, step-by-step processes, and key insights highlighted in bold
4. **Data Visualizations**: When presenting numerical data, trends, or comparisons, CREATE CHARTS using this format:
   ```chart
   {
     "type": "bar|line|pie|area",
     "title": "Chart Title",
     "data": [{"name": "Category", "value": 123}],
     "xKey": "name",
     "yKey": "value"
   }
   ```
   Use "bar" for comparisons, "line" for trends over time, "pie" for proportions, "area" for cumulative data.
5. **Tables**: When presenting structured data or comparisons, CREATE TABLES using this format instead of markdown tables:
   ```table
   {
     "title": "Table Title",
     "headers": ["Column 1", "Column 2"],
     "rows": [["Data 1", "Data 2"]],
     "caption": "Optional table description"
   }
   ```
6. **Engaging Tone**: Be conversational yet professional, like a knowledgeable colleague

## When Information is Available:
Integrate seamlessly without revealing sources; provide comprehensive analysis, structured summaries, and business implications.

## When Information is Limited:
Provide helpful general guidance without mentioning missing documents; focus on best practices and actionable advice.

Return a JSON object with shape {"content": string, "citations": []}. Do not include citations unless specifically requested - focus on seamless, natural responses."#;

fn sources_block(sources: &[ScoredSource]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[#{}] ({}) {}\n{}", i + 1, s.id, s.title, s.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn user_prompt(message: &str, sources: &[ScoredSource]) -> String {
    if sources.is_empty() {
        format!(
            "Question: {}\n\nProvide a helpful, well-formatted response using your expertise. \
             Use markdown formatting with bold text, headers, and structure. When presenting \
             structured data, create tables using the table code blocks. Include charts when \
             presenting numerical data or trends.",
            message
        )
    } else {
        format!(
            "Question: {}\n\nRelevant Information:\n{}\n\nProvide a comprehensive, \
             well-formatted analysis. Use markdown formatting extensively. When presenting \
             structured data or comparisons, create tables using the table code blocks. When \
             presenting numerical data, create charts using the chart code blocks. Focus on \
             insights, comparisons, and actionable information.",
            message,
            sources_block(sources)
        )
    }
}

/// Lenient parse of provider text: the expected `{content, citations}`
/// object, or the raw text wrapped with no citations.
fn parse_completion(raw: &str) -> Completion {
    #[derive(Deserialize)]
    struct Wire {
        #[serde(default)]
        content: String,
        #[serde(default)]
        citations: Vec<Citation>,
    }
    match serde_json::from_str::<Wire>(raw) {
        Ok(w) => Completion {
            content: w.content,
            citations: w.citations,
        },
        Err(_) => Completion {
            content: raw.to_string(),
            citations: Vec::new(),
        },
    }
}

// ============ Mock provider ============

/// Deterministic echo used whenever the selected vendor's credential is
/// absent. Cites the retrieved sources so the demo UI still shows them.
pub struct MockProvider {
    pub model: String,
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, message: &str, sources: &[ScoredSource]) -> Result<Completion> {
        Ok(Completion {
            content: format!("Mock response ({}): {}", self.model, message),
            citations: sources
                .iter()
                .map(|s| Citation {
                    id: s.id.clone(),
                    title: s.title.clone(),
                })
                .collect(),
        })
    }
}

// ============ OpenAI provider ============

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    timeout: Duration,
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, message: &str, sources: &[ScoredSource]) -> Result<Completion> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(message, sources) },
            ],
            "temperature": 0.7,
            "response_format": { "type": "json_object" },
        });

        let resp = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = resp.json().await?;
        let content = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .unwrap_or(r#"{"content":"","citations":[]}"#);
        Ok(parse_completion(content))
    }
}

// ============ Anthropic provider ============

pub struct AnthropicProvider {
    api_key: String,
    model: String,
    timeout: Duration,
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, message: &str, sources: &[ScoredSource]) -> Result<Completion> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4000,
            "system": SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": user_prompt(message, sources) },
            ],
            "temperature": 0.7,
        });

        let resp = client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = resp.json().await?;
        let text: String = json
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(parse_completion(&text))
    }
}
