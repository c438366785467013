//! Standardization: arbitrary extracted text → `{title, sections, metadata}`.
//!
//! The only place arbitrary text is forced into the fixed document schema.
//! With no `OPENAI_API_KEY` in the environment the output is a deterministic
//! truncation of the input; with a key the text goes to the OpenAI chat
//! completions API and the response is treated as untrusted — parsed and
//! validated before use, falling back to the truncation on any failure.
//! Standardization itself never fails an upload.

use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::StandardizeConfig;
use crate::models::Section;

const SYSTEM_PROMPT: &str = "You convert arbitrary unstructured document text into a concise \
standardized JSON schema: {title:string, sections:[{heading, body}], metadata?:object}. \
Keep it short but faithful.";

/// Standardizer output, always schema-valid: non-empty title, at least one
/// section.
#[derive(Debug, Clone)]
pub struct Standardized {
    pub title: String,
    pub sections: Vec<Section>,
    pub metadata: serde_json::Value,
}

/// Untrusted response shape from the model, validated by [`validate`].
#[derive(Debug, Deserialize)]
struct ModelOutput {
    #[serde(default)]
    title: String,
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

/// Standardizes extracted text. Infallible: any model or parse failure
/// produces the deterministic truncation fallback with the error recorded
/// in metadata.
pub async fn standardize(config: &StandardizeConfig, text: &str, filename: &str) -> Standardized {
    let Ok(api_key) = std::env::var("OPENAI_API_KEY") else {
        info!(file = filename, "no OpenAI key configured, using mock standardization");
        return fallback(
            config,
            text,
            filename,
            "OpenAI API key not set - mock output",
            None,
        );
    };

    match call_openai(config, &api_key, text, filename).await {
        Ok(raw) => match parse_model_output(&raw) {
            Some(std) => std,
            None => {
                warn!(file = filename, "model response failed schema validation");
                fallback(
                    config,
                    text,
                    filename,
                    "OpenAI processing failed - using raw content",
                    Some("response was not a valid standardized document".to_string()),
                )
            }
        },
        Err(e) => {
            warn!(file = filename, error = %e, "standardization call failed");
            fallback(
                config,
                text,
                filename,
                "OpenAI processing failed - using raw content",
                Some(e.to_string()),
            )
        }
    }
}

/// Deterministic fallback: title = filename, one "Content" section holding a
/// truncated prefix of the input.
pub fn fallback(
    config: &StandardizeConfig,
    text: &str,
    filename: &str,
    note: &str,
    error: Option<String>,
) -> Standardized {
    let mut metadata = serde_json::json!({ "note": note });
    if let Some(err) = error {
        metadata["error"] = serde_json::Value::String(err);
    }
    Standardized {
        title: filename.to_string(),
        sections: vec![Section {
            heading: "Content".to_string(),
            body: truncate_chars(text, config.fallback_chars),
        }],
        metadata,
    }
}

/// Parses and validates a model response. `None` means the response did not
/// meet the schema (empty title or no sections) and the caller must fall
/// back.
fn parse_model_output(raw: &str) -> Option<Standardized> {
    let parsed: ModelOutput = serde_json::from_str(raw).ok()?;
    if parsed.title.trim().is_empty() || parsed.sections.is_empty() {
        return None;
    }
    Some(Standardized {
        title: parsed.title,
        sections: parsed.sections,
        metadata: parsed.metadata.unwrap_or_else(|| serde_json::json!({})),
    })
}

async fn call_openai(
    config: &StandardizeConfig,
    api_key: &str,
    text: &str,
    filename: &str,
) -> anyhow::Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let user = format!(
        "Filename: {}\n\nContent:\n{}",
        filename,
        truncate_chars(text, config.prompt_chars)
    );

    let body = serde_json::json!({
        "model": config.model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": user },
        ],
        "temperature": 0.2,
        "response_format": { "type": "json_object" },
    });

    let resp = client
        .post("https://api.openai.com/v1/chat/completions")
        .header("Authorization", format!("Bearer {}", api_key))
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
        .unwrap_or("{}");
    Ok(content.to_string())
}

/// Char-boundary-safe prefix truncation.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
