//! OCR fallback for image-only PDFs, via the OCR.space HTTP API.
//!
//! Invoked only when primary PDF extraction recovers no text. Every failure
//! here is non-fatal: the caller falls back to placeholder text, so this
//! module logs and returns `None` rather than erroring the upload.

use std::time::Duration;

use base64::Engine;
use tracing::{info, warn};

use crate::config::OcrConfig;

/// API key from the environment; OCR.space publishes `helloworld` as a
/// rate-limited demo key.
fn api_key() -> String {
    std::env::var("OCR_SPACE_API_KEY").unwrap_or_else(|_| "helloworld".to_string())
}

/// Attempts OCR over a PDF's raw bytes. Returns recovered text, or `None`
/// when OCR is disabled, fails, or yields nothing.
pub async fn ocr_pdf(config: &OcrConfig, filename: &str, bytes: &[u8]) -> Option<String> {
    if !config.enabled {
        return None;
    }

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to build OCR HTTP client");
            return None;
        }
    };

    let data_uri = format!(
        "data:application/pdf;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    );

    let form = [
        ("language", "eng"),
        ("isOverlayRequired", "false"),
        ("OCREngine", "2"),
        ("base64Image", data_uri.as_str()),
    ];

    let resp = match client
        .post(&config.endpoint)
        .header("apikey", api_key())
        .form(&form)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(file = filename, error = %e, "OCR request failed");
            return None;
        }
    };

    if !resp.status().is_success() {
        warn!(file = filename, status = %resp.status(), "OCR service returned an error");
        return None;
    }

    let json: serde_json::Value = match resp.json().await {
        Ok(j) => j,
        Err(e) => {
            warn!(file = filename, error = %e, "OCR response was not valid JSON");
            return None;
        }
    };

    let parsed = json
        .get("ParsedResults")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("ParsedText"))
        .and_then(|t| t.as_str())
        .unwrap_or("");

    if parsed.trim().is_empty() {
        warn!(file = filename, "OCR returned empty text");
        return None;
    }

    info!(file = filename, chars = parsed.len(), "OCR recovered text");
    Some(parsed.to_string())
}
