//! Upload pipeline: extract, OCR fallback, standardize, persist.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::extract;
use crate::models::{now_ts, Document};
use crate::ocr;
use crate::standardize;
use crate::store::Store;

/// Per-file outcome reported back to the uploader.
#[derive(Debug, Serialize)]
pub struct UploadResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    fn ok(id: String, name: &str) -> Self {
        Self {
            id: Some(id),
            name: name.to_string(),
            status: "success".to_string(),
            error: None,
        }
    }

    fn failed(name: &str, error: String) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            status: "error".to_string(),
            error: Some(error),
        }
    }
}

/// Runs one uploaded file through the full pipeline and stores the result.
///
/// Unsupported extensions produce an error entry. Supported formats always
/// produce a stored document: extraction failures degrade to a placeholder
/// and standardization falls back to a raw-content document when the model
/// is unavailable.
pub async fn process_upload(
    filename: &str,
    bytes: &[u8],
    config: &Config,
    store: &dyn Store,
) -> UploadResult {
    if !extract::is_supported(filename) {
        return UploadResult::failed(
            filename,
            format!("Unsupported file type: {}", filename),
        );
    }

    let mut text = match extract::extract_text(filename, bytes) {
        Ok(text) => text,
        Err(err) => return UploadResult::failed(filename, err.to_string()),
    };

    // Image-only PDFs extract to nothing; try OCR before giving up.
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".pdf") && text.trim().is_empty() && config.ocr.enabled {
        if let Some(ocr_text) = ocr::ocr_pdf(&config.ocr, filename, bytes).await {
            text = ocr_text;
        }
    }
    if text.trim().is_empty() {
        text = extract::placeholder_text(filename);
    }

    let standardized = standardize::standardize(&config.standardize, &text, filename).await;
    let doc = Document {
        id: Uuid::new_v4().to_string(),
        title: standardized.title,
        sections: standardized.sections,
        metadata: standardized.metadata,
        created_at: now_ts(),
    };
    let id = doc.id.clone();

    match store.insert_document(&doc).await {
        Ok(()) => {
            info!(id = %id, name = filename, "document stored");
            UploadResult::ok(id, filename)
        }
        Err(err) => UploadResult::failed(filename, err.to_string()),
    }
}

/// Convenience wrapper for a batch of files, in order.
pub async fn process_uploads(
    files: &[(String, Vec<u8>)],
    config: &Config,
    store: &dyn Store,
) -> Vec<UploadResult> {
    let mut results = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        results.push(process_upload(name, bytes, config, store).await);
    }
    results
}
