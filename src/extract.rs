//! Plain-text extraction for uploaded files (TXT, PDF, DOCX, PPTX).
//!
//! Dispatch is purely by file-extension suffix. For supported extensions
//! extraction never fails: parser errors and empty output degrade to an
//! empty string, and callers substitute OCR output or a placeholder so
//! downstream standardization always has non-empty input. Only an unknown
//! extension is an error.

use std::io::Read;

use tracing::warn;

/// Maximum decompressed bytes read from a single OOXML ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
}

/// Extracts plain text from an uploaded file's bytes.
///
/// Returns the recovered text, which may be empty (e.g. an image-only PDF);
/// see [`placeholder_text`] for the stand-in stored when nothing is
/// recovered.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let lower = filename.to_lowercase();

    if lower.ends_with(".txt") {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }
    if lower.ends_with(".pdf") {
        return Ok(extract_pdf(filename, bytes));
    }
    if lower.ends_with(".docx") {
        return Ok(extract_docx(filename, bytes));
    }
    if lower.ends_with(".pptx") {
        return Ok(extract_pptx(filename, bytes));
    }

    Err(ExtractError::UnsupportedFormat(filename.to_string()))
}

/// True when the filename carries an extension [`extract_text`] handles.
pub fn is_supported(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    [".txt", ".pdf", ".docx", ".pptx"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// Stand-in text stored when extraction (and OCR, for PDFs) yields nothing,
/// so the standardizer still receives non-empty input.
pub fn placeholder_text(filename: &str) -> String {
    if filename.to_lowercase().ends_with(".pdf") {
        format!(
            "PDF Document: {}\n\nThis PDF appears to be image-based (no selectable text).",
            filename
        )
    } else {
        format!(
            "Document: {}\n\nNo readable text could be extracted from this file.",
            filename
        )
    }
}

fn extract_pdf(filename: &str, bytes: &[u8]) -> String {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(file = filename, error = %e, "PDF extraction failed");
            String::new()
        }
    }
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Option<Vec<u8>> {
    let entry = archive.by_name(name).ok()?;
    let mut out = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut out).ok()?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        warn!(entry = name, "OOXML entry exceeds size limit, skipping");
        return None;
    }
    Some(out)
}

fn extract_docx(filename: &str, bytes: &[u8]) -> String {
    let mut archive = match zip::ZipArchive::new(std::io::Cursor::new(bytes)) {
        Ok(a) => a,
        Err(e) => {
            warn!(file = filename, error = %e, "DOCX is not a readable ZIP container");
            return String::new();
        }
    };
    let Some(xml) = read_zip_entry_bounded(&mut archive, "word/document.xml") else {
        warn!(file = filename, "word/document.xml missing from DOCX");
        return String::new();
    };
    collect_text_runs(&xml, b"p").trim().to_string()
}

fn extract_pptx(filename: &str, bytes: &[u8]) -> String {
    let mut archive = match zip::ZipArchive::new(std::io::Cursor::new(bytes)) {
        Ok(a) => a,
        Err(e) => {
            warn!(file = filename, error = %e, "PPTX is not a readable ZIP container");
            return String::new();
        }
    };
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut slides = Vec::new();
    for name in slide_names {
        let Some(xml) = read_zip_entry_bounded(&mut archive, &name) else {
            continue;
        };
        let text = collect_text_runs(&xml, b"p");
        if !text.trim().is_empty() {
            slides.push(text.trim().to_string());
        }
    }
    slides.join("\n\n")
}

/// Walks OOXML events collecting `<t>` text runs. Each closing
/// `paragraph_tag` element emits a line break; runs within a paragraph are
/// space-separated. Works for both WordprocessingML (`w:t`/`w:p`) and
/// DrawingML (`a:t`/`a:p`) since only local names are compared.
fn collect_text_runs(xml: &[u8], paragraph_tag: &[u8]) -> String {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text => {
                let run = t.unescape().unwrap_or_default();
                if !run.is_empty() {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push(' ');
                    }
                    out.push_str(run.as_ref());
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    in_text = false;
                } else if name.as_ref() == paragraph_tag && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "OOXML parse error, returning partial text");
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
            let body: String = paragraphs
                .iter()
                .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
                .collect();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    fn pptx_with_slides(slides: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (i, text) in slides.iter().enumerate() {
                zip.start_file(
                    format!("ppt/slides/slide{}.xml", i + 1),
                    zip::write::SimpleFileOptions::default(),
                )
                .unwrap();
                let xml = format!(
                    "<?xml version=\"1.0\"?><p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\"><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>",
                    text
                );
                zip.write_all(xml.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn txt_passes_through() {
        let text = extract_text("notes.txt", b"Q1 revenue grew 20%.").unwrap();
        assert_eq!(text, "Q1 revenue grew 20%.");
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = extract_text("image.png", b"\x89PNG").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
        assert!(!is_supported("image.png"));
        assert!(is_supported("Deck.PPTX"));
    }

    #[test]
    fn invalid_pdf_degrades_to_empty() {
        let text = extract_text("broken.pdf", b"not a pdf").unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn invalid_docx_degrades_to_empty() {
        let text = extract_text("broken.docx", b"not a zip").unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let bytes = docx_with_paragraphs(&["first paragraph", "second paragraph"]);
        let text = extract_text("report.docx", &bytes).unwrap();
        assert_eq!(text, "first paragraph\nsecond paragraph");
    }

    #[test]
    fn pptx_slides_in_numeric_order() {
        let bytes = pptx_with_slides(&["slide one", "slide two"]);
        let text = extract_text("deck.pptx", &bytes).unwrap();
        assert_eq!(text, "slide one\n\nslide two");
    }

    #[test]
    fn pdf_placeholder_mentions_image_based() {
        let p = placeholder_text("scan.pdf");
        assert!(p.contains("scan.pdf"));
        assert!(p.contains("image-based"));
    }
}
