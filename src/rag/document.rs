//! Source documents and loading from disk.

use anyhow::{Context, Result};
use std::path::Path;

/// A loaded source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier, the catalog key of the document.
    pub id: String,
    pub text: String,
    pub source: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: source.into(),
        }
    }
}

/// Load a document from disk. Plain text and markdown are read directly;
/// PDFs need the `rag-pdf` feature.
pub async fn load_document(id: &str, path: &Path) -> Result<Document> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let text = match extension.as_str() {
        "pdf" => extract_pdf_text(path).await?,
        _ => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read document {}", path.display()))?,
    };

    Ok(Document::new(id, normalize_whitespace(&text), path.display().to_string()))
}

#[cfg(feature = "rag-pdf")]
async fn extract_pdf_text(path: &Path) -> Result<String> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
        .await
        .context("PDF extraction task panicked")?
        .with_context(|| format!("Failed to extract text from {}", path.display()))
}

#[cfg(not(feature = "rag-pdf"))]
async fn extract_pdf_text(path: &Path) -> Result<String> {
    anyhow::bail!(
        "Cannot read {}: PDF support requires the `rag-pdf` feature",
        path.display()
    )
}

/// Collapse runs of spaces and tabs, keep paragraph breaks.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_lines = 0;
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_lines += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_lines > 0 { "\n\n" } else { "\n" });
        }
        blank_lines = 0;
        out.push_str(&collapsed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn loads_plain_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("knowledge_base.txt");
        std::fs::write(&path, "Password resets\n\n\n  Use   the portal.  \n").unwrap();

        let doc = load_document("knowledge_base", &path).await.unwrap();
        assert_eq!(doc.id, "knowledge_base");
        assert_eq!(doc.text, "Password resets\n\nUse the portal.");
        assert!(doc.source.ends_with("knowledge_base.txt"));
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.txt");
        let err = load_document("absent", &path).await.unwrap_err();
        assert!(err.to_string().contains("absent.txt"));
    }

    #[test]
    fn normalize_keeps_single_newlines() {
        assert_eq!(normalize_whitespace("a\nb"), "a\nb");
        assert_eq!(normalize_whitespace("\n\na  b\n"), "a b");
    }
}
