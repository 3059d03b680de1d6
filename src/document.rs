use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Contracts with this many characters or fewer are not worth indexing
pub const MIN_CONTRACT_CHARS: usize = 100;

/// Caller-supplied information about a contract.
///
/// The named fields are the ones every caller provides; anything else goes
/// into `extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMetadata {
    /// Display name, e.g. "Software License Agreement"
    pub name: Option<String>,
    /// Contract number or reference
    pub number: Option<String>,
    pub party_a: Option<String>,
    pub party_b: Option<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ContractMetadata {
    /// Metadata carrying only a display name
    pub fn named(name: impl Into<String>) -> Self {
        ContractMetadata {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Label used in logs: the contract number, else the name
    pub fn label(&self) -> Option<&str> {
        self.number.as_deref().or(self.name.as_deref())
    }
}

/// A contract file read from disk
#[derive(Debug, Clone)]
pub struct Document {
    /// The extracted text of the contract
    pub content: String,
    /// The document's file name
    pub file_name: String,
    /// The document's MIME type
    pub mime_type: String,
}

impl Document {
    /// Read a contract from a text or PDF file
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let file_name = path
            .file_name()
            .context("Invalid file name")?
            .to_string_lossy()
            .into_owned();

        let mime_type = from_path(path).first_or_octet_stream().to_string();
        debug!("Detected MIME type {} for {}", mime_type, path.display());

        let content = read_document_content(path, &mime_type)?;

        Ok(Document {
            content,
            file_name,
            mime_type,
        })
    }

    /// Whether the text is long enough to be a real contract
    pub fn is_substantial(&self) -> bool {
        self.content.chars().count() > MIN_CONTRACT_CHARS
    }
}

/// Read a document's text based on its MIME type
pub fn read_document_content<P: AsRef<Path>>(file_path: P, mime_type: &str) -> Result<String> {
    let path = file_path.as_ref();

    match mime_type {
        mime if mime.starts_with("application/pdf") => {
            info!("Extracting text from PDF contract: {}", path.display());
            let content = extract_text(path)
                .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

            if content.trim().is_empty() {
                warn!("PDF {} contains no extractable text", path.display());
            }

            Ok(content)
        }

        mime if mime.starts_with("text/") => {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?;
            // Contracts exported from other tools are not always valid UTF-8
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }

        _ => Err(anyhow::anyhow!(
            "Unsupported contract format: {}. Only text and PDF files are supported.",
            mime_type
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_reads_text_contract() {
        let mut file = Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "MASTER SERVICES AGREEMENT between Acme and Globex").unwrap();

        let document = Document::from_file(file.path()).unwrap();
        assert_eq!(document.mime_type, "text/plain");
        assert!(document.content.starts_with("MASTER SERVICES"));
        assert!(!document.is_substantial());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut file = Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"Fee: 100 \xff EUR").unwrap();

        let document = Document::from_file(file.path()).unwrap();
        assert!(document.content.contains("Fee: 100"));
        assert!(document.content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_substantial_threshold() {
        let document = Document {
            content: "x".repeat(MIN_CONTRACT_CHARS + 1),
            file_name: "c.txt".to_string(),
            mime_type: "text/plain".to_string(),
        };
        assert!(document.is_substantial());

        let short = Document {
            content: "x".repeat(MIN_CONTRACT_CHARS),
            ..document
        };
        assert!(!short.is_substantial());
    }

    #[test]
    fn test_rejects_unsupported_format() {
        let file = Builder::new().suffix(".png").tempfile().unwrap();
        let err = Document::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported contract format"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Document::from_file("/definitely/not/here/contract.txt").is_err());
    }

    #[test]
    fn test_metadata_extra_fields_flatten() {
        let mut metadata = ContractMetadata::named("Supply Agreement");
        metadata.party_a = Some("Acme Corp".to_string());
        metadata
            .extra
            .insert("region".to_string(), "EMEA".to_string());

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["name"], "Supply Agreement");
        assert_eq!(json["region"], "EMEA");

        let parsed: ContractMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, metadata);
        assert_eq!(parsed.label(), Some("Supply Agreement"));
    }
}
