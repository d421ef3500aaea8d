use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::layout::DocumentKind;

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b\d{4}-\d{2}-\d{2}\b",
        r"(?i)\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{4}\b",
        r"(?i)\bQ[1-4]\s*\d{4}\b",
        r"(?i)\bFY\d{2}\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static YEAR_IN_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"20\d{2}").ok());

/// One ingested source document: its text plus provenance metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub source: PathBuf,
    pub kind: DocumentKind,
    pub text: String,
    /// Free-text time label ("2025-01-14", "Q1 2025", "FY25", ...).
    pub temporal_context: Option<String>,
}

impl Artifact {
    pub fn new(source: PathBuf, kind: DocumentKind, text: String) -> Self {
        let id = Self::generate_id(&source, &text);
        let temporal_context = temporal_context(&text, &source);

        Self {
            id,
            source,
            kind,
            text,
            temporal_context,
        }
    }

    fn generate_id(source: &Path, text: &str) -> String {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let head: String = text.chars().take(100).collect();

        let mut hasher = Sha256::new();
        hasher.update(file_name.as_bytes());
        hasher.update(b":");
        hasher.update(head.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..8]) // 16 hex chars
    }

    pub fn source_str(&self) -> String {
        self.source.to_string_lossy().into_owned()
    }
}

/// Every date-like reference in the text, pattern by pattern.
pub fn extract_dates(text: &str) -> Vec<String> {
    DATE_PATTERNS
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.as_str().to_string()))
        .collect()
}

/// First date reference in the text, else a year found in the file name.
pub fn temporal_context(text: &str, source: &Path) -> Option<String> {
    if let Some(first) = extract_dates(text).into_iter().next() {
        return Some(first);
    }

    let name = source.file_name()?.to_string_lossy();
    YEAR_IN_NAME
        .as_ref()?
        .find(&name)
        .map(|m| m.as_str().to_string())
}
