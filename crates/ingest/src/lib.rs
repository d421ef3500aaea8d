pub mod artifact;
pub mod layout;
pub mod reader;

pub use artifact::Artifact;
pub use layout::{DocumentKind, InputLayout, SourceDocument};
pub use reader::{FileReader, ReadError};

use tracing::debug;

/// Read one discovered document into an artifact.
pub async fn ingest_file(reader: &FileReader, doc: &SourceDocument) -> Result<Artifact, ReadError> {
    let text = reader.read(&doc.path).await?;
    debug!(path = ?doc.path, kind = doc.kind.label(), chars = text.chars().count(), "Read document");

    Ok(Artifact::new(doc.path.clone(), doc.kind, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ingest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync 2025.md");
        std::fs::write(&path, "Weekly sync with Jane").unwrap();

        let doc = SourceDocument {
            path: path.clone(),
            kind: DocumentKind::MeetingNotes,
        };
        let artifact = ingest_file(&FileReader::default(), &doc).await.unwrap();

        assert_eq!(artifact.kind, DocumentKind::MeetingNotes);
        assert_eq!(artifact.text, "Weekly sync with Jane");
        assert_eq!(artifact.temporal_context.as_deref(), Some("2025"));
    }
}
