use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("unsupported file format: {0:?}")]
    Unsupported(String),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to extract PDF text from {path:?}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("failed to extract DOCX text from {path:?}: {message}")]
    Docx { path: PathBuf, message: String },
}

/// Reads raw documents into plain text. Format parsing is delegated to
/// `pdf-extract` and to the DOCX package's `word/document.xml`.
pub struct FileReader {
    pdf_char_budget: usize,
}

impl Default for FileReader {
    fn default() -> Self {
        Self {
            pdf_char_budget: 15_000,
        }
    }
}

impl FileReader {
    pub fn new(pdf_char_budget: usize) -> Self {
        Self { pdf_char_budget }
    }

    pub fn is_supported(path: &Path) -> bool {
        matches!(
            extension_of(path).as_str(),
            "md" | "txt" | "pdf" | "docx"
        )
    }

    pub async fn read(&self, path: &Path) -> Result<String, ReadError> {
        let extension = extension_of(path);

        match extension.as_str() {
            "md" | "txt" => {
                let bytes = fs::read(path).await.map_err(|source| ReadError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            "pdf" => {
                let text = read_pdf(path).await?;
                Ok(text.chars().take(self.pdf_char_budget).collect())
            }
            "docx" => read_docx(path).await,
            _ => Err(ReadError::Unsupported(extension)),
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

async fn read_pdf(path: &Path) -> Result<String, ReadError> {
    let owned = path.to_path_buf();
    // pdf-extract panics on some malformed files; the join error catches that
    let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned)).await;

    match joined {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ReadError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
        Err(e) => Err(ReadError::Pdf {
            path: path.to_path_buf(),
            message: format!("parser aborted: {}", e),
        }),
    }
}

async fn read_docx(path: &Path) -> Result<String, ReadError> {
    let owned = path.to_path_buf();
    let joined = tokio::task::spawn_blocking(move || docx_text(&owned)).await;

    match joined {
        Ok(result) => result,
        Err(e) => Err(ReadError::Docx {
            path: path.to_path_buf(),
            message: format!("reader aborted: {}", e),
        }),
    }
}

fn docx_text(path: &Path) -> Result<String, ReadError> {
    let docx_err = |message: String| ReadError::Docx {
        path: path.to_path_buf(),
        message,
    };

    let file = std::fs::File::open(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| docx_err(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| docx_err(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| docx_err(e.to_string()))?;

    paragraphs_from_document_xml(&xml).map_err(docx_err)
}

/// Flatten WordprocessingML into text: one line per `w:p`, tabs and breaks kept.
pub fn paragraphs_from_document_xml(xml: &str) -> Result<String, String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "malformed document.xml at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_xml_paragraphs() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Meeting with Proximus</w:t></w:r></w:p>
            <w:p><w:r><w:t xml:space="preserve">Attendees:</w:t><w:tab/><w:t>Jane &amp; Bob</w:t></w:r></w:p>
        </w:body></w:document>"#;

        let text = paragraphs_from_document_xml(xml).unwrap();
        assert_eq!(text, "Meeting with Proximus\nAttendees:\tJane & Bob\n");
    }

    #[tokio::test]
    async fn test_reads_markdown_and_rejects_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("notes.md");
        std::fs::write(&md, "# Notes\nAzure rollout").unwrap();
        let csv = dir.path().join("data.csv");
        std::fs::write(&csv, "a,b").unwrap();

        let reader = FileReader::default();
        assert_eq!(reader.read(&md).await.unwrap(), "# Notes\nAzure rollout");
        assert!(matches!(
            reader.read(&csv).await,
            Err(ReadError::Unsupported(ext)) if ext == "csv"
        ));
        assert!(FileReader::is_supported(Path::new("Plan.PDF")));
    }

    #[tokio::test]
    async fn test_broken_docx_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let docx = dir.path().join("meeting.docx");
        std::fs::write(&docx, "not a zip").unwrap();

        let result = FileReader::default().read(&docx).await;
        assert!(matches!(result, Err(ReadError::Docx { .. })));
    }
}
