use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// What a source document is, as far as extraction and aggregation care.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    LinkedInProfile,
    MeetingNotes,
    AnnualReport,
    StrategicPlan,
    TechnicalDocument,
    MeetingTranscript,
    DecisionMakersList,
    Document,
}

impl DocumentKind {
    /// Label handed to the model as the document type.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::LinkedInProfile => "LinkedIn Profile",
            DocumentKind::MeetingNotes => "Meeting Notes",
            DocumentKind::AnnualReport => "Annual Report",
            DocumentKind::StrategicPlan => "Strategic Plan",
            DocumentKind::TechnicalDocument => "Technical Document",
            DocumentKind::MeetingTranscript => "Meeting Transcript",
            DocumentKind::DecisionMakersList => "Decision Makers List",
            DocumentKind::Document => "Document",
        }
    }

    pub fn is_meeting(&self) -> bool {
        matches!(
            self,
            DocumentKind::MeetingNotes | DocumentKind::MeetingTranscript
        )
    }

    pub fn classify_pdf(file_name: &str) -> Self {
        let name = file_name.to_lowercase();
        if name.contains("annual report") {
            DocumentKind::AnnualReport
        } else if name.contains("plan") {
            DocumentKind::StrategicPlan
        } else {
            DocumentKind::TechnicalDocument
        }
    }

    pub fn classify_docx(file_name: &str) -> Self {
        let name = file_name.to_lowercase();
        if name.contains("meeting") || name.contains("transcript") {
            DocumentKind::MeetingTranscript
        } else if name.contains("decision") || name.contains("key") {
            DocumentKind::DecisionMakersList
        } else {
            DocumentKind::Document
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub kind: DocumentKind,
}

/// The fixed folder scheme of the raw input tree.
#[derive(Debug, Clone)]
pub struct InputLayout {
    pub root: PathBuf,
    pub linkedin_dir: PathBuf,
    pub meeting_dirs: Vec<PathBuf>,
}

impl InputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            linkedin_dir: root
                .join("LinkedIn")
                .join("Markdown (enhanced for AI interpretation)"),
            meeting_dirs: vec![
                root.join("Internal Account Discussions"),
                root.join("NNR meeting"),
            ],
            root,
        }
    }

    /// All documents to process, in phase order: LinkedIn profiles, meeting
    /// notes, PDFs, DOCX files. Each phase is sorted by path.
    pub fn discover(&self) -> Vec<SourceDocument> {
        let mut documents = Vec::new();

        for path in markdown_files(&self.linkedin_dir) {
            documents.push(SourceDocument {
                path,
                kind: DocumentKind::LinkedInProfile,
            });
        }

        for dir in &self.meeting_dirs {
            for path in markdown_files(dir) {
                documents.push(SourceDocument {
                    path,
                    kind: DocumentKind::MeetingNotes,
                });
            }
        }

        // LinkedIn PDF exports duplicate the markdown profiles
        let linkedin_root = self.root.join("LinkedIn");
        for path in files_with_extension(&self.root, "pdf", None) {
            if path.starts_with(&linkedin_root) {
                continue;
            }
            let kind = DocumentKind::classify_pdf(&file_name(&path));
            documents.push(SourceDocument { path, kind });
        }

        for path in files_with_extension(&self.root, "docx", None) {
            let kind = DocumentKind::classify_docx(&file_name(&path));
            documents.push(SourceDocument { path, kind });
        }

        documents
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn markdown_files(dir: &Path) -> Vec<PathBuf> {
    files_with_extension(dir, "md", Some(1))
}

fn files_with_extension(dir: &Path, extension: &str, max_depth: Option<usize>) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut walker = WalkDir::new(dir);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    files.sort();
    files
}
