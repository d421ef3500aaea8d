use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use extract::{Extractor, StatsSnapshot};
use ingest::{DocumentKind, FileReader, InputLayout, ingest_file};
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{AggregationContext, AggregationPolicy};
use crate::render::{RenderReport, Renderer};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// DOCX files with less text than this are skipped.
    pub min_docx_chars: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { min_docx_chars: 50 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub started_at: String,
    pub discovered: usize,
    pub processed: BTreeMap<DocumentKind, usize>,
    pub skipped: Vec<SkippedDocument>,
    pub extraction: StatsSnapshot,
    pub people: usize,
    pub organizations: usize,
    pub technologies: usize,
    pub topics: usize,
    pub meetings: usize,
    pub relationships: usize,
    pub rendered: RenderReport,
}

/// Run the whole build: discover, read, extract, aggregate, render.
/// Documents are handled one at a time; a document that cannot be read is
/// logged and skipped.
pub async fn build(
    input: &InputLayout,
    reader: &FileReader,
    extractor: &Extractor,
    policy: &AggregationPolicy,
    renderer: &Renderer,
    options: &BuildOptions,
) -> Result<BuildReport> {
    let started_at = chrono::Local::now().to_rfc3339();
    let documents = input.discover();
    info!(root = ?input.root, documents = documents.len(), "Discovered input documents");

    let mut context = AggregationContext::new();
    let mut skipped = Vec::new();

    for doc in &documents {
        let artifact = match ingest_file(reader, doc).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(path = ?doc.path, error = %e, "Skipping unreadable document");
                skipped.push(SkippedDocument {
                    path: doc.path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let is_docx = doc.path.extension().is_some_and(|e| e.eq_ignore_ascii_case("docx"));
        if is_docx && artifact.text.trim().chars().count() < options.min_docx_chars {
            warn!(path = ?doc.path, "Skipping DOCX with too little text");
            skipped.push(SkippedDocument {
                path: doc.path.clone(),
                reason: format!("less than {} characters of text", options.min_docx_chars),
            });
            continue;
        }

        info!(path = ?doc.path, kind = doc.kind.label(), "Processing document");
        let extraction = extractor
            .extract(&artifact.text, &artifact.source_str(), doc.kind.label())
            .await;
        context.absorb(&artifact, extraction);
    }

    let processed = context.documents.clone();
    let set = context.finalize(extractor, policy).await;
    let rendered = renderer.render(&set);

    let report = BuildReport {
        started_at,
        discovered: documents.len(),
        processed,
        skipped,
        extraction: extractor.stats(),
        people: set.people.len(),
        organizations: set.organizations.len(),
        technologies: set.technologies.len(),
        topics: set.topics.len(),
        meetings: set.meetings.len(),
        relationships: set.relationships.len(),
        rendered,
    };
    info!(
        discovered = report.discovered,
        skipped = report.skipped.len(),
        files = report.rendered.total(),
        "Build complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::KnowledgeLayout;
    use async_trait::async_trait;
    use extract::{ExtractError, Extraction, ExtractionBackend, MeetingRecord, PersonRecord};
    use std::fs;

    /// Answers by document type, the way the model would for each kind.
    struct ScriptedBackend;

    #[async_trait]
    impl ExtractionBackend for ScriptedBackend {
        async fn extract(&self, _text: &str, _source: &str, doc_type: &str) -> Result<Extraction, ExtractError> {
            let mut extraction = Extraction::empty();
            match doc_type {
                "LinkedIn Profile" => {
                    let mut person = PersonRecord::named("Jane Doe");
                    person.company = Some("Proximus".into());
                    person.skills = vec!["Azure".into()];
                    extraction.people.push(person);
                    extraction.organizations.push("Proximus".into());
                    extraction.technologies.push("Azure".into());
                }
                "Meeting Notes" => {
                    extraction.meetings.push(MeetingRecord {
                        title: "Kickoff".into(),
                        attendees: vec!["Jane".into()],
                        topics: vec!["AI roadmap".into()],
                        ..Default::default()
                    });
                    extraction.topics.push("AI roadmap".into());
                    extraction.technologies.push("Obscure Tool".into());
                }
                _ => return Err(ExtractError::EmptyReply),
            }
            Ok(extraction)
        }

        async fn consolidate(&self, names: &[String]) -> Result<Vec<String>, ExtractError> {
            Ok(names.to_vec())
        }
    }

    #[tokio::test]
    async fn test_build_end_to_end() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        let profiles = raw.path().join("LinkedIn/Markdown (enhanced for AI interpretation)");
        fs::create_dir_all(&profiles).unwrap();
        fs::write(profiles.join("jane.md"), "Jane Doe, CTO at Proximus").unwrap();

        let meetings = raw.path().join("Internal Account Discussions");
        fs::create_dir_all(&meetings).unwrap();
        fs::write(meetings.join("kickoff.md"), "Kickoff on 2025-01-14 with Jane").unwrap();
        fs::write(raw.path().join("broken.docx"), "not a zip").unwrap();

        let renderer = Renderer::new(KnowledgeLayout::new(out.path()), vec!["microsoft".into()]);
        let report = build(
            &InputLayout::new(raw.path()),
            &FileReader::default(),
            &Extractor::new(Box::new(ScriptedBackend)),
            &AggregationPolicy::default(),
            &renderer,
            &BuildOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.discovered, 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.processed[&DocumentKind::LinkedInProfile], 1);
        assert_eq!(report.extraction.ai_extractions, 2);
        assert_eq!(report.technologies, 1); // only the allow-listed one survives
        assert_eq!(report.rendered.meetings, 1);

        let meeting = fs::read_to_string(out.path().join("events/meetings/kickoff.md")).unwrap();
        assert!(meeting.contains("- [[jane-doe|Jane Doe]]"));
        assert!(meeting.contains("2025-01-14"));
        assert!(out.path().join("entities/organizations/proximus.md").exists());
        assert!(!out.path().join("entities/technologies/obscure-tool.md").exists());
    }
}
