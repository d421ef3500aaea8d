pub mod backend;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod response;
pub mod schema;
pub mod stats;

pub use backend::{ExtractionBackend, LlmBackend};
pub use error::ExtractError;
pub use llm::{AzureChatClient, ChatModel, Credential, OllamaClient, Sampling};
pub use schema::{
    Extraction, ExtractionStatus, MeetingRecord, PersonRecord, RelationshipKind, RelationshipRecord,
};
pub use stats::{ExtractionStats, StatsSnapshot};

use std::time::Instant;
use tracing::{info, warn};

pub const DEFAULT_TEXT_BUDGET: usize = 8_000;

/// Front door for extraction. Never fails: any backend error becomes a
/// `Failed` extraction with empty collections and bumps the error counter.
/// There are no retries.
pub struct Extractor {
    backend: Box<dyn ExtractionBackend>,
    max_chars: usize,
    stats: ExtractionStats,
}

impl Extractor {
    pub fn new(backend: Box<dyn ExtractionBackend>) -> Self {
        Self::with_budget(backend, DEFAULT_TEXT_BUDGET)
    }

    pub fn with_budget(backend: Box<dyn ExtractionBackend>, max_chars: usize) -> Self {
        Self {
            backend,
            max_chars,
            stats: ExtractionStats::default(),
        }
    }

    /// Extract entities and relationships from one document's text
    pub async fn extract(&self, text: &str, source: &str, doc_type: &str) -> Extraction {
        let visible = prompt::truncate_chars(text, self.max_chars);
        let started = Instant::now();

        match self.backend.extract(visible, source, doc_type).await {
            Ok(extraction) => {
                self.stats
                    .record_success(started.elapsed(), extraction.record_count(), extraction.is_partial());
                if let ExtractionStatus::Partial {
                    missing_sections,
                    dropped_records,
                } = &extraction.status
                {
                    warn!(
                        source,
                        ?missing_sections,
                        dropped_records,
                        "Partial extraction"
                    );
                }
                info!(source, doc_type, records = extraction.record_count(), "Extracted entities");
                extraction
            }
            Err(e) => {
                self.stats.record_error(started.elapsed());
                warn!(source, doc_type, error = %e, "AI extraction error");
                Extraction::failed(e.to_string())
            }
        }
    }

    /// Ask the backend to merge near-duplicate technology names. On failure,
    /// or an empty answer, the input list is returned unchanged.
    pub async fn consolidate_technologies(&self, names: &[String]) -> Vec<String> {
        match self.backend.consolidate(names).await {
            Ok(merged) if !merged.is_empty() => {
                self.stats.record_consolidation(true);
                info!(before = names.len(), after = merged.len(), "Consolidated technologies");
                merged
            }
            Ok(_) => {
                self.stats.record_consolidation(false);
                warn!("Consolidation returned no technologies, keeping original list");
                names.to_vec()
            }
            Err(e) => {
                self.stats.record_consolidation(false);
                warn!(error = %e, "Consolidation failed, keeping original list");
                names.to_vec()
            }
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
