use async_trait::async_trait;

use crate::error::ExtractError;
use crate::llm::ChatModel;
use crate::prompt;
use crate::response;
use crate::schema::Extraction;

/// The narrow seam between the pipeline and whatever produces extractions.
/// `text` is already truncated to the extractor's budget.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    async fn extract(&self, text: &str, source: &str, doc_type: &str) -> Result<Extraction, ExtractError>;

    /// Merge near-duplicate technology names.
    async fn consolidate(&self, names: &[String]) -> Result<Vec<String>, ExtractError>;
}

/// Extraction backed by a chat model and the fixed taxonomy prompt.
pub struct LlmBackend {
    model: Box<dyn ChatModel>,
}

impl LlmBackend {
    pub fn new(model: Box<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> String {
        self.model.name()
    }
}

#[async_trait]
impl ExtractionBackend for LlmBackend {
    async fn extract(&self, text: &str, source: &str, doc_type: &str) -> Result<Extraction, ExtractError> {
        let user = prompt::build_extraction_prompt(text, source, doc_type, usize::MAX);
        let reply = self
            .model
            .complete(prompt::EXTRACTION_SYSTEM_PROMPT, &user)
            .await?;
        response::parse_reply(&reply)
    }

    async fn consolidate(&self, names: &[String]) -> Result<Vec<String>, ExtractError> {
        let user = prompt::build_consolidation_prompt(names);
        let reply = self
            .model
            .complete(prompt::CONSOLIDATION_SYSTEM_PROMPT, &user)
            .await?;
        response::parse_consolidation(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedModel {
        reply: String,
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, system: &str, _user: &str) -> Result<String, ExtractError> {
            assert!(!system.is_empty());
            Ok(self.reply.clone())
        }

        fn name(&self) -> String {
            "canned".to_string()
        }
    }

    #[tokio::test]
    async fn test_llm_backend_extracts() {
        let model = CannedModel {
            reply: "```json\n{\"people\": [{\"name\": \"Jane Doe\"}], \"organizations\": [], \"technologies\": [], \"topics\": [], \"meetings\": [], \"relationships\": []}\n```".to_string(),
        };
        let backend = LlmBackend::new(Box::new(model));

        let extraction = backend
            .extract("Jane Doe, CTO", "in/jane.md", "LinkedIn Profile")
            .await
            .unwrap();

        assert_eq!(extraction.people[0].name, "Jane Doe");
        assert_eq!(backend.model_name(), "canned");
    }

    #[tokio::test]
    async fn test_llm_backend_consolidates() {
        let model = CannedModel {
            reply: r#"{"technologies": ["Power BI"]}"#.to_string(),
        };
        let backend = LlmBackend::new(Box::new(model));

        let merged = backend
            .consolidate(&["PowerBI".to_string(), "Power BI".to_string()])
            .await
            .unwrap();
        assert_eq!(merged, vec!["Power BI"]);
    }
}
