use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use extract::{AzureChatClient, ChatModel, Credential, Extractor, LlmBackend, OllamaClient, Sampling};
use ingest::{FileReader, InputLayout};
use knowledge::{AggregationPolicy, BuildOptions, KnowledgeLayout, Renderer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub paths: PathsConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Azure,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: Provider,
    pub azure: AzureConfig,
    pub ollama: OllamaConfig,
    pub sampling: Sampling,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(skip)]
    pub ad_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub raw_input_dir: PathBuf,
    pub markdown_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub text_budget: usize,
    pub pdf_budget: usize,
    pub min_docx_chars: usize,
    pub min_mentions: usize,
    pub consolidation_threshold: usize,
    pub organization_blocklist: Vec<String>,
    pub technology_allow_list: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let policy = AggregationPolicy::default();
        Self {
            llm: LlmConfig {
                provider: Provider::Azure,
                azure: AzureConfig {
                    endpoint: "http://localhost:8080/".to_string(),
                    deployment: "gpt-4.1".to_string(),
                    api_version: "2024-05-01-preview".to_string(),
                    api_key: None,
                    ad_token: None,
                },
                ollama: OllamaConfig {
                    base_url: "http://localhost:11434".to_string(),
                    model: "llama3".to_string(),
                },
                sampling: Sampling::default(),
                request_timeout_secs: 120,
            },
            paths: PathsConfig {
                raw_input_dir: PathBuf::from("./RawInput"),
                markdown_dir: PathBuf::from("./markdown_files"),
            },
            extraction: ExtractionConfig {
                text_budget: extract::DEFAULT_TEXT_BUDGET,
                pdf_budget: 15_000,
                min_docx_chars: BuildOptions::default().min_docx_chars,
                min_mentions: policy.min_mentions,
                consolidation_threshold: policy.consolidation_threshold,
                organization_blocklist: vec!["microsoft".to_string(), "unknown".to_string()],
                technology_allow_list: policy.technology_allow_list,
            },
        }
    }
}

impl AppConfig {
    /// Defaults overridden by the process environment (after `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(provider) = get("KB_LLM_PROVIDER") {
            config.llm.provider = match provider.to_lowercase().as_str() {
                "azure" => Provider::Azure,
                "ollama" => Provider::Ollama,
                other => bail!("Unknown KB_LLM_PROVIDER '{}' (expected azure or ollama)", other),
            };
        }

        let azure = &mut config.llm.azure;
        if let Some(endpoint) = get("AZURE_OPENAI_ENDPOINT") {
            azure.endpoint = endpoint;
        } else if let Some(project) = get("AZURE_PROJECT_ENDPOINT") {
            azure.endpoint = openai_endpoint(&project);
        }
        if let Some(deployment) = get("AZURE_MODEL_DEPLOYMENT_NAME") {
            azure.deployment = deployment;
        }
        if let Some(version) = get("AZURE_OPENAI_API_VERSION") {
            azure.api_version = version;
        }
        azure.api_key = get("AZURE_OPENAI_API_KEY");
        azure.ad_token = get("AZURE_OPENAI_AD_TOKEN");

        if let Some(url) = get("OLLAMA_BASE_URL") {
            config.llm.ollama.base_url = url;
        }
        if let Some(model) = get("OLLAMA_MODEL") {
            config.llm.ollama.model = model;
        }
        if let Some(secs) = get("KB_REQUEST_TIMEOUT_SECS") {
            config.llm.request_timeout_secs = secs
                .parse()
                .with_context(|| format!("KB_REQUEST_TIMEOUT_SECS is not a number: {}", secs))?;
        }

        if let Some(dir) = get("RAW_INPUT_DIR") {
            config.paths.raw_input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("MARKDOWN_FILES_DIR") {
            config.paths.markdown_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn chat_model(&self) -> Result<Box<dyn ChatModel>> {
        let timeout = Duration::from_secs(self.llm.request_timeout_secs);
        let sampling = self.llm.sampling;

        let model: Box<dyn ChatModel> = match self.llm.provider {
            Provider::Azure => {
                let azure = &self.llm.azure;
                let credential = match (&azure.api_key, &azure.ad_token) {
                    (Some(key), _) => Credential::ApiKey(key.clone()),
                    (None, Some(token)) => Credential::Bearer(token.clone()),
                    (None, None) => Credential::None,
                };
                Box::new(AzureChatClient::new(
                    azure.endpoint.clone(),
                    azure.deployment.clone(),
                    azure.api_version.clone(),
                    credential,
                    sampling,
                    timeout,
                )?)
            }
            Provider::Ollama => Box::new(OllamaClient::new(
                self.llm.ollama.base_url.clone(),
                self.llm.ollama.model.clone(),
                sampling,
                timeout,
            )?),
        };
        Ok(model)
    }

    pub fn extractor(&self) -> Result<Extractor> {
        let backend = LlmBackend::new(self.chat_model()?);
        Ok(Extractor::with_budget(Box::new(backend), self.extraction.text_budget))
    }

    pub fn aggregation_policy(&self) -> AggregationPolicy {
        AggregationPolicy {
            min_mentions: self.extraction.min_mentions,
            technology_allow_list: self.extraction.technology_allow_list.clone(),
            consolidation_threshold: self.extraction.consolidation_threshold,
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            min_docx_chars: self.extraction.min_docx_chars,
        }
    }

    pub fn file_reader(&self) -> FileReader {
        FileReader::new(self.extraction.pdf_budget)
    }

    pub fn input_layout(&self) -> InputLayout {
        InputLayout::new(&self.paths.raw_input_dir)
    }

    pub fn renderer(&self) -> Renderer {
        Renderer::new(
            KnowledgeLayout::new(&self.paths.markdown_dir),
            self.extraction.organization_blocklist.clone(),
        )
    }
}

/// `https://<res>.services.ai.azure.com/api/projects/x` becomes
/// `https://<res>.openai.azure.com/`. Anything else is used as given.
pub fn openai_endpoint(project_endpoint: &str) -> String {
    let Some(host) = project_endpoint
        .strip_prefix("https://")
        .and_then(|rest| rest.split('/').next())
    else {
        return project_endpoint.to_string();
    };
    match host.strip_suffix(".services.ai.azure.com") {
        Some(resource) if !resource.is_empty() => format!("https://{}.openai.azure.com/", resource),
        _ => project_endpoint.to_string(),
    }
}
