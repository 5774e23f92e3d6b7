//! Typed configuration for the retrieval core.
//!
//! The mock/live toggle and the knowledge-base directory are supplied by the
//! deployment environment. They are read once into a [`KbConfig`] value and
//! passed explicitly into the provider constructors at startup; nothing in
//! the crate reads ambient global state after that.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::retry::RetryPolicy;
use crate::types::KbError;

const DEFAULT_API_VERSION: &str = "2024-02-15-preview";
const DEFAULT_COMPLETION_DEPLOYMENT: &str = "gpt-4o";
const DEFAULT_EMBEDDING_DEPLOYMENT: &str = "text-embedding-ada-002";
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the live embedding deployment.
#[derive(Clone, Debug)]
pub struct EmbeddingSettings {
    pub endpoint: Url,
    pub deployment: String,
    pub api_version: String,
    pub api_key: String,
    pub dimension: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// Connection settings for the live completion deployment.
#[derive(Clone, Debug)]
pub struct CompletionSettings {
    pub endpoint: Url,
    pub deployment: String,
    pub api_version: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// Everything the retrieval core needs from its environment.
#[derive(Clone, Debug)]
pub struct KbConfig {
    /// Directory holding the knowledge-base HTML documents.
    pub kb_dir: PathBuf,
    /// When set, both providers run in their offline mock variants.
    pub use_mock: bool,
    pub embedding: EmbeddingSettings,
    pub completion: CompletionSettings,
}

impl KbConfig {
    /// Loads configuration from the process environment (and a `.env` file
    /// when present).
    ///
    /// In mock mode the Azure settings may be absent; a placeholder endpoint
    /// is used and never contacted. In live mode a missing endpoint or API
    /// key is a startup error.
    pub fn from_env() -> Result<Self, KbError> {
        dotenvy::dotenv().ok();

        let use_mock = std::env::var("USE_MOCK")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        let kb_dir = PathBuf::from(
            std::env::var("KB_DATA_DIR").unwrap_or_else(|_| "phase2_data".to_string()),
        );

        let api_key = std::env::var("AOAI_API_KEY")
            .or_else(|_| std::env::var("AZURE_OPENAI_API_KEY"))
            .unwrap_or_default();

        let endpoint = match std::env::var("AZURE_OPENAI_ENDPOINT") {
            Ok(raw) => Url::parse(&raw)
                .map_err(|err| KbError::Config(format!("AZURE_OPENAI_ENDPOINT: {err}")))?,
            Err(_) if use_mock => Url::parse("https://offline.invalid").expect("static url"),
            Err(_) => {
                return Err(KbError::Config(
                    "AZURE_OPENAI_ENDPOINT must be set when USE_MOCK=false".into(),
                ));
            }
        };
        if !use_mock && api_key.is_empty() {
            return Err(KbError::Config(
                "AOAI_API_KEY must be set when USE_MOCK=false".into(),
            ));
        }

        let api_version = std::env::var("AZURE_OPENAI_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        Ok(Self {
            kb_dir,
            use_mock,
            embedding: EmbeddingSettings {
                endpoint: endpoint.clone(),
                deployment: std::env::var("AZURE_OPENAI_EMBEDDING_DEPLOYMENT")
                    .unwrap_or_else(|_| DEFAULT_EMBEDDING_DEPLOYMENT.to_string()),
                api_version: api_version.clone(),
                api_key: api_key.clone(),
                dimension: DEFAULT_EMBEDDING_DIMENSION,
                timeout: DEFAULT_TIMEOUT,
                retry: RetryPolicy::default(),
            },
            completion: CompletionSettings {
                endpoint,
                deployment: std::env::var("AZURE_OPENAI_DEPLOYMENT")
                    .unwrap_or_else(|_| DEFAULT_COMPLETION_DEPLOYMENT.to_string()),
                api_version,
                api_key,
                temperature: 0.7,
                max_tokens: 800,
                timeout: DEFAULT_TIMEOUT,
                retry: RetryPolicy::default(),
            },
        })
    }

    /// A mock-mode configuration rooted at `kb_dir`; handy for tests and
    /// offline runs.
    pub fn offline(kb_dir: impl Into<PathBuf>) -> Self {
        Self {
            kb_dir: kb_dir.into(),
            use_mock: true,
            embedding: EmbeddingSettings {
                endpoint: Url::parse("https://offline.invalid").expect("static url"),
                deployment: DEFAULT_EMBEDDING_DEPLOYMENT.to_string(),
                api_version: DEFAULT_API_VERSION.to_string(),
                api_key: String::new(),
                dimension: DEFAULT_EMBEDDING_DIMENSION,
                timeout: DEFAULT_TIMEOUT,
                retry: RetryPolicy::default(),
            },
            completion: CompletionSettings {
                endpoint: Url::parse("https://offline.invalid").expect("static url"),
                deployment: DEFAULT_COMPLETION_DEPLOYMENT.to_string(),
                api_version: DEFAULT_API_VERSION.to_string(),
                api_key: String::new(),
                temperature: 0.7,
                max_tokens: 800,
                timeout: DEFAULT_TIMEOUT,
                retry: RetryPolicy::default(),
            },
        }
    }
}
