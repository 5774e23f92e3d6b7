//! Embedding providers: mapping text to fixed-length vectors.
//!
//! Two variants behind one trait, selected by configuration at startup. The
//! live variant talks to an Azure OpenAI embeddings deployment; the mock
//! variant returns zero vectors deterministically and never touches the
//! network, which keeps offline operation and tests cheap. The retriever
//! and ingestion pipeline are agnostic to which variant is active.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::EmbeddingSettings;
use crate::retry::RetryPolicy;
use crate::types::KbError;

/// Azure embeddings calls accept a bounded batch of inputs per request.
const MAX_BATCH: usize = 16;

/// Maps chunk or query text to a vector of fixed dimensionality.
///
/// Implementations must be safe for concurrent use without locking; nothing
/// here is mutated after construction.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of texts, order-preserving: output vector `i`
    /// corresponds to input text `i`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError>;

    /// Dimensionality of every vector this provider produces.
    fn dimension(&self) -> usize;

    fn name(&self) -> &'static str;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, KbError> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| KbError::ProviderUnavailable("empty embedding response".into()))
    }
}

/// Deterministic offline provider: the zero vector for every input.
///
/// Cosine similarity against a zero vector is defined as `0.0`, so retrieval
/// stays well-defined (if uninformative) in mock mode.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    /// Matches the live deployment's dimensionality so mock-built indexes
    /// are shape-compatible.
    pub const DEFAULT_DIMENSION: usize = 1536;

    pub fn new() -> Self {
        Self::with_dimension(Self::DEFAULT_DIMENSION)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        Ok(texts.iter().map(|_| vec![0.0; self.dimension]).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Live provider backed by an Azure OpenAI embeddings deployment.
pub struct LiveEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    dimension: usize,
    retry: RetryPolicy,
    timeout_secs: u64,
}

impl LiveEmbeddingProvider {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self, KbError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| KbError::ProviderUnavailable(err.to_string()))?;
        Ok(Self {
            client,
            url: format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                settings.endpoint.as_str().trim_end_matches('/'),
                settings.deployment,
                settings.api_version
            ),
            api_key: settings.api_key.clone(),
            dimension: settings.dimension,
            retry: settings.retry,
            timeout_secs: settings.timeout.as_secs(),
        })
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&serde_json::json!({ "input": texts }))
            .send()
            .await
            .map_err(|err| classify_transport_error(err, self.timeout_secs))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(KbError::ProviderQuotaExceeded(format!(
                "embedding service returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(KbError::ProviderUnavailable(format!(
                "embedding service returned {status}"
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| KbError::ProviderUnavailable(format!("malformed response: {err}")))?;

        if body.data.len() != texts.len() {
            return Err(KbError::ProviderUnavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        // The service tags each vector with its input index; reassemble in
        // input order rather than trusting response order.
        let mut data = body.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for LiveEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            let mut produced = self
                .retry
                .run("embed_batch", || self.request_batch(batch))
                .await?;
            vectors.append(&mut produced);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "azure-openai"
    }
}

pub(crate) fn classify_transport_error(err: reqwest::Error, timeout_secs: u64) -> KbError {
    if err.is_timeout() {
        KbError::Timeout {
            seconds: timeout_secs,
        }
    } else {
        KbError::ProviderUnavailable(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}
