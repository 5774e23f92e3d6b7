//! Startup orchestration and the surface exposed to the transport layer.
//!
//! ```text
//! load_dir ──► chunk_section ──► EmbeddingProvider ──► VectorIndex
//!                                                          │
//!                         Retriever ◄─────────────────────┘
//!                             │
//!              AnswerOrchestrator ──► CompletionProvider
//! ```
//!
//! [`KnowledgeService`] builds the pipeline once at startup and then serves
//! the three calls the HTTP layer invokes: `retrieve`, `answer`, and
//! `kb_stats`. Ingestion failures abort startup instead of letting the
//! process serve a degraded or empty knowledge base.

use std::path::PathBuf;
use std::sync::Arc;

use crate::answer::{AnswerConfig, AnswerOrchestrator, AnswerOutcome, Message};
use crate::chunk::{Chunk, ChunkId};
use crate::completion::{CompletionProvider, LiveCompletionProvider, MockCompletionProvider};
use crate::config::KbConfig;
use crate::embedding::{EmbeddingProvider, LiveEmbeddingProvider, MockEmbeddingProvider};
use crate::index::{KbStats, VectorIndex};
use crate::ingestion::{ChunkerConfig, chunk_section, load_dir};
use crate::profile::{Language, UserProfile};
use crate::retriever::{Retriever, ScoredChunk};
use crate::types::KbError;

/// The retrieval core, fully assembled.
pub struct KnowledgeService {
    index: Arc<VectorIndex>,
    retriever: Retriever,
    orchestrator: AnswerOrchestrator,
}

impl std::fmt::Debug for KnowledgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeService").finish_non_exhaustive()
    }
}

impl KnowledgeService {
    pub fn builder() -> KnowledgeServiceBuilder {
        KnowledgeServiceBuilder::default()
    }

    /// Assembles the service from configuration, selecting mock or live
    /// providers, and runs the full ingestion pipeline.
    pub async fn from_config(config: &KbConfig) -> Result<Self, KbError> {
        let embedder: Arc<dyn EmbeddingProvider> = if config.use_mock {
            Arc::new(MockEmbeddingProvider::with_dimension(
                config.embedding.dimension,
            ))
        } else {
            Arc::new(LiveEmbeddingProvider::new(&config.embedding)?)
        };
        let completion: Arc<dyn CompletionProvider> = if config.use_mock {
            Arc::new(MockCompletionProvider)
        } else {
            Arc::new(LiveCompletionProvider::new(&config.completion)?)
        };
        tracing::info!(
            mock = config.use_mock,
            embedder = embedder.name(),
            "assembling knowledge service"
        );
        Self::builder()
            .kb_dir(&config.kb_dir)
            .embedding_provider(embedder)
            .completion_provider(completion)
            .init()
            .await
    }

    /// Profile-aware similarity search; one of the transport layer's two
    /// call sites.
    pub async fn retrieve(
        &self,
        query: &str,
        profile: &UserProfile,
        k: usize,
    ) -> Result<Vec<ScoredChunk<'_>>, KbError> {
        self.retriever.retrieve(query, profile, k).await
    }

    /// Grounded answering; the transport layer's other call site.
    pub async fn answer(
        &self,
        query: &str,
        profile: &UserProfile,
        history: &[Message],
        language: Language,
    ) -> AnswerOutcome {
        self.orchestrator.answer(query, profile, history, language).await
    }

    /// Knowledge-base statistics for health and introspection endpoints.
    pub fn kb_stats(&self) -> KbStats {
        self.index.stats()
    }
}

/// Builder for [`KnowledgeService`].
#[derive(Default)]
pub struct KnowledgeServiceBuilder {
    kb_dir: Option<PathBuf>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    completion: Option<Arc<dyn CompletionProvider>>,
    chunker: ChunkerConfig,
    answer: AnswerConfig,
}

impl KnowledgeServiceBuilder {
    #[must_use]
    pub fn kb_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.kb_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    #[must_use]
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(provider);
        self
    }

    #[must_use]
    pub fn chunker_config(mut self, config: ChunkerConfig) -> Self {
        self.chunker = config;
        self
    }

    #[must_use]
    pub fn answer_config(mut self, config: AnswerConfig) -> Self {
        self.answer = config;
        self
    }

    /// Runs the ingestion pipeline: load, chunk, embed, index.
    ///
    /// The corpus is re-embedded wholesale on every call; there is no
    /// incremental path. Per-section ingestion warnings are logged and kept
    /// in the load outcome; everything else aborts startup.
    pub async fn init(self) -> Result<KnowledgeService, KbError> {
        let kb_dir = self
            .kb_dir
            .ok_or_else(|| KbError::Config("knowledge base directory is required".into()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| KbError::Config("embedding provider is required".into()))?;
        let completion = self
            .completion
            .ok_or_else(|| KbError::Config("completion provider is required".into()))?;

        let outcome = load_dir(&kb_dir).await?;
        for skipped in &outcome.skipped {
            tracing::warn!(
                source_file = %skipped.source_file,
                reason = %skipped.reason,
                "section skipped during ingestion"
            );
        }

        let pending: Vec<_> = outcome
            .sections
            .iter()
            .flat_map(|section| chunk_section(section, self.chunker))
            .collect();

        let texts: Vec<String> = pending.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != pending.len() {
            return Err(KbError::ProviderUnavailable(format!(
                "embedded {} of {} chunks",
                vectors.len(),
                pending.len()
            )));
        }

        let chunks: Vec<Chunk> = pending
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, vector))| chunk.into_chunk(ChunkId(i as u32), vector))
            .collect();

        let index = Arc::new(VectorIndex::build(chunks, embedder.dimension())?);
        let stats = index.stats();
        tracing::info!(
            chunks = stats.chunk_count,
            dimension = stats.embedding_dimension,
            embedder = embedder.name(),
            "knowledge service ready"
        );

        let retriever = Retriever::new(Arc::clone(&index), embedder);
        let orchestrator =
            AnswerOrchestrator::new(retriever.clone(), completion).with_config(self.answer);
        Ok(KnowledgeService {
            index,
            retriever,
            orchestrator,
        })
    }
}
