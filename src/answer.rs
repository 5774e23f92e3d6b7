//! Grounded answer orchestration.
//!
//! Combines retrieved chunks into a context block, builds a
//! language-consistent prompt, and delegates to the completion capability.
//! The orchestrator is stateless across calls and never lets an error
//! escape: every failure is converted into a structured outcome the
//! transport layer can map to a response.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::completion::CompletionProvider;
use crate::profile::{Language, UserProfile};
use crate::retriever::{Retriever, ScoredChunk};
use crate::types::KbError;

/// A conversation turn passed through for continuity.
///
/// History never overrides context grounding; it only gives the completion
/// capability the thread of the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub const USER: &'static str = "user";
    pub const ASSISTANT: &'static str = "assistant";

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Self::USER.to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Self::ASSISTANT.to_string(),
            content: content.into(),
        }
    }
}

/// Tunables for the answer pipeline.
#[derive(Clone, Copy, Debug)]
pub struct AnswerConfig {
    /// How many chunks to retrieve per question.
    pub top_k: usize,
    /// Hits scoring below this are not used as context.
    pub min_score: f32,
    /// Character budget for the context block.
    pub max_context_chars: usize,
    /// How many trailing conversation turns to include.
    pub history_window: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.15,
            max_context_chars: 2000,
            history_window: 6,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Answered,
    Error,
}

/// The orchestrator's structured result, one per question.
#[derive(Clone, Debug, Serialize)]
pub struct AnswerOutcome {
    pub status: AnswerStatus,
    /// Absent when `status` is `Error`.
    pub answer: Option<String>,
    /// Source files backing the answer, deduplicated in rank order.
    pub sources: Vec<String>,
    /// Whether retrieved context was handed to the completion capability.
    pub context_used: bool,
    /// Failure description when `status` is `Error`.
    pub reason: Option<String>,
}

impl AnswerOutcome {
    fn error(reason: String) -> Self {
        Self {
            status: AnswerStatus::Error,
            answer: None,
            sources: Vec::new(),
            context_used: false,
            reason: Some(reason),
        }
    }
}

/// Combines retrieval and completion into a grounded answer.
pub struct AnswerOrchestrator {
    retriever: Retriever,
    completion: Arc<dyn CompletionProvider>,
    config: AnswerConfig,
}

impl AnswerOrchestrator {
    pub fn new(retriever: Retriever, completion: Arc<dyn CompletionProvider>) -> Self {
        Self {
            retriever,
            completion,
            config: AnswerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: AnswerConfig) -> Self {
        self.config = config;
        self
    }

    /// Answers `query` for `profile`, grounded in retrieved context.
    ///
    /// When nothing scores above the relevance floor, the completion
    /// capability is still invoked with the bare question and no fabricated
    /// context, and `context_used` is `false`. Failures are returned as
    /// `status = Error` outcomes; this method does not return `Result`
    /// because no error is allowed past the orchestrator boundary.
    pub async fn answer(
        &self,
        query: &str,
        profile: &UserProfile,
        history: &[Message],
        language: Language,
    ) -> AnswerOutcome {
        let hits = match self
            .retriever
            .retrieve(query, profile, self.config.top_k)
            .await
        {
            Ok(hits) => hits,
            Err(err) => {
                tracing::warn!(%err, "retrieval failed, returning error outcome");
                return AnswerOutcome::error(err.to_string());
            }
        };

        let retained: Vec<&ScoredChunk<'_>> = hits
            .iter()
            .filter(|hit| hit.score >= self.config.min_score)
            .collect();
        let (context, sources) = self.build_context(&retained);
        let context_used = context.is_some();

        let prompt = build_prompt(query, profile, context.as_deref(), history, language, self.config.history_window);

        match self.completion.complete(&prompt, language).await {
            Ok(answer) => AnswerOutcome {
                status: AnswerStatus::Answered,
                answer: Some(answer),
                sources,
                context_used,
                reason: None,
            },
            Err(err) => {
                let failure = KbError::CompletionFailed(err.to_string());
                tracing::warn!(%failure, "completion failed after retries");
                AnswerOutcome::error(failure.to_string())
            }
        }
    }

    /// Builds the context block within the character budget and collects
    /// the backing source files, deduplicated in rank order.
    fn build_context(&self, retained: &[&ScoredChunk<'_>]) -> (Option<String>, Vec<String>) {
        if retained.is_empty() {
            return (None, Vec::new());
        }
        let mut blocks: Vec<String> = Vec::new();
        let mut sources: Vec<String> = Vec::new();
        let mut used = 0usize;
        for hit in retained {
            let block = format!("מקור: {}\n{}", hit.chunk.category.label(), hit.chunk.text);
            let cost = block.chars().count();
            if used + cost > self.config.max_context_chars && !blocks.is_empty() {
                break;
            }
            used += cost;
            if !sources.contains(&hit.chunk.source_file) {
                sources.push(hit.chunk.source_file.clone());
            }
            blocks.push(block);
        }
        (Some(blocks.join("\n---\n")), sources)
    }
}

fn render_history(history: &[Message], window: usize, language: Language) -> String {
    let (user_label, assistant_label) = match language {
        Language::Hebrew => ("משתמש", "עוזר"),
        Language::English => ("User", "Assistant"),
    };
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .map(|message| {
            let label = if message.role == Message::USER {
                user_label
            } else {
                assistant_label
            };
            format!("{label}: {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn profile_line(value: Option<String>, language: Language) -> String {
    value.unwrap_or_else(|| {
        match language {
            Language::Hebrew => "לא צוין",
            Language::English => "Not specified",
        }
        .to_string()
    })
}

fn build_prompt(
    query: &str,
    profile: &UserProfile,
    context: Option<&str>,
    history: &[Message],
    language: Language,
    history_window: usize,
) -> String {
    let name = match (&profile.first_name, &profile.last_name) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(first), None) => Some(first.clone()),
        (None, Some(last)) => Some(last.clone()),
        (None, None) => None,
    };
    let hmo = profile.hmo.map(|h| h.label().to_string());
    let tier = profile.membership_tier.map(|t| t.label().to_string());
    let age = profile.age.map(|a| a.to_string());
    let rendered_history = render_history(history, history_window, language);

    match language {
        Language::English => format!(
            "You are an AI assistant for Israeli health funds. Answer strictly in English.\n\n\
             User profile:\n\
             - Name: {}\n\
             - HMO: {}\n\
             - Membership tier: {}\n\
             - Age: {}\n\n\
             Relevant knowledge:\n{}\n\n\
             Recent conversation history:\n{}\n\n\
             User question:\n{query}\n\n\
             Instructions:\n\
             1. Answer only in English.\n\
             2. Ground your answer only in the relevant knowledge above; do not present unsupported claims as sourced.\n\
             3. If the user belongs to a specific HMO, focus on the details relevant to that HMO.\n\
             4. If membership tiers differ, explain the differences clearly.\n\
             5. If exact information is missing, say so and give general guidance.\n\
             6. Include phone numbers or links when available.\n\n\
             Answer:",
            profile_line(name, language),
            profile_line(hmo, language),
            profile_line(tier, language),
            profile_line(age, language),
            context.unwrap_or("No relevant information found in the knowledge base"),
            if rendered_history.is_empty() {
                "No previous history"
            } else {
                rendered_history.as_str()
            },
        ),
        Language::Hebrew => format!(
            "אתה עוזר AI מומחה לקופות החולים בישראל. ענה אך ורק בעברית.\n\n\
             פרופיל משתמש:\n\
             - שם: {}\n\
             - קופת חולים: {}\n\
             - דרגת חברות: {}\n\
             - גיל: {}\n\n\
             מידע רלוונטי מבסיס הידע:\n{}\n\n\
             היסטוריית שיחה אחרונה:\n{}\n\n\
             שאלת המשתמש:\n{query}\n\n\
             הנחיות:\n\
             1. ענה רק בעברית.\n\
             2. בסס את התשובה אך ורק על המידע הרלוונטי למעלה; אל תציג טענות ללא מקור.\n\
             3. אם המשתמש שייך לקופת חולים מסוימת, התמקד במידע הרלוונטי לו.\n\
             4. אם יש הבדלים בין דרגות החברות, הסבר זאת בבירור.\n\
             5. אם אין מידע מדויק, אמור זאת בכנות ותן הנחיות כלליות.\n\
             6. כלול מספרי טלפון או קישורים אם זמינים.\n\n\
             תשובה:",
            profile_line(name, language),
            profile_line(hmo, language),
            profile_line(tier, language),
            profile_line(age, language),
            context.unwrap_or("לא נמצא מידע רלוונטי בבסיס הידע"),
            if rendered_history.is_empty() {
                "אין היסטוריית שיחה קודמת"
            } else {
                rendered_history.as_str()
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    use crate::chunk::{Chunk, ChunkId, ServiceCategory};
    use crate::embedding::EmbeddingProvider;
    use crate::index::VectorIndex;

    struct StubEmbedder {
        vectors: HashMap<String, Vec<f32>>,
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
            Ok(texts
                .iter()
                .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| vec![0.0; 2]))
                .collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    /// Records every prompt it sees; optionally fails every call.
    struct StubCompletion {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl StubCompletion {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionProvider for StubCompletion {
        async fn complete(&self, prompt: &str, _language: Language) -> Result<String, KbError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(KbError::ProviderUnavailable("completion down".into()))
            } else {
                Ok("grounded answer".to_string())
            }
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn dental_chunk(id: u32, text: &str) -> Chunk {
        Chunk {
            id: ChunkId(id),
            text: text.to_string(),
            source_file: ServiceCategory::Dental.source_file().to_string(),
            category: ServiceCategory::Dental,
            eligibility: Vec::new(),
            embedding: vec![1.0, 0.0],
        }
    }

    fn orchestrator(
        chunks: Vec<Chunk>,
        query_vector: Vec<f32>,
        completion: Arc<StubCompletion>,
    ) -> AnswerOrchestrator {
        let index = Arc::new(VectorIndex::build(chunks, 2).unwrap());
        let embedder = Arc::new(StubEmbedder {
            vectors: HashMap::from([("q".to_string(), query_vector)]),
        });
        AnswerOrchestrator::new(Retriever::new(index, embedder), completion)
    }

    #[tokio::test]
    async fn grounded_answer_carries_context_and_sources() {
        let completion = StubCompletion::ok();
        let orchestrator = orchestrator(
            vec![
                dental_chunk(0, "Dental cleaning is covered."),
                dental_chunk(1, "Annual checkups are free."),
            ],
            vec![1.0, 0.0],
            completion.clone(),
        );

        let outcome = orchestrator
            .answer("q", &UserProfile::anonymous(), &[], Language::English)
            .await;
        assert_eq!(outcome.status, AnswerStatus::Answered);
        assert_eq!(outcome.answer.as_deref(), Some("grounded answer"));
        assert!(outcome.context_used);
        // Both chunks share one source file; deduplicated.
        assert_eq!(outcome.sources, vec!["dentel_services.html".to_string()]);
        let prompt = completion.last_prompt();
        assert!(prompt.contains("Dental cleaning is covered."));
        assert!(prompt.contains("Answer strictly in English"));
    }

    #[tokio::test]
    async fn low_relevance_hits_are_not_presented_as_context() {
        let completion = StubCompletion::ok();
        // Zero query vector: every score is 0.0, below the floor.
        let orchestrator = orchestrator(
            vec![dental_chunk(0, "Dental cleaning is covered.")],
            vec![0.0, 0.0],
            completion.clone(),
        );

        let outcome = orchestrator
            .answer("q", &UserProfile::anonymous(), &[], Language::English)
            .await;
        assert_eq!(outcome.status, AnswerStatus::Answered);
        assert!(!outcome.context_used);
        assert!(outcome.sources.is_empty());
        let prompt = completion.last_prompt();
        assert!(prompt.contains("No relevant information found"));
        assert!(!prompt.contains("Dental cleaning is covered."));
    }

    #[tokio::test]
    async fn completion_failure_becomes_error_outcome() {
        let completion = StubCompletion::failing();
        let orchestrator = orchestrator(
            vec![dental_chunk(0, "Dental cleaning is covered.")],
            vec![1.0, 0.0],
            completion,
        );

        let outcome = orchestrator
            .answer("q", &UserProfile::anonymous(), &[], Language::Hebrew)
            .await;
        assert_eq!(outcome.status, AnswerStatus::Error);
        assert!(outcome.answer.is_none());
        assert!(outcome.reason.unwrap().contains("completion failed"));
    }

    #[tokio::test]
    async fn history_is_passed_through_within_the_window() {
        let completion = StubCompletion::ok();
        let orchestrator = orchestrator(
            vec![dental_chunk(0, "Dental cleaning is covered.")],
            vec![1.0, 0.0],
            completion.clone(),
        );

        let history = vec![
            Message::user("first question"),
            Message::assistant("first answer"),
            Message::user("second question"),
        ];
        orchestrator
            .answer("q", &UserProfile::anonymous(), &history, Language::English)
            .await;
        let prompt = completion.last_prompt();
        assert!(prompt.contains("User: second question"));
        assert!(prompt.contains("Assistant: first answer"));
    }

    #[tokio::test]
    async fn hebrew_prompt_includes_profile_summary() {
        let completion = StubCompletion::ok();
        let orchestrator = orchestrator(
            vec![dental_chunk(0, "טיפולי שיניים מכוסים.")],
            vec![1.0, 0.0],
            completion.clone(),
        );

        let profile = UserProfile {
            first_name: Some("דנה".into()),
            ..UserProfile::confirmed(
                crate::profile::Hmo::Maccabi,
                crate::profile::MembershipTier::Gold,
            )
        };
        orchestrator
            .answer("q", &profile, &[], Language::Hebrew)
            .await;
        let prompt = completion.last_prompt();
        assert!(prompt.contains("ענה אך ורק בעברית"));
        assert!(prompt.contains("קופת חולים: מכבי"));
        assert!(prompt.contains("דרגת חברות: זהב"));
    }

    #[tokio::test]
    async fn context_respects_character_budget() {
        let completion = StubCompletion::ok();
        let long = "x".repeat(900);
        let chunks = vec![
            dental_chunk(0, &long),
            dental_chunk(1, &long),
            dental_chunk(2, &long),
        ];
        let index = Arc::new(VectorIndex::build(chunks, 2).unwrap());
        let embedder = Arc::new(StubEmbedder {
            vectors: HashMap::from([("q".to_string(), vec![1.0, 0.0])]),
        });
        let orchestrator =
            AnswerOrchestrator::new(Retriever::new(index, embedder), completion.clone())
                .with_config(AnswerConfig {
                    max_context_chars: 2000,
                    ..AnswerConfig::default()
                });

        orchestrator
            .answer("q", &UserProfile::anonymous(), &[], Language::English)
            .await;
        let prompt = completion.last_prompt();
        // Two 900-char blocks fit the 2000-char budget; the third does not.
        assert_eq!(prompt.matches(&long).count(), 2);
    }
}
