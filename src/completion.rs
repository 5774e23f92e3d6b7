//! The completion capability consumed by the answer orchestrator.
//!
//! Mirrors the embedding provider split: a live Azure OpenAI
//! chat-completions client and a deterministic offline mock behind the same
//! trait, selected by configuration at startup.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::CompletionSettings;
use crate::profile::Language;
use crate::retry::RetryPolicy;
use crate::types::KbError;

const SYSTEM_PROMPT: &str =
    "You are a helpful healthcare assistant for Israeli HMOs. Answer strictly in the requested language.";

/// An opaque text-completion capability.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Produces a completion for `prompt`, answering in `language`.
    ///
    /// Transient service failures are retried internally; the error that
    /// surfaces here is final for this request.
    async fn complete(&self, prompt: &str, language: Language) -> Result<String, KbError>;

    fn name(&self) -> &'static str;
}

/// Deterministic offline variant. Never contacts any network endpoint.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockCompletionProvider;

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, _prompt: &str, language: Language) -> Result<String, KbError> {
        Ok(match language {
            Language::Hebrew => {
                "מצב לא מקוון: התשובה נוצרה ללא מודל שפה. אנא פנה לקופת החולים שלך לקבלת מידע מחייב."
            }
            Language::English => {
                "Offline mode: this answer was generated without a language model. Please contact your HMO for authoritative information."
            }
        }
        .to_string())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Live variant backed by an Azure OpenAI chat-completions deployment.
pub struct LiveCompletionProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
    timeout_secs: u64,
}

impl LiveCompletionProvider {
    pub fn new(settings: &CompletionSettings) -> Result<Self, KbError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| KbError::ProviderUnavailable(err.to_string()))?;
        Ok(Self {
            client,
            url: format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                settings.endpoint.as_str().trim_end_matches('/'),
                settings.deployment,
                settings.api_version
            ),
            api_key: settings.api_key.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            retry: settings.retry,
            timeout_secs: settings.timeout.as_secs(),
        })
    }

    async fn request_completion(
        &self,
        prompt: &str,
        language: Language,
    ) -> Result<String, KbError> {
        let language_hint = match language {
            Language::Hebrew => "Respond in Hebrew.",
            Language::English => "Respond in English.",
        };
        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&serde_json::json!({
                "messages": [
                    {"role": "system", "content": format!("{SYSTEM_PROMPT} {language_hint}")},
                    {"role": "user", "content": prompt},
                ],
                "temperature": self.temperature,
                "max_tokens": self.max_tokens,
            }))
            .send()
            .await
            .map_err(|err| crate::embedding::classify_transport_error(err, self.timeout_secs))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(KbError::ProviderQuotaExceeded(format!(
                "completion service returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(KbError::ProviderUnavailable(format!(
                "completion service returned {status}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| KbError::ProviderUnavailable(format!("malformed response: {err}")))?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| KbError::ProviderUnavailable("response carried no choices".into()))
    }
}

#[async_trait]
impl CompletionProvider for LiveCompletionProvider {
    async fn complete(&self, prompt: &str, language: Language) -> Result<String, KbError> {
        self.retry
            .run("complete", || self.request_completion(prompt, language))
            .await
    }

    fn name(&self) -> &'static str {
        "azure-openai"
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
