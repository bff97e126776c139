use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::settings::GenerationSettings;
use crate::types::RetrievedDocument;

const PROVIDER: &str = "OpenAI";

const SYSTEM_PROMPT: &str = "You summarise what mental health professionals have said about a \
user's question. Start with a short direct answer, then organise the rest as numbered sections, \
each starting with a short title line followed by bullet points. Use only the retrieved \
information and leave out any section it does not support.";

/// Produces a free-text answer from a query and its retrieved context.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, query: &str, documents: &[RetrievedDocument]) -> Result<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct LLM {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    config: GenerationSettings,
}

impl LLM {
    pub fn new(config: GenerationSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::generation(PROVIDER, format!("client setup failed: {e}")))?;

        Ok(LLM {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            config,
        })
    }

    fn construct_prompt(&self, query: &str, documents: &[RetrievedDocument]) -> String {
        let context: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        format!(
            "Retrieved information:\n{}\n\nUser's question: {query}\n\nYour summarized response:",
            context.join("\n\n")
        )
    }
}

#[async_trait]
impl Generator for LLM {
    async fn generate(&self, query: &str, documents: &[RetrievedDocument]) -> Result<String> {
        if query.trim().is_empty() {
            return Err(RagError::generation(PROVIDER, "query cannot be empty"));
        }

        let prompt = self.construct_prompt(query, documents);
        debug!(
            provider = PROVIDER,
            model = %self.config.model,
            documents = documents.len(),
            prompt_len = prompt.len(),
            "generating answer"
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "generation request failed");
            RagError::generation(PROVIDER, format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %status, "generation API error");
            return Err(RagError::generation(
                PROVIDER,
                format!("API returned {status}: {body}"),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::generation(PROVIDER, format!("failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::generation(PROVIDER, "response contained no answer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentMetadata;

    fn document(content: &str) -> RetrievedDocument {
        RetrievedDocument {
            content: content.to_string(),
            metadata: DocumentMetadata {
                source_record_id: "q1".to_string(),
                source: "Counsel Chat".to_string(),
                score: 0.9,
                topic: String::new(),
                question_title: String::new(),
                question_vector: Vec::new(),
            },
        }
    }

    #[test]
    fn test_construct_prompt() -> anyhow::Result<()> {
        let llm = LLM::new(GenerationSettings::default())?;
        let prompt = llm.construct_prompt(
            "How do I calm down?",
            &[
                document("Question: a\nAnswer: breathe"),
                document("Question: b\nAnswer: walk"),
            ],
        );
        assert!(prompt.starts_with("Retrieved information:\nQuestion: a\nAnswer: breathe\n\nQuestion: b"));
        assert!(prompt.contains("User's question: How do I calm down?"));
        Ok(())
    }

    #[test]
    fn test_endpoint() -> anyhow::Result<()> {
        let llm = LLM::new(GenerationSettings {
            base_url: "http://localhost:11434/v1/".to_string(),
            ..GenerationSettings::default()
        })?;
        assert_eq!(llm.endpoint, "http://localhost:11434/v1/chat/completions");
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_query_rejected() -> anyhow::Result<()> {
        let llm = LLM::new(GenerationSettings::default())?;
        let result = llm.generate("   ", &[]).await;
        assert!(matches!(result, Err(RagError::Generation { .. })));
        Ok(())
    }
}
