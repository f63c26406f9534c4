//! services/api/src/adapters/explanation_llm.rs
//!
//! This module contains the adapter for the explanation LLM.
//! It implements the `ExplanationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client, error::OpenAIError,
};
use async_trait::async_trait;
use report_interpreter_core::ports::{ExplanationService, PortError, PortResult};
use tracing::debug;

const SYSTEM_INSTRUCTIONS: &str =
    "Eres un asistente médico que adapta sus explicaciones al perfil clínico y social del paciente.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ExplanationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiExplanationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiExplanationAdapter {
    /// Creates a new `OpenAiExplanationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, temperature: f32) -> Self {
        Self {
            client,
            model,
            temperature,
        }
    }
}

//=========================================================================================
// `ExplanationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ExplanationService for OpenAiExplanationAdapter {
    /// Single attempt: any transport or API error is returned as-is, without retry.
    async fn explain(&self, prompt: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Requesting explanation");

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let explanation = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Explanation LLM returned no text content.".to_string())
            })?;

        Ok(explanation.trim().to_string())
    }
}
