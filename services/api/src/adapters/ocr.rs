//! services/api/src/adapters/ocr.rs
//!
//! This module contains the OCR adapter. Text is read off report images by an
//! OpenAI vision-capable chat model, which receives the image inline as a
//! base64 data URL. It implements the `OcrService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
    },
    Client, error::OpenAIError,
};
use async_trait::async_trait;
use base64::Engine as _;
use report_interpreter_core::ports::{OcrService, PortError, PortResult};
use tracing::debug;

const SYSTEM_INSTRUCTIONS: &str = "\
Eres un motor de OCR para informes médicos en español. Transcribe todo el texto \
visible de la imagen, línea por línea, respetando el orden de lectura. No \
resumas, no traduzcas, no corrijas y no añadas comentarios.";

const USER_INSTRUCTIONS: &str = "\
Transcribe el texto de esta imagen. Devuelve solo el texto, una línea por cada \
línea del documento.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `OcrService` using an OpenAI vision model.
#[derive(Clone)]
pub struct OpenAiVisionOcrAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiVisionOcrAdapter {
    /// Creates a new `OpenAiVisionOcrAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Encodes an image as a `data:` URL accepted by the chat API.
pub fn image_data_url(image: &[u8], mime_type: &str) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        base64::engine::general_purpose::STANDARD.encode(image)
    )
}

/// Drops markdown code fences and blank lines around the transcription.
fn clean_transcription(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

//=========================================================================================
// `OcrService` Trait Implementation
//=========================================================================================

#[async_trait]
impl OcrService for OpenAiVisionOcrAdapter {
    async fn extract_text(&self, image: &[u8], mime_type: &str) -> PortResult<String> {
        if image.is_empty() {
            return Err(PortError::Unexpected("Empty image upload".to_string()));
        }

        let image_part: ChatCompletionRequestUserMessageContentPart =
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(image_data_url(image, mime_type))
                        .detail(ImageDetail::High)
                        .build()
                        .map_err(|e| PortError::Unexpected(e.to_string()))?,
                )
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into();
        let text_part: ChatCompletionRequestUserMessageContentPart =
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(USER_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into();

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(vec![text_part, image_part])
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(model = %self.model, bytes = image.len(), mime_type, "Running OCR");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let raw = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PortError::Unexpected("OCR model returned no text content.".to_string()))?;

        Ok(clean_transcription(&raw))
    }
}
