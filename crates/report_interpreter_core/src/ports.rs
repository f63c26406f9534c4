//! crates/report_interpreter_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like files or hosted models.

use async_trait::async_trait;
use crate::domain::UserDocument;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., filesystem, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stores a new user. Returns `false` without touching anything if the
    /// username is already registered.
    async fn register(&self, username: &str, password: &str, email: &str) -> PortResult<bool>;

    /// Returns `true` iff the user exists and the password matches.
    async fn authenticate(&self, username: &str, password: &str) -> PortResult<bool>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Reads the whole per-user document. A user with no document yet gets an
    /// empty one.
    async fn load(&self, username: &str) -> PortResult<UserDocument>;

    /// Replaces the whole per-user document.
    async fn save(&self, username: &str, document: &UserDocument) -> PortResult<()>;
}

#[async_trait]
pub trait ExplanationService: Send + Sync {
    /// Sends the prompt to the language model and returns the trimmed answer.
    async fn explain(&self, prompt: &str) -> PortResult<String>;
}

#[async_trait]
pub trait OcrService: Send + Sync {
    /// Extracts the visible text of an encoded image.
    async fn extract_text(&self, image: &[u8], mime_type: &str) -> PortResult<String>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates MP3 audio data from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

#[async_trait]
pub trait ReportExporter: Send + Sync {
    /// Renders the explanation as a PDF and returns its bytes.
    async fn export_pdf(&self, explanation: &str) -> PortResult<Vec<u8>>;
}
