pub mod credentials;
pub mod explanation_llm;
pub mod ocr;
pub mod pdf;
pub mod store;
pub mod tts;

pub use credentials::JsonCredentialStore;
pub use explanation_llm::OpenAiExplanationAdapter;
pub use ocr::OpenAiVisionOcrAdapter;
pub use pdf::PrintPdfExporter;
pub use store::JsonProfileStore;
pub use tts::OpenAiTtsAdapter;
