pub mod domain;
pub mod ingest;
pub mod ports;
pub mod prompt;
pub mod session;

pub use domain::{
    AgeBracket, Comorbidity, DetailLevel, EducationLevel, Goal, HistoryEntry, Profile,
    UploadKind, UploadedFile, UserDocument, UserRecord,
};
pub use ports::{
    CredentialStore, ExplanationService, OcrService, PortError, PortResult, ProfileStore,
    ReportExporter, TextToSpeechService,
};
pub use prompt::{build_prompt, PromptRule, PROMPT_RULES};
pub use session::{SessionContext, SessionController, SessionError, SessionResult, SessionState};
