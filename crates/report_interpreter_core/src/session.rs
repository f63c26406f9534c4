//! crates/report_interpreter_core/src/session.rs
//!
//! The per-session state and the controller that drives every user action:
//! login, profile capture, file ingestion, explanation, speech/PDF rendering
//! and history maintenance.
//!
//! The controller owns no state of its own. Each call receives the caller's
//! `SessionState` explicitly and either completes fully or leaves it unchanged.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{HistoryEntry, Profile, UploadKind, UploadedFile, UserDocument};
use crate::ingest::{combine_sections, ExtractedSection};
use crate::ports::{
    CredentialStore, ExplanationService, OcrService, PortError, ProfileStore, ReportExporter,
    TextToSpeechService,
};
use crate::prompt::{build_prompt, truncate_report};

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Not logged in")]
    NotAuthenticated,
    #[error("The disclaimer must be accepted first")]
    DisclaimerPending,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Username already registered")]
    UsernameTaken,
    #[error("Username must not be empty")]
    InvalidUsername,
    #[error("A profile is required before generating an explanation")]
    ProfileMissing,
    #[error("There is no report text to explain")]
    NothingToExplain,
    #[error("No explanation has been generated yet")]
    NoExplanation,
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error("File is not valid UTF-8 text: {0}")]
    InvalidText(String),
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),
}

pub type SessionResult<T> = Result<T, SessionError>;

//=========================================================================================
// SessionState (Specific to One Browser Session)
//=========================================================================================

/// Who the session belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionContext {
    Anonymous,
    Authenticated { username: String },
}

/// Everything remembered between two actions of the same session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub context: SessionContext,
    pub disclaimer_accepted: bool,
    pub profile: Option<Profile>,
    /// Oldest first, as stored.
    pub history: Vec<HistoryEntry>,
    pub extracted_text: String,
    pub explanation: Option<String>,
}

impl SessionState {
    pub fn anonymous() -> Self {
        Self {
            context: SessionContext::Anonymous,
            disclaimer_accepted: false,
            profile: None,
            history: Vec::new(),
            extracted_text: String::new(),
            explanation: None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match &self.context {
            SessionContext::Authenticated { username } => Some(username),
            SessionContext::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.username().is_some()
    }

    /// The username of a logged-in session that has accepted the disclaimer.
    fn ready_user(&self) -> SessionResult<String> {
        let username = self.username().ok_or(SessionError::NotAuthenticated)?;
        if !self.disclaimer_accepted {
            return Err(SessionError::DisclaimerPending);
        }
        Ok(username.to_string())
    }

    fn document(&self) -> UserDocument {
        UserDocument {
            profile: self.profile.clone(),
            history: self.history.clone(),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::anonymous()
    }
}

//=========================================================================================
// SessionController
//=========================================================================================

/// Orchestrates the session flow over the service ports.
#[derive(Clone)]
pub struct SessionController {
    credentials: Arc<dyn CredentialStore>,
    store: Arc<dyn ProfileStore>,
    ocr: Arc<dyn OcrService>,
    explainer: Arc<dyn ExplanationService>,
    tts: Arc<dyn TextToSpeechService>,
    exporter: Arc<dyn ReportExporter>,
    max_report_chars: usize,
}

impl SessionController {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        store: Arc<dyn ProfileStore>,
        ocr: Arc<dyn OcrService>,
        explainer: Arc<dyn ExplanationService>,
        tts: Arc<dyn TextToSpeechService>,
        exporter: Arc<dyn ReportExporter>,
        max_report_chars: usize,
    ) -> Self {
        Self {
            credentials,
            store,
            ocr,
            explainer,
            tts,
            exporter,
            max_report_chars,
        }
    }

    // --- Authentication ---

    pub async fn register(&self, username: &str, password: &str, email: &str) -> SessionResult<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(SessionError::InvalidUsername);
        }
        if !self.credentials.register(username, password, email).await? {
            return Err(SessionError::UsernameTaken);
        }
        info!(username, "Registered new user");
        Ok(())
    }

    /// Verifies the credentials and returns a fresh authenticated session
    /// loaded with the user's stored profile and history.
    pub async fn login(&self, username: &str, password: &str) -> SessionResult<SessionState> {
        let username = username.trim();
        if username.is_empty() {
            return Err(SessionError::InvalidUsername);
        }
        if !self.credentials.authenticate(username, password).await? {
            warn!(username, "Rejected login attempt");
            return Err(SessionError::InvalidCredentials);
        }

        let document = self.store.load(username).await?;
        info!(username, history = document.history.len(), "User logged in");
        Ok(SessionState {
            context: SessionContext::Authenticated {
                username: username.to_string(),
            },
            profile: document.profile,
            history: document.history,
            ..SessionState::anonymous()
        })
    }

    pub fn logout(&self, state: &mut SessionState) {
        if let Some(username) = state.username() {
            info!(username, "User logged out");
        }
        *state = SessionState::anonymous();
    }

    pub fn accept_disclaimer(&self, state: &mut SessionState) -> SessionResult<()> {
        if !state.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        state.disclaimer_accepted = true;
        Ok(())
    }

    // --- Profile ---

    /// Replaces the profile wholesale and persists the user's document.
    pub async fn save_profile(&self, state: &mut SessionState, profile: Profile) -> SessionResult<()> {
        let username = state.ready_user()?;
        let mut document = state.document();
        document.profile = Some(profile);
        self.store.save(&username, &document).await?;
        state.profile = document.profile;
        Ok(())
    }

    // --- Report Ingestion ---

    /// Turns the uploaded files into the session's report text.
    pub async fn ingest(&self, state: &mut SessionState, files: &[UploadedFile]) -> SessionResult<String> {
        state.ready_user()?;

        let mut kinds = Vec::with_capacity(files.len());
        for file in files {
            let kind = UploadKind::detect(&file.name, file.content_type.as_deref())
                .ok_or_else(|| SessionError::UnsupportedFile(file.name.clone()))?;
            kinds.push(kind);
        }

        let mut sections = Vec::with_capacity(files.len());
        for (file, kind) in files.iter().zip(kinds) {
            let text = match kind {
                UploadKind::Image(mime) => self.ocr.extract_text(&file.data, mime).await?,
                UploadKind::Text => String::from_utf8(file.data.to_vec())
                    .map_err(|_| SessionError::InvalidText(file.name.clone()))?,
            };
            sections.push(ExtractedSection {
                file_name: file.name.clone(),
                source: kind,
                text,
            });
        }

        state.extracted_text = combine_sections(&sections);
        Ok(state.extracted_text.clone())
    }

    // --- Explanation ---

    /// Generates the personalized explanation and records it in the history.
    ///
    /// On any failure the session and the stored document are left untouched.
    pub async fn explain(&self, state: &mut SessionState) -> SessionResult<String> {
        let username = state.ready_user()?;
        let profile = state.profile.as_ref().ok_or(SessionError::ProfileMissing)?;
        if state.extracted_text.trim().is_empty() {
            return Err(SessionError::NothingToExplain);
        }

        let report = truncate_report(&state.extracted_text, self.max_report_chars);
        let prompt = build_prompt(report, profile);
        let explanation = self.explainer.explain(&prompt).await?;

        let mut document = state.document();
        document
            .history
            .push(HistoryEntry::now(state.extracted_text.clone(), explanation.clone()));
        self.store.save(&username, &document).await?;

        state.history = document.history;
        state.explanation = Some(explanation.clone());
        info!(username, history = state.history.len(), "Explanation generated");
        Ok(explanation)
    }

    pub async fn synthesize_speech(&self, state: &SessionState) -> SessionResult<Vec<u8>> {
        state.ready_user()?;
        let explanation = state.explanation.as_deref().ok_or(SessionError::NoExplanation)?;
        Ok(self.tts.generate_audio(explanation).await?)
    }

    pub async fn export_pdf(&self, state: &SessionState) -> SessionResult<Vec<u8>> {
        state.ready_user()?;
        let explanation = state.explanation.as_deref().ok_or(SessionError::NoExplanation)?;
        Ok(self.exporter.export_pdf(explanation).await?)
    }

    // --- History ---

    /// The history, most recent first.
    pub fn history<'a>(&self, state: &'a SessionState) -> SessionResult<Vec<&'a HistoryEntry>> {
        state.ready_user()?;
        Ok(state.history.iter().rev().collect())
    }

    /// Empties the history and persists it; the profile is kept.
    pub async fn clear_history(&self, state: &mut SessionState) -> SessionResult<()> {
        let username = state.ready_user()?;
        let document = UserDocument {
            profile: state.profile.clone(),
            history: Vec::new(),
        };
        self.store.save(&username, &document).await?;
        state.history.clear();
        info!(username, "History cleared");
        Ok(())
    }

    /// Forgets the current report and explanation so a new one can be uploaded.
    pub fn new_analysis(&self, state: &mut SessionState) -> SessionResult<()> {
        state.ready_user()?;
        state.extracted_text.clear();
        state.explanation = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgeBracket, Comorbidity, DetailLevel, EducationLevel, Goal};
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;

    //-------------------------------------------------------------------------------------
    // In-memory port implementations
    //-------------------------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryCredentials {
        users: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentials {
        async fn register(&self, username: &str, password: &str, _email: &str) -> PortResult<bool> {
            let mut users = self.users.lock().unwrap();
            if users.contains_key(username) {
                return Ok(false);
            }
            users.insert(username.to_string(), password.to_string());
            Ok(true)
        }

        async fn authenticate(&self, username: &str, password: &str) -> PortResult<bool> {
            Ok(self.users.lock().unwrap().get(username).map(String::as_str) == Some(password))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        documents: Mutex<HashMap<String, UserDocument>>,
    }

    #[async_trait]
    impl ProfileStore for MemoryStore {
        async fn load(&self, username: &str) -> PortResult<UserDocument> {
            Ok(self.documents.lock().unwrap().get(username).cloned().unwrap_or_default())
        }

        async fn save(&self, username: &str, document: &UserDocument) -> PortResult<()> {
            self.documents
                .lock()
                .unwrap()
                .insert(username.to_string(), document.clone());
            Ok(())
        }
    }

    struct FixedOcr;

    #[async_trait]
    impl OcrService for FixedOcr {
        async fn extract_text(&self, image: &[u8], mime_type: &str) -> PortResult<String> {
            Ok(format!("{} bytes de {}", image.len(), mime_type))
        }
    }

    /// Echoes the prompt it received, or fails when asked to.
    struct EchoExplainer {
        fail: bool,
        last_prompt: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ExplanationService for EchoExplainer {
        async fn explain(&self, prompt: &str) -> PortResult<String> {
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            if self.fail {
                return Err(PortError::Unexpected("model unavailable".into()));
            }
            Ok("Todo en rango normal.".to_string())
        }
    }

    struct StubSpeech;

    #[async_trait]
    impl TextToSpeechService for StubSpeech {
        async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }
    }

    struct StubPdf;

    #[async_trait]
    impl ReportExporter for StubPdf {
        async fn export_pdf(&self, explanation: &str) -> PortResult<Vec<u8>> {
            Ok(format!("%PDF {}", explanation).into_bytes())
        }
    }

    struct Harness {
        controller: SessionController,
        store: Arc<MemoryStore>,
        explainer: Arc<EchoExplainer>,
    }

    fn harness(fail_explanations: bool, max_report_chars: usize) -> Harness {
        let store = Arc::new(MemoryStore::default());
        let explainer = Arc::new(EchoExplainer {
            fail: fail_explanations,
            last_prompt: Mutex::new(None),
        });
        let controller = SessionController::new(
            Arc::new(MemoryCredentials::default()),
            store.clone(),
            Arc::new(FixedOcr),
            explainer.clone(),
            Arc::new(StubSpeech),
            Arc::new(StubPdf),
            max_report_chars,
        );
        Harness {
            controller,
            store,
            explainer,
        }
    }

    fn profile() -> Profile {
        Profile {
            age: Some(AgeBracket::From30To64),
            education: Some(EducationLevel::Secondary),
            detail: Some(DetailLevel::Intermediate),
            goal: Some(Goal::UnderstandHealth),
            comorbidities: [Comorbidity::Hypertension].into_iter().collect(),
        }
    }

    fn text_file(name: &str, body: &str) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            content_type: Some("text/plain".to_string()),
            data: Bytes::from(body.to_string()),
        }
    }

    async fn ready_session(h: &Harness) -> SessionState {
        h.controller.register("ana", "secreta", "ana@example.com").await.unwrap();
        let mut state = h.controller.login("ana", "secreta").await.unwrap();
        h.controller.accept_disclaimer(&mut state).unwrap();
        state
    }

    //-------------------------------------------------------------------------------------
    // Tests
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn login_requires_matching_password() {
        let h = harness(false, 1000);
        h.controller.register("ana", "secreta", "").await.unwrap();

        assert!(h.controller.login("ana", "secreta").await.unwrap().is_authenticated());
        assert!(matches!(
            h.controller.login("ana", "otra").await,
            Err(SessionError::InvalidCredentials)
        ));
        assert!(matches!(
            h.controller.login("nadie", "secreta").await,
            Err(SessionError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let h = harness(false, 1000);
        h.controller.register("ana", "uno", "").await.unwrap();
        assert!(matches!(
            h.controller.register("ana", "dos", "").await,
            Err(SessionError::UsernameTaken)
        ));
        assert!(h.controller.login("ana", "uno").await.is_ok());
        assert!(matches!(
            h.controller.register("   ", "x", "").await,
            Err(SessionError::InvalidUsername)
        ));
    }

    #[tokio::test]
    async fn actions_require_login_and_disclaimer() {
        let h = harness(false, 1000);
        let mut anonymous = SessionState::anonymous();
        assert!(matches!(
            h.controller.save_profile(&mut anonymous, profile()).await,
            Err(SessionError::NotAuthenticated)
        ));

        h.controller.register("ana", "secreta", "").await.unwrap();
        let mut state = h.controller.login("ana", "secreta").await.unwrap();
        assert!(matches!(
            h.controller.save_profile(&mut state, profile()).await,
            Err(SessionError::DisclaimerPending)
        ));
    }

    #[tokio::test]
    async fn login_restores_profile_and_history() {
        let h = harness(false, 1000);
        let mut state = ready_session(&h).await;
        h.controller.save_profile(&mut state, profile()).await.unwrap();
        h.controller
            .ingest(&mut state, &[text_file("informe.txt", "Colesterol 240")])
            .await
            .unwrap();
        h.controller.explain(&mut state).await.unwrap();

        let restored = h.controller.login("ana", "secreta").await.unwrap();
        assert_eq!(restored.profile, Some(profile()));
        assert_eq!(restored.history.len(), 1);
        assert!(!restored.disclaimer_accepted);
        assert!(restored.explanation.is_none());
    }

    #[tokio::test]
    async fn ingest_combines_images_and_text_in_order() {
        let h = harness(false, 1000);
        let mut state = ready_session(&h).await;
        let image = UploadedFile {
            name: "analitica.jpg".to_string(),
            content_type: Some("image/jpeg".to_string()),
            data: Bytes::from_static(&[1, 2, 3]),
        };

        let text = h
            .controller
            .ingest(&mut state, &[image, text_file("notas.txt", "Sin cambios")])
            .await
            .unwrap();

        assert_eq!(
            text,
            "--- Texto extraído de analitica.jpg ---\n3 bytes de image/jpeg\n\n\
             --- Contenido de notas.txt ---\nSin cambios"
        );
        assert_eq!(state.extracted_text, text);
    }

    #[tokio::test]
    async fn unsupported_upload_leaves_text_unchanged() {
        let h = harness(false, 1000);
        let mut state = ready_session(&h).await;
        state.extracted_text = "anterior".to_string();
        let pdf = UploadedFile {
            name: "informe.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            data: Bytes::from_static(b"%PDF"),
        };

        let result = h
            .controller
            .ingest(&mut state, &[text_file("a.txt", "nuevo"), pdf])
            .await;
        assert!(matches!(result, Err(SessionError::UnsupportedFile(name)) if name == "informe.pdf"));
        assert_eq!(state.extracted_text, "anterior");

        let invalid = UploadedFile {
            name: "roto.txt".to_string(),
            content_type: None,
            data: Bytes::from_static(&[0xff, 0xfe]),
        };
        assert!(matches!(
            h.controller.ingest(&mut state, &[invalid]).await,
            Err(SessionError::InvalidText(_))
        ));
        assert_eq!(state.extracted_text, "anterior");
    }

    #[tokio::test]
    async fn explain_requires_profile_and_text() {
        let h = harness(false, 1000);
        let mut state = ready_session(&h).await;
        state.extracted_text = "Glucosa 98".to_string();
        assert!(matches!(
            h.controller.explain(&mut state).await,
            Err(SessionError::ProfileMissing)
        ));

        h.controller.save_profile(&mut state, profile()).await.unwrap();
        state.extracted_text = "   ".to_string();
        assert!(matches!(
            h.controller.explain(&mut state).await,
            Err(SessionError::NothingToExplain)
        ));
    }

    #[tokio::test]
    async fn explain_appends_history_and_persists() {
        let h = harness(false, 1000);
        let mut state = ready_session(&h).await;
        h.controller.save_profile(&mut state, profile()).await.unwrap();
        h.controller
            .ingest(&mut state, &[text_file("informe.txt", "TSH 6.2")])
            .await
            .unwrap();

        let explanation = h.controller.explain(&mut state).await.unwrap();
        assert_eq!(explanation, "Todo en rango normal.");
        assert_eq!(state.explanation.as_deref(), Some("Todo en rango normal."));

        let stored = h.store.load("ana").await.unwrap();
        assert_eq!(stored.history.len(), 1);
        assert_eq!(stored.history[0].report_text, state.extracted_text);
        assert_eq!(stored.history[0].explanation, "Todo en rango normal.");
        assert_eq!(stored.profile, Some(profile()));

        let prompt = h.explainer.last_prompt.lock().unwrap().clone().unwrap();
        assert_eq!(prompt, build_prompt(&state.extracted_text, &profile()));
    }

    #[tokio::test]
    async fn failed_explanation_changes_nothing() {
        let h = harness(true, 1000);
        let mut state = ready_session(&h).await;
        h.controller.save_profile(&mut state, profile()).await.unwrap();
        state.extracted_text = "Ferritina 8".to_string();

        assert!(matches!(
            h.controller.explain(&mut state).await,
            Err(SessionError::Port(_))
        ));
        assert!(state.history.is_empty());
        assert!(state.explanation.is_none());
        assert!(h.store.load("ana").await.unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn long_reports_are_truncated_in_the_prompt_only() {
        let h = harness(false, 5);
        let mut state = ready_session(&h).await;
        h.controller.save_profile(&mut state, profile()).await.unwrap();
        state.extracted_text = "abcdefghij".to_string();

        h.controller.explain(&mut state).await.unwrap();
        let prompt = h.explainer.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.ends_with("Texto del informe médico:\nabcde"));
        assert_eq!(state.history[0].report_text, "abcdefghij");
    }

    #[tokio::test]
    async fn history_is_most_recent_first_and_clearing_keeps_profile() {
        let h = harness(false, 1000);
        let mut state = ready_session(&h).await;
        h.controller.save_profile(&mut state, profile()).await.unwrap();
        for report in ["primero", "segundo"] {
            state.extracted_text = report.to_string();
            h.controller.explain(&mut state).await.unwrap();
        }

        let view = h.controller.history(&state).unwrap();
        assert_eq!(view[0].report_text, "segundo");
        assert_eq!(view[1].report_text, "primero");

        h.controller.clear_history(&mut state).await.unwrap();
        assert!(state.history.is_empty());
        let stored = h.store.load("ana").await.unwrap();
        assert!(stored.history.is_empty());
        assert_eq!(stored.profile, Some(profile()));
    }

    #[tokio::test]
    async fn speech_and_pdf_need_an_explanation() {
        let h = harness(false, 1000);
        let mut state = ready_session(&h).await;
        assert!(matches!(
            h.controller.synthesize_speech(&state).await,
            Err(SessionError::NoExplanation)
        ));
        assert!(matches!(
            h.controller.export_pdf(&state).await,
            Err(SessionError::NoExplanation)
        ));

        state.explanation = Some("Resultado".to_string());
        assert_eq!(h.controller.synthesize_speech(&state).await.unwrap(), b"Resultado");
        assert_eq!(h.controller.export_pdf(&state).await.unwrap(), b"%PDF Resultado");
    }

    #[tokio::test]
    async fn new_analysis_and_logout_reset_state() {
        let h = harness(false, 1000);
        let mut state = ready_session(&h).await;
        state.extracted_text = "texto".to_string();
        state.explanation = Some("explicación".to_string());

        h.controller.new_analysis(&mut state).unwrap();
        assert!(state.extracted_text.is_empty());
        assert!(state.explanation.is_none());
        assert!(state.is_authenticated());

        h.controller.logout(&mut state);
        assert_eq!(state.context, SessionContext::Anonymous);
        assert!(!state.disclaimer_accepted);
    }
}
