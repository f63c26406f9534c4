//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the session's REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth::{
    self, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};
use crate::web::state::{AppState, SessionHandle};
use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use report_interpreter_core::domain::{
    AgeBracket, Comorbidity, DetailLevel, EducationLevel, Goal, HistoryEntry, Profile,
    UploadedFile,
};
use report_interpreter_core::session::SessionError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        accept_disclaimer_handler,
        get_profile_handler,
        save_profile_handler,
        upload_reports_handler,
        explain_handler,
        explanation_audio_handler,
        explanation_pdf_handler,
        history_handler,
        clear_history_handler,
        new_analysis_handler,
    ),
    components(
        schemas(
            RegisterRequest, RegisterResponse, LoginRequest, LoginResponse,
            ProfilePayload, ReportTextResponse, ExplanationResponse, HistoryItem
        )
    ),
    tags(
        (name = "Medical Report Interpreter API", description = "Upload a medical report and get an explanation adapted to your profile.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a controller outcome onto an HTTP status and a user-facing message.
///
/// Port failures (OCR, model, storage) collapse into one generic message.
pub fn session_error_response(e: SessionError) -> (StatusCode, String) {
    let status = match &e {
        SessionError::NotAuthenticated | SessionError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        SessionError::DisclaimerPending => StatusCode::FORBIDDEN,
        SessionError::UsernameTaken => StatusCode::CONFLICT,
        SessionError::InvalidUsername
        | SessionError::ProfileMissing
        | SessionError::NothingToExplain
        | SessionError::NoExplanation
        | SessionError::UnsupportedFile(_)
        | SessionError::InvalidText(_) => StatusCode::BAD_REQUEST,
        SessionError::Port(port_error) => {
            error!("Service call failed: {:?}", port_error);
            return (
                StatusCode::BAD_GATEWAY,
                "The operation could not be completed. Please try again.".to_string(),
            );
        }
    };
    (status, e.to_string())
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The profile form, using the exact option labels.
#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct ProfilePayload {
    /// One of `<18`, `18–29`, `30–64`, `≥65`.
    pub age: String,
    pub education: String,
    pub detail: String,
    pub goal: String,
    #[serde(default)]
    pub comorbidities: Vec<String>,
}

impl ProfilePayload {
    fn to_domain(&self) -> Result<Profile, String> {
        fn parse<T>(field: &str, value: &str, from_label: fn(&str) -> Option<T>) -> Result<T, String> {
            from_label(value).ok_or_else(|| format!("Unknown value for {}: '{}'", field, value))
        }

        let comorbidities = self
            .comorbidities
            .iter()
            .map(|c| parse("comorbidities", c, Comorbidity::from_label))
            .collect::<Result<_, _>>()?;

        Ok(Profile {
            age: Some(parse("age", &self.age, AgeBracket::from_label)?),
            education: Some(parse("education", &self.education, EducationLevel::from_label)?),
            detail: Some(parse("detail", &self.detail, DetailLevel::from_label)?),
            goal: Some(parse("goal", &self.goal, Goal::from_label)?),
            comorbidities,
        })
    }

    fn from_domain(profile: &Profile) -> Self {
        Self {
            age: profile.age.map(|v| v.label()).unwrap_or_default().to_string(),
            education: profile.education.map(|v| v.label()).unwrap_or_default().to_string(),
            detail: profile.detail.map(|v| v.label()).unwrap_or_default().to_string(),
            goal: profile.goal.map(|v| v.label()).unwrap_or_default().to_string(),
            comorbidities: profile
                .comorbidities
                .iter()
                .map(|c| c.label().to_string())
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ReportTextResponse {
    pub extracted_text: String,
}

#[derive(Serialize, ToSchema)]
pub struct ExplanationResponse {
    pub explanation: String,
}

/// One history entry; `number` 1 is the most recent.
#[derive(Serialize, ToSchema)]
pub struct HistoryItem {
    pub number: usize,
    pub recorded_at: String,
    pub report_text: String,
    pub explanation: String,
}

impl HistoryItem {
    fn from_domain(number: usize, entry: &HistoryEntry) -> Self {
        Self {
            number,
            recorded_at: entry.recorded_at.clone(),
            report_text: entry.report_text.clone(),
            explanation: entry.explanation.clone(),
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Accept the usage disclaimer shown at login.
#[utoipa::path(
    post,
    path = "/disclaimer",
    responses(
        (status = 204, description = "Disclaimer accepted"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn accept_disclaimer_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut session = session.lock().await;
    app_state
        .controller
        .accept_disclaimer(&mut session)
        .map_err(session_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get the saved profile.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The saved profile", body = ProfilePayload),
        (status = 404, description = "No profile saved yet")
    )
)]
pub async fn get_profile_handler(
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = session.lock().await;
    let profile = session
        .profile
        .as_ref()
        .ok_or((StatusCode::NOT_FOUND, "No profile saved yet".to_string()))?;
    Ok(Json(ProfilePayload::from_domain(profile)))
}

/// Save (overwrite) the profile.
#[utoipa::path(
    put,
    path = "/profile",
    request_body = ProfilePayload,
    responses(
        (status = 204, description = "Profile saved"),
        (status = 400, description = "Unknown option label"),
        (status = 403, description = "Disclaimer not accepted")
    )
)]
pub async fn save_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Json(payload): Json<ProfilePayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = payload
        .to_domain()
        .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    let mut session = session.lock().await;
    app_state
        .controller
        .save_profile(&mut session, profile)
        .await
        .map_err(session_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload one or more report files (png/jpg/jpeg images or plain text).
#[utoipa::path(
    post,
    path = "/reports",
    request_body(content_type = "multipart/form-data", description = "One or more report files."),
    responses(
        (status = 200, description = "Combined extracted text", body = ReportTextResponse),
        (status = 400, description = "No file, unsupported type, or invalid text"),
        (status = 502, description = "OCR failed")
    )
)]
pub async fn upload_reports_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        // Plain form fields carry no report.
        let Some(name) = field.file_name().map(str::to_string) else {
            debug!(field = ?field.name(), "Skipping multipart field without a file");
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read file bytes: {}", e),
            )
        })?;
        files.push(UploadedFile {
            name,
            content_type,
            data,
        });
    }

    if files.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include at least one file".to_string(),
        ));
    }

    let mut session = session.lock().await;
    let extracted_text = app_state
        .controller
        .ingest(&mut session, &files)
        .await
        .map_err(session_error_response)?;
    info!(files = files.len(), chars = extracted_text.chars().count(), "Report ingested");

    Ok(Json(ReportTextResponse { extracted_text }))
}

/// Generate the personalized explanation for the current report.
#[utoipa::path(
    post,
    path = "/explanation",
    responses(
        (status = 200, description = "Explanation generated and added to history", body = ExplanationResponse),
        (status = 400, description = "Missing profile or report text"),
        (status = 502, description = "Language model call failed")
    )
)]
pub async fn explain_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut session = session.lock().await;
    let explanation = app_state
        .controller
        .explain(&mut session)
        .await
        .map_err(session_error_response)?;
    Ok(Json(ExplanationResponse { explanation }))
}

/// Listen to the current explanation (MP3).
#[utoipa::path(
    get,
    path = "/explanation/audio",
    responses(
        (status = 200, description = "MP3 audio (audio/mpeg)"),
        (status = 400, description = "No explanation yet"),
        (status = 502, description = "Speech synthesis failed")
    )
)]
pub async fn explanation_audio_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = session.lock().await;
    let audio = app_state
        .controller
        .synthesize_speech(&session)
        .await
        .map_err(session_error_response)?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

/// Download the current explanation as a PDF.
#[utoipa::path(
    get,
    path = "/explanation/pdf",
    responses(
        (status = 200, description = "PDF document (application/pdf)"),
        (status = 400, description = "No explanation yet")
    )
)]
pub async fn explanation_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = session.lock().await;
    let pdf = app_state
        .controller
        .export_pdf(&session)
        .await
        .map_err(session_error_response)?;

    let file_name = app_state
        .config
        .pdf_export_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("informe_personalizado.pdf");
    let disposition = format!("attachment; filename=\"{}\"", file_name);

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    ))
}

/// List past reports, most recent first.
#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "History entries, newest first", body = [HistoryItem])
    )
)]
pub async fn history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = session.lock().await;
    let entries = app_state
        .controller
        .history(&session)
        .map_err(session_error_response)?;
    let items: Vec<HistoryItem> = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| HistoryItem::from_domain(i + 1, entry))
        .collect();
    Ok(Json(items))
}

/// Delete the whole history. The profile is kept.
#[utoipa::path(
    delete,
    path = "/history",
    responses(
        (status = 204, description = "History cleared")
    )
)]
pub async fn clear_history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut session = session.lock().await;
    app_state
        .controller
        .clear_history(&mut session)
        .await
        .map_err(session_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Start a new analysis: forget the current report text and explanation.
#[utoipa::path(
    post,
    path = "/analysis/reset",
    responses(
        (status = 204, description = "Ready for a new report")
    )
)]
pub async fn new_analysis_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut session = session.lock().await;
    app_state
        .controller
        .new_analysis(&mut session)
        .map_err(session_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_interpreter_core::ports::PortError;

    #[test]
    fn profile_payload_rejects_unknown_labels() {
        let payload = ProfilePayload {
            age: "≥65".into(),
            education: "Medios".into(),
            detail: "Simple".into(),
            goal: "Entender mi salud".into(),
            comorbidities: vec![],
        };
        assert_eq!(payload.to_domain().unwrap_err(), "Unknown value for detail: 'Simple'");
    }

    #[test]
    fn profile_payload_round_trips_through_domain() {
        let payload = ProfilePayload {
            age: "18–29".into(),
            education: "Estudios/experiencia sanitaria".into(),
            detail: "Técnico".into(),
            goal: "Presentar en trabajo/seguro".into(),
            comorbidities: vec!["Asma".into(), "Hipertensión".into()],
        };
        let profile = payload.to_domain().unwrap();
        assert!(profile.has(Comorbidity::Asthma));
        let back = ProfilePayload::from_domain(&profile);
        assert_eq!(back.comorbidities, vec!["Hipertensión".to_string(), "Asma".to_string()]);
        assert_eq!(back.age, "18–29");
    }

    #[test]
    fn port_failures_are_reported_generically() {
        let (status, message) =
            session_error_response(SessionError::Port(PortError::Unexpected("api key leaked".into())));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!message.contains("api key"));

        let (status, _) = session_error_response(SessionError::UsernameTaken);
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = session_error_response(SessionError::DisclaimerPending);
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
