//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        tts::parse_voice, JsonCredentialStore, JsonProfileStore, OpenAiExplanationAdapter,
        OpenAiTtsAdapter, OpenAiVisionOcrAdapter, PrintPdfExporter,
    },
    config::{Config, ConfigError},
    error::ApiError,
    web::{
        self,
        rest::ApiDoc,
        state::{AppState, SessionRegistry},
    },
};
use async_openai::{config::OpenAIConfig, types::audio::SpeechModel, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use report_interpreter_core::session::SessionController;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Prepare the JSON Stores ---
    let credentials = Arc::new(JsonCredentialStore::new(config.credentials_path.clone()));
    credentials.ensure_exists().await?;
    let profiles = Arc::new(JsonProfileStore::new(config.data_dir.clone()));
    info!(
        credentials = %config.credentials_path.display(),
        data_dir = %config.data_dir.display(),
        "User stores ready"
    );

    // --- 3. Initialize Service Adapters ---
    let api_key = config
        .openai_api_key
        .as_ref()
        .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
    let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));

    let ocr_adapter = Arc::new(OpenAiVisionOcrAdapter::new(
        openai_client.clone(),
        config.ocr_model.clone(),
    ));
    let explanation_adapter = Arc::new(OpenAiExplanationAdapter::new(
        openai_client.clone(),
        config.explanation_model.clone(),
        config.explanation_temperature,
    ));

    let tts_voice = parse_voice(&config.tts_voice).ok_or_else(|| {
        ConfigError::InvalidValue(
            "TTS_VOICE".to_string(),
            format!("'{}' is not a known voice", config.tts_voice),
        )
    })?;
    let tts_adapter = Arc::new(OpenAiTtsAdapter::new(
        openai_client.clone(),
        SpeechModel::Tts1Hd,
        tts_voice,
    ));

    let pdf_exporter = Arc::new(PrintPdfExporter::new(Some(config.pdf_export_path.clone())));

    // --- 4. Build the Shared AppState ---
    let controller = SessionController::new(
        credentials,
        profiles,
        ocr_adapter,
        explanation_adapter,
        tts_adapter,
        pdf_exporter,
        config.max_report_chars,
    );
    let app_state = Arc::new(AppState {
        controller: Arc::new(controller),
        sessions: Arc::new(SessionRegistry::new()),
        config: config.clone(),
    });

    // --- 5. Create the Web Router ---
    let origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("ALLOWED_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
