//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub data_dir: PathBuf,
    pub credentials_path: PathBuf,
    pub pdf_export_path: PathBuf,
    pub openai_api_key: Option<String>,
    pub explanation_model: String,
    pub explanation_temperature: f32,
    pub ocr_model: String,
    pub tts_voice: String,
    pub max_report_chars: usize,
    pub allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;
        let allowed_origin = var_or("ALLOWED_ORIGIN", "http://localhost:3000");

        // --- Storage Locations ---
        let data_dir = PathBuf::from(var_or("DATA_DIR", "usuarios_datos"));
        let credentials_path = PathBuf::from(var_or("CREDENTIALS_PATH", "usuarios_credenciales.json"));
        let pdf_export_path = PathBuf::from(var_or("PDF_EXPORT_PATH", "informe_personalizado.pdf"));

        // --- Load API Keys (as optional) ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());

        // --- Load Adapter-specific Settings ---
        let explanation_model = var_or("EXPLANATION_MODEL", "gpt-3.5-turbo");
        let explanation_temperature: f32 =
            parse_var("EXPLANATION_TEMPERATURE", &var_or("EXPLANATION_TEMPERATURE", "0.7"))?;
        if !(0.0..=2.0).contains(&explanation_temperature) {
            return Err(ConfigError::InvalidValue(
                "EXPLANATION_TEMPERATURE".to_string(),
                "must be between 0 and 2".to_string(),
            ));
        }
        let ocr_model = var_or("OCR_MODEL", "gpt-4o-mini");
        let tts_voice = var_or("TTS_VOICE", "alloy");
        let max_report_chars = parse_var("MAX_REPORT_CHARS", &var_or("MAX_REPORT_CHARS", "12000"))?;

        Ok(Self {
            bind_address,
            log_level,
            data_dir,
            credentials_path,
            pdf_export_path,
            openai_api_key,
            explanation_model,
            explanation_temperature,
            ocr_model,
            tts_voice,
            max_report_chars,
            allowed_origin,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
