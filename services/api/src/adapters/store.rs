//! services/api/src/adapters/store.rs
//!
//! This module contains the per-user document store, the concrete implementation
//! of the `ProfileStore` port from the `core` crate. Each user owns one JSON file
//! `<data_dir>/<escaped username>.json`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use report_interpreter_core::domain::{
    AgeBracket, Comorbidity, DetailLevel, EducationLevel, Goal, HistoryEntry, Profile, UserDocument,
};
use report_interpreter_core::ports::{PortError, PortResult, ProfileStore};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Everything outside this set is escaped in file stems, including `%`, which
/// is the escape character itself.
static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("valid filename regex"));

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A file-per-user store that implements the `ProfileStore` port.
///
/// Writes go through a temporary file and a rename, so a crash mid-write never
/// leaves a truncated document behind. There is no locking: two sessions of
/// the same user can still overwrite each other (last writer wins).
#[derive(Clone)]
pub struct JsonProfileStore {
    data_dir: PathBuf,
}

impl JsonProfileStore {
    /// Creates a new `JsonProfileStore` rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// The file that holds `username`'s document.
    pub fn document_path(&self, username: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", username_file_stem(username)))
    }
}

/// Maps a username onto a file stem that is safe on any filesystem.
///
/// ASCII letters, digits, `_`, `-` and `.` are kept; every other character
/// becomes `%XX` per UTF-8 byte, and a leading `.` becomes `%2E`. Distinct
/// usernames always get distinct stems, so no two users share a document.
pub fn username_file_stem(username: &str) -> String {
    let escaped = UNSAFE_FILENAME_CHARS.replace_all(username, |caps: &Captures| {
        caps[0].bytes().map(|b| format!("%{:02X}", b)).collect::<String>()
    });
    if let Some(rest) = escaped.strip_prefix('.') {
        return format!("%2E{rest}");
    }
    if escaped.is_empty() {
        // A lone `%` is never produced by escaping.
        return "%".to_string();
    }
    escaped.into_owned()
}

/// Writes `contents` to a uniquely named sibling of `path` and renames it into
/// place. Concurrent writers each use their own temporary file; the last
/// rename wins.
pub(crate) async fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    let tmp = PathBuf::from(tmp_name);

    let result = match fs::write(&tmp, contents).await {
        Ok(()) => fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    result
}

//=========================================================================================
// "Impure" File Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize, Default)]
struct UserDocumentRecord {
    #[serde(rename = "perfil", default)]
    profile: Option<ProfileRecord>,
    #[serde(rename = "historial", default)]
    history: Vec<HistoryRecord>,
}

#[derive(Serialize, Deserialize)]
struct ProfileRecord {
    #[serde(rename = "edad", default)]
    age: String,
    #[serde(rename = "estudios", default)]
    education: String,
    #[serde(rename = "objetivo", default)]
    goal: String,
    #[serde(rename = "comorbilidades", default)]
    comorbidities: Vec<String>,
    #[serde(rename = "detalle", default)]
    detail: String,
}

impl ProfileRecord {
    fn to_domain(self) -> Profile {
        let comorbidities = self
            .comorbidities
            .iter()
            .filter_map(|label| {
                let parsed = Comorbidity::from_label(label);
                if parsed.is_none() {
                    warn!(label = %label, "Ignoring unknown comorbidity in stored profile");
                }
                parsed
            })
            .collect();
        Profile {
            age: AgeBracket::from_label(&self.age),
            education: EducationLevel::from_label(&self.education),
            detail: DetailLevel::from_label(&self.detail),
            goal: Goal::from_label(&self.goal),
            comorbidities,
        }
    }

    fn from_domain(profile: &Profile) -> Self {
        Self {
            age: profile.age.map(|v| v.label()).unwrap_or_default().to_string(),
            education: profile.education.map(|v| v.label()).unwrap_or_default().to_string(),
            goal: profile.goal.map(|v| v.label()).unwrap_or_default().to_string(),
            comorbidities: profile
                .comorbidities
                .iter()
                .map(|c| c.label().to_string())
                .collect(),
            detail: profile.detail.map(|v| v.label()).unwrap_or_default().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct HistoryRecord {
    #[serde(rename = "fecha")]
    recorded_at: String,
    #[serde(rename = "texto")]
    report_text: String,
    #[serde(rename = "resultado")]
    explanation: String,
}

impl HistoryRecord {
    fn to_domain(self) -> HistoryEntry {
        HistoryEntry {
            recorded_at: self.recorded_at,
            report_text: self.report_text,
            explanation: self.explanation,
        }
    }

    fn from_domain(entry: &HistoryEntry) -> Self {
        Self {
            recorded_at: entry.recorded_at.clone(),
            report_text: entry.report_text.clone(),
            explanation: entry.explanation.clone(),
        }
    }
}

impl UserDocumentRecord {
    fn to_domain(self) -> UserDocument {
        UserDocument {
            profile: self.profile.map(ProfileRecord::to_domain),
            history: self.history.into_iter().map(HistoryRecord::to_domain).collect(),
        }
    }

    fn from_domain(document: &UserDocument) -> Self {
        Self {
            profile: document.profile.as_ref().map(ProfileRecord::from_domain),
            history: document.history.iter().map(HistoryRecord::from_domain).collect(),
        }
    }
}

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for JsonProfileStore {
    async fn load(&self, username: &str) -> PortResult<UserDocument> {
        let path = self.document_path(username);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No stored document yet");
                return Ok(UserDocument::default());
            }
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };

        let record: UserDocumentRecord = serde_json::from_str(&raw).map_err(|e| {
            PortError::Unexpected(format!("Corrupt user document {}: {}", path.display(), e))
        })?;
        Ok(record.to_domain())
    }

    async fn save(&self, username: &str, document: &UserDocument) -> PortResult<()> {
        let path = self.document_path(username);
        let json = serde_json::to_string_pretty(&UserDocumentRecord::from_domain(document))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        write_atomically(&path, json.as_bytes())
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to write {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), history = document.history.len(), "Saved user document");
        Ok(())
    }
}
