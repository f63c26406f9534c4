//! crates/report_interpreter_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or serialization format.

use bytes::Bytes;
use chrono::Local;
use std::collections::BTreeSet;

/// Timestamp format used for history entries (day/month/year hour:minute).
pub const HISTORY_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

//=========================================================================================
// Profile Answers
//=========================================================================================

/// Age bracket selected on the profile form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeBracket {
    Under18,
    From18To29,
    From30To64,
    Over65,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 4] = [
        AgeBracket::Under18,
        AgeBracket::From18To29,
        AgeBracket::From30To64,
        AgeBracket::Over65,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AgeBracket::Under18 => "<18",
            AgeBracket::From18To29 => "18–29",
            AgeBracket::From30To64 => "30–64",
            AgeBracket::Over65 => "≥65",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.label() == label)
    }
}

/// Highest education level selected on the profile form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EducationLevel {
    Basic,
    Secondary,
    NonHealthUniversity,
    HealthcareBackground,
}

impl EducationLevel {
    pub const ALL: [EducationLevel; 4] = [
        EducationLevel::Basic,
        EducationLevel::Secondary,
        EducationLevel::NonHealthUniversity,
        EducationLevel::HealthcareBackground,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EducationLevel::Basic => "Básicos",
            EducationLevel::Secondary => "Medios",
            EducationLevel::NonHealthUniversity => "Universitarios no sanitarios",
            EducationLevel::HealthcareBackground => "Estudios/experiencia sanitaria",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.label() == label)
    }
}

/// How technical the explanation should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailLevel {
    Simple,
    Intermediate,
    Technical,
}

impl DetailLevel {
    pub const ALL: [DetailLevel; 3] = [
        DetailLevel::Simple,
        DetailLevel::Intermediate,
        DetailLevel::Technical,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DetailLevel::Simple => "Muy simple",
            DetailLevel::Intermediate => "Intermedio",
            DetailLevel::Technical => "Técnico",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.label() == label)
    }
}

/// What the user intends to do with the explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Goal {
    UnderstandHealth,
    PrepareVisit,
    WorkOrInsurance,
    LegalUse,
}

impl Goal {
    pub const ALL: [Goal; 4] = [
        Goal::UnderstandHealth,
        Goal::PrepareVisit,
        Goal::WorkOrInsurance,
        Goal::LegalUse,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Goal::UnderstandHealth => "Entender mi salud",
            Goal::PrepareVisit => "Preparar visita médica",
            Goal::WorkOrInsurance => "Presentar en trabajo/seguro",
            Goal::LegalUse => "Uso legal (baja, juicio)",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.label() == label)
    }
}

/// One entry of the fixed comorbidity checklist.
///
/// Declaration order is the checklist order shown on the form; the derived
/// `Ord` keeps every set of comorbidities in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Comorbidity {
    Hypertension,
    Diabetes,
    HighCholesterol,
    HeartDisease,
    Obesity,
    Smoking,
    Asthma,
    KidneyFailure,
}

impl Comorbidity {
    pub const ALL: [Comorbidity; 8] = [
        Comorbidity::Hypertension,
        Comorbidity::Diabetes,
        Comorbidity::HighCholesterol,
        Comorbidity::HeartDisease,
        Comorbidity::Obesity,
        Comorbidity::Smoking,
        Comorbidity::Asthma,
        Comorbidity::KidneyFailure,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Comorbidity::Hypertension => "Hipertensión",
            Comorbidity::Diabetes => "Diabetes",
            Comorbidity::HighCholesterol => "Colesterol alto",
            Comorbidity::HeartDisease => "Enfermedad cardiaca",
            Comorbidity::Obesity => "Obesidad",
            Comorbidity::Smoking => "Tabaquismo",
            Comorbidity::Asthma => "Asma",
            Comorbidity::KidneyFailure => "Insuficiencia renal",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.label() == label)
    }
}

/// The structured answers that personalize an explanation.
///
/// Every field is optional: a value that could not be recognized when the
/// profile was loaded is simply absent and contributes nothing to the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub age: Option<AgeBracket>,
    pub education: Option<EducationLevel>,
    pub detail: Option<DetailLevel>,
    pub goal: Option<Goal>,
    pub comorbidities: BTreeSet<Comorbidity>,
}

impl Profile {
    pub fn has(&self, comorbidity: Comorbidity) -> bool {
        self.comorbidities.contains(&comorbidity)
    }
}

//=========================================================================================
// History and Per-user Documents
//=========================================================================================

/// One stored report/explanation pair. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub recorded_at: String,
    pub report_text: String,
    pub explanation: String,
}

impl HistoryEntry {
    /// Creates an entry stamped with the current local time.
    pub fn now(report_text: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            recorded_at: Local::now().format(HISTORY_TIMESTAMP_FORMAT).to_string(),
            report_text: report_text.into(),
            explanation: explanation.into(),
        }
    }
}

/// Everything persisted for a single user: the latest profile and the
/// append-only history (oldest first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDocument {
    pub profile: Option<Profile>,
    pub history: Vec<HistoryEntry>,
}

// Represents a registered user - only used by the credential store.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub email: String,
}

//=========================================================================================
// Uploads
//=========================================================================================

/// A single file received from the user.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// How an uploaded file is turned into text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadKind {
    /// An image to run through OCR, with the MIME type to declare for it.
    Image(&'static str),
    Text,
}

impl UploadKind {
    /// Classifies a file by extension, falling back to the declared content type.
    pub fn detect(name: &str, content_type: Option<&str>) -> Option<Self> {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "png" => return Some(UploadKind::Image("image/png")),
            "jpg" | "jpeg" => return Some(UploadKind::Image("image/jpeg")),
            "txt" => return Some(UploadKind::Text),
            _ => {}
        }

        let mime = content_type?.split(';').next()?.trim().to_ascii_lowercase();
        match mime.as_str() {
            "image/png" => Some(UploadKind::Image("image/png")),
            "image/jpeg" | "image/jpg" => Some(UploadKind::Image("image/jpeg")),
            "text/plain" => Some(UploadKind::Text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_for_every_variant() {
        for age in AgeBracket::ALL {
            assert_eq!(AgeBracket::from_label(age.label()), Some(age));
        }
        for education in EducationLevel::ALL {
            assert_eq!(EducationLevel::from_label(education.label()), Some(education));
        }
        for comorbidity in Comorbidity::ALL {
            assert_eq!(Comorbidity::from_label(comorbidity.label()), Some(comorbidity));
        }
        assert_eq!(Goal::from_label("Uso legal (baja, juicio)"), Some(Goal::LegalUse));
        assert_eq!(DetailLevel::from_label("Técnico"), Some(DetailLevel::Technical));
    }

    #[test]
    fn unknown_labels_are_rejected() {
        assert_eq!(AgeBracket::from_label("18-29"), None);
        assert_eq!(DetailLevel::from_label("muy simple"), None);
        assert_eq!(Comorbidity::from_label("Migraña"), None);
    }

    #[test]
    fn comorbidity_set_follows_checklist_order() {
        let profile = Profile {
            comorbidities: [Comorbidity::KidneyFailure, Comorbidity::Hypertension]
                .into_iter()
                .collect(),
            ..Profile::default()
        };
        let ordered: Vec<_> = profile.comorbidities.iter().copied().collect();
        assert_eq!(ordered, vec![Comorbidity::Hypertension, Comorbidity::KidneyFailure]);
    }

    #[test]
    fn upload_kind_prefers_extension_then_content_type() {
        assert_eq!(UploadKind::detect("scan.PNG", None), Some(UploadKind::Image("image/png")));
        assert_eq!(
            UploadKind::detect("photo.jpeg", Some("application/octet-stream")),
            Some(UploadKind::Image("image/jpeg"))
        );
        assert_eq!(UploadKind::detect("informe.txt", None), Some(UploadKind::Text));
        assert_eq!(
            UploadKind::detect("blob", Some("text/plain; charset=utf-8")),
            Some(UploadKind::Text)
        );
        assert_eq!(UploadKind::detect("report.pdf", Some("application/pdf")), None);
        assert_eq!(UploadKind::detect("noext", None), None);
    }

    #[test]
    fn history_entry_uses_day_month_year_stamp() {
        let entry = HistoryEntry::now("texto", "resultado");
        assert_eq!(entry.recorded_at.len(), "18/10/2026 16:53".len());
        assert_eq!(&entry.recorded_at[2..3], "/");
        assert_eq!(entry.report_text, "texto");
    }
}
