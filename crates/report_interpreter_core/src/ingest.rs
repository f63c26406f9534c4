//! crates/report_interpreter_core/src/ingest.rs
//!
//! Assembles the text of one or more uploaded files into the single report
//! text that is shown to the user and sent for explanation.

use crate::domain::UploadKind;

/// The text recovered from one uploaded file.
#[derive(Debug, Clone)]
pub struct ExtractedSection {
    pub file_name: String,
    pub source: UploadKind,
    pub text: String,
}

impl ExtractedSection {
    fn header(&self) -> String {
        match self.source {
            UploadKind::Image(_) => format!("--- Texto extraído de {} ---", self.file_name),
            UploadKind::Text => format!("--- Contenido de {} ---", self.file_name),
        }
    }
}

/// Joins the sections in upload order, each under its own header line.
pub fn combine_sections(sections: &[ExtractedSection]) -> String {
    let mut combined = String::new();
    for section in sections {
        combined.push_str("\n\n");
        combined.push_str(&section.header());
        combined.push('\n');
        combined.push_str(&section.text);
    }
    combined.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_keep_upload_order_and_headers() {
        let sections = vec![
            ExtractedSection {
                file_name: "analitica.png".into(),
                source: UploadKind::Image("image/png"),
                text: "Glucosa 110\nLDL 160".into(),
            },
            ExtractedSection {
                file_name: "notas.txt".into(),
                source: UploadKind::Text,
                text: "Sin alergias conocidas.".into(),
            },
        ];

        assert_eq!(
            combine_sections(&sections),
            "--- Texto extraído de analitica.png ---\nGlucosa 110\nLDL 160\n\n\
             --- Contenido de notas.txt ---\nSin alergias conocidas."
        );
    }

    #[test]
    fn no_sections_yield_empty_text() {
        assert_eq!(combine_sections(&[]), "");
    }
}
