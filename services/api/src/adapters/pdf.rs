//! services/api/src/adapters/pdf.rs
//!
//! PDF export of a generated explanation via `printpdf`. It implements the
//! `ReportExporter` port from the `core` crate.

use async_trait::async_trait;
use chrono::Local;
use printpdf::*;
use report_interpreter_core::ports::{PortError, PortResult, ReportExporter};
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

use crate::adapters::store::write_atomically;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const FONT_SIZE: f32 = 12.0;
/// Characters per body line at 12pt Helvetica on an A4 page.
const WRAP_WIDTH: usize = 90;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Renders explanations to PDF and overwrites a fixed export file each time.
#[derive(Clone)]
pub struct PrintPdfExporter {
    output_path: Option<PathBuf>,
}

impl PrintPdfExporter {
    /// Creates a new exporter. With `Some(path)`, every export also replaces
    /// the file at `path`.
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }
}

/// Replaces every character outside Latin-1 with `?`, as the built-in PDF
/// fonts cannot show them.
pub fn to_latin1_lossy(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) <= 0xFF { c } else { '?' })
        .collect()
}

/// Greedy word wrap; words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            if current.is_empty() {
                current = word;
            } else if current.chars().count() + 1 + word.chars().count() <= width {
                current.push(' ');
                current.push_str(&word);
            } else {
                lines.push(std::mem::replace(&mut current, word));
            }
        }
        lines.push(current);
    }
    lines
}

fn pdf_error(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(format!("PDF error: {e}"))
}

/// Lays out the header and body, continuing onto new pages as needed.
pub fn render_explanation_pdf(explanation: &str, generated_on: &str) -> PortResult<Vec<u8>> {
    let title = "Informe personalizado";
    let (doc, page1, layer1) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;

    let mut layer = doc.get_page(page1).get_layer(layer1);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM - LINE_HEIGHT_MM;

    // Header
    layer.use_text(
        format!("Informe generado el {generated_on}"),
        FONT_SIZE,
        Mm(MARGIN_MM),
        Mm(y),
        &font,
    );
    y -= LINE_HEIGHT_MM * 2.0;
    layer.use_text("Resultado personalizado:", FONT_SIZE, Mm(MARGIN_MM), Mm(y), &bold);
    y -= LINE_HEIGHT_MM * 1.5;

    // Body
    for line in wrap_text(&to_latin1_lossy(explanation), WRAP_WIDTH) {
        if y < MARGIN_MM {
            let (page, page_layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            layer = doc.get_page(page).get_layer(page_layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM - LINE_HEIGHT_MM;
        }
        if !line.is_empty() {
            layer.use_text(line, FONT_SIZE, Mm(MARGIN_MM), Mm(y), &font);
        }
        y -= LINE_HEIGHT_MM;
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf).map_err(pdf_error)?;
    buf.into_inner().map_err(pdf_error)
}

//=========================================================================================
// `ReportExporter` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReportExporter for PrintPdfExporter {
    async fn export_pdf(&self, explanation: &str) -> PortResult<Vec<u8>> {
        let generated_on = Local::now().format("%d/%m/%Y").to_string();
        let bytes = render_explanation_pdf(explanation, &generated_on)?;

        if let Some(path) = &self.output_path {
            write_atomically(path, &bytes)
                .await
                .map_err(|e| PortError::Unexpected(format!("Failed to write {}: {}", path.display(), e)))?;
            info!(path = %path.display(), bytes = bytes.len(), "Exported explanation PDF");
        }
        Ok(bytes)
    }
}
