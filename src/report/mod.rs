//! Diagnosis report: records + optional leaf photo → PDF bytes.
//!
//! ## Data Flow
//!
//! ```text
//! records ─┐
//!          ├─▶ Canvas (layout) ──▶ Document ──▶ pdf::write ──▶ Vec<u8>
//! image ───┘   scratch JPEG ─┘
//! ```
//!
//! 1. [`document`]: FPDF-style cursor layout into positioned operations
//! 2. [`metrics`]: Helvetica widths and word wrapping
//! 3. [`pdf`]: serialisation of the laid-out pages
//!
//! The leaf photo is JPEG-encoded into a uniquely named scratch file and read
//! back for embedding. The file lives in a [`tempfile::NamedTempFile`], so it
//! is removed when the embedding scope ends whether or not it succeeded.

pub mod document;
pub mod metrics;
pub mod pdf;

use crate::encode::{is_grayscale_jpeg, write_jpeg};
use crate::error::RenderError;
use crate::extract::DiagnosisRecord;
use document::{Canvas, Document, EmbeddedImage, Font, Rgb, MARGIN};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const REPORT_TITLE: &str = "AgroPulse AI - Plant Diagnosis Report";
/// Download name offered to the browser.
pub const REPORT_FILE_NAME: &str = "plant_diagnosis_report.pdf";

/// Width of the embedded leaf photo, in millimetres.
pub const IMAGE_WIDTH: f64 = 100.0;
pub const ALERT_RED: Rgb = Rgb(220, 50, 50);

const DISEASE_COLUMN: f64 = 60.0;
const CURE_COLUMN: f64 = 130.0;
const TABLE_LINE_HEIGHT: f64 = 8.0;
const HEADER_HEIGHT: f64 = 10.0;

/// How records are laid out below the title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Red bold disease line, italic cure block; one block per record.
    #[default]
    Freeform,
    /// Two-column bordered Disease/Cure table, one row per record.
    Table,
}

/// Builds PDF reports. Cheap to clone; holds no per-report state.
#[derive(Debug, Clone, Default)]
pub struct ReportRenderer {
    scratch_dir: Option<PathBuf>,
}

impl ReportRenderer {
    /// Renderer using the system temp directory for scratch files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer writing scratch files under `dir`.
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: Some(dir.into()),
        }
    }

    /// Render a complete PDF report.
    pub fn render(
        &self,
        records: &[DiagnosisRecord],
        image: Option<&DynamicImage>,
        layout: Layout,
    ) -> Result<Vec<u8>, RenderError> {
        let doc = self.compose(records, image, layout)?;
        let bytes = pdf::write(&doc)?;
        info!(
            "📄 Report rendered: {} record(s), {} page(s), {} bytes",
            records.len(),
            doc.pages.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Lay out the report without serialising it.
    pub fn compose(
        &self,
        records: &[DiagnosisRecord],
        image: Option<&DynamicImage>,
        layout: Layout,
    ) -> Result<Document, RenderError> {
        if records.is_empty() {
            return Err(RenderError::NoRecords);
        }

        let mut canvas = Canvas::new(REPORT_TITLE);
        canvas.set_font(Font::Bold, 14.0);
        canvas.cell(0.0, 10.0, REPORT_TITLE, false, true);

        if let Some(img) = image {
            let embedded = self.embed_image(img)?;
            canvas.ln(5.0);
            let index = canvas.add_image(embedded);
            canvas.image(index, IMAGE_WIDTH);
        }

        canvas.ln(10.0);
        match layout {
            Layout::Freeform => freeform(&mut canvas, records),
            Layout::Table => table(&mut canvas, records),
        }
        Ok(canvas.finish())
    }

    fn embed_image(&self, img: &DynamicImage) -> Result<EmbeddedImage, RenderError> {
        if img.width() == 0 || img.height() == 0 {
            return Err(RenderError::Image(format!(
                "image has no pixels ({}x{})",
                img.width(),
                img.height()
            )));
        }

        let jpeg = with_scratch_file(self.scratch_dir.as_deref(), |scratch| {
            write_jpeg(img, scratch)?;
            scratch.flush().map_err(RenderError::Scratch)?;
            debug!("Leaf photo staged at {}", scratch.path().display());
            std::fs::read(scratch.path()).map_err(RenderError::Scratch)
        })?;

        Ok(EmbeddedImage {
            jpeg,
            width: img.width(),
            height: img.height(),
            grayscale: is_grayscale_jpeg(img),
        })
    }
}

/// Render with the default renderer.
pub fn render(
    records: &[DiagnosisRecord],
    image: Option<&DynamicImage>,
    layout: Layout,
) -> Result<Vec<u8>, RenderError> {
    ReportRenderer::new().render(records, image, layout)
}

/// Run `f` with a fresh scratch file; the file is deleted when this returns.
pub(crate) fn with_scratch_file<T>(
    dir: Option<&Path>,
    f: impl FnOnce(&mut NamedTempFile) -> Result<T, RenderError>,
) -> Result<T, RenderError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("agropulse-leaf-").suffix(".jpg");
    let mut scratch = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(RenderError::Scratch)?;

    let result = f(&mut scratch);
    if let Err(e) = scratch.close() {
        debug!("Scratch file cleanup reported: {e}");
    }
    result
}

fn freeform(canvas: &mut Canvas, records: &[DiagnosisRecord]) {
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            canvas.ln(5.0);
        }
        canvas.set_font(Font::Bold, 12.0);
        canvas.set_text_color(ALERT_RED);
        canvas.cell(0.0, 10.0, &format!("Disease: {}", record.disease), false, true);

        canvas.set_text_color(Rgb::BLACK);
        canvas.set_font(Font::Italic, 12.0);
        canvas.multi_cell(0.0, 10.0, &format!("Cure:\n{}", record.cure));
    }
}

fn table_header(canvas: &mut Canvas) {
    canvas.set_font(Font::Bold, 12.0);
    canvas.set_text_color(Rgb::BLACK);
    canvas.cell(DISEASE_COLUMN, HEADER_HEIGHT, "Disease", true, false);
    canvas.cell(CURE_COLUMN, HEADER_HEIGHT, "Cure", true, true);
    canvas.set_font(Font::Regular, 11.0);
}

/// Row lines that fit on a fresh page below the header.
fn lines_per_page() -> usize {
    ((Canvas::page_body_height() - HEADER_HEIGHT) / TABLE_LINE_HEIGHT).floor() as usize
}

fn table(canvas: &mut Canvas, records: &[DiagnosisRecord]) {
    table_header(canvas);

    for record in records {
        let disease_lines = canvas.wrap(&record.disease, DISEASE_COLUMN);
        let cure_lines = canvas.wrap(&record.cure, CURE_COLUMN);
        let line_count = disease_lines.len().max(cure_lines.len()).max(1);

        // Rows that fit on one page move there whole; taller rows are split
        // and continue below a repeated header.
        let mut start = 0;
        while start < line_count {
            let fits = canvas.lines_left(TABLE_LINE_HEIGHT);
            let remaining = line_count - start;
            if fits == 0 || (remaining > fits && remaining <= lines_per_page()) {
                canvas.add_page();
                table_header(canvas);
                continue;
            }
            let take = remaining.min(fits);
            table_row_slice(canvas, &disease_lines, &cure_lines, start, take);
            start += take;
        }
    }
}

fn table_row_slice(
    canvas: &mut Canvas,
    disease_lines: &[String],
    cure_lines: &[String],
    start: usize,
    count: usize,
) {
    let (x, y) = canvas.position();
    let row_height = count as f64 * TABLE_LINE_HEIGHT;
    canvas.rect(x, y, DISEASE_COLUMN, row_height);
    canvas.rect(x + DISEASE_COLUMN, y, CURE_COLUMN, row_height);

    let columns = [(x, disease_lines), (x + DISEASE_COLUMN, cure_lines)];
    for (column_x, lines) in columns {
        for (i, line) in lines.iter().skip(start).take(count).enumerate() {
            canvas.text_line(
                column_x,
                y + i as f64 * TABLE_LINE_HEIGHT,
                TABLE_LINE_HEIGHT,
                line,
            );
        }
    }
    canvas.set_xy(MARGIN, y + row_height);
}
