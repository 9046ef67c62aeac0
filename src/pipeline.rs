//! One diagnosis request, start to finish.
//!
//! ```text
//! upload ──▶ decode+encode ──▶ gemini ──▶ extract ──▶ render
//!            (blocking)        (async)    (pure)      (blocking)
//! ```
//!
//! Upload and inference failures abort the request. A reply that does not
//! follow the grammar, or a report that fails to render, does not: the
//! caller gets the (possibly defaulted) records with a warning or a
//! `report_error` instead. Only an empty record list skips the report.

use crate::encode::{decode_upload, encode_base64};
use crate::error::{DiagnoseError, RenderError};
use crate::extract::{extract, DiagnosisRecord, Extraction, ParseOutcome};
use crate::gemini::GeminiClient;
use crate::prompts::Variant;
use crate::report::ReportRenderer;
use tracing::{info, warn};

/// Everything the caller needs to show a diagnosis.
#[derive(Debug)]
pub struct Diagnosis {
    pub variant: Variant,
    pub records: Vec<DiagnosisRecord>,
    pub outcome: ParseOutcome,
    pub warning: Option<String>,
    /// PDF bytes, absent when nothing was extracted or rendering failed.
    pub report: Option<Vec<u8>>,
    pub report_error: Option<String>,
}

#[derive(Clone)]
pub struct Pipeline {
    gemini: GeminiClient,
    renderer: ReportRenderer,
}

impl Pipeline {
    pub fn new(gemini: GeminiClient, renderer: ReportRenderer) -> Self {
        Self { gemini, renderer }
    }

    pub fn model(&self) -> &str {
        self.gemini.model()
    }

    pub fn renderer(&self) -> &ReportRenderer {
        &self.renderer
    }

    /// Diagnose one uploaded leaf photo.
    pub async fn run(&self, upload: Vec<u8>, variant: Variant) -> Result<Diagnosis, DiagnoseError> {
        let (image, image_base64) = tokio::task::spawn_blocking(move || {
            let image = decode_upload(&upload)?;
            let b64 = encode_base64(&image)?;
            Ok::<_, DiagnoseError>((image, b64))
        })
        .await
        .map_err(|e| DiagnoseError::Internal(e.to_string()))??;

        let reply = self.gemini.diagnose(variant.prompt(), &image_base64).await?;

        let mode = variant.extract_mode();
        let Extraction { records, outcome } = extract(&reply, mode);
        let warning = outcome.warning(mode).map(str::to_string);

        if records.is_empty() {
            warn!("Model reply did not follow the {variant} grammar; skipping report");
            return Ok(Diagnosis {
                variant,
                records,
                outcome,
                warning,
                report: None,
                report_error: None,
            });
        }

        let renderer = self.renderer.clone();
        let layout = variant.layout();
        let to_render = records.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            renderer.render(&to_render, Some(&image), layout)
        })
        .await
        .unwrap_or_else(|e| Err(RenderError::Task(e.to_string())));

        let (report, report_error) = match rendered {
            Ok(bytes) => (Some(bytes), None),
            Err(e) => {
                warn!("❌ PDF generation failed: {e}");
                (None, Some(format!("PDF generation failed: {e}")))
            }
        };

        info!(
            "✅ Diagnosis complete: {} record(s), outcome {:?}",
            records.len(),
            outcome
        );
        Ok(Diagnosis {
            variant,
            records,
            outcome,
            warning,
            report,
            report_error,
        })
    }
}
