mod common;

use agropulse::report::document::Font;
use agropulse::report::{render, ALERT_RED, REPORT_TITLE};
use agropulse::{
    extract, DiagnoseError, ExtractMode, GeminiClient, InferenceError, Layout, ParseOutcome,
    Pipeline, ReportRenderer, Variant,
};
use common::{gemini_error, gemini_reply, leaf_png, StubGemini};
use std::time::Duration;

const LEAF_BLIGHT: &str =
    "Disease: Leaf Blight\nCure:\n1. Remove infected leaves\n2. Apply fungicide\n3. Improve drainage";
const RUST_AND_MILDEW: &str =
    "Disease 1: Rust\nCure 1: Use copper spray\nDisease 2: Mildew\nCure 2: Improve airflow";

fn pipeline_for(stub: &StubGemini, renderer: ReportRenderer) -> Pipeline {
    let gemini = GeminiClient::new(&stub.config()).unwrap();
    Pipeline::new(gemini, renderer)
}

#[test]
fn numbered_reply_renders_freeform_report() {
    let extraction = extract(LEAF_BLIGHT, ExtractMode::Single);
    assert_eq!(extraction.outcome, ParseOutcome::Complete);
    assert_eq!(extraction.records.len(), 1);
    assert_eq!(extraction.records[0].disease, "Leaf Blight");
    assert_eq!(
        extraction.records[0].cure,
        "1. Remove infected leaves\n2. Apply fungicide\n3. Improve drainage"
    );

    let doc = ReportRenderer::new()
        .compose(&extraction.records, None, Layout::Freeform)
        .unwrap();
    let texts: Vec<_> = doc.pages[0].texts().collect();

    assert!(texts.iter().any(|(t, _, _)| *t == REPORT_TITLE));
    assert!(texts
        .iter()
        .any(|(t, f, c)| *t == "Disease: Leaf Blight" && *f == Font::Bold && *c == ALERT_RED));
    let first_italic = texts
        .iter()
        .find(|(_, f, _)| *f == Font::Italic)
        .map(|(t, _, _)| *t);
    assert_eq!(first_italic, Some("Cure:"));
}

#[test]
fn indexed_reply_renders_two_row_table() {
    let extraction = extract(RUST_AND_MILDEW, ExtractMode::Multi);
    assert_eq!(extraction.outcome, ParseOutcome::Complete);
    let names: Vec<_> = extraction.records.iter().map(|r| r.disease.as_str()).collect();
    assert_eq!(names, ["Rust", "Mildew"]);

    let doc = ReportRenderer::new()
        .compose(&extraction.records, None, Layout::Table)
        .unwrap();
    let texts: Vec<_> = doc.pages[0].texts().map(|(t, _, _)| t).collect();
    for cell in ["Disease", "Cure", "Rust", "Use copper spray", "Mildew", "Improve airflow"] {
        assert!(texts.contains(&cell), "missing cell {cell:?} in {texts:?}");
    }

    let bytes = render(&extraction.records, None, Layout::Table).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4"));
}

#[tokio::test]
async fn numbered_cures_request_produces_report() {
    let stub = StubGemini::spawn(200, gemini_reply(LEAF_BLIGHT)).await;
    let pipeline = pipeline_for(&stub, ReportRenderer::new());

    let diagnosis = pipeline.run(leaf_png(), Variant::NumberedCures).await.unwrap();

    assert_eq!(diagnosis.outcome, ParseOutcome::Complete);
    assert_eq!(diagnosis.records[0].disease, "Leaf Blight");
    assert!(diagnosis.warning.is_none());
    assert!(diagnosis.report_error.is_none());
    let pdf = diagnosis.report.expect("report rendered");
    assert!(pdf.starts_with(b"%PDF-"));
    assert!(pdf.windows(9).any(|w| w == b"DCTDecode"));

    let requests = stub.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let parts = &requests[0]["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], Variant::NumberedCures.prompt());
    assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
    assert!(parts[1]["inline_data"]["data"].as_str().unwrap().len() > 100);
}

#[tokio::test]
async fn top_diseases_request_produces_table_records() {
    let stub = StubGemini::spawn(200, gemini_reply(RUST_AND_MILDEW)).await;
    let pipeline = pipeline_for(&stub, ReportRenderer::new());

    let diagnosis = pipeline.run(leaf_png(), Variant::TopDiseases).await.unwrap();

    assert_eq!(diagnosis.records.len(), 2);
    assert_eq!(diagnosis.records[1].cure, "Improve airflow");
    assert!(diagnosis.report.is_some());
}

#[tokio::test]
async fn unparsed_multi_reply_warns_without_report() {
    let stub = StubGemini::spawn(200, gemini_reply("This leaf looks healthy to me.")).await;
    let pipeline = pipeline_for(&stub, ReportRenderer::new());

    let diagnosis = pipeline.run(leaf_png(), Variant::TopDiseases).await.unwrap();

    assert!(diagnosis.records.is_empty());
    assert_eq!(diagnosis.outcome, ParseOutcome::Unparsed);
    assert!(diagnosis.warning.is_some());
    assert!(diagnosis.report.is_none());
    assert!(diagnosis.report_error.is_none());
}

#[tokio::test]
async fn unparsed_single_reply_still_reports_not_found() {
    let stub = StubGemini::spawn(200, gemini_reply("No idea, sorry.")).await;
    let pipeline = pipeline_for(&stub, ReportRenderer::new());

    let diagnosis = pipeline.run(leaf_png(), Variant::SingleCure).await.unwrap();

    assert_eq!(diagnosis.outcome, ParseOutcome::Unparsed);
    assert_eq!(diagnosis.records[0].disease, "Not found");
    assert_eq!(diagnosis.records[0].cure, "Not found");
    assert!(diagnosis.warning.is_some());
    assert!(diagnosis.report.is_some());
}

#[tokio::test]
async fn api_error_message_is_surfaced() {
    let stub = StubGemini::spawn(400, gemini_error("API key not valid")).await;
    let pipeline = pipeline_for(&stub, ReportRenderer::new());

    let err = pipeline
        .run(leaf_png(), Variant::NumberedCures)
        .await
        .unwrap_err();

    match err {
        DiagnoseError::Inference(InferenceError::Api { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let stub =
        StubGemini::spawn_with_delay(200, gemini_reply(LEAF_BLIGHT), Duration::from_secs(3)).await;
    let mut config = stub.config();
    config.request_timeout = Duration::from_millis(200);
    let pipeline = Pipeline::new(GeminiClient::new(&config).unwrap(), ReportRenderer::new());

    let err = pipeline
        .run(leaf_png(), Variant::NumberedCures)
        .await
        .unwrap_err();

    assert!(
        matches!(err, DiagnoseError::Inference(ref e) if e.is_timeout()),
        "got {err:?}"
    );
}

#[tokio::test]
async fn undecodable_upload_never_reaches_gemini() {
    let stub = StubGemini::spawn(200, gemini_reply(LEAF_BLIGHT)).await;
    let pipeline = pipeline_for(&stub, ReportRenderer::new());

    let err = pipeline
        .run(b"not an image".to_vec(), Variant::NumberedCures)
        .await
        .unwrap_err();

    assert!(matches!(err, DiagnoseError::Upload(_)));
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn scratch_files_are_removed_after_report() {
    let scratch = tempfile::tempdir().unwrap();
    let stub = StubGemini::spawn(200, gemini_reply(LEAF_BLIGHT)).await;
    let pipeline = pipeline_for(&stub, ReportRenderer::with_scratch_dir(scratch.path()));

    let diagnosis = pipeline.run(leaf_png(), Variant::NumberedCures).await.unwrap();

    assert!(diagnosis.report.is_some());
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn render_failure_keeps_the_diagnosis() {
    let missing = tempfile::tempdir().unwrap().path().join("gone");
    let stub = StubGemini::spawn(200, gemini_reply(LEAF_BLIGHT)).await;
    let pipeline = pipeline_for(&stub, ReportRenderer::with_scratch_dir(missing));

    let diagnosis = pipeline.run(leaf_png(), Variant::NumberedCures).await.unwrap();

    assert_eq!(diagnosis.records[0].disease, "Leaf Blight");
    assert!(diagnosis.report.is_none());
    let msg = diagnosis.report_error.expect("render error reported");
    assert!(msg.starts_with("PDF generation failed"), "got {msg}");
}
