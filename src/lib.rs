//! # AgroPulse
//!
//! Plant disease diagnosis from a leaf photo.
//!
//! A photo is re-encoded as JPEG, sent to Gemini together with a
//! variant-specific prompt, and the free-text reply is parsed into
//! disease/cure records. The records are rendered into a downloadable PDF
//! report that embeds the photo.
//!
//! ## Modules
//!
//! - [`config`]: environment configuration
//! - [`encode`]: upload decoding and JPEG/base64 encoding
//! - [`prompts`]: prompt texts and [`Variant`]s
//! - [`gemini`]: the `generateContent` client
//! - [`extract`]: reply grammar → [`DiagnosisRecord`]s
//! - [`report`]: PDF layout and serialisation
//! - [`pipeline`]: one request end to end
//! - [`server`]: axum routes

pub mod config;
pub mod encode;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod server;

pub use config::AppConfig;
pub use error::{ConfigError, DiagnoseError, EncodeError, InferenceError, RenderError};
pub use extract::{extract, DiagnosisRecord, ExtractMode, Extraction, ParseOutcome};
pub use gemini::GeminiClient;
pub use pipeline::{Diagnosis, Pipeline};
pub use prompts::Variant;
pub use report::{Layout, ReportRenderer};
pub use server::{router, AppState};
