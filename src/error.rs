//! Error types for the AgroPulse pipeline.
//!
//! Each pipeline stage owns one error enum so callers can tell the failure
//! modes apart:
//!
//! * [`ConfigError`]: fatal, the process refuses to start.
//! * [`EncodeError`]: the uploaded bytes are not a usable image.
//! * [`InferenceError`]: the Gemini call failed (network, auth, non-2xx,
//!   malformed JSON, timeout). Recoverable; shown to the user.
//! * [`RenderError`]: the PDF report could not be assembled. Recoverable;
//!   the diagnosis is still returned without a report.
//! * [`DiagnoseError`]: what a whole diagnosis request can fail with.
//!
//! A response that does not follow the expected grammar is not an error at
//! all; see [`crate::extract::ParseOutcome`].

use thiserror::Error;

/// Startup configuration could not be resolved.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent or blank.
    #[error("{name} not found. Add it to your .env file.")]
    Missing { name: &'static str },

    /// A variable is present but cannot be parsed.
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// The uploaded image could not be decoded or re-encoded.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Uploaded file is empty")]
    Empty,

    /// The bytes are not a JPEG/PNG the decoder understands.
    #[error("Could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// Re-encoding to JPEG failed.
    #[error("JPEG encoding failed: {0}")]
    Codec(#[source] image::ImageError),
}

/// The outbound call to the inference API failed.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Connection refused, DNS failure, TLS error, body read failure.
    #[error("Request to Gemini failed: {0}")]
    Transport(String),

    #[error("Gemini did not answer within {secs}s")]
    Timeout { secs: u64 },

    /// The API reported an error object (`error.message`).
    #[error("Gemini API Error: {message}")]
    Api { status: u16, message: String },

    /// Non-2xx status without a usable error message.
    #[error("Gemini API returned HTTP {status}")]
    Status { status: u16 },

    #[error("Gemini API returned no candidates. Check your API key or request.")]
    NoCandidates,

    #[error("Gemini API returned malformed JSON: {0}")]
    MalformedJson(String),

    #[error("Could not build HTTP client: {0}")]
    Client(String),
}

impl InferenceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// The PDF report could not be generated.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No diagnosis records to render")]
    NoRecords,

    /// Scratch file creation, write or read-back failed.
    #[error("Scratch file error: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("Image embedding failed: {0}")]
    Image(String),

    /// The document could not be serialised.
    #[error("PDF serialisation failed: {0}")]
    Pdf(String),

    /// The blocking render task panicked or was cancelled.
    #[error("Render task failed: {0}")]
    Task(String),
}

/// A diagnosis request failed before any result could be shown.
///
/// Parse misses and render failures are not in here: the pipeline still
/// answers with defaulted records or without a report.
#[derive(Debug, Error)]
pub enum DiagnoseError {
    #[error(transparent)]
    Upload(#[from] EncodeError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// A blocking worker task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EncodeError> for RenderError {
    fn from(e: EncodeError) -> Self {
        Self::Image(e.to_string())
    }
}
