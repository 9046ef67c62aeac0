//! Diagnosis extraction: free-text model reply → [`DiagnosisRecord`]s.
//!
//! The prompt asks the model to answer in a fixed textual grammar, but the
//! reply is still natural language: models add emphasis markers, skip list
//! numbers, or ignore the format entirely. The rules here recover what they
//! can and fall back to `"Not found"` for the rest. Everything in this module
//! is a pure function of the input text.
//!
//! ## Grammars
//!
//! ```text
//! Single                      Multi
//! ──────                      ─────
//! Disease: Leaf Blight        Disease 1: Rust
//! Cure:                       Cure 1: Use copper spray
//! 1. Remove infected leaves   Disease 2: Mildew
//! 2. Apply fungicide          Cure 2: Improve airflow
//! 3. Improve drainage
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Placeholder used for any field the grammar could not recover.
pub const NOT_FOUND: &str = "Not found";

/// Maximum number of numbered cure lines kept in single-record mode.
pub const MAX_CURES: usize = 3;

/// One (disease, cure) pair extracted from the model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub disease: String,
    /// Free text, or up to [`MAX_CURES`] lines `"1. …\n2. …"`.
    pub cure: String,
}

impl DiagnosisRecord {
    pub fn new(disease: impl Into<String>, cure: impl Into<String>) -> Self {
        Self {
            disease: disease.into(),
            cure: cure.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(NOT_FOUND, NOT_FOUND)
    }
}

/// Which grammar the caller expects the reply to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// One `Disease:` line and one `Cure:` section.
    Single,
    /// Repeated `Disease N:` / `Cure N:` blocks.
    Multi,
}

/// How much of the grammar was actually present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseOutcome {
    /// Every expected field was found.
    Complete,
    /// Single mode only: one of disease/cure fell back to [`NOT_FOUND`].
    Defaulted,
    /// Nothing recognisable. Single mode yields one all-default record,
    /// multi mode yields no records at all.
    Unparsed,
}

/// Result of [`extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub records: Vec<DiagnosisRecord>,
    pub outcome: ParseOutcome,
}

impl Extraction {
    pub fn is_unparsed(&self) -> bool {
        self.outcome == ParseOutcome::Unparsed
    }

    pub fn warning(&self, mode: ExtractMode) -> Option<&'static str> {
        self.outcome.warning(mode)
    }
}

impl ParseOutcome {
    /// User-facing warning for replies that did not follow the grammar.
    pub fn warning(self, mode: ExtractMode) -> Option<&'static str> {
        match (self, mode) {
            (ParseOutcome::Unparsed, ExtractMode::Single) => Some(
                "Could not find a disease or cure in the AI response. Try another photo.",
            ),
            (ParseOutcome::Unparsed, ExtractMode::Multi) => Some(
                "The AI response did not follow the expected 'Disease N / Cure N' format.",
            ),
            (ParseOutcome::Defaulted, _) => {
                Some("Part of the diagnosis could not be read from the AI response.")
            }
            (ParseOutcome::Complete, _) => None,
        }
    }
}

/// Extract diagnosis records from a raw model reply.
///
/// Never fails: a reply that ignores the grammar is reported through
/// [`Extraction::outcome`], not as an error.
pub fn extract(text: &str, mode: ExtractMode) -> Extraction {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    match mode {
        ExtractMode::Single => extract_single(&text),
        ExtractMode::Multi => extract_multi(&text),
    }
}

// ── Single-record grammar ────────────────────────────────────────────────────

// `Disease:`, `**Disease:**`, `*Disease*:` …
static RE_DISEASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdisease[ \t]*\**[ \t]*:[ \t]*(.+)").unwrap());

// Singular only: "Possible cures: …" in a preamble is not the marker.
static RE_CURE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcure[ \t]*\**[ \t]*:[ \t]*(.*)").unwrap());

// Applied per line, so a number inside a disease name never counts.
static RE_NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*\d+\.[ \t]*(.+)$").unwrap());

fn extract_single(text: &str) -> Extraction {
    let disease_caps = RE_DISEASE.captures(text);
    let disease = disease_caps
        .as_ref()
        .map(|caps| clean(&caps[1]))
        .filter(|d| !d.is_empty());

    // The marker belongs to the disease line above it; earlier text is preamble.
    let disease_end = disease_caps
        .as_ref()
        .and_then(|caps| caps.get(0))
        .map_or(0, |m| m.end());
    let marker = RE_CURE_MARKER
        .captures_at(text, disease_end)
        .or_else(|| RE_CURE_MARKER.captures(text));

    let cure = marker.and_then(|caps| {
        let marker_end = caps.get(0).map_or(text.len(), |m| m.end());
        let items = numbered_items(&caps[1], &text[marker_end..]);
        if !items.is_empty() {
            return Some(renumber(&items));
        }
        Some(clean(&caps[1])).filter(|c| !c.is_empty())
    });

    let outcome = match (&disease, &cure) {
        (Some(_), Some(_)) => ParseOutcome::Complete,
        (None, None) => ParseOutcome::Unparsed,
        _ => ParseOutcome::Defaulted,
    };
    if outcome != ParseOutcome::Complete {
        debug!(
            "Single-record grammar incomplete: disease={} cure={}",
            disease.is_some(),
            cure.is_some()
        );
    }

    Extraction {
        records: vec![DiagnosisRecord::new(
            disease.unwrap_or_else(|| NOT_FOUND.to_string()),
            cure.unwrap_or_else(|| NOT_FOUND.to_string()),
        )],
        outcome,
    }
}

/// Collect the numbered items that directly follow the `Cure:` marker.
///
/// `inline` is the rest of the marker line and may hold the first item.
/// Blank lines are skipped; the first other line ends the list.
fn numbered_items(inline: &str, tail: &str) -> Vec<String> {
    let mut items = Vec::new();
    if let Some(caps) = RE_NUMBERED.captures(inline) {
        push_item(&mut items, &caps[1]);
    }
    // The first line of `tail` is the marker line itself.
    for line in tail.lines().skip(1) {
        if items.len() >= MAX_CURES {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        match RE_NUMBERED.captures(line) {
            Some(caps) => push_item(&mut items, &caps[1]),
            None => break,
        }
    }
    items
}

fn push_item(items: &mut Vec<String>, raw: &str) {
    let item = raw.trim();
    if !item.is_empty() {
        items.push(item.to_string());
    }
}

/// Re-number items contiguously from 1, whatever the source numbering was.
fn renumber(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Multi-record grammar ─────────────────────────────────────────────────────

static RE_DISEASE_N: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdisease[ \t]*(\d+)[ \t]*\**[ \t]*:").unwrap());

static RE_CURE_N: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcure[ \t]*(\d+)[ \t]*\**[ \t]*:").unwrap());

fn extract_multi(text: &str) -> Extraction {
    // (index, marker end, marker start) for every `Disease N:` marker.
    let markers: Vec<(String, usize, usize)> = RE_DISEASE_N
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((caps[1].to_string(), whole.end(), whole.start()))
        })
        .collect();

    let mut records = Vec::with_capacity(markers.len());
    for (i, (index, body_start, _)) in markers.iter().enumerate() {
        let body_end = markers.get(i + 1).map_or(text.len(), |next| next.2);
        let block = &text[*body_start..body_end];

        let Some(cure_caps) = RE_CURE_N.captures(block) else {
            debug!("Dropping Disease {index} block: no Cure marker");
            continue;
        };
        if !same_index(index, &cure_caps[1]) {
            debug!(
                "Dropping Disease {index} block: Cure index {} does not match",
                &cure_caps[1]
            );
            continue;
        }
        let Some(cure_marker) = cure_caps.get(0) else {
            continue;
        };

        let disease = clean(&block[..cure_marker.start()]);
        let cure = clean(&block[cure_marker.end()..]);
        records.push(DiagnosisRecord::new(
            or_not_found(disease),
            or_not_found(cure),
        ));
    }

    let outcome = if records.is_empty() {
        ParseOutcome::Unparsed
    } else {
        ParseOutcome::Complete
    };
    Extraction { records, outcome }
}

fn same_index(a: &str, b: &str) -> bool {
    a.trim_start_matches('0') == b.trim_start_matches('0')
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Trim whitespace and stray markdown emphasis around a captured field.
fn clean(raw: &str) -> String {
    raw.trim().trim_matches('*').trim().to_string()
}

fn or_not_found(value: String) -> String {
    if value.is_empty() {
        NOT_FOUND.to_string()
    } else {
        value
    }
}
