//! Instruction prompts sent to Gemini alongside the leaf photo.
//!
//! Each [`Variant`] pairs a prompt with the grammar the extractor expects the
//! reply to follow and the report layout that suits it. Editing a prompt here
//! without updating the grammar in [`crate::extract`] breaks parsing.

use crate::extract::ExtractMode;
use crate::report::Layout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One disease, one free-text cure.
pub const SINGLE_CURE_PROMPT: &str = "\
You are an expert plant pathologist. A leaf image is uploaded.
Identify the disease (if any) and suggest one short, specific cure.

Return strictly in this format:

Disease: <name>
Cure: <cure>
";

/// One disease, exactly three numbered cures.
pub const NUMBERED_CURES_PROMPT: &str = "\
You are an expert plant pathologist. A leaf image is uploaded.
Identify the disease (if any) and list exactly 3 short, specific cures.

Return strictly in this format:

Disease: <name>
Cure:
1. <first cure>
2. <second cure>
3. <third cure>
";

/// The three most likely diseases, one cure each.
pub const TOP_DISEASES_PROMPT: &str = "\
You are an expert plant pathologist. A leaf image is uploaded.
List the 3 most likely diseases, most likely first, each with one short, specific cure.

Return strictly in this format:

Disease 1: <name>
Cure 1: <cure>
Disease 2: <name>
Cure 2: <cure>
Disease 3: <name>
Cure 3: <cure>
";

/// Analysis variant selected per request (or by default in config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    SingleCure,
    #[default]
    NumberedCures,
    TopDiseases,
}

impl Variant {
    pub const ALL: [Variant; 3] = [
        Variant::SingleCure,
        Variant::NumberedCures,
        Variant::TopDiseases,
    ];

    pub fn prompt(self) -> &'static str {
        match self {
            Self::SingleCure => SINGLE_CURE_PROMPT,
            Self::NumberedCures => NUMBERED_CURES_PROMPT,
            Self::TopDiseases => TOP_DISEASES_PROMPT,
        }
    }

    pub fn extract_mode(self) -> ExtractMode {
        match self {
            Self::SingleCure | Self::NumberedCures => ExtractMode::Single,
            Self::TopDiseases => ExtractMode::Multi,
        }
    }

    pub fn layout(self) -> Layout {
        match self.extract_mode() {
            ExtractMode::Single => Layout::Freeform,
            ExtractMode::Multi => Layout::Table,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleCure => "single-cure",
            Self::NumberedCures => "numbered-cures",
            Self::TopDiseases => "top-diseases",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown variant '{s}' (expected one of: single-cure, numbered-cures, top-diseases)"
                )
            })
    }
}
