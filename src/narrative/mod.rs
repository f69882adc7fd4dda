// src/narrative/mod.rs
//! Narrative request/response types and the schema the model must answer with.

pub mod client;
pub mod parser;

use serde::{Deserialize, Serialize};

pub use client::{
    build_narrative_client, DynNarrativeClient, MockNarrativeClient, NarrativeClient,
    OpenAiNarrativeClient,
};
pub use parser::{extract_json_object, parse_narrative};

/// Rendered prompt text. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeRequest(String);

impl NarrativeRequest {
    pub fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Raw answer from the text-completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeResponse {
    pub content: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outlook {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorOutlook {
    pub sector: String,
    pub outlook: Outlook,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyLevels {
    #[serde(default)]
    pub support: Option<f64>,
    #[serde(default)]
    pub resistance: Option<f64>,
}

/// Structured report produced by the model. `market_mood`, `mood_score` and
/// `summary` are required; list fields may be omitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketNarrative {
    pub market_mood: String,
    pub mood_score: f64,
    pub summary: String,
    #[serde(default)]
    pub sector_outlook: Vec<SectorOutlook>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub strategy_notes: Vec<String>,
    #[serde(default)]
    pub key_levels: KeyLevels,
}
