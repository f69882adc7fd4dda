// src/error.rs
//! Pipeline-level failures. Source-level errors never reach this type.

/// Maximum characters of raw model output kept for diagnostics.
pub const EXCERPT_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReportError {
    /// Text-completion call failed (status, transport, or empty answer).
    #[error("narrative service error: {0}")]
    NarrativeService(String),

    /// Model answer held no usable JSON object or it failed validation.
    #[error("narrative parse error: {reason}")]
    NarrativeParse { reason: String, excerpt: String },
}

impl ReportError {
    pub fn parse(reason: impl Into<String>, raw: &str) -> Self {
        ReportError::NarrativeParse {
            reason: reason.into(),
            excerpt: excerpt(raw),
        }
    }

    /// Stable machine-readable category for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::NarrativeService(_) => "narrative_service_error",
            ReportError::NarrativeParse { .. } => "narrative_parse_error",
        }
    }
}

/// Truncate on a char boundary, marking the cut with "...".
pub fn excerpt(raw: &str) -> String {
    let mut out: String = raw.chars().take(EXCERPT_MAX_CHARS).collect();
    if raw.chars().nth(EXCERPT_MAX_CHARS).is_some() {
        out.push_str("...");
    }
    out
}
