// src/narrative/parser.rs
//! Tolerant extraction of the report object from free-form model output.
//!
//! Models wrap JSON in prose or code fences. We take the first `{` that opens a
//! structurally balanced object (braces inside string literals do not count),
//! parse exactly that span, and validate it. Nothing is guessed: any failure is
//! a `NarrativeParse` error carrying a truncated excerpt of the raw text.

use serde_json::Value;

use crate::error::ReportError;
use crate::narrative::MarketNarrative;

/// Upper bound on restarts from braces that an earlier pass saw inside a string.
const MAX_RESCANS: usize = 8;

/// One string-aware pass from the opening brace at `start`.
///
/// Returns the earliest-starting object that closed during the pass (the pass
/// stops as soon as the brace at `start` closes) and the first `{` that was
/// seen inside a string literal.
fn scan_from(bytes: &[u8], start: usize) -> (Option<(usize, usize)>, Option<usize>) {
    let mut open: Vec<usize> = Vec::new();
    let mut best: Option<(usize, usize)> = None;
    let mut quoted_brace = None;
    let mut in_str = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_str {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_str = false;
            } else if b == b'{' && quoted_brace.is_none() {
                quoted_brace = Some(i);
            }
            continue;
        }
        match b {
            b'"' => in_str = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(s) = open.pop() {
                    if open.is_empty() {
                        return (Some((s, i)), quoted_brace);
                    }
                    if best.map_or(true, |(b0, _)| s < b0) {
                        best = Some((s, i));
                    }
                }
            }
            _ => {}
        }
    }
    (best, quoted_brace)
}

/// First structurally balanced `{...}` span in `text`.
///
/// Stray braces that never close do not trigger a rescan; only a brace that
/// sat inside a string literal (as seen from an earlier start) does.
pub fn find_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = bytes.iter().position(|&b| b == b'{')?;
    let mut fallback: Option<(usize, usize)> = None;

    for _ in 0..MAX_RESCANS {
        let (found, quoted) = scan_from(bytes, start);
        let found = match (found, fallback) {
            (Some(f), Some(fb)) if fb.0 < f.0 => Some(fb),
            (f, fb) => f.or(fb),
        };
        match (found, quoted) {
            (Some((s, _)), Some(q)) if q < s => {
                fallback = found;
                start = q;
            }
            (Some((s, e)), _) => return Some(&text[s..=e]),
            (None, Some(q)) => start = q,
            (None, None) => return None,
        }
    }
    fallback.map(|(s, e)| &text[s..=e])
}

/// Locate and parse the first JSON object in `raw`.
pub fn extract_json_object(raw: &str) -> Result<Value, ReportError> {
    let span = find_json_object(raw).ok_or_else(|| ReportError::parse("no JSON object found", raw))?;
    serde_json::from_str(span).map_err(|e| ReportError::parse(format!("invalid JSON: {e}"), raw))
}

/// Extract, deserialize and validate the report object.
pub fn parse_narrative(raw: &str) -> Result<MarketNarrative, ReportError> {
    let value = extract_json_object(raw)?;
    let narrative: MarketNarrative = serde_json::from_value(value)
        .map_err(|e| ReportError::parse(format!("schema mismatch: {e}"), raw))?;
    validate(&narrative).map_err(|reason| ReportError::parse(reason, raw))?;
    Ok(narrative)
}

fn validate(n: &MarketNarrative) -> Result<(), String> {
    if n.market_mood.trim().is_empty() {
        return Err("marketMood is empty".to_string());
    }
    if n.summary.trim().is_empty() {
        return Err("summary is empty".to_string());
    }
    if !n.mood_score.is_finite() || !(0.0..=100.0).contains(&n.mood_score) {
        return Err(format!("moodScore {} outside 0..=100", n.mood_score));
    }
    Ok(())
}
