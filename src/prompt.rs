//! # Prompt Synthesizer
//! Renders a snapshot plus indicators into the narrative request text.
//!
//! Section headers and their order are fixed: every snapshot slot is rendered,
//! even when empty, and anything missing or not `ok` shows as `N/A`. The
//! response-format block at the end mirrors `narrative::MarketNarrative`.

use std::fmt::Write as _;

use crate::indicators::IndicatorSet;
use crate::narrative::NarrativeRequest;
use crate::sources::orchestrator::Snapshot;
use crate::sources::types::{MarketQuote, Mover, SourceResult, SourceStatus};

pub const NA: &str = "N/A";

/// Section headers in render order.
pub const SECTION_HEADERS: [&str; 11] = [
    "=== MAJOR US INDICES ===",
    "=== TOP MOVERS ===",
    "=== GLOBAL MARKETS ===",
    "=== CRYPTO ===",
    "=== FOREX ===",
    "=== COMMODITIES ===",
    "=== ECONOMIC DATA ===",
    "=== MARKET NEWS ===",
    "=== MARKET BREADTH ===",
    "=== TECHNICAL INDICATORS (BENCHMARK) ===",
    "=== RESPONSE FORMAT ===",
];

const PREAMBLE: &str = "You are a senior market strategist. Using ONLY the data below, write today's market report. \
Treat any value shown as N/A as unavailable; do not invent numbers for it.";

const RESPONSE_FORMAT: &str = r#"Respond with ONE JSON object and nothing else, using exactly these keys:
{
  "marketMood": "bullish | bearish | neutral | cautious | volatile",
  "moodScore": 0-100 number (0 = extreme fear, 100 = extreme greed),
  "summary": "3-4 sentence overview",
  "sectorOutlook": [{"sector": "string", "outlook": "bullish | bearish | neutral", "rationale": "string"}],
  "riskFactors": ["string"],
  "opportunities": ["string"],
  "strategyNotes": ["string"],
  "keyLevels": {"support": number or null, "resistance": number or null}
}"#;

fn opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.2}"),
        _ => NA.to_string(),
    }
}

fn header<T>(out: &mut String, idx: usize, slot: &SourceResult<T>) {
    let _ = writeln!(out, "\n{} [status: {}]", SECTION_HEADERS[idx], slot.status.as_str());
}

fn quote_lines(out: &mut String, quotes: &[MarketQuote]) {
    if quotes.is_empty() {
        let _ = writeln!(out, "- {NA}");
        return;
    }
    for q in quotes {
        let _ = writeln!(
            out,
            "- {} ({}): {:.2} ({:+.2}, {:+.2}%)",
            q.name, q.symbol, q.price, q.change, q.change_percent
        );
    }
}

fn mover_line(label: &str, movers: &[Mover]) -> String {
    if movers.is_empty() {
        return format!("{label}: {NA}");
    }
    let parts: Vec<String> = movers
        .iter()
        .map(|m| format!("{} {:+.2}% (${:.2})", m.symbol, m.change_percent, m.price))
        .collect();
    format!("{label}: {}", parts.join("; "))
}

/// Pure, deterministic rendering of `(Snapshot, IndicatorSet)`.
pub fn build_prompt(snap: &Snapshot, ind: &IndicatorSet) -> NarrativeRequest {
    let mut out = String::with_capacity(4096);
    out.push_str(PREAMBLE);
    out.push('\n');

    header(&mut out, 0, &snap.indices);
    quote_lines(&mut out, &snap.indices.data);

    header(&mut out, 1, &snap.movers);
    let m = &snap.movers.data;
    let _ = writeln!(out, "{}", mover_line("Gainers", &m.gainers));
    let _ = writeln!(out, "{}", mover_line("Losers", &m.losers));
    let _ = writeln!(out, "{}", mover_line("Most active", &m.most_active));

    header(&mut out, 2, &snap.global_markets);
    quote_lines(&mut out, &snap.global_markets.data);

    header(&mut out, 3, &snap.crypto);
    if snap.crypto.data.is_empty() {
        let _ = writeln!(out, "- {NA}");
    }
    for c in &snap.crypto.data {
        let _ = writeln!(
            out,
            "- {} ({}): ${:.2} (24h {:+.2}%)",
            c.name, c.symbol, c.price, c.change_percent_24h
        );
    }

    header(&mut out, 4, &snap.forex);
    quote_lines(&mut out, &snap.forex.data);

    header(&mut out, 5, &snap.commodities);
    quote_lines(&mut out, &snap.commodities.data);

    header(&mut out, 6, &snap.economic);
    if snap.economic.data.is_empty() {
        let _ = writeln!(out, "- {NA}");
    }
    for e in &snap.economic.data {
        let _ = writeln!(
            out,
            "- {} ({}): {} (previous {}) as of {}",
            e.name,
            e.series_id,
            opt(e.value),
            opt(e.previous),
            e.date
        );
    }

    header(&mut out, 7, &snap.news);
    if snap.news.data.is_empty() {
        let _ = writeln!(out, "- {NA}");
    }
    for n in &snap.news.data {
        let _ = writeln!(out, "- [{}] {}", n.source, n.title);
    }

    header(&mut out, 8, &snap.breadth);
    let b = &snap.breadth.data;
    if snap.breadth.status == SourceStatus::Ok {
        let _ = writeln!(
            out,
            "Advancers: {} | Decliners: {} | Unchanged: {} | New highs: {} | New lows: {} | A/D ratio: {}",
            b.advancers,
            b.decliners,
            b.unchanged,
            b.new_highs,
            b.new_lows,
            opt(b.advance_decline_ratio())
        );
    } else {
        let _ = writeln!(
            out,
            "Advancers: {NA} | Decliners: {NA} | Unchanged: {NA} | New highs: {NA} | New lows: {NA} | A/D ratio: {NA}"
        );
    }

    header(&mut out, 9, &snap.price_history);
    let _ = writeln!(out, "Data points: {}", snap.price_history.data.len());
    let _ = writeln!(out, "Price: {}", opt(ind.price));
    let _ = writeln!(out, "RSI(14): {}", opt(ind.rsi));
    let _ = writeln!(out, "SMA20: {} | SMA50: {}", opt(ind.sma20), opt(ind.sma50));
    let _ = writeln!(out, "EMA12: {} | EMA26: {}", opt(ind.ema12), opt(ind.ema26));
    match ind.macd {
        Some(m) => {
            let _ = writeln!(
                out,
                "MACD: {:.4} | Signal: {:.4} | Histogram: {:.4}",
                m.value, m.signal, m.histogram
            );
        }
        None => {
            let _ = writeln!(out, "MACD: {NA} | Signal: {NA} | Histogram: {NA}");
        }
    }
    let _ = writeln!(
        out,
        "Trend: {}",
        ind.trend.map(|t| t.as_str()).unwrap_or(NA)
    );

    let _ = writeln!(out, "\n{}", SECTION_HEADERS[10]);
    out.push_str(RESPONSE_FORMAT);
    out.push('\n');

    NarrativeRequest::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute_indicators;
    use crate::sources::types::{MarketBreadth, PriceSeries};

    #[test]
    fn empty_snapshot_renders_every_section_with_na() {
        let p = build_prompt(&Snapshot::default(), &IndicatorSet::default());
        let text = p.as_str();

        let mut last = 0;
        for h in SECTION_HEADERS {
            let pos = text.find(h).unwrap_or_else(|| panic!("missing section {h}"));
            assert!(pos >= last, "section {h} out of order");
            last = pos;
        }
        assert!(text.contains("[status: failed]"));
        assert!(text.contains("Gainers: N/A"));
        assert!(text.contains("RSI(14): N/A"));
        assert!(text.contains("A/D ratio: N/A"));
    }

    #[test]
    fn populated_values_are_rendered() {
        let mut snap = Snapshot::default();
        snap.indices = SourceResult::fetched(vec![MarketQuote::from_prices(
            "^GSPC", "S&P 500", 110.0, 100.0,
        )]);
        snap.breadth = SourceResult::fetched(MarketBreadth {
            advancers: 300,
            decliners: 200,
            ..MarketBreadth::default()
        });
        let closes: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        snap.price_history = SourceResult::fetched(PriceSeries::from_closes(closes.clone()));

        let p = build_prompt(&snap, &compute_indicators(&closes));
        let text = p.as_str();
        assert!(text.contains("- S&P 500 (^GSPC): 110.00 (+10.00, +10.00%)"));
        assert!(text.contains("A/D ratio: 1.50"));
        assert!(text.contains("RSI(14): 100.00"));
        assert!(text.contains("SMA50: N/A"));
        assert!(text.contains("Data points: 30"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let snap = Snapshot::default();
        let ind = IndicatorSet::default();
        assert_eq!(build_prompt(&snap, &ind), build_prompt(&snap, &ind));
    }
}
