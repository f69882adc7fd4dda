// src/sources/mod.rs
pub mod orchestrator;
pub mod providers;
pub mod stub;
pub mod types;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;

use crate::config::SourcesConfig;
use crate::sources::orchestrator::Sources;
use crate::sources::providers::{
    fred::FredSource,
    news_rss::NewsRssSource,
    sibling::SiblingJsonSource,
    yahoo::{self, PriceHistorySource, QuoteListSource, YahooChartClient},
};

/// Normalize feed text: decode entities, strip tags, ASCII quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 500 chars
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }
    out
}

/// Build the production source set from configuration.
pub fn build_sources(cfg: &SourcesConfig) -> Result<Sources> {
    let timeout = cfg.source_timeout();
    let chart = YahooChartClient::new(&cfg.quote_base_url, timeout).context("building chart client")?;
    let sib = cfg.sibling_base_url.as_str();

    Ok(Sources {
        indices: Box::new(QuoteListSource::new("indices", chart.clone(), yahoo::US_INDICES)),
        movers: Box::new(
            SiblingJsonSource::new("movers", sib, "/api/market/movers", None, timeout)
                .context("building movers source")?,
        ),
        global_markets: Box::new(QuoteListSource::new(
            "globalMarkets",
            chart.clone(),
            yahoo::GLOBAL_INDICES,
        )),
        crypto: Box::new(
            SiblingJsonSource::new("crypto", sib, "/api/market/crypto", Some("data"), timeout)
                .context("building crypto source")?,
        ),
        forex: Box::new(QuoteListSource::new("forex", chart.clone(), yahoo::FOREX_PAIRS)),
        commodities: Box::new(QuoteListSource::new(
            "commodities",
            chart.clone(),
            yahoo::COMMODITIES,
        )),
        economic: Box::new(
            FredSource::new(&cfg.fred_base_url, cfg.fred_api_key.clone(), timeout)
                .context("building economic source")?,
        ),
        news: Box::new(
            NewsRssSource::from_urls(cfg.news_feeds.clone(), cfg.news_limit, timeout)
                .context("building news source")?,
        ),
        breadth: Box::new(
            SiblingJsonSource::new("breadth", sib, "/api/market/breadth", None, timeout)
                .context("building breadth source")?,
        ),
        price_history: Box::new(PriceHistorySource::new(
            chart,
            &cfg.benchmark_symbol,
            &cfg.history_range,
        )),
    })
}
