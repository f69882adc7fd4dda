// src/sources/providers/news_rss.rs
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::sources::normalize_text;
use crate::sources::types::{NewsItem, SourceError, SourceFetcher};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> u64 {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
        .unwrap_or(0)
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

/// Parse one RSS document into news items (titles normalized, empty titles dropped).
pub fn parse_feed(xml: &str) -> Result<Vec<NewsItem>, SourceError> {
    let t0 = std::time::Instant::now();
    let rss: Rss = from_str(&scrub_html_entities_for_xml(xml))
        .map_err(|e| SourceError::Decode(format!("rss: {e}")))?;

    let source = rss
        .channel
        .title
        .as_deref()
        .map(normalize_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "RSS".to_string());

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = normalize_text(it.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            continue;
        }
        let summary = it
            .description
            .as_deref()
            .map(normalize_text)
            .filter(|s| !s.is_empty());
        out.push(NewsItem {
            title,
            source: source.clone(),
            url: it.link,
            published_at: it.pub_date.as_deref().map(parse_rfc2822_to_unix).unwrap_or(0),
            summary,
        });
    }

    histogram!("report_news_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

/// Newest first, duplicate titles removed, capped at `limit`.
pub fn merge_items(mut items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    let mut seen = std::collections::HashSet::new();
    items.retain(|it| seen.insert(it.title.to_ascii_lowercase()));
    items.truncate(limit);
    items
}

enum Mode {
    Fixture(Vec<String>),
    Http {
        urls: Vec<String>,
        client: reqwest::Client,
    },
}

pub struct NewsRssSource {
    mode: Mode,
    limit: usize,
}

impl NewsRssSource {
    pub fn from_urls(urls: Vec<String>, limit: usize, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent("market-report-engine/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            mode: Mode::Http { urls, client },
            limit,
        })
    }

    /// Parse embedded documents instead of hitting the network.
    pub fn from_fixtures(docs: Vec<String>, limit: usize) -> Self {
        Self {
            mode: Mode::Fixture(docs),
            limit,
        }
    }

    async fn fetch_one(client: &reqwest::Client, url: &str) -> Result<Vec<NewsItem>, SourceError> {
        let resp = client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!("rss {url}: HTTP {}", resp.status())));
        }
        parse_feed(&resp.text().await?)
    }
}

#[async_trait]
impl SourceFetcher<Vec<NewsItem>> for NewsRssSource {
    async fn fetch(&self) -> Result<Vec<NewsItem>, SourceError> {
        let results: Vec<Result<Vec<NewsItem>, SourceError>> = match &self.mode {
            Mode::Fixture(docs) => docs.iter().map(|d| parse_feed(d)).collect(),
            Mode::Http { urls, client } => {
                join_all(urls.iter().map(|u| Self::fetch_one(client, u))).await
            }
        };

        let mut items = Vec::new();
        let mut last_err = None;
        for res in results {
            match res {
                Ok(mut v) => items.append(&mut v),
                Err(e) => {
                    tracing::debug!(source = "news", error = %e, "feed failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if items.is_empty() => Err(e),
            _ => Ok(merge_items(items, self.limit)),
        }
    }

    fn name(&self) -> &'static str {
        "news"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, ts: u64) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            source: "T".to_string(),
            url: None,
            published_at: ts,
            summary: None,
        }
    }

    #[test]
    fn merge_sorts_dedups_and_caps() {
        let out = merge_items(
            vec![item("a", 1), item("B", 3), item("b", 2), item("c", 5)],
            2,
        );
        let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "B"]);
    }

    #[test]
    fn rfc2822_dates_parse_or_zero() {
        assert_eq!(parse_rfc2822_to_unix("Thu, 01 Jan 1970 00:01:00 +0000"), 60);
        assert_eq!(parse_rfc2822_to_unix("yesterday"), 0);
    }
}
