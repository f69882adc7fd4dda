// tests/providers_news_rss.rs
use market_report::sources::providers::news_rss::{parse_feed, NewsRssSource};
use market_report::sources::types::SourceFetcher;

const FIXTURE: &str = include_str!("fixtures/market_news.xml");

#[test]
fn parses_fixture_and_normalizes_text() {
    let items = parse_feed(FIXTURE).expect("parse fixture");
    // blank title dropped
    assert_eq!(items.len(), 4);

    let first = &items[0];
    assert_eq!(first.source, "Market Wire");
    assert_eq!(
        first.title,
        "Stocks close higher as \"soft landing\" bets firm"
    );
    assert_eq!(
        first.summary.as_deref(),
        Some("The S&P 500 gained 0.8% on Tuesday.")
    );
    assert_eq!(first.published_at, 1_791_901_800);

    let oil = items.iter().find(|i| i.title.starts_with("Oil")).expect("oil item");
    assert_eq!(oil.published_at, 0, "bad pubDate maps to 0");
}

#[tokio::test]
async fn fixture_source_sorts_dedups_and_caps() {
    let src = NewsRssSource::from_fixtures(vec![FIXTURE.to_string()], 10);
    let items = src.fetch().await.expect("fetch");
    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Treasury yields slip ahead of CPI",
            "Stocks close higher as \"soft landing\" bets firm",
            "Oil steadies after weekly drop",
        ]
    );

    let capped = NewsRssSource::from_fixtures(vec![FIXTURE.to_string()], 1);
    assert_eq!(capped.fetch().await.expect("fetch").len(), 1);
}

#[tokio::test]
async fn broken_feed_is_tolerated_when_another_parses() {
    let src = NewsRssSource::from_fixtures(
        vec!["<rss><channel>".to_string(), FIXTURE.to_string()],
        10,
    );
    assert_eq!(src.fetch().await.expect("fetch").len(), 3);

    let only_broken = NewsRssSource::from_fixtures(vec!["not xml at all".to_string()], 10);
    assert!(only_broken.fetch().await.is_err());
}
