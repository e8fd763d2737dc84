//! News card generation: fetch the tech feeds, parse them, and render
//! social cards. Each source is fetched in its own task; one broken feed
//! never takes down the run.

pub mod cards;
pub mod feed;

use crate::error::{AppError, Result};
use crate::metrics;
use feed::NewsItem;
use tracing::{info, warn};

/// A feed we follow. The icon shows up on the rendered index.
#[derive(Debug, Clone, Copy)]
pub struct NewsSource {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub url: &'static str,
}

pub const SOURCES: &[NewsSource] = &[
    NewsSource {
        key: "techcrunch",
        name: "TechCrunch",
        icon: "🟢",
        url: "https://techcrunch.com/category/artificial-intelligence/feed/",
    },
    NewsSource {
        key: "theverge",
        name: "The Verge",
        icon: "🔵",
        url: "https://www.theverge.com/rss/index.xml",
    },
    NewsSource {
        key: "arstechnica",
        name: "Ars Technica",
        icon: "🟠",
        url: "https://feeds.arstechnica.com/arstechnica/technology-lab",
    },
];

pub fn source_by_key(key: &str) -> Option<&'static NewsSource> {
    SOURCES.iter().find(|s| s.key == key)
}

/// Fetches one feed's XML.
pub async fn fetch_source_xml(client: &reqwest::Client, source: &NewsSource) -> Result<String> {
    let response = client
        .get(source.url)
        .header("User-Agent", "routeboard/0.1 (RSS reader)")
        .header("Accept", "application/rss+xml, application/xml, text/xml")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Api {
            message: format!("{} returned HTTP {status}", source.name),
        });
    }
    Ok(response.text().await?)
}

/// Fetches and parses every requested source concurrently. Failed sources
/// are logged and dropped from the result.
pub async fn collect_items(
    sources: &[&'static NewsSource],
    per_source_limit: usize,
) -> Vec<NewsItem> {
    let client = reqwest::Client::new();
    let mut handles = Vec::new();
    for source in sources {
        let client = client.clone();
        let source = **source;
        handles.push(tokio::spawn(async move {
            let xml = fetch_source_xml(&client, &source).await?;
            feed::parse_feed(&xml, source.name, per_source_limit)
        }));
    }

    let mut items = Vec::new();
    for (source, handle) in sources.iter().zip(handles) {
        match handle.await {
            Ok(Ok(parsed)) => {
                metrics::feed_fetch_success(source.key);
                metrics::feed_items_parsed(source.key, parsed.len() as u64);
                info!("{}: {} items", source.name, parsed.len());
                items.extend(parsed);
            }
            Ok(Err(e)) => {
                metrics::feed_fetch_error(source.key);
                warn!("{} failed: {e}", source.name);
            }
            Err(e) => {
                metrics::feed_fetch_error(source.key);
                warn!("{} task panicked: {e}", source.name);
            }
        }
    }

    // Newest first across sources; undated items sink to the end.
    items.sort_by(|a, b| b.published.cmp(&a.published));
    items
}
