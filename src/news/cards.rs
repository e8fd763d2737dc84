//! Social card rendering. Each news item becomes one HTML card; an index
//! page links them all. Card copy comes from the generative model when a
//! client is available, otherwise from the item's own title and excerpt.

use crate::error::Result;
use crate::gemini::{extract_json_block, GeminiClient};
use crate::metrics;
use crate::news::feed::NewsItem;
use askama::Template;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardCopy {
    pub headline: String,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct NewsCard {
    pub item: NewsItem,
    pub copy: CardCopy,
}

#[derive(Template)]
#[template(path = "news_card.html")]
struct CardTemplate<'a> {
    source: &'a str,
    headline: &'a str,
    summary: &'a str,
    link: &'a str,
    image_url: Option<&'a str>,
    published: String,
}

#[derive(Template)]
#[template(path = "news_index.html")]
struct IndexTemplate<'a> {
    cards: &'a [IndexEntry],
}

struct IndexEntry {
    file: String,
    source: String,
    headline: String,
}

fn card_prompt(item: &NewsItem) -> String {
    format!(
        "You write short, punchy social-media news cards.\n\n\
         Article title: {}\n\
         Article excerpt: {}\n\n\
         Write card copy as JSON:\n\
         ```json\n\
         {{\n  \"headline\": \"a tightened headline, at most 60 characters\",\n  \"summary\": \"two plain sentences summarizing the story\"\n}}\n\
         ```",
        item.title, item.description
    )
}

/// Copy used when the model is unavailable or unparseable.
fn fallback_copy(item: &NewsItem) -> CardCopy {
    CardCopy {
        headline: item.title.chars().take(60).collect(),
        summary: item.description.chars().take(160).collect(),
    }
}

pub async fn card_copy(gemini: Option<&GeminiClient>, item: &NewsItem) -> CardCopy {
    let Some(client) = gemini else {
        return fallback_copy(item);
    };
    match client.generate(&card_prompt(item)).await {
        Ok(text) => extract_json_block(&text)
            .and_then(|block| serde_json::from_str::<CardCopy>(&block).ok())
            .unwrap_or_else(|| {
                warn!("Card copy response unparseable for '{}'", item.title);
                fallback_copy(item)
            }),
        Err(e) => {
            warn!("Card copy generation failed ({e}) for '{}'", item.title);
            fallback_copy(item)
        }
    }
}

fn slug(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Renders cards plus an index page into `output_dir`. Returns the paths
/// of the written card files.
pub fn render_cards(cards: &[NewsCard], output_dir: &str) -> Result<Vec<PathBuf>> {
    let dir = Path::new(output_dir);
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    let mut index_entries = Vec::new();
    for (position, card) in cards.iter().enumerate() {
        let file_name = format!("{:02}-{}.html", position + 1, slug(&card.item.source));
        let published = card
            .item
            .published
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default();
        let html = CardTemplate {
            source: &card.item.source,
            headline: &card.copy.headline,
            summary: &card.copy.summary,
            link: &card.item.link,
            image_url: card.item.image_url.as_deref(),
            published,
        }
        .render()?;

        let path = dir.join(&file_name);
        fs::write(&path, html)?;
        metrics::card_rendered();
        index_entries.push(IndexEntry {
            file: file_name,
            source: card.item.source.clone(),
            headline: card.copy.headline.clone(),
        });
        written.push(path);
    }

    let index_html = IndexTemplate {
        cards: &index_entries,
    }
    .render()?;
    fs::write(dir.join("index.html"), index_html)?;

    info!("Rendered {} cards into {}", written.len(), output_dir);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> NewsItem {
        NewsItem {
            source: "The Verge".into(),
            title: title.into(),
            link: "https://example.com/story".into(),
            description: "An excerpt of the story body.".into(),
            published: None,
            image_url: None,
        }
    }

    #[test]
    fn fallback_copy_tightens_long_titles() {
        let long = "A very long headline ".repeat(10);
        let copy = fallback_copy(&item(&long));
        assert_eq!(copy.headline.chars().count(), 60);
    }

    #[test]
    fn slug_is_filesystem_safe() {
        assert_eq!(slug("The Verge"), "the-verge");
        assert_eq!(slug("Ars Technica!"), "ars-technica");
    }

    #[tokio::test]
    async fn renders_cards_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let cards = vec![NewsCard {
            item: item("Model ships"),
            copy: CardCopy {
                headline: "Model ships".into(),
                summary: "It shipped.".into(),
            },
        }];
        let written = render_cards(&cards, dir.path().to_str().unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert!(dir.path().join("index.html").exists());
        let html = fs::read_to_string(&written[0]).unwrap();
        assert!(html.contains("Model ships"));
    }
}
