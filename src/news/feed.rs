//! RSS 2.0 / Atom parsing into [`NewsItem`]s.
//!
//! The extraction rules mirror what the news screens actually need:
//! title, link, a plain-text description capped at 300 characters, the
//! publication time, and a best-effort image (media:content with an image
//! medium, else an image enclosure, else the first `<img>` inside the
//! description HTML).

use crate::error::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

const DESCRIPTION_LIMIT: usize = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub source: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

#[derive(Default)]
struct ItemBuilder {
    title: String,
    link_text: String,
    link_href: Option<String>,
    description: String,
    summary: String,
    content: String,
    date_text: String,
    media_image: Option<String>,
    enclosure_image: Option<String>,
}

impl ItemBuilder {
    fn finish(self, source: &str) -> Option<NewsItem> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let link = if !self.link_text.trim().is_empty() {
            self.link_text.trim().to_string()
        } else {
            self.link_href.unwrap_or_default()
        };

        let raw_description = [&self.description, &self.summary, &self.content]
            .into_iter()
            .find(|d| !d.trim().is_empty())
            .cloned()
            .unwrap_or_default();

        let image_url = self
            .media_image
            .or(self.enclosure_image)
            .or_else(|| first_img_src(&raw_description));

        Some(NewsItem {
            source: source.to_string(),
            title,
            link,
            description: clean_description(&raw_description),
            published: parse_feed_date(self.date_text.trim()),
            image_url,
        })
    }
}

/// Strips markup and truncates to the card-sized excerpt.
pub fn clean_description(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, "");
    text.trim().chars().take(DESCRIPTION_LIMIT).collect()
}

/// First `<img src>` inside an HTML fragment, if any.
pub fn first_img_src(html: &str) -> Option<String> {
    if !html.contains("<img") {
        return None;
    }
    let fragment = Html::parse_fragment(html);
    let selector = Selector::parse("img").ok()?;
    fragment
        .select(&selector)
        .find_map(|img| img.value().attr("src"))
        .map(|src| src.to_string())
}

/// Feeds disagree on date formats: RSS uses RFC 2822, Atom RFC 3339.
pub fn parse_feed_date(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn attr_value(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element.attributes().flatten().find_map(|attr| {
        if attr.key.as_ref() == name {
            String::from_utf8(attr.value.to_vec()).ok()
        } else {
            None
        }
    })
}

fn handle_media_tags(element: &BytesStart<'_>, builder: &mut ItemBuilder) {
    match element.name().as_ref() {
        b"media:content" => {
            let medium = attr_value(element, b"medium");
            let is_image = matches!(medium.as_deref(), Some("image") | None);
            if builder.media_image.is_none() && is_image {
                builder.media_image = attr_value(element, b"url");
            }
        }
        b"enclosure" => {
            let mime = attr_value(element, b"type").unwrap_or_default();
            if builder.enclosure_image.is_none() && mime.starts_with("image") {
                builder.enclosure_image = attr_value(element, b"url");
            }
        }
        b"link" => {
            // Atom carries the target in href rather than element text.
            if builder.link_href.is_none() {
                let rel = attr_value(element, b"rel");
                if matches!(rel.as_deref(), None | Some("alternate")) {
                    builder.link_href = attr_value(element, b"href");
                }
            }
        }
        _ => {}
    }
}

/// Parses an RSS 2.0 or Atom document. `limit` caps the returned items.
pub fn parse_feed(xml: &str, source: &str, limit: usize) -> Result<Vec<NewsItem>> {
    let mut reader = Reader::from_str(xml);
    let mut items = Vec::new();
    let mut builder: Option<ItemBuilder> = None;
    let mut field: Option<&'static str> = None;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = element.name();
                match name.as_ref() {
                    b"item" | b"entry" => {
                        builder = Some(ItemBuilder::default());
                    }
                    b"title" => field = builder.is_some().then_some("title"),
                    b"link" => {
                        if let Some(b) = builder.as_mut() {
                            handle_media_tags(&element, b);
                            field = Some("link");
                        }
                    }
                    b"description" => field = builder.is_some().then_some("description"),
                    b"summary" => field = builder.is_some().then_some("summary"),
                    b"content" | b"content:encoded" => {
                        field = builder.is_some().then_some("content")
                    }
                    b"pubDate" | b"published" | b"updated" => {
                        // First date element wins; RSS items carry only
                        // pubDate, Atom entries list published then updated.
                        let wants_date =
                            builder.as_ref().is_some_and(|b| b.date_text.is_empty());
                        field = wants_date.then_some("date");
                    }
                    _ => {
                        if let Some(b) = builder.as_mut() {
                            handle_media_tags(&element, b);
                        }
                    }
                }
            }
            Event::Empty(element) => {
                if let Some(b) = builder.as_mut() {
                    handle_media_tags(&element, b);
                }
            }
            Event::Text(text) => {
                if let (Some(b), Some(name)) = (builder.as_mut(), field) {
                    append_field(b, name, &text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let (Some(b), Some(name)) = (builder.as_mut(), field) {
                    append_field(b, name, &String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::End(element) => match element.name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(item) = builder.take().and_then(|b| b.finish(source)) {
                        items.push(item);
                        if items.len() >= limit {
                            break;
                        }
                    }
                }
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(items)
}

fn append_field(builder: &mut ItemBuilder, field: &str, value: &str) {
    let target = match field {
        "title" => &mut builder.title,
        "link" => &mut builder.link_text,
        "description" => &mut builder.description,
        "summary" => &mut builder.summary,
        "content" => &mut builder.content,
        "date" => &mut builder.date_text,
        _ => return,
    };
    target.push_str(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_truncates() {
        let description = format!("<p>Hello <b>world</b></p>{}", "x".repeat(400));
        let cleaned = clean_description(&description);
        assert!(cleaned.starts_with("Hello world"));
        assert_eq!(cleaned.chars().count(), 300);
    }

    #[test]
    fn img_extraction_finds_the_first_source() {
        let html = r#"<p>text</p><img src="https://cdn.example.com/a.jpg"><img src="b.jpg">"#;
        assert_eq!(
            first_img_src(html).as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
        assert_eq!(first_img_src("<p>no images</p>"), None);
    }

    #[test]
    fn both_feed_date_formats_parse() {
        assert!(parse_feed_date("Tue, 03 Mar 2026 09:15:00 +0000").is_some());
        assert!(parse_feed_date("2026-03-03T09:15:00Z").is_some());
        assert!(parse_feed_date("yesterday-ish").is_none());
    }
}
