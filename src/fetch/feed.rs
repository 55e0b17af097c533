// src/fetch/feed.rs
// Feed retrieval: one GET, then a tag-based parse that tolerates both RSS
// (`item`/`title`/`link`/`description`/`pubDate`) and Atom (`entry`/`title`/
// link-with-href/`summary`|`content`/`published`|`updated`) shapes without
// committing to either schema.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::error::PipelineError;
use crate::fetch::normalize_text;

/// Only the head of a feed is interesting; anything older has been seen on a
/// previous run or predates the source's registration.
pub const MAX_FEED_ENTRIES: usize = 10;

/// Ephemeral unit extracted from a feed. Becomes a draft or is discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
    pub title: String,
    pub link: Option<String>,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Description,
    Published,
}

#[derive(Default)]
struct PartialItem {
    title: String,
    link: Option<String>,
    description: String,
    published: Option<String>,
}

fn field_for(tag: &[u8]) -> Option<Field> {
    match tag {
        b"title" => Some(Field::Title),
        b"link" => Some(Field::Link),
        // `encoded` is content:encoded with the prefix stripped.
        b"description" | b"summary" | b"content" | b"encoded" => Some(Field::Description),
        b"pubDate" | b"published" | b"updated" => Some(Field::Published),
        _ => None,
    }
}

/// Atom carries the link in an `href` attribute; accept it unless the entry
/// marks it as something other than the alternate representation.
fn href_attr(e: &BytesStart) -> Option<String> {
    let mut href = None;
    let mut rel_ok = true;
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"href" => href = attr.unescape_value().ok().map(|v| v.into_owned()),
            b"rel" => rel_ok = matches!(attr.value.as_ref(), b"alternate"),
            _ => {}
        }
    }
    if rel_ok {
        href
    } else {
        None
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        let unix = dt.to_offset(UtcOffset::UTC).unix_timestamp();
        return DateTime::<Utc>::from_timestamp(unix, 0);
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Real-world feeds embed bare HTML entities that are not legal XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

/// Parse up to [`MAX_FEED_ENTRIES`] candidate items out of RSS/Atom text.
/// Entries lacking both a title and a link are discarded.
pub fn parse_feed(xml: &str) -> Result<Vec<CandidateItem>> {
    let clean = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&clean);
    reader.config_mut().trim_text(true);

    let mut items: Vec<CandidateItem> = Vec::new();
    let mut in_entry = false;
    let mut field: Option<Field> = None;
    let mut cur = PartialItem::default();
    let mut text = String::new();

    loop {
        match reader.read_event().context("reading feed xml")? {
            Event::Start(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"item" | b"entry" => {
                        in_entry = true;
                        cur = PartialItem::default();
                    }
                    tag if in_entry => {
                        if let Some(f) = field_for(tag) {
                            field = Some(f);
                            text.clear();
                            if f == Field::Link && cur.link.is_none() {
                                cur.link = href_attr(&e);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if in_entry && e.local_name().as_ref() == b"link" && cur.link.is_none() {
                    cur.link = href_attr(&e);
                }
            }
            Event::Text(t) => {
                if in_entry && field.is_some() {
                    match t.unescape() {
                        Ok(s) => text.push_str(&s),
                        // Unknown entity; keep the raw bytes rather than drop the entry.
                        Err(_) => text.push_str(&String::from_utf8_lossy(t.as_ref())),
                    }
                }
            }
            Event::CData(t) => {
                if in_entry && field.is_some() {
                    text.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"item" | b"entry" => {
                        in_entry = false;
                        if let Some(item) = finish_item(std::mem::take(&mut cur)) {
                            items.push(item);
                            if items.len() >= MAX_FEED_ENTRIES {
                                break;
                            }
                        }
                    }
                    tag if in_entry => {
                        if let Some(f) = field {
                            if field_for(tag) == Some(f) {
                                assign_field(&mut cur, f, &text);
                                field = None;
                                text.clear();
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(items)
}

fn assign_field(cur: &mut PartialItem, field: Field, raw: &str) {
    match field {
        Field::Title => {
            if cur.title.is_empty() {
                cur.title = normalize_text(raw);
            }
        }
        Field::Link => {
            let v = raw.trim();
            if cur.link.is_none() && !v.is_empty() {
                cur.link = Some(v.to_string());
            }
        }
        Field::Description => {
            if cur.description.is_empty() {
                cur.description = normalize_text(raw);
            }
        }
        Field::Published => {
            if cur.published.is_none() && !raw.trim().is_empty() {
                cur.published = Some(raw.trim().to_string());
            }
        }
    }
}

fn finish_item(cur: PartialItem) -> Option<CandidateItem> {
    if cur.title.is_empty() && cur.link.is_none() {
        return None;
    }
    Some(CandidateItem {
        title: cur.title,
        link: cur.link,
        description: cur.description,
        published_at: cur.published.as_deref().and_then(parse_date),
    })
}

pub struct FeedFetcher {
    client: reqwest::Client,
}

impl FeedFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("newsforge/0.1 (+https://github.com/newsforge)")
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self { client }
    }

    /// GET the feed URL and parse its head. Any failure becomes a fetch
    /// error for this source; the caller records it and moves on.
    pub async fn fetch(&self, url: &str) -> Result<Vec<CandidateItem>, PipelineError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::fetch_transport(&e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::fetch_status(status.as_u16()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| PipelineError::fetch_transport(&e))?;
        parse_feed(&body).map_err(|e| PipelineError::Fetch {
            status: None,
            message: format!("feed parse failed: {e:#}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rss_items_parse_with_cdata_and_entities() {
        let xml = r#"<?xml version="1.0"?>
            <rss><channel>
              <title>Chan</title>
              <item>
                <title><![CDATA[First &amp; Foremost]]></title>
                <link>https://example.com/a</link>
                <description>Body &nbsp;text</description>
                <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
              </item>
            </channel></rss>"#;
        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "First & Foremost");
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/a"));
        assert_eq!(items[0].description, "Body text");
        assert!(items[0].published_at.is_some());
    }

    #[test]
    fn atom_entries_take_href_links_and_rfc3339_dates() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
              <title>Feed title</title>
              <entry>
                <title>Atom entry</title>
                <link rel="self" href="https://example.com/self"/>
                <link href="https://example.com/entry"/>
                <summary>short summary</summary>
                <updated>2025-01-06T10:00:00Z</updated>
              </entry>
            </feed>"#;
        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/entry"));
        assert_eq!(items[0].description, "short summary");
        assert!(items[0].published_at.is_some());
    }

    #[test]
    fn entries_without_title_and_link_are_dropped() {
        let xml = r#"<rss><channel>
              <item><description>orphan</description></item>
              <item><title>kept</title></item>
            </channel></rss>"#;
        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "kept");
        assert!(items[0].link.is_none());
    }

    #[test]
    fn parse_stops_at_ten_entries() {
        let mut xml = String::from("<rss><channel>");
        for i in 0..25 {
            xml.push_str(&format!(
                "<item><title>t{i}</title><link>https://e.com/{i}</link></item>"
            ));
        }
        xml.push_str("</channel></rss>");
        let items = parse_feed(&xml).unwrap();
        assert_eq!(items.len(), MAX_FEED_ENTRIES);
        assert_eq!(items[0].title, "t0");
    }
}
