// src/fetch/page.rs
// Ad-hoc webpage retrieval: browser-identifying GET with redirects, then
// best-effort content extraction. Readable regions are tried in order:
// <article>, then <main>, then every paragraph on the page.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;

use crate::error::PipelineError;
use crate::fetch::{normalize_text, truncate_chars};

/// Cap on extracted body text, to bound prompt size.
pub const PAGE_BODY_LIMIT: usize = 10_000;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static SEL_META_DESC: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static SEL_ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static SEL_MAIN: Lazy<Selector> = Lazy::new(|| Selector::parse("main").unwrap());
static SEL_PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub description: String,
    pub body: String,
}

/// Pure extraction step, separated from the network call so it can be tested
/// against arbitrary HTML.
pub fn extract_page(html: &str, url: &str) -> PageContent {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&SEL_TITLE)
        .next()
        .map(|e| normalize_text(&e.text().collect::<String>()))
        .unwrap_or_default();

    let description = doc
        .select(&SEL_META_DESC)
        .next()
        .and_then(|e| e.value().attr("content"))
        .map(normalize_text)
        .unwrap_or_default();

    let region_text = |sel: &Selector| -> Option<String> {
        doc.select(sel)
            .next()
            .map(|e| normalize_text(&e.text().collect::<Vec<_>>().join(" ")))
            .filter(|t| !t.is_empty())
    };

    let body = region_text(&SEL_ARTICLE)
        .or_else(|| region_text(&SEL_MAIN))
        .or_else(|| {
            let joined = doc
                .select(&SEL_PARAGRAPH)
                .map(|p| p.text().collect::<String>())
                .collect::<Vec<_>>()
                .join(" ");
            let t = normalize_text(&joined);
            (!t.is_empty()).then_some(t)
        })
        .unwrap_or_default();

    PageContent {
        url: url.to_string(),
        title,
        description,
        body: truncate_chars(&body, PAGE_BODY_LIMIT),
    }
}

pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_UA)
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self { client }
    }

    pub async fn fetch(&self, url: &str) -> Result<PageContent, PipelineError> {
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
        let html = resp
            .text()
            .await
            .map_err(|e| PipelineError::fetch_transport(&e))?;
        Ok(extract_page(&html, url))
    }
}
