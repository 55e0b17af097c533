// src/generate/mod.rs
// Draft generation: one prompt per source kind, a single model call, then
// defensive extraction of the structured record from free text.

pub mod client;
pub mod extract;

use std::sync::Arc;

use crate::error::PipelineError;
use crate::fetch::feed::CandidateItem;
use crate::fetch::page::PageContent;
use client::ModelClient;
pub use extract::{extract_json_object, slugify, StructuredDraft};

/// Editorial voice applied identically across all source kinds.
pub const STYLE_GUIDE: &str = "\
Editorial style guide:\n\
- Voice: clear, direct, professional; no hype, no filler phrases.\n\
- Audience: curious general readers; explain jargon on first use.\n\
- Structure: strong lede, short paragraphs, descriptive subheadings in the body.\n\
- Body uses lightweight markup: ## for subheadings, **bold** for emphasis, plain paragraphs otherwise.\n\
- Always state why the story matters to the reader.";

const FORMAT_BLOCK: &str = "\
Return ONLY a single JSON object, no prose before or after it, with exactly these fields:\n\
{\"title\": string, \"slug\": string, \"excerpt\": string, \"body\": string, \"tag\": string, \
\"seo_title\": string, \"seo_description\": string, \"seo_keywords\": [string]}";

/// What the generator works from: a deduplicated feed item, a configured
/// theme or topic, or extracted page content.
#[derive(Debug)]
pub enum Material<'a> {
    FeedItem(&'a CandidateItem),
    Theme { description: &'a str },
    Topic { prompt: &'a str },
    Page(&'a PageContent),
}

/// One prompt per source kind. Every variant instructs the model to write an
/// original piece rather than a verbatim copy.
pub fn build_prompt(material: &Material<'_>, default_tag: &str) -> String {
    let role = "You are a staff writer for an online news publication.";
    let task = match material {
        Material::FeedItem(_) => {
            "Write an original news article inspired by the feed item below. \
             Do not copy its text; report the story in your own words and make \
             its relevance to our readers explicit."
        }
        Material::Theme { .. } => {
            "Write an original feature article for our recurring editorial theme \
             described below, and make its relevance to our readers explicit."
        }
        Material::Topic { .. } => {
            "Write an original, timely article on the topic brief below, and \
             make its relevance to our readers explicit."
        }
        Material::Page(_) => {
            "Write an original article covering the story on the web page below. \
             Do not copy its text; summarize, contextualize, and make its \
             relevance to our readers explicit."
        }
    };

    let context = match material {
        Material::FeedItem(item) => format!(
            "Feed item:\nTitle: {}\nLink: {}\nDescription: {}",
            item.title,
            item.link.as_deref().unwrap_or("(none)"),
            item.description
        ),
        Material::Theme { description } => format!("Editorial theme:\n{description}"),
        Material::Topic { prompt } => format!("Topic brief:\n{prompt}"),
        Material::Page(page) => format!(
            "Web page:\nTitle: {}\nURL: {}\nMeta description: {}\nExtracted text: {}",
            page.title, page.url, page.description, page.body
        ),
    };

    format!(
        "{role}\n\n{task}\n\n{STYLE_GUIDE}\n\n{context}\n\n\
         Preferred classification tag: {default_tag}\n\n{FORMAT_BLOCK}"
    )
}

pub struct Generator {
    model: Arc<dyn ModelClient>,
    max_tokens: u32,
}

impl Generator {
    pub fn new(model: Arc<dyn ModelClient>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    pub fn model(&self) -> &Arc<dyn ModelClient> {
        &self.model
    }

    /// Invoke the model and validate its response into a [`StructuredDraft`].
    /// Any failure (transport, upstream error, no parsable object, missing
    /// required fields) comes back as a single generation error.
    pub async fn generate(
        &self,
        material: &Material<'_>,
        default_tag: &str,
    ) -> Result<StructuredDraft, PipelineError> {
        let prompt = build_prompt(material, default_tag);
        let text = self.model.complete(&prompt, self.max_tokens).await?;

        let object = extract_json_object(&text).ok_or_else(|| {
            PipelineError::Generation("model response contained no JSON object".into())
        })?;
        let mut draft: StructuredDraft = serde_json::from_str(object)
            .map_err(|e| PipelineError::Generation(format!("model JSON did not parse: {e}")))?;

        if draft.title.trim().is_empty() {
            return Err(PipelineError::Generation("model omitted the title".into()));
        }
        if draft.body.trim().is_empty() {
            return Err(PipelineError::Generation("model omitted the body".into()));
        }
        if draft.slug.trim().is_empty() {
            draft.slug = slugify(&draft.title);
        }
        if draft.tag.trim().is_empty() {
            draft.tag = default_tag.to_string();
        }
        Ok(draft)
    }
}
