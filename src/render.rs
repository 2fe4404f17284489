//! HTML rendering for posters and the daily digest.
//!
//! Templates are compiled into the binary and rendered with `minijinja`
//! (HTML auto-escaping on).

use crate::error::{Result, ScholarError};
use crate::model::{DEFAULT_ACCENT_COLOR, DEFAULT_HIGHLIGHT_BG, StructuredSummary};
use crate::scheduler::record::DigestRecord;
use minijinja::{Environment, context};
use serde::Serialize;

const POSTER_TEMPLATE: &str = "poster.html";
const DIGEST_TEMPLATE: &str = "digest.html";

/// Heading used when a digest has no articles.
pub const EMPTY_DIGEST_TITLE: &str = "Daily Research Digest";

/// Template renderer. Cheap to share behind an `Arc`.
pub struct Renderer {
    env: Environment<'static>,
}

#[derive(Debug, Serialize)]
struct FeaturedArticle<'a> {
    title: &'a str,
    authors: &'a str,
    key_insight: &'a str,
    image_url: &'a str,
}

#[derive(Debug, Serialize)]
struct DigestArticle<'a> {
    title: &'a str,
    authors: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
    image_url: &'a str,
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

impl Renderer {
    /// Compile the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Render`] when a template fails to compile.
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(POSTER_TEMPLATE, include_str!("../templates/poster.html"))
            .map_err(|e| ScholarError::Render(format!("poster template: {e}")))?;
        env.add_template(DIGEST_TEMPLATE, include_str!("../templates/digest.html"))
            .map_err(|e| ScholarError::Render(format!("digest template: {e}")))?;
        Ok(Self { env })
    }

    /// Render a single-paper poster.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Render`] on template evaluation failure.
    pub fn poster(&self, summary: &StructuredSummary) -> Result<String> {
        let title = or_default(&summary.title, "Untitled");
        let ctx = context! {
            page_title => or_default(&summary.title, "Paper Poster"),
            poster_title => title,
            one_sentence_summary => &summary.one_sentence_summary,
            key_innovations => &summary.key_innovations,
            impact_statement => &summary.impact_statement,
            tags => &summary.tags,
            accent_color => or_default(&summary.design_theme.accent_color, DEFAULT_ACCENT_COLOR),
            highlight_bg => or_default(&summary.design_theme.highlight_bg, DEFAULT_HIGHLIGHT_BG),
        };
        self.render(POSTER_TEMPLATE, ctx)
    }

    /// Render the newspaper-style digest page.
    ///
    /// The first card is featured with the hero image; other cards without
    /// their own image reuse the hero image.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Render`] on template evaluation failure.
    pub fn digest(&self, record: &DigestRecord) -> Result<String> {
        let hero = record.image_url.as_str();
        let featured = match record.items.first() {
            Some(first) => FeaturedArticle {
                title: &first.title,
                authors: &first.authors,
                key_insight: &first.summary,
                image_url: hero,
            },
            None => FeaturedArticle {
                title: EMPTY_DIGEST_TITLE,
                authors: "",
                key_insight: "Today's highlights",
                image_url: hero,
            },
        };
        let papers: Vec<DigestArticle<'_>> = record
            .items
            .iter()
            .skip(1)
            .map(|item| DigestArticle {
                title: or_default(&item.title, "Untitled"),
                authors: &item.authors,
                abstract_text: &item.summary,
                image_url: item.image_url.as_deref().unwrap_or(hero),
            })
            .collect();

        let ctx = context! {
            date => record.date.format("%A, %B %-d, %Y").to_string(),
            featured => featured,
            papers => papers,
        };
        self.render(DIGEST_TEMPLATE, ctx)
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        self.env
            .get_template(name)
            .and_then(|tpl| tpl.render(ctx))
            .map_err(|e| ScholarError::Render(format!("{name}: {e}")))
    }
}
