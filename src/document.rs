use std::{
    collections::BTreeMap,
    fmt,
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::processor::decode_entities;

/// Average reading speed used for the reading-time estimate.
pub const WORDS_PER_MINUTE: usize = 200;

/// Excerpt length, in characters, used when a document computes its own
/// excerpt.
pub const DEFAULT_EXCERPT_LENGTH: usize = 160;

/// Post kinds assigned by the parser when the header does not name one.
pub mod kinds {
    pub const ARTICLE: &str = "article";
    pub const LINK: &str = "link";
    pub const THOUGHT: &str = "thought";
}

/// Rendering capability attached to every document.
///
/// Documents call into this lazily and cache the results on themselves,
/// so any implementation must be deterministic for identical input.
/// Rendered output is trusted markup, not sanitized: presentation layers
/// must escape it again.
pub trait ContentProcessor: Send + Sync + fmt::Debug {
    /// Convert body markup to display HTML.
    fn render(&self, body: &str) -> String;

    /// Produce a plain-text excerpt of at most `max_len + 3` characters.
    fn excerpt(&self, body: &str, max_len: usize) -> String;

    /// Demote the first top-level heading of `html` when it repeats
    /// `title`.
    fn demote_duplicate_heading(&self, title: &str, html: &str) -> String;
}

/// One unit of content: header metadata plus body text.
///
/// Documents are built once by the parser and then shared behind `Arc`.
/// The rendered body, excerpt and search text are derived on first access
/// and cached on the instance; a reload replaces the instance instead of
/// invalidating the caches.
#[derive(Clone)]
pub struct Document {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub tags: Vec<Arc<str>>,
    pub categories: Vec<Arc<str>>,
    pub draft: bool,
    pub featured: bool,
    pub author: String,
    pub kind: String,
    pub link_url: Option<String>,
    /// Header keys this crate does not interpret, kept for consumers that
    /// do.
    pub extensions: BTreeMap<String, serde_yaml::Value>,
    pub body: String,
    pub word_count: usize,
    pub reading_time: usize,
    pub last_modified: DateTime<Utc>,
    /// File the document was loaded from, if any.
    pub source_path: Option<PathBuf>,

    processor: Arc<dyn ContentProcessor>,
    rendered: OnceLock<String>,
    excerpt: OnceLock<String>,
    search_text: OnceLock<String>,
}

impl Document {
    /// Build a document with empty metadata. The parser fills in the
    /// remaining public fields from the header.
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        date: DateTime<Utc>,
        processor: Arc<dyn ContentProcessor>,
    ) -> Self {
        let body = body.into();
        let word_count = word_count(&body);
        Self {
            slug: slug.into(),
            title: title.into(),
            description: String::new(),
            date,
            tags: Vec::new(),
            categories: Vec::new(),
            draft: false,
            featured: false,
            author: String::new(),
            kind: kinds::ARTICLE.to_string(),
            link_url: None,
            extensions: BTreeMap::new(),
            body,
            word_count,
            reading_time: reading_time(word_count),
            last_modified: date,
            source_path: None,
            processor,
            rendered: OnceLock::new(),
            excerpt: OnceLock::new(),
            search_text: OnceLock::new(),
        }
    }

    /// Record the file this document came from.
    pub fn with_source_path(mut self, path: PathBuf) -> Self {
        self.source_path = Some(path);
        self
    }

    /// Swap the processing capability. Cached derived fields are dropped
    /// since they came from the previous processor.
    pub fn with_processor(
        mut self,
        processor: Arc<dyn ContentProcessor>,
    ) -> Self {
        self.processor = processor;
        self.rendered = OnceLock::new();
        self.excerpt = OnceLock::new();
        self.search_text = OnceLock::new();
        self
    }

    /// A fresh instance identical to this one except for the draft flag.
    pub fn with_draft(&self, draft: bool) -> Self {
        let mut next = self.clone();
        next.draft = draft;
        next
    }

    /// Body rendered to HTML, with a heading that repeats the title
    /// demoted one level.
    pub fn rendered_body(&self) -> &str {
        self.rendered.get_or_init(|| {
            let html = self.processor.render(&self.body);
            self.processor.demote_duplicate_heading(&self.title, &html)
        })
    }

    /// Plain-text excerpt of the body.
    pub fn excerpt(&self) -> &str {
        self.excerpt.get_or_init(|| {
            self.processor.excerpt(&self.body, DEFAULT_EXCERPT_LENGTH)
        })
    }

    /// Lowercased rendered body with markup removed and entities
    /// decoded, used for body matching during search.
    pub fn search_text(&self) -> &str {
        self.search_text.get_or_init(|| {
            decode_entities(&strip_tags(self.rendered_body())).to_lowercase()
        })
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim()))
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.categories
            .iter()
            .any(|c| c.to_lowercase() == category.trim().to_lowercase())
    }

    /// Whether the document was published within `window` before `now`.
    pub fn is_recent(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.date > now - window
    }

    /// Serializable list view.
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            slug: self.slug.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            date: self.date,
            tags: self.tags.clone(),
            categories: self.categories.clone(),
            excerpt: self.excerpt().to_string(),
            reading_time: self.reading_time,
            featured: self.featured,
            draft: self.draft,
            kind: self.kind.clone(),
            link_url: self.link_url.clone(),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("slug", &self.slug)
            .field("title", &self.title)
            .field("date", &self.date)
            .field("tags", &self.tags)
            .field("categories", &self.categories)
            .field("draft", &self.draft)
            .field("featured", &self.featured)
            .field("kind", &self.kind)
            .field("word_count", &self.word_count)
            .finish_non_exhaustive()
    }
}

/// Simplified document for listings and JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub tags: Vec<Arc<str>>,
    pub categories: Vec<Arc<str>>,
    pub excerpt: String,
    pub reading_time: usize,
    pub featured: bool,
    pub draft: bool,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
}

/// Number of whitespace-delimited tokens in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Reading time in whole minutes, never less than one.
pub fn reading_time(word_count: usize) -> usize {
    (word_count / WORDS_PER_MINUTE).max(1)
}

/// Remove anything between `<` and `>`.
pub(crate) fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
