//! Turns raw document text into a [`Document`].
//!
//! A document may open with a YAML header fenced by `---` lines:
//!
//! ```text
//! ---
//! title: Go Concurrency Patterns
//! date: 2024-03-01
//! tags: [go, concurrency]
//! ---
//! Body text in Markdown.
//! ```
//!
//! Without an opening fence the whole text is body and the title is
//! derived from the slug.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de};
use serde_yaml::{Mapping, Value};

use crate::{
    document::{ContentProcessor, Document, kinds},
    error::{Error, Result},
    intern::intern,
};

const FENCE: &str = "---";

/// Word count under which an untitled document is treated as a thought.
const THOUGHT_MAX_WORDS: usize = 100;

/// Header fields recognized by the parser.
///
/// Text fields accept any scalar, so `title: 1984` or `tags: [books,
/// 2024]` read as text rather than failing on the number.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    #[serde(deserialize_with = "scalar_text")]
    slug: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    title: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    description: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    author: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    date: Option<String>,
    #[serde(deserialize_with = "text_list")]
    tags: Option<Vec<String>>,
    #[serde(alias = "category", deserialize_with = "text_list")]
    categories: Option<Vec<String>>,
    draft: Option<bool>,
    featured: Option<bool>,
    #[serde(rename = "type", deserialize_with = "scalar_text")]
    kind: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    link_url: Option<String>,
    #[serde(flatten)]
    extensions: BTreeMap<String, Value>,
}

/// Text of a scalar YAML value; `None` for null and non-scalars.
fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn scalar_text<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => scalar_to_string(value)
            .map(Some)
            .ok_or_else(|| de::Error::custom("expected a single value")),
    }
}

/// `tags: [a, b]` or `tags: "a, b"`.
fn text_list<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Sequence(items) => items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| {
                scalar_to_string(item).ok_or_else(|| {
                    de::Error::custom("expected a list of values")
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Some),
        value => scalar_to_string(value)
            .map(|joined| {
                Some(joined.split(',').map(str::to_string).collect())
            })
            .ok_or_else(|| de::Error::custom("expected a list of values")),
    }
}

/// Parse `raw` into a document identified by `slug`.
///
/// `last_modified` is the backing file's modification time; it also
/// stands in for the publication date when the header has none. A
/// header that fails to parse is an [`Error::InvalidMetadata`].
pub fn parse_document(
    slug: &str,
    raw: &str,
    last_modified: DateTime<Utc>,
    processor: Arc<dyn ContentProcessor>,
) -> Result<Document> {
    let (front, body) = match split_front_matter(raw) {
        Some((header, body)) => match read_header(slug, header)? {
            Some(front) => (front, body),
            None => (FrontMatter::default(), raw),
        },
        None => (FrontMatter::default(), raw),
    };

    let slug = non_empty(front.slug).unwrap_or_else(|| slug.to_string());
    let explicit_title = non_empty(front.title);
    let has_title = explicit_title.is_some();
    let title = explicit_title.unwrap_or_else(|| default_title(&slug));

    let date = match non_empty(front.date) {
        Some(raw_date) => {
            parse_date(&raw_date).ok_or_else(|| Error::InvalidMetadata {
                slug: slug.clone(),
                reason: format!("unrecognized date {raw_date:?}"),
            })?
        }
        None => last_modified,
    };

    let mut doc = Document::new(slug, title, body.trim(), date, processor);
    doc.description = front.description.unwrap_or_default().trim().into();
    doc.author = front.author.unwrap_or_default().trim().into();
    doc.tags = normalize_tags(front.tags);
    doc.categories = normalize_categories(front.categories);
    doc.draft = front.draft.unwrap_or(false);
    doc.featured = front.featured.unwrap_or(false);
    doc.link_url = non_empty(front.link_url);
    doc.kind = infer_kind(
        non_empty(front.kind),
        doc.link_url.is_some(),
        has_title,
        doc.word_count,
    );
    doc.extensions = front.extensions;
    doc.last_modified = last_modified;

    Ok(doc)
}

/// Split `raw` into `(header, body)` when it opens with a fence line and
/// a second fence line closes the header.
fn split_front_matter(raw: &str) -> Option<(&str, &str)> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let (first, rest) = raw.split_once('\n')?;
    if first.trim_end() != FENCE {
        return None;
    }

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parse the fenced block. `Ok(None)` means the block is not a key-value
/// header at all (for example prose between two horizontal rules), so
/// the caller treats the whole text as body.
fn read_header(slug: &str, header: &str) -> Result<Option<FrontMatter>> {
    let invalid = |e: serde_yaml::Error| Error::InvalidMetadata {
        slug: slug.to_string(),
        reason: e.to_string(),
    };

    if header.trim().is_empty() {
        return Ok(Some(FrontMatter::default()));
    }

    let value: Value = serde_yaml::from_str(header).map_err(invalid)?;
    match value {
        Value::Null => Ok(Some(FrontMatter::default())),
        Value::Mapping(_) => {
            serde_yaml::from_value(value).map(Some).map_err(invalid)
        }
        _ => Ok(None),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Title derived from an identifier: `go-concurrency_patterns` becomes
/// `Go Concurrency Patterns`.
pub fn default_title(slug: &str) -> String {
    slug.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Parse a header date. Date-only values are taken as midnight UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
    {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Trim, lowercase and deduplicate tags, keeping first-seen order.
fn normalize_tags(values: Option<Vec<String>>) -> Vec<Arc<str>> {
    let mut out: Vec<Arc<str>> = Vec::new();
    for value in values.unwrap_or_default() {
        let tag = value.trim().to_lowercase();
        if tag.is_empty() || out.iter().any(|t| **t == *tag) {
            continue;
        }
        out.push(intern(&tag));
    }
    out
}

/// Trim and deduplicate categories case-insensitively, keeping the first
/// spelling seen.
fn normalize_categories(values: Option<Vec<String>>) -> Vec<Arc<str>> {
    let mut out: Vec<Arc<str>> = Vec::new();
    for value in values.unwrap_or_default() {
        let category = value.trim();
        if category.is_empty()
            || out.iter().any(|c| c.to_lowercase() == category.to_lowercase())
        {
            continue;
        }
        out.push(intern(category));
    }
    out
}

fn infer_kind(
    explicit: Option<String>,
    has_link: bool,
    has_title: bool,
    word_count: usize,
) -> String {
    if let Some(kind) = explicit {
        return kind;
    }
    if has_link {
        kinds::LINK.to_string()
    } else if !has_title && word_count < THOUGHT_MAX_WORDS {
        kinds::THOUGHT.to_string()
    } else {
        kinds::ARTICLE.to_string()
    }
}

/// Return `raw` with its header's `draft` key set to `draft`, creating a
/// header when there is none. Every other key and the body are kept.
pub fn set_draft_flag(slug: &str, raw: &str, draft: bool) -> Result<String> {
    let (mut header, body) = match split_front_matter(raw) {
        Some((header, body)) if header.trim().is_empty() => {
            (Mapping::new(), body)
        }
        Some((header, body)) => {
            let value: Value =
                serde_yaml::from_str(header).map_err(|e| {
                    Error::InvalidMetadata {
                        slug: slug.to_string(),
                        reason: e.to_string(),
                    }
                })?;
            match value {
                Value::Mapping(mapping) => (mapping, body),
                Value::Null => (Mapping::new(), body),
                _ => (Mapping::new(), raw),
            }
        }
        None => (Mapping::new(), raw),
    };

    header.insert(Value::String("draft".into()), Value::Bool(draft));
    let yaml = serde_yaml::to_string(&header)?;
    Ok(format!("{FENCE}\n{yaml}{FENCE}\n{body}"))
}
