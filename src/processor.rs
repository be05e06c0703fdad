use std::sync::LazyLock;

use pulldown_cmark::{Options, Parser, html};
use regex::Regex;

use crate::document::{ContentProcessor, strip_tags};

/// Paragraphs shorter than this (in characters) never open an excerpt.
pub const MIN_EXCERPT_PARAGRAPH: usize = 30;

/// Openers that make a paragraph useless as an excerpt.
const FILLER_OPENERS: &[&str] = &[
    "in this article",
    "in this post",
    "welcome to",
    "today we",
    "this article",
    "this post",
];

const ELLIPSIS: &str = "...";

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new($pattern).expect("static pattern is valid")
        });
    };
}

static_regex!(CODE_FENCE, r"(?s)(```|~~~).*?(```|~~~)");
static_regex!(IMAGE, r"!\[([^\]]*)\]\([^)]*\)");
static_regex!(LINK, r"\[([^\]]*)\]\([^)]*\)");
static_regex!(INLINE_CODE, r"`([^`]*)`");
static_regex!(HEADING_LINE, r"^\s{0,3}#{1,6}(\s|$)");
static_regex!(
    RULE_LINE,
    r"^\s*(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$"
);
static_regex!(LIST_MARKER, r"^\s*(?:[-*+]|\d+[.)])\s+");
static_regex!(QUOTE_MARKER, r"^\s*>\s?");
static_regex!(EDGE_UNDERSCORES, r"\b_+|_+\b");
static_regex!(BLANK_LINE, r"\n[ \t]*\n");
static_regex!(FIRST_H1, r"(?s)<h1([^>]*)>(.*?)</h1>");

/// Markdown implementation of [`ContentProcessor`].
///
/// Rendering uses pulldown-cmark with GitHub-flavoured extensions. Raw
/// HTML in the source passes through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownProcessor;

impl MarkdownProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentProcessor for MarkdownProcessor {
    fn render(&self, body: &str) -> String {
        render_markdown(body)
    }

    fn excerpt(&self, body: &str, max_len: usize) -> String {
        generate_excerpt(body, max_len)
    }

    fn demote_duplicate_heading(&self, title: &str, html: &str) -> String {
        demote_duplicate_heading(title, html)
    }
}

/// Render Markdown to HTML.
///
/// Supports tables, footnotes, strikethrough, task lists and heading
/// attributes.
pub fn render_markdown(raw: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES;

    let parser = Parser::new_ext(raw, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

/// Build a plain-text excerpt of at most `max_len + 3` characters.
///
/// Markup is stripped first, then whole paragraphs are collected, skipping
/// short or boilerplate ones. Text that is still too long is cut at a
/// sentence end near the limit, or at a word boundary, and gets `...`.
pub fn generate_excerpt(body: &str, max_len: usize) -> String {
    let cleaned = strip_markdown(body);
    let paragraphs: Vec<String> = BLANK_LINE
        .split(&cleaned)
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty())
        .collect();

    let mut excerpt = String::new();
    let mut excerpt_len = 0;
    for paragraph in paragraphs.iter().filter(|p| is_excerpt_worthy(p)) {
        let len = paragraph.chars().count();
        if excerpt_len > 0 && excerpt_len + 1 + len > max_len {
            break;
        }
        if excerpt_len > 0 {
            excerpt.push(' ');
            excerpt_len += 1;
        }
        excerpt.push_str(paragraph);
        excerpt_len += len;
        if excerpt_len >= max_len / 2 {
            break;
        }
    }

    // Nothing substantial survived: fall back to whatever text there is.
    if excerpt.is_empty() {
        excerpt = paragraphs.join(" ");
        excerpt_len = excerpt.chars().count();
    }

    if excerpt_len <= max_len {
        return excerpt;
    }
    truncate_excerpt(&excerpt, max_len)
}

fn is_excerpt_worthy(paragraph: &str) -> bool {
    if paragraph.chars().count() < MIN_EXCERPT_PARAGRAPH {
        return false;
    }
    let lower = paragraph.to_lowercase();
    !FILLER_OPENERS.iter().any(|opener| lower.starts_with(opener))
}

fn truncate_excerpt(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let truncated = &chars[..max_len.min(chars.len())];

    let quarter_start = max_len - max_len / 4;
    let sentence_end = (quarter_start..truncated.len()).rev().find(|&i| {
        matches!(truncated[i], '.' | '!' | '?')
            && !chars.get(i + 1).is_some_and(|next| next.is_uppercase())
    });

    let cut = match sentence_end {
        Some(i) => i + 1,
        None => (max_len / 2..truncated.len())
            .rev()
            .find(|&i| truncated[i].is_whitespace())
            .unwrap_or(truncated.len()),
    };

    let kept: String = truncated[..cut].iter().collect();
    let kept = kept.trim_end_matches(|c: char| {
        c.is_whitespace() || c.is_ascii_punctuation()
    });
    format!("{kept}{ELLIPSIS}")
}

/// Remove Markdown syntax, keeping the visible text and the blank lines
/// that separate paragraphs.
fn strip_markdown(body: &str) -> String {
    let without_fences = CODE_FENCE.replace_all(body, "\n");

    let lines: Vec<String> = without_fences
        .lines()
        .filter(|line| {
            !HEADING_LINE.is_match(line) && !RULE_LINE.is_match(line)
        })
        .map(|line| {
            let line = QUOTE_MARKER.replace(line, "");
            LIST_MARKER.replace(&line, "").into_owned()
        })
        .collect();
    let text = lines.join("\n");

    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = text.replace("**", "").replace("~~", "").replace('*', "");
    EDGE_UNDERSCORES.replace_all(&text, "").into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// If the first `<h1>` in `html` repeats `title`, turn that heading (and
/// only that one) into an `<h2>`.
pub fn demote_duplicate_heading(title: &str, html: &str) -> String {
    let title = normalize_heading_text(title);
    if title.is_empty() {
        return html.to_string();
    }

    let Some(caps) = FIRST_H1.captures(html) else {
        return html.to_string();
    };
    let (Some(whole), Some(attrs), Some(inner)) =
        (caps.get(0), caps.get(1), caps.get(2))
    else {
        return html.to_string();
    };

    let heading = normalize_heading_text(&decode_entities(&strip_tags(
        inner.as_str(),
    )));
    if heading != title {
        return html.to_string();
    }

    format!(
        "{}<h2{}>{}</h2>{}",
        &html[..whole.start()],
        attrs.as_str(),
        inner.as_str(),
        &html[whole.end()..]
    )
}

fn normalize_heading_text(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

/// Decode the entities pulldown-cmark emits for escaped text.
pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
