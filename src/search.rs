//! Field-weighted full-text search over a slice of documents.
//!
//! The engine holds no documents. Every call receives the slice to scan
//! (normally the store's published list) and keeps nothing from it after
//! returning.
//!
//! Scoring, per query token:
//!
//! | field                         | points                     |
//! |-------------------------------|----------------------------|
//! | title equals token            | 30                         |
//! | title starts with token       | 20                         |
//! | title contains token          | 15                         |
//! | description contains token    | 12                         |
//! | a tag contains token          | 10                         |
//! | a category contains token     | 8                          |
//! | excerpt contains token        | 5                          |
//! | body contains token           | 0.5 per hit, at most 10    |
//!
//! Multi-token queries get a phrase bonus (10 in the title, else 5 in the
//! excerpt). Featured documents are then multiplied by 1.2 and documents
//! from the last 30 days by 1.1.

use std::{
    cmp::Ordering,
    collections::BTreeSet,
    fmt,
    sync::Arc,
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::document::{Document, DocumentSummary};

pub const TITLE_EXACT: f64 = 30.0;
pub const TITLE_PREFIX: f64 = 20.0;
pub const TITLE_SUBSTRING: f64 = 15.0;
pub const DESCRIPTION: f64 = 12.0;
pub const TAG: f64 = 10.0;
pub const CATEGORY: f64 = 8.0;
pub const EXCERPT: f64 = 5.0;
pub const BODY_PER_HIT: f64 = 0.5;
pub const BODY_MAX_HITS: usize = 10;

pub const PHRASE_IN_TITLE: f64 = 10.0;
pub const PHRASE_IN_EXCERPT: f64 = 5.0;

pub const FEATURED_BOOST: f64 = 1.2;
pub const RECENT_BOOST: f64 = 1.1;
pub const RECENT_WINDOW_DAYS: i64 = 30;

/// Title-only scoring.
pub const TITLE_ONLY_MATCH: f64 = 10.0;
pub const TITLE_ONLY_PREFIX: f64 = 5.0;
pub const TITLE_ONLY_EXACT: f64 = 10.0;

pub const DEFAULT_PER_PAGE: usize = 10;

/// Tokens shorter than this many characters are dropped.
const MIN_TOKEN_CHARS: usize = 3;

const PUNCTUATION: &[char] = &[
    ',', '.', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '"', '\'',
    '-', '_',
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for",
    "of", "with", "by", "is", "are", "was", "were", "be", "been", "have",
    "has", "had", "do", "does", "did", "will", "would", "could", "should",
    "may", "might", "must", "can", "this", "that", "these", "those", "i",
    "you", "he", "she", "it", "we", "they", "me", "him", "her", "us",
    "them", "my", "your", "his", "its", "our", "their", "am", "as", "so",
    "no", "not", "up", "out", "if", "about", "who", "what", "where",
    "when", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "only", "own", "same", "than", "too",
    "very", "just", "now",
];

/// Document field that contributed to a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchedField {
    Title,
    Description,
    Tags,
    Categories,
    Excerpt,
    Body,
}

impl MatchedField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Tags => "tags",
            Self::Categories => "categories",
            Self::Excerpt => "excerpt",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for MatchedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Arc<Document>,
    pub score: f64,
    /// Fields that matched, in the order they first matched.
    pub matched_fields: Vec<MatchedField>,
}

impl SearchResult {
    pub fn hit(&self) -> SearchHit {
        SearchHit {
            document: self.document.summary(),
            score: self.score,
            matched_fields: self.matched_fields.clone(),
        }
    }
}

/// Serializable form of a [`SearchResult`].
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub document: DocumentSummary,
    pub score: f64,
    pub matched_fields: Vec<MatchedField>,
}

/// Restrictions applied before scoring.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Keep documents carrying any of these tags.
    pub tags: Vec<String>,
    /// Keep documents in any of these categories.
    pub categories: Vec<String>,
    /// Inclusive lower bound on the publication date.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the publication date.
    pub date_to: Option<DateTime<Utc>>,
    pub only_featured: bool,
}

impl SearchFilters {
    pub fn matches(&self, doc: &Document) -> bool {
        if self.only_featured && !doc.featured {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| doc.has_tag(t)) {
            return false;
        }
        if !self.categories.is_empty()
            && !self.categories.iter().any(|c| doc.in_category(c))
        {
            return false;
        }
        if self.date_from.is_some_and(|from| doc.date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| doc.date > to) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub per_page: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page: usize,
    pub next_page: usize,
}

impl Pagination {
    /// Page numbers are 1-based. `page` is clamped into range and a
    /// `per_page` of zero falls back to [`DEFAULT_PER_PAGE`]. There is
    /// always at least one page, even when it is empty.
    pub fn new(page: usize, total_items: usize, per_page: usize) -> Self {
        let per_page = if per_page == 0 { DEFAULT_PER_PAGE } else { per_page };
        let total_pages = total_items.div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        Self {
            current_page,
            total_pages,
            total_items,
            per_page,
            has_previous: current_page > 1,
            has_next: current_page < total_pages,
            previous_page: current_page.saturating_sub(1).max(1),
            next_page: (current_page + 1).min(total_pages),
        }
    }

    /// Index range of the current page within the full result list.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = (self.current_page - 1) * self.per_page;
        let end = (start + self.per_page).min(self.total_items);
        start.min(end)..end
    }
}

#[derive(Debug, Clone)]
pub struct SearchPage {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub pagination: Pagination,
}

/// Stateless scorer. The only configuration is the clock used for the
/// recency boost.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchEngine {
    now: Option<DateTime<Utc>>,
}

impl SearchEngine {
    /// Engine that reads the system clock on every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with a fixed "now", for reproducible recency boosts.
    pub fn with_now(now: DateTime<Utc>) -> Self {
        Self { now: Some(now) }
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// Rank `documents` against `query`. A `limit` of zero means no limit.
    ///
    /// Drafts and documents that match nothing are left out. Equal scores
    /// keep their relative order from `documents`.
    pub fn search(
        &self,
        documents: &[Arc<Document>],
        query: &str,
        limit: usize,
    ) -> Vec<SearchResult> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let now = self.now();
        let scored: Vec<SearchResult> = documents
            .iter()
            .filter(|doc| !doc.draft)
            .filter_map(|doc| score_document(doc, &tokens, now))
            .collect();
        rank(scored, limit)
    }

    /// Filter `documents` first, then search the rest without a limit.
    pub fn search_with_filters(
        &self,
        documents: &[Arc<Document>],
        query: &str,
        filters: &SearchFilters,
    ) -> Vec<SearchResult> {
        let filtered: Vec<Arc<Document>> = documents
            .iter()
            .filter(|doc| filters.matches(doc))
            .cloned()
            .collect();
        self.search(&filtered, query, 0)
    }

    /// One page of the full result list.
    pub fn search_paginated(
        &self,
        documents: &[Arc<Document>],
        query: &str,
        page: usize,
        per_page: usize,
    ) -> SearchPage {
        let mut all = self.search(documents, query, 0);
        let pagination = Pagination::new(page, all.len(), per_page);
        let results = all.drain(pagination.range()).collect();
        SearchPage {
            query: query.trim().to_lowercase(),
            results,
            pagination,
        }
    }

    /// Match the whole query against titles only.
    pub fn search_in_title(
        &self,
        documents: &[Arc<Document>],
        query: &str,
        limit: usize,
    ) -> Vec<SearchResult> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<SearchResult> = documents
            .iter()
            .filter(|doc| !doc.draft)
            .filter_map(|doc| {
                let title = doc.title.to_lowercase();
                if !title.contains(&query) {
                    return None;
                }
                let mut score = TITLE_ONLY_MATCH;
                if title.starts_with(&query) {
                    score += TITLE_ONLY_PREFIX;
                }
                if title == query {
                    score += TITLE_ONLY_EXACT;
                }
                Some(SearchResult {
                    document: Arc::clone(doc),
                    score,
                    matched_fields: vec![MatchedField::Title],
                })
            })
            .collect();

        results.sort_by(by_score_desc);
        if limit > 0 {
            results.truncate(limit);
        }
        results
    }

    /// Documents with a tag equal to `tag`, ignoring case.
    pub fn by_tag(
        &self,
        documents: &[Arc<Document>],
        tag: &str,
    ) -> Vec<Arc<Document>> {
        documents
            .iter()
            .filter(|doc| !doc.draft && doc.has_tag(tag))
            .cloned()
            .collect()
    }

    /// Documents in a category equal to `category`, ignoring case.
    pub fn by_category(
        &self,
        documents: &[Arc<Document>],
        category: &str,
    ) -> Vec<Arc<Document>> {
        documents
            .iter()
            .filter(|doc| !doc.draft && doc.in_category(category))
            .cloned()
            .collect()
    }

    /// Completion candidates: tags containing `query`, plus title words
    /// longer than three characters that contain it. Sorted, no
    /// duplicates; a `limit` of zero means no limit.
    pub fn suggestions(
        &self,
        query: &str,
        documents: &[Arc<Document>],
        limit: usize,
    ) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut found = BTreeSet::new();
        for doc in documents.iter().filter(|doc| !doc.draft) {
            for tag in &doc.tags {
                if tag.to_lowercase().contains(&query) {
                    found.insert(tag.to_string());
                }
            }
            if !doc.title.to_lowercase().contains(&query) {
                continue;
            }
            for word in tokenize(&doc.title) {
                if word.chars().count() > 3 && word.contains(&query) {
                    found.insert(word);
                }
            }
        }

        let limit = if limit == 0 { usize::MAX } else { limit };
        found.into_iter().take(limit).collect()
    }
}

/// Split a query into lowercase search tokens, dropping punctuation,
/// short tokens and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(PUNCTUATION, " ")
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|word| !is_stop_word(word))
        .map(str::to_string)
        .collect()
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

fn score_document(
    doc: &Arc<Document>,
    tokens: &[String],
    now: DateTime<Utc>,
) -> Option<SearchResult> {
    let title = doc.title.to_lowercase();
    let description = doc.description.to_lowercase();
    let excerpt = doc.excerpt().to_lowercase();
    let body = doc.search_text();

    let mut score = 0.0;
    let mut matched = Vec::new();

    for token in tokens {
        let token = token.as_str();

        if title.contains(token) {
            score += if title == token {
                TITLE_EXACT
            } else if title.starts_with(token) {
                TITLE_PREFIX
            } else {
                TITLE_SUBSTRING
            };
            note(&mut matched, MatchedField::Title);
        }

        if !description.is_empty() && description.contains(token) {
            score += DESCRIPTION;
            note(&mut matched, MatchedField::Description);
        }

        if doc.tags.iter().any(|tag| tag.to_lowercase().contains(token)) {
            score += TAG;
            note(&mut matched, MatchedField::Tags);
        }

        if doc
            .categories
            .iter()
            .any(|category| category.to_lowercase().contains(token))
        {
            score += CATEGORY;
            note(&mut matched, MatchedField::Categories);
        }

        if excerpt.contains(token) {
            score += EXCERPT;
            note(&mut matched, MatchedField::Excerpt);
        }

        let hits = body.matches(token).count().min(BODY_MAX_HITS);
        if hits > 0 {
            score += hits as f64 * BODY_PER_HIT;
            note(&mut matched, MatchedField::Body);
        }
    }

    if tokens.len() > 1 {
        let phrase = tokens.join(" ");
        if title.contains(&phrase) {
            score += PHRASE_IN_TITLE;
        } else if excerpt.contains(&phrase) {
            score += PHRASE_IN_EXCERPT;
        }
    }

    if score <= 0.0 {
        return None;
    }

    if doc.featured {
        score *= FEATURED_BOOST;
    }
    if doc.is_recent(now, Duration::days(RECENT_WINDOW_DAYS)) {
        score *= RECENT_BOOST;
    }

    Some(SearchResult {
        document: Arc::clone(doc),
        score,
        matched_fields: matched,
    })
}

fn note(matched: &mut Vec<MatchedField>, field: MatchedField) {
    if !matched.contains(&field) {
        matched.push(field);
    }
}

fn by_score_desc(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score.total_cmp(&a.score)
}

/// Order by score, keeping input order among equals.
///
/// With a limit, only the top `limit` positions are selected, by repeated
/// max extraction. Each candidate remembers its input position so that
/// swaps cannot disturb the tie order.
fn rank(results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    if limit == 0 || limit >= results.len() {
        let mut results = results;
        results.sort_by(by_score_desc);
        return results;
    }

    let mut indexed: Vec<(usize, SearchResult)> =
        results.into_iter().enumerate().collect();
    for slot in 0..limit {
        let mut best = slot;
        for candidate in slot + 1..indexed.len() {
            let (idx, result) = &indexed[candidate];
            let (best_idx, best_result) = &indexed[best];
            let better = match result.score.total_cmp(&best_result.score) {
                Ordering::Greater => true,
                Ordering::Equal => idx < best_idx,
                Ordering::Less => false,
            };
            if better {
                best = candidate;
            }
        }
        indexed.swap(slot, best);
    }

    indexed.truncate(limit);
    indexed.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{intern::intern, processor::MarkdownProcessor};

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn old_date() -> DateTime<Utc> {
        fixed_now() - Duration::days(365)
    }

    fn doc(slug: &str, title: &str, body: &str) -> Document {
        Document::new(
            slug,
            title,
            body,
            old_date(),
            Arc::new(MarkdownProcessor::new()),
        )
    }

    fn engine() -> SearchEngine {
        SearchEngine::with_now(fixed_now())
    }

    fn slugs(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.document.slug.as_str()).collect()
    }

    #[test]
    fn tokenize_drops_punctuation_short_words_and_stop_words() {
        assert_eq!(
            tokenize("The Go-Concurrency (patterns), is it FUN?"),
            vec!["concurrency", "patterns", "fun"]
        );
        assert!(tokenize("the a an of").is_empty());
        assert!(tokenize("").is_empty());
        assert_eq!(tokenize("snake_case"), vec!["snake", "case"]);
    }

    #[test]
    fn exact_title_outranks_substring_title() {
        let docs = vec![
            Arc::new(doc("practice", "Concurrency in Practice", "Threads.")),
            Arc::new(doc("patterns", "Go Concurrency Patterns", "Channels.")),
        ];
        let results = engine().search(&docs, "Go Concurrency Patterns", 0);
        assert_eq!(slugs(&results), vec!["patterns", "practice"]);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn exact_title_scores_strictly_higher_than_contained() {
        let exact = Arc::new(doc("a", "Rust", "Same body."));
        let contains = Arc::new(doc("b", "Learning Rust Today", "Same body."));
        let results = engine().search(&[contains, exact], "rust", 0);
        assert_eq!(slugs(&results), vec!["a", "b"]);
        assert_eq!(results[0].score, TITLE_EXACT);
        assert_eq!(results[1].score, TITLE_SUBSTRING);
    }

    #[test]
    fn tag_only_match_reports_only_tags() {
        let mut tagged = doc("ownership", "Memory Ownership", "Borrowing.");
        tagged.tags = vec![intern("rust"), intern("systems")];
        let results = engine().search(&[Arc::new(tagged)], "rust", 0);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].matched_fields, vec![MatchedField::Tags]);
        assert_eq!(results[0].score, TAG);
    }

    #[test]
    fn stop_word_queries_return_nothing() {
        let docs: Vec<_> = (0..20)
            .map(|i| Arc::new(doc(&format!("d{i}"), "The A", "the a the a")))
            .collect();
        assert!(engine().search(&docs, "the", 0).is_empty());
        assert!(engine().search(&docs, "a", 0).is_empty());
        assert!(engine().search(&docs, "  ", 0).is_empty());
    }

    #[test]
    fn matched_fields_follow_first_match_order() {
        let mut d =
            doc("x", "Tokio Runtime", "The tokio runtime schedules tasks.");
        d.description = "An async runtime".into();
        d.categories = vec![intern("Runtime")];
        let results = engine().search(&[Arc::new(d)], "runtime tokio", 0);
        assert_eq!(
            results[0].matched_fields,
            vec![
                MatchedField::Title,
                MatchedField::Description,
                MatchedField::Categories,
                MatchedField::Excerpt,
                MatchedField::Body,
            ]
        );
    }

    #[test]
    fn body_hits_are_capped() {
        let body = "needle ".repeat(50);
        let haystack = Arc::new(doc("n", "Haystack", &body));
        let results = engine().search(&[haystack], "needle", 0);
        // Excerpt (5) plus ten capped body hits (5).
        assert_eq!(results[0].score, EXCERPT + BODY_PER_HIT * 10.0);
    }

    #[test]
    fn escaped_characters_do_not_match_entity_names() {
        let d = doc("q", "Dialogue", "He said \"hi\" & left, 'quietly'.");
        let docs = vec![Arc::new(d)];
        assert!(engine().search(&docs, "quot", 0).is_empty());
        assert!(engine().search(&docs, "amp", 0).is_empty());
        assert_eq!(engine().search(&docs, "quietly", 0).len(), 1);
    }

    #[test]
    fn phrase_bonus_prefers_title() {
        let d = doc("p", "Async Rust Basics", "Nothing here.");
        let results = engine().search(&[Arc::new(d)], "async rust", 0);
        // Prefix 20 + substring 15 + phrase 10.
        assert_eq!(results[0].score, TITLE_PREFIX + TITLE_SUBSTRING + 10.0);
    }

    #[test]
    fn featured_boost_multiplies_score() {
        let plain = doc("plain", "Rust Notes", "Body.");
        let mut featured = plain.clone();
        featured.featured = true;

        let base = engine().search(&[Arc::new(plain)], "rust", 0)[0].score;
        let boosted =
            engine().search(&[Arc::new(featured)], "rust", 0)[0].score;
        assert!(boosted > base);
        assert!((boosted - base * FEATURED_BOOST).abs() < 1e-9);
    }

    #[test]
    fn recent_boost_applies_after_featured() {
        let mut d = doc("r", "Rust Notes", "Body.");
        d.featured = true;
        d.date = fixed_now() - Duration::days(3);
        let score = engine().search(&[Arc::new(d)], "rust", 0)[0].score;
        let expected = TITLE_PREFIX * FEATURED_BOOST * RECENT_BOOST;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn drafts_are_never_returned() {
        let mut draft = doc("draft", "Rust Draft", "rust");
        draft.draft = true;
        draft.tags = vec![intern("rust")];
        let docs = vec![Arc::new(draft)];

        assert!(engine().search(&docs, "rust", 0).is_empty());
        assert!(engine().search_in_title(&docs, "rust", 0).is_empty());
        assert!(engine().by_tag(&docs, "rust").is_empty());
        assert!(engine().suggestions("rust", &docs, 0).is_empty());
    }

    #[test]
    fn ties_keep_input_order() {
        let docs: Vec<_> = ["c", "a", "b"]
            .iter()
            .map(|s| Arc::new(doc(s, "Same Title", "Body.")))
            .collect();
        let all = engine().search(&docs, "title", 0);
        assert_eq!(slugs(&all), vec!["c", "a", "b"]);
        let top = engine().search(&docs, "title", 2);
        assert_eq!(slugs(&top), vec!["c", "a"]);
    }

    #[test]
    fn search_in_title_scores_whole_query() {
        let docs = vec![
            Arc::new(doc("sub", "Learning Go", "")),
            Arc::new(doc("prefix", "Go Basics", "")),
            Arc::new(doc("exact", "Go", "")),
            Arc::new(doc("none", "Rust", "")),
        ];
        let results = engine().search_in_title(&docs, " GO ", 0);
        assert_eq!(slugs(&results), vec!["exact", "prefix", "sub"]);
        let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![25.0, 15.0, 10.0]);
        assert_eq!(engine().search_in_title(&docs, "go", 1).len(), 1);
    }

    #[test]
    fn by_tag_and_category_are_exact() {
        let mut d = doc("x", "X", "");
        d.tags = vec![intern("rust")];
        d.categories = vec![intern("Programming")];
        let docs = vec![Arc::new(d)];

        assert_eq!(engine().by_tag(&docs, "RUST").len(), 1);
        assert!(engine().by_tag(&docs, "rus").is_empty());
        assert_eq!(engine().by_category(&docs, "programming").len(), 1);
        assert!(engine().by_category(&docs, "program").is_empty());
    }

    #[test]
    fn suggestions_merge_tags_and_title_words() {
        let mut a = doc("a", "Concurrency Patterns in Go", "");
        a.tags = vec![intern("concurrency"), intern("go")];
        let mut b = doc("b", "Concurrent Rust", "");
        b.tags = vec![intern("rust")];
        let docs = vec![Arc::new(a), Arc::new(b)];

        assert_eq!(
            engine().suggestions("CONCURR", &docs, 0),
            vec!["concurrency", "concurrent"]
        );
        assert_eq!(
            engine().suggestions("concurr", &docs, 1),
            vec!["concurrency"]
        );
        assert!(engine().suggestions("", &docs, 0).is_empty());
    }

    #[test]
    fn filters_narrow_before_scoring() {
        let mut a = doc("a", "Rust One", "");
        a.tags = vec![intern("rust")];
        a.featured = true;
        let mut b = doc("b", "Rust Two", "");
        b.tags = vec![intern("systems")];
        b.date = fixed_now();
        let docs = vec![Arc::new(a), Arc::new(b)];

        let by_tag = SearchFilters {
            tags: vec!["Systems".into()],
            ..SearchFilters::default()
        };
        let results = engine().search_with_filters(&docs, "rust", &by_tag);
        assert_eq!(slugs(&results), vec!["b"]);

        let featured = SearchFilters {
            only_featured: true,
            ..SearchFilters::default()
        };
        let results = engine().search_with_filters(&docs, "rust", &featured);
        assert_eq!(slugs(&results), vec!["a"]);

        let recent = SearchFilters {
            date_from: Some(fixed_now()),
            date_to: Some(fixed_now()),
            ..SearchFilters::default()
        };
        let results = engine().search_with_filters(&docs, "rust", &recent);
        assert_eq!(slugs(&results), vec!["b"]);
    }

    #[test]
    fn pagination_clamps_and_reports_neighbours() {
        let p = Pagination::new(2, 25, 10);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_previous && p.has_next);
        assert_eq!((p.previous_page, p.next_page), (1, 3));
        assert_eq!(p.range(), 10..20);

        let last = Pagination::new(99, 25, 10);
        assert_eq!(last.current_page, 3);
        assert_eq!(last.range(), 20..25);
        assert!(!last.has_next);

        let empty = Pagination::new(0, 0, 0);
        assert_eq!(empty.current_page, 1);
        assert_eq!(empty.total_pages, 1);
        assert_eq!(empty.per_page, DEFAULT_PER_PAGE);
        assert_eq!(empty.range(), 0..0);
    }

    #[test]
    fn paginated_search_slices_full_ranking() {
        let docs: Vec<_> = (0..5)
            .map(|i| Arc::new(doc(&format!("d{i}"), "Rust", "")))
            .collect();
        let page = engine().search_paginated(&docs, "Rust", 2, 2);
        assert_eq!(page.query, "rust");
        assert_eq!(slugs(&page.results), vec!["d2", "d3"]);
        assert_eq!(page.pagination.total_items, 5);
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[test]
    fn hit_serializes_matched_fields_lowercase() {
        let mut d = doc("x", "Rust", "");
        d.tags = vec![intern("rust")];
        let results = engine().search(&[Arc::new(d)], "rust", 0);
        let json = serde_json::to_value(results[0].hit()).unwrap();
        assert_eq!(json["slug"], "x");
        assert_eq!(json["matched_fields"][0], "title");
        assert_eq!(json["matched_fields"][1], "tags");
    }

    const WORDS: &[&str] =
        &["rust", "tokio", "async", "memory", "search", "index"];

    type Corpus = Vec<(usize, usize, usize, bool)>;

    fn corpus_strategy() -> impl Strategy<Value = Corpus> {
        prop::collection::vec(
            (0..WORDS.len(), 0..WORDS.len(), 0..4usize, any::<bool>()),
            0..25,
        )
    }

    proptest! {
        #[test]
        fn limited_search_equals_truncated_full_search(
            corpus in corpus_strategy(),
            query in 0..WORDS.len(),
            limit in 1usize..30,
        ) {
            let docs: Vec<Arc<Document>> = corpus
                .iter()
                .enumerate()
                .map(|(i, &(title, body, repeat, featured))| {
                    let mut d = doc(
                        &format!("d{i}"),
                        &format!("{} notes", WORDS[title]),
                        &format!("{} ", WORDS[body]).repeat(repeat),
                    );
                    d.featured = featured;
                    Arc::new(d)
                })
                .collect();

            let engine = engine();
            let full = engine.search(&docs, WORDS[query], 0);
            let top = engine.search(&docs, WORDS[query], limit);

            let expected: Vec<(&str, f64)> = full
                .iter()
                .take(limit)
                .map(|r| (r.document.slug.as_str(), r.score))
                .collect();
            let actual: Vec<(&str, f64)> = top
                .iter()
                .map(|r| (r.document.slug.as_str(), r.score))
                .collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
