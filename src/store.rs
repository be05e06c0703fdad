//! The in-memory content store.
//!
//! All documents live in one immutable [`Snapshot`] behind an
//! `RwLock<Arc<Snapshot>>`. Loading builds a complete replacement off to
//! the side and swaps the pointer, so readers always see either the old
//! or the new content in full. Writers (load, reload, publish,
//! unpublish) are serialized by a separate mutex that also holds the
//! content root.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    document::{ContentProcessor, Document, DocumentSummary},
    error::{Error, Result},
    parser::{parse_document, set_draft_flag},
    processor::MarkdownProcessor,
    walker::{self, ContentFile},
};

/// Number of tags reported in [`StoreStats::popular_tags`].
pub const POPULAR_TAGS: usize = 10;

/// Number of documents reported in [`StoreStats::recent`].
pub const RECENT_IN_STATS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: Arc<str>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: Arc<str>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub published: usize,
    pub drafts: usize,
    pub tags: usize,
    pub categories: usize,
    pub popular_tags: Vec<TagCount>,
    pub recent: Vec<DocumentSummary>,
    pub last_loaded: Option<DateTime<Utc>>,
}

/// One consistent view of the whole content set.
///
/// Published documents and drafts are both kept ordered by date
/// descending, then slug ascending. The tag and category indexes only
/// cover published documents.
#[derive(Debug, Default)]
pub struct Snapshot {
    by_slug: HashMap<String, Arc<Document>>,
    published: Vec<Arc<Document>>,
    drafts: Vec<Arc<Document>>,
    by_tag: HashMap<Arc<str>, Vec<Arc<Document>>>,
    /// Keyed by lowercased name; the value keeps the first spelling seen.
    by_category: HashMap<String, (Arc<str>, Vec<Arc<Document>>)>,
    loaded_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Index `documents`. Slugs must already be unique.
    pub fn build(
        mut documents: Vec<Arc<Document>>,
        loaded_at: Option<DateTime<Utc>>,
    ) -> Self {
        documents.sort_by(|a, b| {
            b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug))
        });

        let mut snapshot = Self {
            loaded_at,
            ..Self::default()
        };
        for doc in documents {
            snapshot.by_slug.insert(doc.slug.clone(), Arc::clone(&doc));
            if doc.draft {
                snapshot.drafts.push(doc);
                continue;
            }
            for tag in &doc.tags {
                snapshot
                    .by_tag
                    .entry(Arc::clone(tag))
                    .or_default()
                    .push(Arc::clone(&doc));
            }
            for category in &doc.categories {
                snapshot
                    .by_category
                    .entry(category.to_lowercase())
                    .or_insert_with(|| (Arc::clone(category), Vec::new()))
                    .1
                    .push(Arc::clone(&doc));
            }
            snapshot.published.push(doc);
        }
        snapshot
    }

    /// Any document, draft or not.
    pub fn get(&self, slug: &str) -> Option<&Arc<Document>> {
        self.by_slug.get(slug)
    }

    pub fn published(&self) -> &[Arc<Document>] {
        &self.published
    }

    pub fn drafts(&self) -> &[Arc<Document>] {
        &self.drafts
    }

    /// Published documents carrying `tag` (case-insensitive).
    pub fn by_tag(&self, tag: &str) -> &[Arc<Document>] {
        self.by_tag
            .get(tag.trim().to_lowercase().as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Published documents in `category` (case-insensitive).
    pub fn by_category(&self, category: &str) -> &[Arc<Document>] {
        self.by_category
            .get(&category.trim().to_lowercase())
            .map(|(_, docs)| docs.as_slice())
            .unwrap_or_default()
    }

    pub fn tag_counts(&self) -> Vec<TagCount> {
        let mut counts: Vec<TagCount> = self
            .by_tag
            .iter()
            .map(|(name, docs)| TagCount {
                name: Arc::clone(name),
                count: docs.len(),
            })
            .collect();
        counts.sort_by(|a, b| {
            b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name))
        });
        counts
    }

    pub fn category_counts(&self) -> Vec<CategoryCount> {
        let mut counts: Vec<CategoryCount> = self
            .by_category
            .values()
            .map(|(name, docs)| CategoryCount {
                name: Arc::clone(name),
                count: docs.len(),
            })
            .collect();
        counts.sort_by(|a, b| {
            b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name))
        });
        counts
    }

    pub fn all_tags(&self) -> Vec<Arc<str>> {
        let mut tags: Vec<_> = self.by_tag.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn all_categories(&self) -> Vec<Arc<str>> {
        let mut categories: Vec<_> = self
            .by_category
            .values()
            .map(|(name, _)| Arc::clone(name))
            .collect();
        categories.sort();
        categories
    }

    pub fn stats(&self) -> StoreStats {
        let mut popular_tags = self.tag_counts();
        popular_tags.truncate(POPULAR_TAGS);
        StoreStats {
            total: self.len(),
            published: self.published.len(),
            drafts: self.drafts.len(),
            tags: self.by_tag.len(),
            categories: self.by_category.len(),
            popular_tags,
            recent: self
                .published
                .iter()
                .take(RECENT_IN_STATS)
                .map(|doc| doc.summary())
                .collect(),
            last_loaded: self.loaded_at,
        }
    }

    /// When the content directory was last read successfully.
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Total documents, drafts included.
    pub fn len(&self) -> usize {
        self.by_slug.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slug.is_empty()
    }

    fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.by_slug.values()
    }
}

/// File-backed document store.
#[derive(Debug)]
pub struct ContentStore {
    processor: Arc<dyn ContentProcessor>,
    snapshot: RwLock<Arc<Snapshot>>,
    /// Content root. Holding the lock serializes every writer.
    root: Mutex<PathBuf>,
}

impl ContentStore {
    /// Load every document under `root` with the Markdown processor.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_processor(root, Arc::new(MarkdownProcessor::new()))
    }

    pub fn open_with_processor(
        root: impl Into<PathBuf>,
        processor: Arc<dyn ContentProcessor>,
    ) -> Result<Self> {
        let root = root.into();
        let store = Self {
            processor,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            root: Mutex::new(root.clone()),
        };
        store.load(&root)?;
        Ok(store)
    }

    /// Load from `path` and make it the root for later reloads.
    ///
    /// On failure the current snapshot and root stay in place.
    pub fn load(&self, path: &Path) -> Result<usize> {
        let mut root = self.root.lock();
        let count = self.load_from(path)?;
        *root = path.to_path_buf();
        Ok(count)
    }

    /// Re-read the content root and swap in the result.
    pub fn reload(&self) -> Result<usize> {
        let root = self.root.lock();
        self.load_from(&root)
    }

    pub fn root(&self) -> PathBuf {
        self.root.lock().clone()
    }

    /// Caller must hold `self.root`.
    fn load_from(&self, path: &Path) -> Result<usize> {
        let start = Instant::now();
        let files = walker::discover_files(path)?;

        // Read and parse in parallel; collect keeps walk order.
        let parsed: Vec<Document> = files
            .par_iter()
            .filter_map(|file| self.read_document(file))
            .collect();

        let mut seen = HashSet::new();
        let mut documents = Vec::with_capacity(parsed.len());
        for doc in parsed {
            if !seen.insert(doc.slug.clone()) {
                tracing::warn!(
                    slug = %doc.slug,
                    path = ?doc.source_path,
                    "Skipping document with duplicate slug"
                );
                continue;
            }
            documents.push(Arc::new(doc));
        }

        let snapshot = Snapshot::build(documents, Some(Utc::now()));
        let count = snapshot.len();
        tracing::info!(
            root = %path.display(),
            files = files.len(),
            published = snapshot.published().len(),
            drafts = snapshot.drafts().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded content"
        );
        self.swap(snapshot);
        Ok(count)
    }

    fn read_document(&self, file: &ContentFile) -> Option<Document> {
        let raw = match fs::read_to_string(&file.absolute_path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    path = %file.absolute_path.display(),
                    error = %e,
                    "Skipping unreadable file"
                );
                return None;
            }
        };

        let parsed = parse_document(
            &file.slug(),
            &raw,
            file.modified,
            Arc::clone(&self.processor),
        );
        match parsed {
            Ok(doc) => Some(doc.with_source_path(file.absolute_path.clone())),
            Err(e) => {
                tracing::warn!(
                    path = %file.absolute_path.display(),
                    error = %e,
                    "Skipping unparseable file"
                );
                None
            }
        }
    }

    fn swap(&self, snapshot: Snapshot) {
        *self.snapshot.write() = Arc::new(snapshot);
    }

    /// Handle to the current snapshot, for several reads that must agree
    /// with each other.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.snapshot.read())
    }

    /// A published document.
    pub fn get_by_slug(&self, slug: &str) -> Result<Arc<Document>> {
        self.snapshot()
            .get(slug)
            .filter(|doc| !doc.draft)
            .cloned()
            .ok_or_else(|| Error::document_not_found(slug))
    }

    pub fn by_tag(&self, tag: &str) -> Vec<Arc<Document>> {
        self.snapshot().by_tag(tag).to_vec()
    }

    pub fn by_category(&self, category: &str) -> Vec<Arc<Document>> {
        self.snapshot().by_category(category).to_vec()
    }

    /// Every published document, newest first.
    pub fn all(&self) -> Vec<Arc<Document>> {
        self.snapshot().published().to_vec()
    }

    pub fn tag_counts(&self) -> Vec<TagCount> {
        self.snapshot().tag_counts()
    }

    pub fn category_counts(&self) -> Vec<CategoryCount> {
        self.snapshot().category_counts()
    }

    pub fn all_tags(&self) -> Vec<Arc<str>> {
        self.snapshot().all_tags()
    }

    pub fn all_categories(&self) -> Vec<Arc<str>> {
        self.snapshot().all_categories()
    }

    pub fn stats(&self) -> StoreStats {
        self.snapshot().stats()
    }

    /// The `limit` newest published documents; `0` means all.
    pub fn recent(&self, limit: usize) -> Vec<Arc<Document>> {
        take(self.snapshot().published().iter(), limit)
    }

    /// The `limit` newest featured documents; `0` means all.
    pub fn featured(&self, limit: usize) -> Vec<Arc<Document>> {
        take(
            self.snapshot().published().iter().filter(|doc| doc.featured),
            limit,
        )
    }

    /// Number of published documents.
    pub fn len(&self) -> usize {
        self.snapshot().published().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_loaded(&self) -> Option<DateTime<Utc>> {
        self.snapshot().loaded_at()
    }

    /// A draft by slug. Published documents are not returned.
    pub fn draft_by_slug(&self, slug: &str) -> Result<Arc<Document>> {
        validate_slug(slug)?;
        self.snapshot()
            .get(slug)
            .filter(|doc| doc.draft)
            .cloned()
            .ok_or_else(|| Error::draft_not_found(slug))
    }

    pub fn all_drafts(&self) -> Vec<Arc<Document>> {
        self.snapshot().drafts().to_vec()
    }

    /// Any document by slug, whether draft or published.
    pub fn preview_draft(&self, slug: &str) -> Result<Arc<Document>> {
        validate_slug(slug)?;
        self.snapshot()
            .get(slug)
            .cloned()
            .ok_or_else(|| Error::document_not_found(slug))
    }

    /// Clear a draft's flag, on disk and in memory.
    pub fn publish(&self, slug: &str) -> Result<Arc<Document>> {
        self.set_draft(slug, false)
    }

    /// Turn a published document back into a draft.
    pub fn unpublish(&self, slug: &str) -> Result<Arc<Document>> {
        self.set_draft(slug, true)
    }

    fn set_draft(&self, slug: &str, draft: bool) -> Result<Arc<Document>> {
        validate_slug(slug)?;
        let _writer = self.root.lock();

        let current = self.snapshot();
        let existing = current
            .get(slug)
            .filter(|doc| doc.draft != draft)
            .ok_or_else(|| {
                if draft {
                    Error::document_not_found(slug)
                } else {
                    Error::draft_not_found(slug)
                }
            })?;

        if let Some(path) = &existing.source_path {
            let raw = fs::read_to_string(path)?;
            let rewritten = set_draft_flag(slug, &raw, draft)?;
            write_atomically(path, &rewritten)?;
        }

        let updated = Arc::new(existing.with_draft(draft));
        let documents = current
            .documents()
            .map(|doc| {
                if doc.slug == slug {
                    Arc::clone(&updated)
                } else {
                    Arc::clone(doc)
                }
            })
            .collect();
        self.swap(Snapshot::build(documents, current.loaded_at()));

        tracing::info!(slug, draft, "Updated draft flag");
        Ok(updated)
    }
}

fn take<'a>(
    docs: impl Iterator<Item = &'a Arc<Document>>,
    limit: usize,
) -> Vec<Arc<Document>> {
    let limit = if limit == 0 { usize::MAX } else { limit };
    docs.take(limit).cloned().collect()
}

/// Reject slugs that could address anything outside the content root.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.trim().is_empty()
        || slug.contains("..")
        || slug.contains('/')
        || slug.contains('\\')
    {
        return Err(Error::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
