//! Read and search surface over a [`ContentStore`].
//!
//! Searches run against the store's current published list and go
//! through a [`SearchCache`]. Every change to the content (reload,
//! publish, unpublish) clears the cache before returning, so a cached
//! result never outlives the snapshot it was computed from.

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::{
    cache::{
        CacheConfig,
        CacheKey,
        CacheStats,
        CachedValue,
        QueryKind,
        SearchCache,
    },
    document::Document,
    error::Result,
    search::{SearchEngine, SearchFilters, SearchPage, SearchResult},
    store::{CategoryCount, ContentStore, StoreStats, TagCount},
};

#[derive(Debug)]
pub struct ContentService {
    store: ContentStore,
    engine: SearchEngine,
    cache: Arc<SearchCache>,
}

impl ContentService {
    /// Load `root` with the default cache settings.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(
            ContentStore::open(root)?,
            SearchEngine::new(),
            CacheConfig::default(),
        ))
    }

    pub fn new(
        store: ContentStore,
        engine: SearchEngine,
        cache: CacheConfig,
    ) -> Self {
        Self {
            store,
            engine,
            cache: Arc::new(SearchCache::new(cache)),
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Re-read the content directory. The cache is only cleared when the
    /// reload succeeds.
    pub fn reload(&self) -> Result<usize> {
        let count = self.store.reload()?;
        self.cache.clear();
        Ok(count)
    }

    pub fn publish(&self, slug: &str) -> Result<Arc<Document>> {
        let doc = self.store.publish(slug)?;
        self.cache.clear();
        Ok(doc)
    }

    pub fn unpublish(&self, slug: &str) -> Result<Arc<Document>> {
        let doc = self.store.unpublish(slug)?;
        self.cache.clear();
        Ok(doc)
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Arc<Document>> {
        self.store.get_by_slug(slug)
    }

    pub fn by_tag(&self, tag: &str) -> Vec<Arc<Document>> {
        self.store.by_tag(tag)
    }

    pub fn by_category(&self, category: &str) -> Vec<Arc<Document>> {
        self.store.by_category(category)
    }

    pub fn all(&self) -> Vec<Arc<Document>> {
        self.store.all()
    }

    pub fn recent(&self, limit: usize) -> Vec<Arc<Document>> {
        self.store.recent(limit)
    }

    pub fn featured(&self, limit: usize) -> Vec<Arc<Document>> {
        self.store.featured(limit)
    }

    pub fn tag_counts(&self) -> Vec<TagCount> {
        self.store.tag_counts()
    }

    pub fn category_counts(&self) -> Vec<CategoryCount> {
        self.store.category_counts()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn last_loaded(&self) -> Option<DateTime<Utc>> {
        self.store.last_loaded()
    }

    pub fn all_drafts(&self) -> Vec<Arc<Document>> {
        self.store.all_drafts()
    }

    pub fn draft_by_slug(&self, slug: &str) -> Result<Arc<Document>> {
        self.store.draft_by_slug(slug)
    }

    pub fn preview_draft(&self, slug: &str) -> Result<Arc<Document>> {
        self.store.preview_draft(slug)
    }

    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        self.cached_results(CacheKey::new(QueryKind::Search, query, limit), || {
            let snapshot = self.store.snapshot();
            self.engine.search(snapshot.published(), query, limit)
        })
    }

    pub fn search_in_title(
        &self,
        query: &str,
        limit: usize,
    ) -> Vec<SearchResult> {
        self.cached_results(CacheKey::new(QueryKind::Title, query, limit), || {
            let snapshot = self.store.snapshot();
            self.engine.search_in_title(snapshot.published(), query, limit)
        })
    }

    /// Filtered searches are not cached.
    pub fn search_with_filters(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Vec<SearchResult> {
        let snapshot = self.store.snapshot();
        self.engine
            .search_with_filters(snapshot.published(), query, filters)
    }

    pub fn search_paginated(
        &self,
        query: &str,
        page: usize,
        per_page: usize,
    ) -> SearchPage {
        let key = CacheKey::new(QueryKind::Page { page }, query, per_page);
        if let Some(CachedValue::Page(page)) = self.cache.get(&key) {
            return page;
        }

        let generation = self.cache.generation();
        let snapshot = self.store.snapshot();
        let result = self.engine.search_paginated(
            snapshot.published(),
            query,
            page,
            per_page,
        );
        self.cache
            .insert_at(generation, key, CachedValue::Page(result.clone()));
        result
    }

    pub fn suggestions(&self, query: &str, limit: usize) -> Vec<String> {
        let key = CacheKey::new(QueryKind::Suggestions, query, limit);
        if let Some(CachedValue::Suggestions(values)) = self.cache.get(&key) {
            return values;
        }

        let generation = self.cache.generation();
        let snapshot = self.store.snapshot();
        let values =
            self.engine.suggestions(query, snapshot.published(), limit);
        self.cache.insert_at(
            generation,
            key,
            CachedValue::Suggestions(values.clone()),
        );
        values
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Expire stale cache entries every `interval` in the background.
    /// Must be called from within a tokio runtime.
    pub fn spawn_cache_cleanup(&self, interval: Duration) -> JoinHandle<()> {
        self.cache.spawn_cleanup(interval)
    }

    /// The generation is read before `compute` takes its snapshot, so
    /// results from a snapshot that a reload has replaced are returned
    /// but never cached.
    fn cached_results(
        &self,
        key: CacheKey,
        compute: impl FnOnce() -> Vec<SearchResult>,
    ) -> Vec<SearchResult> {
        if let Some(CachedValue::Results(results)) = self.cache.get(&key) {
            return results;
        }
        let generation = self.cache.generation();
        let results = compute();
        self.cache.insert_at(
            generation,
            key,
            CachedValue::Results(results.clone()),
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        sync::{
            Barrier,
            atomic::{AtomicBool, Ordering},
        },
    };

    use super::*;
    use crate::{
        cache::DEFAULT_CLEANUP_INTERVAL,
        document::ContentProcessor,
        processor::MarkdownProcessor,
    };

    /// Markdown processor whose first excerpt after `arm` blocks until
    /// the test lets it go.
    #[derive(Debug)]
    struct GatedProcessor {
        inner: MarkdownProcessor,
        armed: AtomicBool,
        entered: Barrier,
        release: Barrier,
    }

    impl GatedProcessor {
        fn new() -> Self {
            Self {
                inner: MarkdownProcessor::new(),
                armed: AtomicBool::new(false),
                entered: Barrier::new(2),
                release: Barrier::new(2),
            }
        }

        fn arm(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }
    }

    impl ContentProcessor for GatedProcessor {
        fn render(&self, body: &str) -> String {
            self.inner.render(body)
        }

        fn excerpt(&self, body: &str, max_len: usize) -> String {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.wait();
                self.release.wait();
            }
            self.inner.excerpt(body, max_len)
        }

        fn demote_duplicate_heading(&self, title: &str, html: &str) -> String {
            self.inner.demote_duplicate_heading(title, html)
        }
    }

    fn fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("rust.md"),
            "---\ntitle: Rust Ownership\ndate: 2024-01-02\ntags: [rust]\n---\n\
             Borrowing rules.\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("go.md"),
            "---\ntitle: Go Channels\ndate: 2024-01-01\ntags: [go]\n---\n\
             Channels everywhere.\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("draft.md"),
            "---\ntitle: Rust Draft\ndraft: true\n---\nNot yet.\n",
        )
        .unwrap();
        tmp
    }

    #[test]
    fn repeated_search_hits_cache() {
        let tmp = fixture();
        let service = ContentService::open(tmp.path()).unwrap();

        let first = service.search("rust", 10);
        let second = service.search("  RUST ", 10);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(service.cache_stats().hits, 1);
        assert_eq!(service.cache_stats().misses, 1);
    }

    #[test]
    fn reload_clears_cache_and_sees_new_content() {
        let tmp = fixture();
        let service = ContentService::open(tmp.path()).unwrap();
        assert_eq!(service.search("rust", 0).len(), 1);

        fs::write(
            tmp.path().join("more.md"),
            "---\ntitle: More Rust\ndate: 2024-01-03\n---\nAgain.\n",
        )
        .unwrap();
        service.reload().unwrap();

        assert_eq!(service.cache_stats().entries, 0);
        assert_eq!(service.search("rust", 0).len(), 2);
    }

    #[test]
    fn search_racing_a_reload_does_not_cache_old_results() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("a.md"),
            "---\ntitle: Rust A\ndate: 2024-01-01\n---\nFirst.\n",
        )
        .unwrap();
        let processor = Arc::new(GatedProcessor::new());
        let service = ContentService::new(
            ContentStore::open_with_processor(tmp.path(), processor.clone())
                .unwrap(),
            SearchEngine::new(),
            CacheConfig::default(),
        );

        processor.arm();
        let in_flight = std::thread::scope(|scope| {
            let search = scope.spawn(|| service.search("rust", 0));

            // The search has its snapshot and is stuck scoring it.
            processor.entered.wait();
            fs::write(
                tmp.path().join("b.md"),
                "---\ntitle: Rust B\ndate: 2024-01-02\n---\nSecond.\n",
            )
            .unwrap();
            service.reload().unwrap();
            processor.release.wait();

            search.join().unwrap()
        });

        assert_eq!(in_flight.len(), 1);
        assert_eq!(service.cache_stats().entries, 0);
        assert_eq!(service.all().len(), 2);
        assert_eq!(service.search("rust", 0).len(), 2);
    }

    #[test]
    fn failed_reload_keeps_cache() {
        let tmp = fixture();
        let service = ContentService::open(tmp.path()).unwrap();
        service.search("rust", 0);

        let root = tmp.path().to_path_buf();
        drop(tmp);
        assert!(service.reload().is_err());
        assert_eq!(service.cache_stats().entries, 1);
        assert_eq!(service.store().root(), root);
        assert_eq!(service.all().len(), 2);
    }

    #[test]
    fn publish_invalidates_cached_results() {
        let tmp = fixture();
        let service = ContentService::open(tmp.path()).unwrap();
        assert_eq!(service.search_in_title("rust", 0).len(), 1);

        service.publish("draft").unwrap();
        assert_eq!(service.search_in_title("rust", 0).len(), 2);

        service.unpublish("draft").unwrap();
        assert_eq!(service.search_in_title("rust", 0).len(), 1);
    }

    #[test]
    fn suggestions_and_pages_are_cached() {
        let tmp = fixture();
        let service = ContentService::open(tmp.path()).unwrap();

        assert_eq!(service.suggestions("rus", 0), vec!["rust"]);
        assert_eq!(service.suggestions("rus", 0), vec!["rust"]);

        let page = service.search_paginated("channels", 1, 10);
        assert_eq!(page.results.len(), 1);
        let again = service.search_paginated("channels", 1, 10);
        assert_eq!(again.pagination, page.pagination);

        assert_eq!(service.cache_stats().hits, 2);
    }

    #[test]
    fn filtered_search_uses_published_documents() {
        let tmp = fixture();
        let service = ContentService::open(tmp.path()).unwrap();
        let filters = SearchFilters {
            tags: vec!["rust".into()],
            ..SearchFilters::default()
        };
        let results = service.search_with_filters("rust", &filters);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.slug, "rust");
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_task_runs_against_service_cache() {
        let tmp = fixture();
        let service = ContentService::new(
            ContentStore::open(tmp.path()).unwrap(),
            SearchEngine::new(),
            CacheConfig {
                ttl: Duration::from_secs(5),
                max_entries: 10,
            },
        );
        service.search("rust", 0);
        let _task = service.spawn_cache_cleanup(DEFAULT_CLEANUP_INTERVAL);

        tokio::time::sleep(DEFAULT_CLEANUP_INTERVAL + Duration::from_secs(1))
            .await;
        assert_eq!(service.cache_stats().entries, 0);
    }
}
