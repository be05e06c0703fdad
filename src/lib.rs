//! quire - a file-backed content store with in-process full-text search.
//!
//! quire loads a directory of Markdown documents with YAML headers into
//! an immutable in-memory snapshot, answers lookups, listings and
//! aggregates from it, and ranks documents against free-text queries
//! with field-weighted scoring. Reloads build a new snapshot and swap it
//! in atomically, so readers never see a half-loaded collection.
//!
//! # Quick start
//!
//! ```no_run
//! use quire::{ContentDir, ContentService};
//!
//! let content_dir = ContentDir::resolve(None).unwrap();
//! let service = ContentService::open(content_dir.root()).unwrap();
//!
//! for hit in service.search("rust ownership", 10) {
//!     println!("{} (score: {:.2})", hit.document.title, hit.score);
//! }
//!
//! let doc = service.get_by_slug("hello-world").unwrap();
//! println!("{}", doc.rendered_body());
//! ```

pub mod cache;
pub mod content_dir;
pub mod document;
pub mod error;
pub mod intern;
pub mod parser;
pub mod processor;
pub mod search;
pub mod service;
pub mod store;
pub mod walker;

pub use cache::{CacheConfig, SearchCache};
pub use content_dir::ContentDir;
pub use document::{ContentProcessor, Document, DocumentSummary};
pub use error::{Error, Result};
pub use parser::parse_document;
pub use processor::MarkdownProcessor;
pub use search::{SearchEngine, SearchFilters, SearchResult};
pub use service::ContentService;
pub use store::{ContentStore, Snapshot};
