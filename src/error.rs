use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot walk content directory {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata in '{slug}': {reason}")]
    InvalidMetadata { slug: String, reason: String },

    #[error("metadata serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid slug: {0:?}")]
    InvalidSlug(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("content directory does not exist and could not be created: {0}")]
    ContentDir(PathBuf),
}

impl Error {
    pub(crate) fn document_not_found(slug: &str) -> Self {
        Self::NotFound {
            kind: "document",
            name: slug.to_string(),
        }
    }

    pub(crate) fn draft_not_found(slug: &str) -> Self {
        Self::NotFound {
            kind: "draft",
            name: slug.to_string(),
        }
    }

    /// True for lookup misses, which callers present as "not found"
    /// rather than as a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
