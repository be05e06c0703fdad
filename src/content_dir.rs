use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming the content directory.
pub const CONTENT_DIR_ENV: &str = "QUIRE_CONTENT_DIR";

/// Root of the markdown tree a store loads from.
///
/// Every slug is derived from a path relative to this root, so two runs
/// that resolve to the same directory serve the same documents.
#[derive(Debug, Clone)]
pub struct ContentDir {
    root: PathBuf,
}

impl ContentDir {
    /// Pick the content root. A `--content-dir` argument wins over
    /// `QUIRE_CONTENT_DIR`; with neither set the store reads
    /// `content/` under the user's XDG data home. A missing root is
    /// created empty so a fresh install starts with no documents.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(CONTENT_DIR_ENV) {
                Some(val) => PathBuf::from(val),
                None => default_root()?,
            },
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::ContentDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn default_root() -> Result<PathBuf> {
    let data_home = xdg::BaseDirectories::with_prefix("quire")
        .get_data_home()
        .ok_or_else(|| {
            Error::Config("no XDG data home to place content under".into())
        })?;
    Ok(data_home.join("content"))
}
