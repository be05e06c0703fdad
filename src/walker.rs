use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// A content file found under the content root.
#[derive(Debug, Clone)]
pub struct ContentFile {
    /// Path relative to the content root.
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub modified: DateTime<Utc>,
}

impl ContentFile {
    /// Identifier derived from the file name, e.g. `posts/hello.md` gives
    /// `hello`.
    pub fn slug(&self) -> String {
        self.relative_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Extensions recognized as Markdown content.
pub const CONTENT_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "mkd"];

/// Recursively collect content files under `root`, sorted by relative
/// path.
///
/// Hidden files and directories are skipped. Symlinked files are
/// followed; symlinked directories are not, which rules out cycles.
pub fn discover_files(root: &Path) -> Result<Vec<ContentFile>> {
    let canonical_root = root.canonicalize().map_err(|source| Error::Walk {
        path: root.to_path_buf(),
        source,
    })?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<ContentFile>,
) -> Result<()> {
    let walk_err = |source| Error::Walk {
        path: current.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(current).map_err(walk_err)? {
        let entry = entry.map_err(walk_err)?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type().map_err(walk_err)?;
        if file_type.is_dir() {
            walk_dir(root, &path, results)?;
            continue;
        }
        if !is_content_file(&path) {
            continue;
        }

        // Broken symlinks and files that vanish mid-walk are skipped.
        let Ok(metadata) = fs::metadata(&path) else {
            tracing::debug!(
                path = %path.display(),
                "Skipping unreadable entry"
            );
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        results.push(ContentFile {
            relative_path: path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_path_buf(),
            absolute_path: path,
            modified,
        });
    }

    Ok(())
}

/// Whether `path` carries one of the [`CONTENT_EXTENSIONS`].
pub fn is_content_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            CONTENT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(files: &[ContentFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.relative_path.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn discovers_markdown_variants_only() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["a.md", "b.markdown", "c.mdown", "d.mkd"] {
            std::fs::write(tmp.path().join(name), "# Hello").unwrap();
        }
        std::fs::write(tmp.path().join("readme.txt"), "Hello").unwrap();
        std::fs::write(tmp.path().join("image.png"), "binary").unwrap();

        let files = discover_files(tmp.path()).unwrap();
        assert_eq!(
            names(&files),
            vec!["a.md", "b.markdown", "c.mdown", "d.mkd"]
        );
    }

    #[test]
    fn skips_hidden_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let hidden = tmp.path().join(".git");
        std::fs::create_dir(&hidden).unwrap();
        std::fs::write(hidden.join("config.md"), "git config").unwrap();
        std::fs::write(tmp.path().join(".draft.md"), "secret").unwrap();
        std::fs::write(tmp.path().join("visible.md"), "hello").unwrap();

        let files = discover_files(tmp.path()).unwrap();
        assert_eq!(names(&files), vec!["visible.md"]);
    }

    #[test]
    fn recurses_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("posts");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("deep.md"), "deep").unwrap();
        std::fs::write(tmp.path().join("top.md"), "top").unwrap();

        let files = discover_files(tmp.path()).unwrap();
        assert_eq!(names(&files), vec!["posts/deep.md", "top.md"]);
        assert_eq!(files[0].slug(), "deep");
    }

    #[test]
    fn mtime_is_recent() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("file.md"), "content").unwrap();

        let files = discover_files(tmp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].modified > DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn results_are_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("z.md"), "z").unwrap();
        std::fs::write(tmp.path().join("a.md"), "a").unwrap();
        std::fs::write(tmp.path().join("m.md"), "m").unwrap();

        let files = discover_files(tmp.path()).unwrap();
        assert_eq!(names(&files), vec!["a.md", "m.md", "z.md"]);
    }

    #[test]
    fn empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_files(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_a_walk_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = discover_files(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Walk { .. }));
    }

    #[test]
    fn extension_check_ignores_case() {
        assert!(is_content_file(Path::new("post.MD")));
        assert!(!is_content_file(Path::new("post.txt")));
        assert!(!is_content_file(Path::new("md")));
    }
}
