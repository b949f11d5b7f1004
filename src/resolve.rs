//! Path resolution for the source and static trees.
//!
//! Turns a root directory plus a glob pattern into the list of files the rest
//! of the pipeline works with. Every match is reported twice: relative to the
//! root (forward slashes, used as the file's identity and output location)
//! and as an absolute path (used for reads and for matching watch events).
//!
//! ```text
//! resolve_paths("site/src", "**/*.html")
//!   site/src/index.html          → index.html
//!   site/src/blog/~layout.html   → blog/~layout.html
//!   site/src/blog/post.html      → blog/post.html
//! ```
//!
//! A match whose relative path needs a `..` segment lies outside the root and
//! is rejected with [`ResolveError::PathEscape`]. That check is never relaxed.
//!
//! The module also carries the lexical path helpers ([`normalize`],
//! [`relative_to`], [`to_slash`]) the composer uses to rewrite `%{path …}`
//! directives. None of them touch the filesystem.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Glob used to collect template files under the source root.
pub const SOURCE_PATTERN: &str = "**/*.html";

/// Glob used to collect assets under the static root.
pub const STATIC_PATTERN: &str = "**/*";

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Path {} is not contained in {}", .path.display(), .root.display())]
    PathEscape { path: PathBuf, root: PathBuf },
    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("Could not read directory entry: {0}")]
    Glob(#[from] glob::GlobError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file matched under a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Path relative to the root, `/`-separated.
    pub relative: String,
    /// Absolute, lexically normalized path.
    pub absolute: PathBuf,
}

/// Resolve every regular file under `root` matching `pattern`.
///
/// Results come back in the glob crate's listing order (sorted), which the
/// dependency graph and the batch build both rely on for deterministic
/// output. Directories matched by the pattern are skipped.
pub fn resolve_paths(root: &Path, pattern: &str) -> Result<Vec<ResolvedPath>, ResolveError> {
    let root = if root.as_os_str().is_empty() {
        Path::new(".")
    } else {
        root
    };
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let full_pattern = format!("{}/{}", escaped_root.trim_end_matches(['/', '\\']), pattern);

    let norm_root = normalize(root);
    let mut resolved = Vec::new();

    for entry in glob::glob(&full_pattern)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        resolved.push(resolve_one(&norm_root, &path)?);
    }

    Ok(resolved)
}

fn resolve_one(norm_root: &Path, path: &Path) -> Result<ResolvedPath, ResolveError> {
    let escape = || ResolveError::PathEscape {
        path: path.to_path_buf(),
        root: norm_root.to_path_buf(),
    };

    let relative = normalize(path)
        .strip_prefix(norm_root)
        .map(Path::to_path_buf)
        .map_err(|_| escape())?;
    if has_parent_segment(&relative) || relative.as_os_str().is_empty() {
        return Err(escape());
    }

    Ok(ResolvedPath {
        relative: to_slash(&relative),
        absolute: normalize(&std::path::absolute(path)?),
    })
}

/// True if any component of `path` is `..`.
pub fn has_parent_segment(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

/// Collapse `.` and `..` components without consulting the filesystem.
///
/// Leading `..` components of a relative path are kept, since there is
/// nothing left to pop.
pub fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Express `target` relative to the directory `from_dir`.
///
/// Both paths are normalized first and must be in the same space (both
/// relative to one root, or both absolute).
pub fn relative_to(from_dir: &Path, target: &Path) -> PathBuf {
    let from = normalize(from_dir);
    let target = normalize(target);

    let from_parts: Vec<Component> = from.components().collect();
    let target_parts: Vec<Component> = target.components().collect();
    let common = from_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..from_parts.len() {
        result.push("..");
    }
    for part in &target_parts[common..] {
        result.push(part);
    }
    result
}

/// Render a path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir => Some(String::new()),
            Component::CurDir | Component::Prefix(_) => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
