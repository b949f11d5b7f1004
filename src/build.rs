//! Materializing resolved files into the output tree.
//!
//! Every source and static file maps to exactly one output path:
//!
//! ```text
//! src/blog/post.html     → dist/blog/post.html   (composed with its layouts)
//! src/~layout.html       → (hidden, never written)
//! static/css/site.css    → dist/css/site.css     (byte copy)
//! ```
//!
//! ## Failure Handling
//!
//! Single-file I/O problems (unreadable source, unwritable destination, a
//! destination that is already gone) are logged with `tracing::warn!` and
//! reported as [`BuildOutcome::Failed`]; sibling files keep building.
//! Composition errors are returned as [`BuildError::Compose`] and the caller
//! decides: the batch build stops, the watch loop logs and moves on.

use crate::compose::{self, ComposeError};
use crate::config::BuildConfig;
use crate::graph::{self, ContentFile, SourceTree, StaticFile};
use crate::resolve::ResolveError;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("Could not clear build folder {}: {source}", .path.display())]
    Clear {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What happened to one file's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Composed and written.
    Written(PathBuf),
    /// Static file copied.
    Copied(PathBuf),
    /// Output removed after the source was deleted.
    Removed(PathBuf),
    /// Hidden file, nothing to write.
    Skipped,
    /// The operation was abandoned; the reason has been logged.
    Failed { path: PathBuf, reason: String },
}

/// Outcome counts for a batch build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub written: usize,
    pub copied: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BuildReport {
    pub fn record(&mut self, outcome: &BuildOutcome) {
        match outcome {
            BuildOutcome::Written(_) => self.written += 1,
            BuildOutcome::Copied(_) => self.copied += 1,
            BuildOutcome::Removed(_) => self.removed += 1,
            BuildOutcome::Skipped => self.skipped += 1,
            BuildOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Build the whole site once: sources first, then static files.
///
/// Files are processed one at a time in resolver order. Path escapes and
/// composition errors abort the build.
pub fn build_all(config: &BuildConfig) -> Result<BuildReport, BuildError> {
    let out_dir = &config.out_directory;
    if config.clear_build_folder {
        clear_output(out_dir)?;
    }

    let mut report = BuildReport::default();

    let tree = graph::load_source_tree(&config.source_directory)?;
    for file in tree.files() {
        report.record(&build_content_file(&tree, file, out_dir)?);
    }

    let statics = graph::load_static_files(&config.static_directory)?;
    for file in &statics {
        report.record(&build_static_file(file, out_dir));
    }

    Ok(report)
}

/// Remove the output directory. A missing directory is not an error.
pub fn clear_output(out_dir: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(out_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BuildError::Clear {
            path: out_dir.to_path_buf(),
            source,
        }),
    }
}

/// Write (or remove) the output for one content file of `tree`.
pub fn build_content_file(
    tree: &SourceTree,
    file: &ContentFile,
    out_dir: &Path,
) -> Result<BuildOutcome, BuildError> {
    if !file.is_public() {
        return Ok(BuildOutcome::Skipped);
    }

    let destination = out_dir.join(&file.relative_path);
    if file.is_deleted {
        return Ok(remove_output(destination));
    }

    let chain = tree.dependency_chain(file);
    let content = match compose::compose(&chain, &file.relative_path) {
        Ok(content) => content,
        Err(ComposeError::Io { path, source }) => {
            tracing::warn!("Could not read {}: {}", path.display(), source);
            return Ok(BuildOutcome::Failed {
                path: destination,
                reason: source.to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    Ok(write_output(destination, content.as_bytes()))
}

/// Copy (or remove) the output for one static file.
pub fn build_static_file(file: &StaticFile, out_dir: &Path) -> BuildOutcome {
    let destination = out_dir.join(&file.relative_path);
    if file.is_deleted {
        return remove_output(destination);
    }

    if !file.absolute_path.is_file() {
        tracing::warn!("Static file {} is no longer accessible", file.absolute_path.display());
        return BuildOutcome::Failed {
            path: destination,
            reason: "source file is not accessible".into(),
        };
    }

    let copied = ensure_parent(&destination).and_then(|_| fs::copy(&file.absolute_path, &destination));
    match copied {
        Ok(_) => BuildOutcome::Copied(destination),
        Err(e) => {
            tracing::warn!("Could not copy file {}: {}", destination.display(), e);
            BuildOutcome::Failed {
                path: destination,
                reason: e.to_string(),
            }
        }
    }
}

fn write_output(destination: PathBuf, content: &[u8]) -> BuildOutcome {
    match ensure_parent(&destination).and_then(|_| fs::write(&destination, content)) {
        Ok(()) => BuildOutcome::Written(destination),
        Err(e) => {
            tracing::warn!("Could not update file {}: {}", destination.display(), e);
            BuildOutcome::Failed {
                path: destination,
                reason: e.to_string(),
            }
        }
    }
}

fn remove_output(destination: PathBuf) -> BuildOutcome {
    match fs::remove_file(&destination) {
        Ok(()) => BuildOutcome::Removed(destination),
        Err(e) => {
            tracing::warn!("Could not delete file {}: {}", destination.display(), e);
            BuildOutcome::Failed {
                path: destination,
                reason: e.to_string(),
            }
        }
    }
}

fn ensure_parent(destination: &Path) -> std::io::Result<()> {
    match destination.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}
