//! Dependency graph between content files and the layouts that wrap them.
//!
//! ## Naming Conventions
//!
//! A file's role comes from its base name alone:
//!
//! ```text
//! src/
//! ├── ~layout.html            # Layout, hidden: wraps every file below src/
//! ├── index.html              # Public page
//! ├── ~nav.html               # Hidden: resolved but never written
//! └── blog/
//!     ├── ~layout-blog.html   # Layout, hidden: wraps every file below blog/
//!     └── post.html           # Wrapped by both layouts
//! ```
//!
//! - **Hidden** (`~` prefix): excluded from the output tree.
//! - **Layout** (`~layout` prefix): applied to every other file in its
//!   directory and all subdirectories. Since the layout marker starts with the
//!   hidden marker, layouts are always hidden as well.
//!
//! ## Resolution
//!
//! Layouts are visited shallowest directory first (resolution order among
//! layouts of equal depth), and each is appended to the dependency list of
//! every file it contains, layouts included. The result is the full closure
//! per file: `blog/post.html` lists `~layout.html` then
//! `blog/~layout-blog.html`, and composition treats the first entry as the
//! outermost wrapper.
//!
//! Files live in a [`SourceTree`] arena; dependencies are indices into it.

use crate::resolve::{self, ResolveError, ResolvedPath};
use std::path::{Path, PathBuf};

/// Base-name prefix that keeps a file out of the output tree.
pub const HIDDEN_MARKER: &str = "~";

/// Base-name prefix that turns a file into a layout.
pub const LAYOUT_MARKER: &str = "~layout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Hidden,
}

/// A template file under the source root.
#[derive(Debug, Clone)]
pub struct ContentFile {
    /// Path relative to the source root, `/`-separated. Unique within a tree.
    pub relative_path: String,
    /// Absolute path used for reads and for matching watch events.
    pub absolute_path: PathBuf,
    pub visibility: Visibility,
    pub is_layout: bool,
    /// Set by the watch loop right before the removal build.
    pub is_deleted: bool,
    /// Indices of the layouts wrapping this file, outermost first.
    pub dependencies: Vec<usize>,
}

impl ContentFile {
    fn from_resolved(path: ResolvedPath) -> Self {
        let name = base_name(&path.relative);
        let visibility = if name.starts_with(HIDDEN_MARKER) {
            Visibility::Hidden
        } else {
            Visibility::Public
        };
        Self {
            is_layout: name.starts_with(LAYOUT_MARKER),
            visibility,
            relative_path: path.relative,
            absolute_path: path.absolute,
            is_deleted: false,
            dependencies: Vec::new(),
        }
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Directory part of the relative path (`""` at the root).
    fn relative_dir(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }

    /// Number of directories between the source root and this file.
    fn depth(&self) -> usize {
        self.relative_path.matches('/').count()
    }
}

/// A file under the static root, copied verbatim.
#[derive(Debug, Clone)]
pub struct StaticFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub is_deleted: bool,
}

impl From<ResolvedPath> for StaticFile {
    fn from(path: ResolvedPath) -> Self {
        Self {
            relative_path: path.relative,
            absolute_path: path.absolute,
            is_deleted: false,
        }
    }
}

/// All content files of one resolution pass with their dependencies resolved.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    files: Vec<ContentFile>,
}

impl SourceTree {
    /// Classify the resolved paths and link every file to its layouts.
    pub fn from_paths(paths: Vec<ResolvedPath>) -> Self {
        let mut files: Vec<ContentFile> = paths.into_iter().map(ContentFile::from_resolved).collect();

        let mut layouts: Vec<usize> = (0..files.len()).filter(|&i| files[i].is_layout).collect();
        // Stable, so layouts sharing a depth keep resolution order.
        layouts.sort_by_key(|&i| files[i].depth());
        for layout in layouts {
            let layout_dir = files[layout].relative_dir().to_string();
            for (index, file) in files.iter_mut().enumerate() {
                if index == layout {
                    continue;
                }
                let rel = resolve::relative_to(Path::new(&layout_dir), Path::new(&file.relative_path));
                if !resolve::has_parent_segment(&rel) {
                    file.dependencies.push(layout);
                }
            }
        }

        Self { files }
    }

    pub fn files(&self) -> &[ContentFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ContentFile> {
        self.files.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ContentFile> {
        self.files.get_mut(index)
    }

    pub fn find_by_absolute_path(&self, path: &Path) -> Option<usize> {
        self.files.iter().position(|f| f.absolute_path == path)
    }

    pub fn find_by_relative_path(&self, relative: &str) -> Option<usize> {
        self.files.iter().position(|f| f.relative_path == relative)
    }

    /// The files composed for `file`: its layouts outermost first, then itself.
    pub fn dependency_chain<'a>(&'a self, file: &'a ContentFile) -> Vec<&'a ContentFile> {
        file.dependencies
            .iter()
            .map(|&dep| &self.files[dep])
            .chain(std::iter::once(file))
            .collect()
    }

    /// Indices of every file that lists `index` as a dependency, in resolution order.
    pub fn dependents_of(&self, index: usize) -> Vec<usize> {
        self.files
            .iter()
            .enumerate()
            .filter(|(i, f)| *i != index && f.dependencies.contains(&index))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Relative paths of the files depending on the file at `absolute_path`.
///
/// Captured from the old tree before a rescan so dependents of a deleted
/// file can be found again by path in the fresh tree.
pub fn dependent_paths(tree: &SourceTree, absolute_path: &Path) -> Vec<String> {
    match tree.find_by_absolute_path(absolute_path) {
        Some(index) => tree
            .dependents_of(index)
            .into_iter()
            .map(|i| tree.files[i].relative_path.clone())
            .collect(),
        None => Vec::new(),
    }
}

/// Scan the source root and resolve its dependency graph.
pub fn load_source_tree(root: &Path) -> Result<SourceTree, ResolveError> {
    let paths = resolve::resolve_paths(root, resolve::SOURCE_PATTERN)?;
    Ok(SourceTree::from_paths(paths))
}

/// Scan the static root.
pub fn load_static_files(root: &Path) -> Result<Vec<StaticFile>, ResolveError> {
    let paths = resolve::resolve_paths(root, resolve::STATIC_PATTERN)?;
    Ok(paths.into_iter().map(StaticFile::from).collect())
}

fn base_name(relative: &str) -> &str {
    relative.rsplit('/').next().unwrap_or(relative)
}
