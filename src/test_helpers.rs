//! Shared test utilities for the htmlbuild test suite.
//!
//! Provides a throwaway project directory with the standard `src/`,
//! `static/` and `dist/` layout, plus helpers for writing input trees and
//! reading back output.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = Site::new(&[
//!     ("src/~layout.html", "<html>%{content}</html>"),
//!     ("src/index.html", "Hello"),
//! ]);
//! build_all(&site.config).unwrap();
//!
//! assert_eq!(read_output(&site, "index.html").as_deref(), Some("<html>Hello</html>"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::BuildConfig;

// =========================================================================
// Fixture setup
// =========================================================================

/// A project in a temp directory, with a config pointing at it.
pub struct Site {
    _dir: TempDir,
    pub root: PathBuf,
    pub config: BuildConfig,
}

impl Site {
    /// Create the project and write `files` (paths relative to the project).
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        // Canonical so paths compare equal to those reported by the watcher.
        let root = dir.path().canonicalize().unwrap();
        write_tree(&root, files);
        let config = BuildConfig {
            source_directory: root.join("src"),
            static_directory: root.join("static"),
            out_directory: root.join("dist"),
            clear_build_folder: true,
        };
        Self {
            _dir: dir,
            root,
            config,
        }
    }

    /// Absolute path of a file in the project.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write (or overwrite) one project file.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }
}

/// Write each `(relative path, content)` pair under `root`, creating directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
    }
}

// =========================================================================
// Output inspection
// =========================================================================

/// Contents of an output file, or `None` if it was not written.
pub fn read_output(site: &Site, relative: &str) -> Option<String> {
    fs::read_to_string(site.config.out_directory.join(relative)).ok()
}
