//! # htmlbuild
//!
//! A small HTML build tool. Pages are plain HTML files; shared markup lives in
//! `~layout` files that wrap every page in their directory and below. There is
//! no template language beyond three directives.
//!
//! # Architecture: Resolve, Compose, Write
//!
//! ```text
//! 1. Resolve   src/**/*.html  →  SourceTree    (files + layout dependencies)
//! 2. Compose   layouts + page →  String        (directives expanded, nested)
//! 3. Write     String         →  dist/         (one output per public file)
//! ```
//!
//! The static tree skips step 2: its files are copied byte for byte. Watch
//! mode repeats the three steps for the files an event touches, rescanning
//! the tree first so the dependency lists are never stale.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`resolve`] | Glob a tree into relative/absolute path pairs, rejecting escapes |
//! | [`graph`] | Classify files (public, hidden, layout) and compute layout dependencies |
//! | [`compose`] | Expand `%{content}`, `%{path}` and `%{{`, then nest content into layouts |
//! | [`build`] | Write, copy or remove one output file; the full batch build |
//! | [`watch`] | Per-tree watchers turning filesystem events into incremental rebuilds |
//! | [`config`] | `htmlbuild.toml` loading and validation |
//! | [`output`] | CLI output formatting for build and watch activity |
//!
//! # Design Decisions
//!
//! ## Layouts by Directory
//!
//! A file named `~layout*.html` applies to every other HTML file in its own
//! directory and all subdirectories. Nesting falls out of the directory
//! structure: `blog/post.html` is wrapped by `blog/~layout.html`, which in
//! turn sits inside `~layout.html`. Since layouts start with `~`, they are
//! hidden and never written themselves.
//!
//! ## Files in an Arena
//!
//! [`graph::SourceTree`] owns every content file; dependencies are indices
//! into it. Rescans build a fresh tree, so no index outlives the scan that
//! produced it.
//!
//! ## Full Rescans on Every Event
//!
//! Rather than patching dependency lists, the watchers rescan the whole tree
//! for each event. Sites built with this tool are small, and a fresh scan is
//! always consistent with the disk.

pub mod build;
pub mod compose;
pub mod config;
pub mod graph;
pub mod output;
pub mod resolve;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
