//! Incremental rebuilds driven by filesystem events.
//!
//! The `watch` command does one full build, then keeps the output tree in
//! step with the source and static trees. Each tree has its own watcher
//! object owning the last resolved file list:
//!
//! | Event | Source tree | Static tree |
//! |-------|-------------|-------------|
//! | add / change | rescan, rebuild the file, rebuild its dependents | rescan, copy the file |
//! | add directory | rescan, rebuild every file below it | rescan, copy every file below it |
//! | unlink | remove the output, rescan, rebuild the captured dependents | remove the output |
//!
//! ## Dependents
//!
//! A dependency list already holds every layout that applies to a file, so
//! rebuilding the direct dependents of a changed layout is the whole job;
//! nothing is chased recursively.
//!
//! When a layout is deleted, its dependents are captured *before* the rescan
//! (by relative path, with [`dependent_paths`]) and looked up again in the
//! fresh tree, where their dependency lists no longer mention the layout.
//!
//! ## Event Loop
//!
//! [`watch`] runs one `notify` watcher per tree. Both feed a single channel;
//! events are coalesced for [`DEBOUNCE_MS`] and then handled one at a time,
//! so every handler runs its rescan/build sequence to completion before the
//! next event starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;

use crate::build::{self, BuildError, BuildOutcome};
use crate::config::BuildConfig;
use crate::graph::{self, SourceTree, StaticFile, dependent_paths};
use crate::output::Activity;
use crate::resolve::{self, ResolveError};

/// Quiet period before pending events are handled.
pub const DEBOUNCE_MS: u64 = 100;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("Could not find the {tree} file {}", .path.display())]
    Untracked { tree: Tree, path: PathBuf },
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tree {
    Source,
    Static,
}

impl std::fmt::Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tree::Source => f.write_str("source"),
            Tree::Static => f.write_str("static"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsEventKind {
    Add,
    Change,
    Unlink,
}

/// A filesystem notification reduced to what the watchers act on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

impl FsEvent {
    pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Translate a `notify` event into add / change / unlink events.
///
/// Renames become an unlink of the old path and an add of the new one.
/// Access and metadata-only events are dropped.
pub fn events_from_notify(event: &Event) -> Vec<FsEvent> {
    let each = |kind: FsEventKind| {
        event
            .paths
            .iter()
            .map(|p| FsEvent::new(kind, p.clone()))
            .collect::<Vec<_>>()
    };

    match event.kind {
        EventKind::Create(_) => each(FsEventKind::Add),
        EventKind::Remove(_) => each(FsEventKind::Unlink),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(FsEventKind::Unlink),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(FsEventKind::Add),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![
                FsEvent::new(FsEventKind::Unlink, from.clone()),
                FsEvent::new(FsEventKind::Add, to.clone()),
            ],
            _ => Vec::new(),
        },
        // Platforms that cannot pair rename halves report each side alone.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    FsEventKind::Add
                } else {
                    FsEventKind::Unlink
                };
                FsEvent::new(kind, p.clone())
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => each(FsEventKind::Change),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Why a file was rebuilt while handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    Changed,
    Dependent,
    Deleted,
}

/// One file materialized while handling an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebuild {
    pub relative_path: String,
    pub reason: RebuildReason,
    pub outcome: BuildOutcome,
}

/// Per-tree event handling.
///
/// `report` is called with each activity right before the file is built.
pub trait TreeWatcher {
    fn tree(&self) -> Tree;

    fn root(&self) -> &Path;

    /// Whether an added or changed `path` can belong to this tree's file list.
    fn accepts(&self, path: &Path) -> bool;

    fn on_update(
        &mut self,
        path: &Path,
        report: &mut dyn FnMut(Activity),
    ) -> Result<Vec<Rebuild>, WatchError>;

    /// Build every file below a directory that appeared in the tree.
    fn on_add_dir(
        &mut self,
        dir: &Path,
        report: &mut dyn FnMut(Activity),
    ) -> Result<Vec<Rebuild>, WatchError>;

    /// Remove the outputs of `paths`, all known to this watcher.
    fn on_unlink(
        &mut self,
        paths: &[PathBuf],
        report: &mut dyn FnMut(Activity),
    ) -> Result<Vec<Rebuild>, WatchError>;

    /// Absolute paths of known files at or below `path`.
    fn known_under(&self, path: &Path) -> Vec<PathBuf>;

    fn handle(
        &mut self,
        event: &FsEvent,
        report: &mut dyn FnMut(Activity),
    ) -> Result<Vec<Rebuild>, WatchError> {
        let path = resolve::normalize(&event.path);
        match event.kind {
            FsEventKind::Add | FsEventKind::Change => {
                // A moved-in directory is reported once, not per file.
                if event.kind == FsEventKind::Add && path.is_dir() && path.starts_with(self.root()) {
                    return self.on_add_dir(&path, report);
                }
                if !self.accepts(&path) {
                    return Ok(Vec::new());
                }
                if !path.is_file() {
                    tracing::debug!("{} vanished before it could be built", path.display());
                    return Ok(Vec::new());
                }
                self.on_update(&path, report)
            }
            FsEventKind::Unlink => {
                let known = self.known_under(&path);
                if known.is_empty() {
                    // Already handled, e.g. a directory whose files went first.
                    tracing::debug!("Ignoring unlink of untracked {}", path.display());
                    return Ok(Vec::new());
                }
                // A removed directory takes every known file below it along.
                self.on_unlink(&known, report)
            }
        }
    }
}

/// Watch state for the source tree.
pub struct SourceWatcher {
    root: PathBuf,
    out_dir: PathBuf,
    files: SourceTree,
}

impl SourceWatcher {
    pub fn new(root: PathBuf, out_dir: PathBuf) -> Result<Self, WatchError> {
        let files = graph::load_source_tree(&root)?;
        Ok(Self {
            root,
            out_dir,
            files,
        })
    }

    /// The file list as of the last rescan.
    pub fn files(&self) -> &SourceTree {
        &self.files
    }

    fn rescan(&mut self) -> Result<(), WatchError> {
        tracing::debug!("Rescanning {}", self.root.display());
        self.files = graph::load_source_tree(&self.root)?;
        Ok(())
    }

    /// Build one file of the current list, logging composition errors.
    fn rebuild(&self, index: usize, reason: RebuildReason) -> Rebuild {
        let file = &self.files.files()[index];
        let outcome = match build::build_content_file(&self.files, file, &self.out_dir) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Could not update file {}: {}", file.relative_path, e);
                BuildOutcome::Failed {
                    path: self.out_dir.join(&file.relative_path),
                    reason: e.to_string(),
                }
            }
        };
        Rebuild {
            relative_path: file.relative_path.clone(),
            reason,
            outcome,
        }
    }

    /// Build every file, as the first step of a watch session.
    pub fn build_all(&mut self, report: &mut dyn FnMut(Activity)) -> Result<Vec<Rebuild>, WatchError> {
        report(Activity::Building);
        self.rescan()?;
        Ok((0..self.files.len())
            .map(|index| self.rebuild(index, RebuildReason::Changed))
            .collect())
    }
}

impl TreeWatcher for SourceWatcher {
    fn tree(&self) -> Tree {
        Tree::Source
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn accepts(&self, path: &Path) -> bool {
        path.starts_with(&self.root) && path.extension().is_some_and(|e| e == "html")
    }

    fn known_under(&self, path: &Path) -> Vec<PathBuf> {
        self.files
            .files()
            .iter()
            .filter(|f| f.absolute_path.starts_with(path))
            .map(|f| f.absolute_path.clone())
            .collect()
    }

    fn on_update(
        &mut self,
        path: &Path,
        report: &mut dyn FnMut(Activity),
    ) -> Result<Vec<Rebuild>, WatchError> {
        self.rescan()?;
        let index = self
            .files
            .find_by_absolute_path(path)
            .ok_or_else(|| WatchError::Untracked {
                tree: Tree::Source,
                path: path.to_path_buf(),
            })?;

        report(Activity::UpdatingSource(&self.files.files()[index].relative_path));
        let mut rebuilds = vec![self.rebuild(index, RebuildReason::Changed)];

        for dependent in self.files.dependents_of(index) {
            report(Activity::UpdatingDependent(&self.files.files()[dependent].relative_path));
            rebuilds.push(self.rebuild(dependent, RebuildReason::Dependent));
        }
        Ok(rebuilds)
    }

    fn on_add_dir(
        &mut self,
        dir: &Path,
        report: &mut dyn FnMut(Activity),
    ) -> Result<Vec<Rebuild>, WatchError> {
        self.rescan()?;
        // Layouts below `dir` only wrap files below `dir`, so this set
        // already holds every dependent.
        let added: Vec<usize> = (0..self.files.len())
            .filter(|&i| self.files.files()[i].absolute_path.starts_with(dir))
            .collect();

        let mut rebuilds = Vec::with_capacity(added.len());
        for index in added {
            report(Activity::UpdatingSource(&self.files.files()[index].relative_path));
            rebuilds.push(self.rebuild(index, RebuildReason::Changed));
        }
        Ok(rebuilds)
    }

    fn on_unlink(
        &mut self,
        paths: &[PathBuf],
        report: &mut dyn FnMut(Activity),
    ) -> Result<Vec<Rebuild>, WatchError> {
        let mut rebuilds = Vec::with_capacity(paths.len());
        let mut dependents: Vec<String> = Vec::new();

        for path in paths {
            let index = self
                .files
                .find_by_absolute_path(path)
                .ok_or_else(|| WatchError::Untracked {
                    tree: Tree::Source,
                    path: path.clone(),
                })?;
            if let Some(file) = self.files.get_mut(index) {
                file.is_deleted = true;
            }
            report(Activity::DeletingSource(&self.files.files()[index].relative_path));
            rebuilds.push(self.rebuild(index, RebuildReason::Deleted));

            for dependent in dependent_paths(&self.files, path) {
                if !dependents.contains(&dependent) {
                    dependents.push(dependent);
                }
            }
        }

        // Captured before the rescan drops the deleted files from every list.
        self.rescan()?;

        for (index, file) in self.files.files().iter().enumerate() {
            if !dependents.contains(&file.relative_path) {
                continue;
            }
            report(Activity::UpdatingDependent(&file.relative_path));
            rebuilds.push(self.rebuild(index, RebuildReason::Dependent));
        }
        Ok(rebuilds)
    }
}

/// Watch state for the static tree.
pub struct StaticWatcher {
    root: PathBuf,
    out_dir: PathBuf,
    files: Vec<StaticFile>,
}

impl StaticWatcher {
    pub fn new(root: PathBuf, out_dir: PathBuf) -> Result<Self, WatchError> {
        let files = graph::load_static_files(&root)?;
        Ok(Self {
            root,
            out_dir,
            files,
        })
    }

    pub fn files(&self) -> &[StaticFile] {
        &self.files
    }

    fn rescan(&mut self) -> Result<(), WatchError> {
        tracing::debug!("Rescanning {}", self.root.display());
        self.files = graph::load_static_files(&self.root)?;
        Ok(())
    }

    fn find(&self, path: &Path) -> Result<usize, WatchError> {
        self.files
            .iter()
            .position(|f| f.absolute_path == path)
            .ok_or_else(|| WatchError::Untracked {
                tree: Tree::Static,
                path: path.to_path_buf(),
            })
    }

    fn rebuild(&self, index: usize, reason: RebuildReason) -> Rebuild {
        let file = &self.files[index];
        Rebuild {
            relative_path: file.relative_path.clone(),
            reason,
            outcome: build::build_static_file(file, &self.out_dir),
        }
    }

    /// Copy every file, as the first step of a watch session.
    pub fn build_all(&mut self) -> Result<Vec<Rebuild>, WatchError> {
        self.rescan()?;
        Ok((0..self.files.len())
            .map(|index| self.rebuild(index, RebuildReason::Changed))
            .collect())
    }
}

impl TreeWatcher for StaticWatcher {
    fn tree(&self) -> Tree {
        Tree::Static
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn accepts(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    fn known_under(&self, path: &Path) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|f| f.absolute_path.starts_with(path))
            .map(|f| f.absolute_path.clone())
            .collect()
    }

    fn on_update(
        &mut self,
        path: &Path,
        report: &mut dyn FnMut(Activity),
    ) -> Result<Vec<Rebuild>, WatchError> {
        self.rescan()?;
        let index = self.find(path)?;
        report(Activity::UpdatingStatic(&self.files[index].relative_path));
        Ok(vec![self.rebuild(index, RebuildReason::Changed)])
    }

    fn on_add_dir(
        &mut self,
        dir: &Path,
        report: &mut dyn FnMut(Activity),
    ) -> Result<Vec<Rebuild>, WatchError> {
        self.rescan()?;
        let mut rebuilds = Vec::new();
        for (index, file) in self.files.iter().enumerate() {
            if !file.absolute_path.starts_with(dir) {
                continue;
            }
            report(Activity::UpdatingStatic(&file.relative_path));
            rebuilds.push(self.rebuild(index, RebuildReason::Changed));
        }
        Ok(rebuilds)
    }

    fn on_unlink(
        &mut self,
        paths: &[PathBuf],
        report: &mut dyn FnMut(Activity),
    ) -> Result<Vec<Rebuild>, WatchError> {
        let mut rebuilds = Vec::with_capacity(paths.len());
        for path in paths {
            let index = self.find(path)?;
            self.files[index].is_deleted = true;
            report(Activity::DeletingStatic(&self.files[index].relative_path));
            rebuilds.push(self.rebuild(index, RebuildReason::Deleted));
        }
        self.files.retain(|f| !f.is_deleted);
        Ok(rebuilds)
    }
}

/// Pending events, coalesced until the trees go quiet.
///
/// An event is dropped when the latest pending event for the same tree and
/// path has the same kind; otherwise arrival order is kept.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: Vec<(Tree, FsEvent)>,
    last_event: Option<Instant>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tree: Tree, event: FsEvent) {
        self.last_event = Some(Instant::now());
        let latest_same_path = self
            .pending
            .iter()
            .rev()
            .find(|(t, e)| *t == tree && e.path == event.path);
        if latest_same_path.is_some_and(|(_, e)| e.kind == event.kind) {
            return;
        }
        self.pending.push((tree, event));
    }

    pub fn should_flush(&self, debounce: Duration) -> bool {
        self.last_event
            .is_some_and(|last| !self.pending.is_empty() && last.elapsed() >= debounce)
    }

    pub fn take(&mut self) -> Vec<(Tree, FsEvent)> {
        self.last_event = None;
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Canonicalize an existing directory, or make a missing one absolute.
fn watch_root(path: &Path) -> Result<PathBuf, WatchError> {
    match path.canonicalize() {
        Ok(p) => Ok(p),
        Err(_) => Ok(resolve::normalize(&std::path::absolute(path)?)),
    }
}

fn start_watcher(
    tree: Tree,
    root: &Path,
    tx: Sender<(Tree, notify::Result<Event>)>,
) -> Result<Option<RecommendedWatcher>, WatchError> {
    if !root.is_dir() {
        tracing::warn!("{} directory {} does not exist, not watching it", tree, root.display());
        return Ok(None);
    }
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send((tree, res));
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(Some(watcher))
}

/// Clear the output when configured, then build both trees in full.
///
/// Returns the watchers holding the freshly scanned trees. Composition errors
/// are logged per file.
pub fn start_session(
    config: &BuildConfig,
    on_activity: &mut dyn FnMut(Activity),
) -> Result<(SourceWatcher, StaticWatcher), WatchError> {
    let source_root = watch_root(&config.source_directory)?;
    let static_root = watch_root(&config.static_directory)?;
    let out_dir = watch_root(&config.out_directory)?;

    if config.clear_build_folder {
        build::clear_output(&out_dir)?;
    }

    let mut source = SourceWatcher::new(source_root, out_dir.clone())?;
    let mut statics = StaticWatcher::new(static_root, out_dir)?;
    source.build_all(on_activity)?;
    statics.build_all()?;
    Ok((source, statics))
}

/// Handle a batch of debounced events in arrival order.
///
/// A resolve error (such as a path escape) is logged and ends only its own
/// event. Any other error stops the batch and is returned.
pub fn dispatch_events(
    source: &mut dyn TreeWatcher,
    statics: &mut dyn TreeWatcher,
    events: Vec<(Tree, FsEvent)>,
    on_activity: &mut dyn FnMut(Activity),
) -> Result<(), WatchError> {
    for (tree, event) in events {
        let watcher: &mut dyn TreeWatcher = match tree {
            Tree::Source => &mut *source,
            Tree::Static => &mut *statics,
        };
        match watcher.handle(&event, on_activity) {
            Ok(_) => {}
            Err(WatchError::Resolve(e)) => {
                tracing::error!(
                    "Could not handle {} change {}: {}",
                    watcher.tree(),
                    event.path.display(),
                    e
                );
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Build everything once, then rebuild on changes until `running` is cleared.
///
/// Composition errors are logged per file and the session continues; a path
/// escape stops only the event that hit it. A reported path missing from a
/// fresh scan after an add or change ends the session with
/// [`WatchError::Untracked`].
pub fn watch<F>(config: &BuildConfig, running: Arc<AtomicBool>, mut on_activity: F) -> Result<(), WatchError>
where
    F: FnMut(Activity),
{
    let (mut source, mut statics) = start_session(config, &mut on_activity)?;

    let (tx, rx) = channel();
    // Dropping a watcher stops it, so both stay bound until the loop ends.
    let _source_watcher = start_watcher(Tree::Source, source.root(), tx.clone())?;
    let _static_watcher = start_watcher(Tree::Static, statics.root(), tx)?;

    let mut queue = EventQueue::new();
    let debounce = Duration::from_millis(DEBOUNCE_MS);

    while running.load(Ordering::SeqCst) {
        if let Ok((tree, res)) = rx.recv_timeout(Duration::from_millis(50)) {
            match res {
                Ok(event) => {
                    for fs_event in events_from_notify(&event) {
                        queue.push(tree, fs_event);
                    }
                }
                Err(e) => tracing::warn!("File watcher error: {}", e),
            }
        }

        if queue.should_flush(debounce) {
            dispatch_events(&mut source, &mut statics, queue.take(), &mut on_activity)?;
        }
    }

    Ok(())
}
