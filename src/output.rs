//! CLI output formatting for builds and the watch loop.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Building output directory...
//! Built 4 files, copied 2 static files (3 hidden skipped)
//! ```
//!
//! ## Watch
//!
//! ```text
//! Watching src and static for changes (Ctrl+C to stop)
//! Updating source file 'blog/~layout.html'
//!   Updating dependant 'blog/first.html'
//!   Updating dependant 'blog/second.html'
//! Deleting file 'old.html'
//! Updating static file 'css/site.css'
//! Deleting static file 'logo.png'
//! ```
//!
//! # Architecture
//!
//! Each kind of output has a `format_*` function (returns plain text) for
//! testability and a `print_*` wrapper that colors it and writes to stdout.
//! Failures are not printed here; they go through `tracing`.

use crate::build::BuildReport;
use colored::{Color, Colorize};
use std::path::Path;

/// One step of a build or watch session, reported before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity<'a> {
    Building,
    UpdatingSource(&'a str),
    UpdatingDependent(&'a str),
    DeletingSource(&'a str),
    UpdatingStatic(&'a str),
    DeletingStatic(&'a str),
}

impl<'a> Activity<'a> {
    fn parts(&self) -> (&'static str, Color, Option<&'a str>) {
        match *self {
            Activity::Building => ("Building output directory...", Color::Cyan, None),
            Activity::UpdatingSource(p) => ("Updating source file", Color::Blue, Some(p)),
            Activity::UpdatingDependent(p) => ("  Updating dependant", Color::Green, Some(p)),
            Activity::DeletingSource(p) => ("Deleting file", Color::Red, Some(p)),
            Activity::UpdatingStatic(p) => ("Updating static file", Color::Cyan, Some(p)),
            Activity::DeletingStatic(p) => ("Deleting static file", Color::Magenta, Some(p)),
        }
    }
}

pub fn format_activity(activity: &Activity) -> String {
    match activity.parts() {
        (label, _, Some(path)) => format!("{label} '{path}'"),
        (label, _, None) => label.to_string(),
    }
}

pub fn print_activity(activity: &Activity) {
    match activity.parts() {
        (label, color, Some(path)) => {
            println!("{} {}", label.color(color), format!("'{path}'").yellow())
        }
        (label, color, None) => println!("{}", label.color(color)),
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Summary lines after a batch build.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut summary = format!(
        "Built {}, copied {}",
        plural(report.written, "file"),
        plural(report.copied, "static file")
    );
    if report.skipped > 0 {
        summary.push_str(&format!(" ({} hidden skipped)", report.skipped));
    }

    let mut lines = vec![summary];
    if report.failed > 0 {
        lines.push(format!(
            "{} could not be written, see the warnings above",
            plural(report.failed, "file")
        ));
    }
    lines
}

pub fn print_build_report(report: &BuildReport) {
    let lines = format_build_report(report);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("{}", line.green());
        } else {
            println!("{}", line.red());
        }
    }
}

pub fn format_watch_header(source: &Path, static_dir: &Path) -> String {
    format!(
        "Watching {} and {} for changes (Ctrl+C to stop)",
        source.display(),
        static_dir.display()
    )
}

pub fn print_watch_header(source: &Path, static_dir: &Path) {
    println!("{}", format_watch_header(source, static_dir).cyan());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_building_banner() {
        assert_eq!(format_activity(&Activity::Building), "Building output directory...");
    }

    #[test]
    fn format_source_update_quotes_path() {
        assert_eq!(
            format_activity(&Activity::UpdatingSource("blog/post.html")),
            "Updating source file 'blog/post.html'"
        );
    }

    #[test]
    fn format_dependent_is_indented() {
        assert_eq!(
            format_activity(&Activity::UpdatingDependent("a.html")),
            "  Updating dependant 'a.html'"
        );
    }

    #[test]
    fn format_deletions() {
        assert_eq!(
            format_activity(&Activity::DeletingSource("old.html")),
            "Deleting file 'old.html'"
        );
        assert_eq!(
            format_activity(&Activity::DeletingStatic("logo.png")),
            "Deleting static file 'logo.png'"
        );
    }

    #[test]
    fn format_report_plain() {
        let report = BuildReport {
            written: 4,
            copied: 1,
            ..BuildReport::default()
        };
        assert_eq!(
            format_build_report(&report),
            vec!["Built 4 files, copied 1 static file"]
        );
    }

    #[test]
    fn format_report_with_skipped_and_failed() {
        let report = BuildReport {
            written: 1,
            copied: 0,
            skipped: 2,
            failed: 1,
            removed: 0,
        };
        let lines = format_build_report(&report);
        assert_eq!(lines[0], "Built 1 file, copied 0 static files (2 hidden skipped)");
        assert_eq!(lines[1], "1 file could not be written, see the warnings above");
    }

    #[test]
    fn format_watch_header_names_both_trees() {
        let line = format_watch_header(Path::new("src"), Path::new("static"));
        assert_eq!(line, "Watching src and static for changes (Ctrl+C to stop)");
    }
}
