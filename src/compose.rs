//! Content composition: directive rewriting and layout substitution.
//!
//! A content file is rendered by walking its dependency chain outermost
//! layout first and substituting each file into the previous one's
//! `%{content}` placeholder:
//!
//! ```text
//! ~layout.html   <html>%{content}</html>
//! page.html      Hello
//! ─────────────────────────────────────
//! dist/page.html <html>Hello</html>
//! ```
//!
//! ## Directives
//!
//! | Syntax | Result |
//! |--------|--------|
//! | `%{{` | literal `%{` |
//! | `%{content}` | placeholder for the wrapped file (layouts only) |
//! | `%{path <fragment>}` | `<fragment>`, resolved next to the file that wrote it, made relative to the output file |
//!
//! `%{path …}` keeps links portable: `%{path styles.css}` in `a/~layout.html`
//! renders as `../styles.css` inside `a/b/page.html` and as `styles.css`
//! inside `a/page.html`.
//!
//! Directives are scanned by a small [`Lexer`] that tries `%{{` before
//! `%{…}`. The placeholder is carried through composition as the private-use
//! code point [`CONTENT_MARKER`].

use crate::graph::ContentFile;
use crate::resolve::{relative_to, to_slash};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stand-in for `%{content}` while layouts are being stacked.
pub const CONTENT_MARKER: char = '\u{10FFFD}';

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("File {layout} does not contain '%{{content}}'")]
    MissingContentPlaceholder { layout: String },
    #[error("File {file} contains '%{{content}}' even though it is not a layout file")]
    UnconsumedContentPlaceholder { file: String },
    #[error("Unknown escape command '{command}' in {file}")]
    UnknownDirective { command: String, file: String },
    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One file's raw text, tagged with its path relative to the source root.
#[derive(Debug, Clone)]
pub struct SourceText<'a> {
    pub relative_path: &'a str,
    pub text: String,
}

/// Render `chain` (layouts outermost first, the content file last) for the
/// output file at `destination`, relative to the output root.
pub fn compose(chain: &[&ContentFile], destination: &str) -> Result<String, ComposeError> {
    let sources = chain.iter().map(|file| {
        fs::read_to_string(&file.absolute_path)
            .map(|text| SourceText {
                relative_path: &file.relative_path,
                text,
            })
            .map_err(|source| ComposeError::Io {
                path: file.absolute_path.clone(),
                source,
            })
    });
    compose_sources(sources, destination)
}

/// Compose already-loaded (or lazily loaded) texts.
///
/// Sources are pulled one at a time, so a read failure late in the chain is
/// only hit once every earlier file composed cleanly.
pub fn compose_sources<'a, I>(sources: I, destination: &str) -> Result<String, ComposeError>
where
    I: IntoIterator<Item = Result<SourceText<'a>, ComposeError>>,
{
    let mut accumulator = String::new();
    let mut previous: Option<&'a str> = None;

    for source in sources {
        let source = source?;
        let prepared = prepare_content(&source.text, source.relative_path, destination)?;

        if accumulator.is_empty() {
            accumulator = prepared;
        } else if let Some(pos) = accumulator.find(CONTENT_MARKER) {
            accumulator.replace_range(pos..pos + CONTENT_MARKER.len_utf8(), &prepared);
        } else {
            return Err(ComposeError::MissingContentPlaceholder {
                layout: previous.unwrap_or_default().to_string(),
            });
        }
        previous = Some(source.relative_path);
    }

    if accumulator.contains(CONTENT_MARKER) {
        return Err(ComposeError::UnconsumedContentPlaceholder {
            file: previous.unwrap_or_default().to_string(),
        });
    }
    Ok(accumulator)
}

/// Rewrite every directive in one file's text.
///
/// `source` is the file's own path and `destination` the output file's path,
/// both relative to their roots. `%{content}` becomes [`CONTENT_MARKER`].
pub fn prepare_content(text: &str, source: &str, destination: &str) -> Result<String, ComposeError> {
    let mut out = String::with_capacity(text.len());

    for token in Lexer::new(text) {
        match token {
            Token::Text(s) => out.push_str(s),
            Token::EscapedBrace => out.push_str("%{"),
            Token::Directive(body) => {
                let args: Vec<&str> = body.trim().split(' ').collect();
                match args[0] {
                    "content" => out.push(CONTENT_MARKER),
                    "path" => out.push_str(&rewrite_path(&args[1..].join(" "), source, destination)),
                    command => {
                        return Err(ComposeError::UnknownDirective {
                            command: command.to_string(),
                            file: source.to_string(),
                        });
                    }
                }
            }
        }
    }

    Ok(out)
}

/// Resolve `fragment` next to `source`, then express it relative to the
/// directory of `destination`.
fn rewrite_path(fragment: &str, source: &str, destination: &str) -> String {
    let source_dir = Path::new(source).parent().unwrap_or(Path::new(""));
    let target = source_dir.join(fragment.trim_start_matches('/'));
    let base = Path::new(destination).parent().unwrap_or(Path::new(""));
    to_slash(&relative_to(base, &target))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Plain text, copied through.
    Text(&'a str),
    /// `%{{`
    EscapedBrace,
    /// Body of a `%{…}` directive, without the braces.
    Directive(&'a str),
}

/// Single-pass scanner over `%{{` and `%{…}`.
///
/// A `%{` with no closing `}` anywhere after it is plain text; scanning
/// resumes right after the `%`.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let rest = &self.input[self.pos..];
        if rest.is_empty() {
            return None;
        }

        if let Some(after) = rest.strip_prefix("%{") {
            if after.starts_with('{') {
                self.pos += 3;
                return Some(Token::EscapedBrace);
            }
            if let Some(end) = after.find('}') {
                self.pos += 2 + end + 1;
                return Some(Token::Directive(&after[..end]));
            }
            self.pos += 1;
            return Some(Token::Text(&rest[..1]));
        }

        let end = rest.find("%{").unwrap_or(rest.len());
        self.pos += end;
        Some(Token::Text(&rest[..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src<'a>(relative_path: &'a str, text: &str) -> Result<SourceText<'a>, ComposeError> {
        Ok(SourceText {
            relative_path,
            text: text.to_string(),
        })
    }

    // =========================================================================
    // Lexer
    // =========================================================================

    #[test]
    fn lexer_splits_text_and_directives() {
        let tokens: Vec<Token> = Lexer::new("a%{content}b%{{c").collect();
        assert_eq!(
            tokens,
            vec![
                Token::Text("a"),
                Token::Directive("content"),
                Token::Text("b"),
                Token::EscapedBrace,
                Token::Text("c"),
            ]
        );
    }

    #[test]
    fn lexer_prefers_escape_over_directive() {
        let tokens: Vec<Token> = Lexer::new("%{{content}").collect();
        assert_eq!(tokens, vec![Token::EscapedBrace, Token::Text("content}")]);
    }

    #[test]
    fn lexer_treats_unterminated_directive_as_text() {
        let tokens: Vec<Token> = Lexer::new("50%{ off").collect();
        let text: String = tokens
            .iter()
            .map(|t| match t {
                Token::Text(s) => *s,
                _ => panic!("unexpected token {t:?}"),
            })
            .collect();
        assert_eq!(text, "50%{ off");
    }

    #[test]
    fn lexer_directive_body_spans_lines() {
        let tokens: Vec<Token> = Lexer::new("%{path\na.css}").collect();
        assert_eq!(tokens, vec![Token::Directive("path\na.css")]);
    }

    // =========================================================================
    // prepare_content
    // =========================================================================

    #[test]
    fn escaped_brace_becomes_literal() {
        let out = prepare_content("%{{foo", "page.html", "page.html").unwrap();
        assert_eq!(out, "%{foo");
    }

    #[test]
    fn content_directive_becomes_marker() {
        let out = prepare_content("<p>%{content}</p>", "~layout.html", "page.html").unwrap();
        assert_eq!(out, format!("<p>{CONTENT_MARKER}</p>"));
    }

    #[test]
    fn directive_tolerates_surrounding_whitespace() {
        let out = prepare_content("%{ content }", "~layout.html", "page.html").unwrap();
        assert_eq!(out, CONTENT_MARKER.to_string());
    }

    #[test]
    fn path_from_nested_layout_into_deeper_page() {
        let out = prepare_content("%{path styles.css}", "a/~layout.html", "a/b/page.html").unwrap();
        assert_eq!(out, "../styles.css");
    }

    #[test]
    fn path_from_same_directory_is_unchanged() {
        let out = prepare_content("%{path img/logo.png}", "~layout.html", "index.html").unwrap();
        assert_eq!(out, "img/logo.png");
    }

    #[test]
    fn path_with_parent_segments() {
        let out = prepare_content("%{path ../shared/x.css}", "a/~layout.html", "a/b/c/page.html")
            .unwrap();
        assert_eq!(out, "../../../shared/x.css");
    }

    #[test]
    fn path_fragment_keeps_spaces() {
        let out = prepare_content("%{path my file.pdf}", "docs/~layout.html", "docs/x/y.html")
            .unwrap();
        assert_eq!(out, "../my file.pdf");
    }

    #[test]
    fn leading_slash_in_path_fragment_is_relative_to_source() {
        let out = prepare_content("%{path /main.css}", "~layout.html", "a/page.html").unwrap();
        assert_eq!(out, "../main.css");
    }

    #[test]
    fn unknown_directive_is_named() {
        let err = prepare_content("%{include nav.html}", "page.html", "page.html").unwrap_err();
        match err {
            ComposeError::UnknownDirective { command, file } => {
                assert_eq!(command, "include");
                assert_eq!(file, "page.html");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_directive_is_unknown() {
        let err = prepare_content("%{}", "page.html", "page.html").unwrap_err();
        assert!(matches!(err, ComposeError::UnknownDirective { ref command, .. } if command.is_empty()));
    }

    // =========================================================================
    // compose_sources
    // =========================================================================

    #[test]
    fn layout_wraps_page() {
        let out = compose_sources(
            [src("~layout.html", "<html>%{content}</html>"), src("page.html", "Hello")],
            "page.html",
        )
        .unwrap();
        assert_eq!(out, "<html>Hello</html>");
    }

    #[test]
    fn file_without_directives_round_trips() {
        let text = "<!doctype html>\n<p>50% done {ok}</p>\n";
        let out = compose_sources([src("plain.html", text)], "plain.html").unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn content_in_top_level_file_is_unconsumed() {
        let err = compose_sources([src("page.html", "x %{content} y")], "page.html").unwrap_err();
        assert!(matches!(
            err,
            ComposeError::UnconsumedContentPlaceholder { ref file } if file == "page.html"
        ));
    }

    #[test]
    fn layout_without_placeholder_is_named() {
        let err = compose_sources(
            [src("~layout.html", "<html></html>"), src("page.html", "Hello")],
            "page.html",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::MissingContentPlaceholder { ref layout } if layout == "~layout.html"
        ));
    }

    #[test]
    fn two_layouts_stack_in_chain_order() {
        let out = compose_sources(
            [
                src("~layout.html", "<body>%{content}</body>"),
                src("blog/~layout.html", "<article>%{content}</article>"),
                src("blog/post.html", "text"),
            ],
            "blog/post.html",
        )
        .unwrap();
        assert_eq!(out, "<body><article>text</article></body>");
    }

    #[test]
    fn only_first_placeholder_is_filled() {
        let err = compose_sources(
            [src("~layout.html", "%{content}|%{content}"), src("page.html", "x")],
            "page.html",
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::UnconsumedContentPlaceholder { .. }));
    }

    #[test]
    fn escapes_in_inner_content_survive_substitution() {
        let out = compose_sources(
            [src("~layout.html", "[%{content}]"), src("page.html", "%{{literal}")],
            "page.html",
        )
        .unwrap();
        assert_eq!(out, "[%{literal}]");
    }

    #[test]
    fn each_file_rewrites_paths_from_its_own_location() {
        let out = compose_sources(
            [
                src("~layout.html", "%{path site.css} %{content}"),
                src("docs/guide/page.html", "%{path img.png}"),
            ],
            "docs/guide/page.html",
        )
        .unwrap();
        assert_eq!(out, "../../site.css img.png");
    }

    #[test]
    fn composed_output_has_no_marker_or_directives() {
        let out = compose_sources(
            [
                src("~layout.html", "<a href=\"%{path x.css}\">%{content}</a>"),
                src("p.html", "%{{ok}"),
            ],
            "p.html",
        )
        .unwrap();
        assert!(!out.contains(CONTENT_MARKER));
        assert_eq!(out, "<a href=\"x.css\">%{ok}</a>");
    }

    #[test]
    fn read_failure_is_io_error() {
        let file = ContentFile {
            relative_path: "gone.html".into(),
            absolute_path: PathBuf::from("/nonexistent/htmlbuild/gone.html"),
            visibility: crate::graph::Visibility::Public,
            is_layout: false,
            is_deleted: false,
            dependencies: vec![],
        };
        let err = compose(&[&file], "gone.html").unwrap_err();
        assert!(matches!(err, ComposeError::Io { .. }));
    }
}
