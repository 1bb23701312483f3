//! Fixture verifier: inline expected-finding markers and exact matching.
//!
//! A fixture is ordinary source with markers wrapping the text a finding
//! must highlight:
//!
//! ```text
//! new <weak_warning descr="Fluent should not be instantiated directly.">FluentDirect</weak_warning>();
//! ```
//!
//! ## Grammar
//!
//! ```text
//! <open>   := "<" <tag> (<ws> <name> "=" <quoted>)* <ws>? ">"
//! <close>  := "</" <tag> <ws>? ">"
//! <tag>    := "error" | "warning" | "weak_warning" | "info"
//! ```
//!
//! `descr` is the expected message and is required. Markers may nest. Any
//! other `<` is ordinary text. Parsing is all-or-nothing: a malformed
//! marker fails the whole fixture with the file and line.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use winnow::ascii::{multispace0, multispace1};
use winnow::combinator::{alt, delimited, repeat};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};
use winnow::ModalResult;

use crate::adapter::{LanguageAdapter, SourceText};
use crate::rule::{Finding, RuleSet, Severity};
use crate::span::Span;
use crate::text::line_of_offset;
use crate::types::Location;
use crate::unit::CompilationUnit;

const MARKER_TAGS: &[&str] = &["weak_warning", "warning", "error", "info"];

/// Errors raised while reading a fixture.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FixtureError {
    #[error("{file}:{line}: <{tag}> marker is missing the descr attribute")]
    MissingDescr { file: String, line: u32, tag: String },

    #[error("{file}:{line}: <{tag}> marker is never closed")]
    Unclosed { file: String, line: u32, tag: String },

    #[error("{file}:{line}: </{found}> closes <{expected}>")]
    Mismatched {
        file: String,
        line: u32,
        expected: String,
        found: String,
    },

    #[error("{file}:{line}: </{tag}> has no matching opening marker")]
    StrayClose { file: String, line: u32, tag: String },

    #[error("{file}:{line}: malformed <{tag}> marker")]
    Malformed { file: String, line: u32, tag: String },

    #[error("{file}: fixture could not be analyzed: {reason}")]
    Analysis { file: String, reason: String },
}

impl FixtureError {
    /// The fixture file named by the error.
    pub fn file(&self) -> &str {
        match self {
            FixtureError::MissingDescr { file, .. }
            | FixtureError::Unclosed { file, .. }
            | FixtureError::Mismatched { file, .. }
            | FixtureError::StrayClose { file, .. }
            | FixtureError::Malformed { file, .. }
            | FixtureError::Analysis { file, .. } => file,
        }
    }
}

/// One expected finding parsed from a marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedAnnotation {
    /// Byte span of the wrapped text in the clean source.
    pub span: Span,
    /// Expected message (`descr`).
    pub message: String,
    /// Marker tag.
    pub severity: Severity,
}

/// A fixture with its markers removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFixture {
    /// Fixture path.
    pub path: String,
    /// Source with every marker stripped.
    pub clean_text: String,
    /// Expected findings in marker order.
    pub expected: Vec<ExpectedAnnotation>,
}

struct OpenMarker {
    tag: Severity,
    descr: String,
    start: usize,
    line: u32,
}

/// Strip markers from `text`, collecting the expected annotations.
pub fn parse_fixture(path: &str, text: &str) -> Result<ParsedFixture, FixtureError> {
    let mut clean = String::with_capacity(text.len());
    let mut expected = Vec::new();
    let mut stack: Vec<OpenMarker> = Vec::new();
    let mut pos = 0;

    while let Some(rel) = text[pos..].find('<') {
        let at = pos + rel;
        clean.push_str(&text[pos..at]);
        let rest = &text[at..];
        let line = line_of_offset(text, at);

        if let Some(tag) = marker_tag(rest, "</") {
            let mut input = rest;
            let found = close_marker.parse_next(&mut input).map_err(|_| FixtureError::Malformed {
                file: path.to_string(),
                line,
                tag: tag.to_string(),
            })?;
            let Some(open) = stack.pop() else {
                return Err(FixtureError::StrayClose {
                    file: path.to_string(),
                    line,
                    tag: found.as_str().to_string(),
                });
            };
            if open.tag != found {
                return Err(FixtureError::Mismatched {
                    file: path.to_string(),
                    line,
                    expected: open.tag.as_str().to_string(),
                    found: found.as_str().to_string(),
                });
            }
            expected.push(ExpectedAnnotation {
                span: Span::new(open.start, clean.len()),
                message: open.descr,
                severity: open.tag,
            });
            pos = at + (rest.len() - input.len());
        } else if let Some(tag) = marker_tag(rest, "<") {
            let mut input = rest;
            let (severity, attributes) =
                open_marker.parse_next(&mut input).map_err(|_| FixtureError::Malformed {
                    file: path.to_string(),
                    line,
                    tag: tag.to_string(),
                })?;
            let descr = attributes
                .into_iter()
                .find(|(name, _)| name == "descr")
                .map(|(_, value)| value)
                .ok_or_else(|| FixtureError::MissingDescr {
                    file: path.to_string(),
                    line,
                    tag: tag.to_string(),
                })?;
            stack.push(OpenMarker {
                tag: severity,
                descr,
                start: clean.len(),
                line,
            });
            pos = at + (rest.len() - input.len());
        } else {
            clean.push('<');
            pos = at + 1;
        }
    }
    clean.push_str(&text[pos..]);

    if let Some(open) = stack.pop() {
        return Err(FixtureError::Unclosed {
            file: path.to_string(),
            line: open.line,
            tag: open.tag.as_str().to_string(),
        });
    }

    expected.sort_by_key(|a| a.span);
    debug!(path, markers = expected.len(), "parsed fixture");

    Ok(ParsedFixture {
        path: path.to_string(),
        clean_text: clean,
        expected,
    })
}

/// If `rest` starts with `prefix` followed by a marker tag and a tag
/// terminator, return the tag name.
fn marker_tag(rest: &str, prefix: &str) -> Option<&'static str> {
    let after = rest.strip_prefix(prefix)?;
    if prefix == "<" && after.starts_with('/') {
        return None;
    }
    MARKER_TAGS.iter().copied().find(|tag| {
        after.strip_prefix(tag).is_some_and(|tail| {
            tail.starts_with('>') || tail.starts_with(|c: char| c.is_ascii_whitespace())
        })
    })
}

// ============================================================================
// Marker parsers (winnow)
// ============================================================================

fn tag_name(input: &mut &str) -> ModalResult<Severity> {
    alt((
        "weak_warning".value(Severity::WeakWarning),
        "warning".value(Severity::Warning),
        "error".value(Severity::Error),
        "info".value(Severity::Info),
    ))
    .parse_next(input)
}

fn quoted(input: &mut &str) -> ModalResult<String> {
    alt((
        delimited('"', take_till(0.., |c| c == '"'), '"'),
        delimited('\'', take_till(0.., |c| c == '\''), '\''),
    ))
    .map(unescape)
    .parse_next(input)
}

fn attribute(input: &mut &str) -> ModalResult<(String, String)> {
    let _ = multispace1.parse_next(input)?;
    let name: &str =
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-').parse_next(input)?;
    let _ = (multispace0, '=', multispace0).parse_next(input)?;
    let value = quoted(input)?;
    Ok((name.to_string(), value))
}

fn open_marker(input: &mut &str) -> ModalResult<(Severity, Vec<(String, String)>)> {
    let _ = '<'.parse_next(input)?;
    let tag = tag_name(input)?;
    let attributes: Vec<(String, String)> = repeat(0.., attribute).parse_next(input)?;
    let _ = (multispace0, '>').parse_next(input)?;
    Ok((tag, attributes))
}

fn close_marker(input: &mut &str) -> ModalResult<Severity> {
    delimited("</", tag_name, (multispace0, '>')).parse_next(input)
}

fn unescape(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

// ============================================================================
// Verification
// ============================================================================

/// Kind of verification mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// A finding with no matching annotation.
    Unexpected,
    /// An annotation with no matching finding.
    Missing,
}

/// One difference between expected and actual findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub location: Location,
    pub span: Span,
    pub message: String,
    pub severity: Severity,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            MismatchKind::Unexpected => "unexpected finding",
            MismatchKind::Missing => "missing finding",
        };
        write!(f, "{}: {} {} {}: {}", self.location, kind, self.severity, self.span, self.message)
    }
}

/// Outcome of verifying one fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub path: String,
    pub expected_count: usize,
    pub actual_count: usize,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    /// True when annotations and findings match exactly.
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compare annotations against the findings reported for the fixture file.
///
/// Matching is by (span, message, severity) and counts duplicates. The
/// marker tag is the expected severity. Findings for other files are ignored.
pub fn verify(fixture: &ParsedFixture, findings: &[Finding]) -> VerifyReport {
    let actual: Vec<&Finding> = findings.iter().filter(|f| f.site.file == fixture.path).collect();

    let mut pending: HashMap<(Span, &str, Severity), usize> = HashMap::new();
    for annotation in &fixture.expected {
        *pending
            .entry((annotation.span, annotation.message.as_str(), annotation.severity))
            .or_default() += 1;
    }

    let mut mismatches = Vec::new();
    for finding in &actual {
        match pending.get_mut(&(finding.site.span, finding.message.as_str(), finding.severity)) {
            Some(count) if *count > 0 => *count -= 1,
            _ => mismatches.push(mismatch(
                fixture,
                MismatchKind::Unexpected,
                finding.site.span,
                &finding.message,
                finding.severity,
            )),
        }
    }

    for annotation in &fixture.expected {
        let key = (annotation.span, annotation.message.as_str(), annotation.severity);
        if let Some(count) = pending.get_mut(&key) {
            if *count > 0 {
                *count -= 1;
                mismatches.push(mismatch(
                    fixture,
                    MismatchKind::Missing,
                    annotation.span,
                    &annotation.message,
                    annotation.severity,
                ));
            }
        }
    }

    mismatches.sort_by(|a, b| (a.span, a.kind as u8).cmp(&(b.span, b.kind as u8)));

    VerifyReport {
        path: fixture.path.clone(),
        expected_count: fixture.expected.len(),
        actual_count: actual.len(),
        mismatches,
    }
}

fn mismatch(fixture: &ParsedFixture, kind: MismatchKind, span: Span, message: &str, severity: Severity) -> Mismatch {
    Mismatch {
        kind,
        location: Location::from_span(fixture.path.clone(), &fixture.clean_text, span),
        span,
        message: message.to_string(),
        severity,
    }
}

/// Parse a fixture, analyze it together with `context` files, run `rules`
/// and verify the findings.
pub fn verify_fixture<A: LanguageAdapter>(
    adapter: &A,
    rules: &RuleSet,
    path: &str,
    text: &str,
    context: &[SourceText],
) -> Result<VerifyReport, FixtureError> {
    let fixture = parse_fixture(path, text)?;

    let mut sources = Vec::with_capacity(context.len() + 1);
    sources.push(SourceText::new(path, fixture.clean_text.clone()));
    sources.extend(context.iter().filter(|s| s.path != path).cloned());

    let unit = CompilationUnit::build(adapter, &sources);
    if let Some(skipped) = unit.skipped().iter().find(|s| s.path == path) {
        return Err(FixtureError::Analysis {
            file: path.to_string(),
            reason: skipped.reason.clone(),
        });
    }

    let findings = rules.check(&unit);
    Ok(verify(&fixture, &findings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{ClassIdentity, InstantiationSite};

    const MSG: &str = "Fluent should not be instantiated directly.";

    fn finding(path: &str, span: Span, message: &str) -> Finding {
        finding_with(path, span, message, Severity::WeakWarning)
    }

    fn finding_with(path: &str, span: Span, message: &str, severity: Severity) -> Finding {
        Finding {
            rule: "r".to_string(),
            site: InstantiationSite {
                raw_class_ref: "X".to_string(),
                resolved: ClassIdentity::new("X"),
                span,
                namespace: String::new(),
                file: path.to_string(),
            },
            message: message.to_string(),
            severity,
        }
    }

    mod parse {
        use super::*;

        #[test]
        fn strips_marker_and_records_span() {
            let text = format!(
                "<?php\nnew <weak_warning descr=\"{}\">FluentDirect</weak_warning>();\n",
                MSG
            );
            let parsed = parse_fixture("f.php", &text).unwrap();
            assert_eq!(parsed.clean_text, "<?php\nnew FluentDirect();\n");
            assert_eq!(parsed.expected.len(), 1);
            let annotation = &parsed.expected[0];
            assert_eq!(&parsed.clean_text[annotation.span.as_range()], "FluentDirect");
            assert_eq!(annotation.message, MSG);
            assert_eq!(annotation.severity, Severity::WeakWarning);
        }

        #[test]
        fn php_angle_brackets_are_text() {
            let text = "<?php if ($a < $b && $c <= 1) { echo <<<EOT\nx\nEOT; }";
            let parsed = parse_fixture("f.php", text).unwrap();
            assert_eq!(parsed.clean_text, text);
            assert!(parsed.expected.is_empty());
        }

        #[test]
        fn entities_are_unescaped() {
            let text = "<error descr=\"&quot;A&quot; &amp; &lt;B&gt;\">x</error>";
            let parsed = parse_fixture("f.php", text).unwrap();
            assert_eq!(parsed.expected[0].message, "\"A\" & <B>");
        }

        #[test]
        fn extra_attributes_and_single_quotes() {
            let text = "<warning textAttributesKey='K' descr='msg'>x</warning>";
            let parsed = parse_fixture("f.php", text).unwrap();
            assert_eq!(parsed.expected[0].message, "msg");
            assert_eq!(parsed.expected[0].severity, Severity::Warning);
        }

        #[test]
        fn nested_markers() {
            let text = "<warning descr=\"outer\">a<info descr=\"inner\">b</info>c</warning>";
            let parsed = parse_fixture("f.php", text).unwrap();
            assert_eq!(parsed.clean_text, "abc");
            assert_eq!(parsed.expected.len(), 2);
            assert_eq!(parsed.expected[0].span, Span::new(0, 3));
            assert_eq!(parsed.expected[1].span, Span::new(1, 2));
        }
    }

    mod malformed {
        use super::*;

        #[test]
        fn missing_descr_names_line() {
            let err = parse_fixture("f.php", "<?php\n\n<warning>x</warning>").unwrap_err();
            assert_eq!(
                err,
                FixtureError::MissingDescr {
                    file: "f.php".to_string(),
                    line: 3,
                    tag: "warning".to_string()
                }
            );
            assert!(err.to_string().starts_with("f.php:3:"));
        }

        #[test]
        fn unclosed_marker() {
            let err = parse_fixture("f.php", "<error descr=\"m\">x").unwrap_err();
            assert!(matches!(err, FixtureError::Unclosed { line: 1, .. }));
        }

        #[test]
        fn mismatched_close() {
            let err = parse_fixture("f.php", "<error descr=\"m\">x</warning>").unwrap_err();
            assert!(matches!(err, FixtureError::Mismatched { .. }));
        }

        #[test]
        fn stray_close() {
            let err = parse_fixture("f.php", "x</info>").unwrap_err();
            assert!(matches!(err, FixtureError::StrayClose { .. }));
        }

        #[test]
        fn broken_attribute() {
            let err = parse_fixture("f.php", "<error descr=\"m>x</error>").unwrap_err();
            assert!(matches!(err, FixtureError::Malformed { .. }));
        }
    }

    mod matching {
        use super::*;

        fn fixture() -> ParsedFixture {
            parse_fixture(
                "f.php",
                &format!("new <weak_warning descr=\"{}\">A</weak_warning>();", MSG),
            )
            .unwrap()
        }

        #[test]
        fn exact_match_passes() {
            let report = verify(&fixture(), &[finding("f.php", Span::new(4, 5), MSG)]);
            assert!(report.passed());
            assert_eq!(report.expected_count, 1);
            assert_eq!(report.actual_count, 1);
        }

        #[test]
        fn wrong_message_is_both_unexpected_and_missing() {
            let report = verify(&fixture(), &[finding("f.php", Span::new(4, 5), "other")]);
            let kinds: Vec<_> = report.mismatches.iter().map(|m| m.kind).collect();
            assert_eq!(kinds, vec![MismatchKind::Unexpected, MismatchKind::Missing]);
        }

        #[test]
        fn marker_tag_must_match_severity() {
            let report = verify(
                &fixture(),
                &[finding_with("f.php", Span::new(4, 5), MSG, Severity::Error)],
            );
            assert!(!report.passed());
            let got: Vec<_> = report.mismatches.iter().map(|m| (m.kind, m.severity)).collect();
            assert_eq!(
                got,
                vec![
                    (MismatchKind::Unexpected, Severity::Error),
                    (MismatchKind::Missing, Severity::WeakWarning),
                ]
            );
            assert!(report.mismatches[0].to_string().contains("unexpected finding error"));
        }

        #[test]
        fn duplicate_finding_is_unexpected() {
            let report = verify(
                &fixture(),
                &[
                    finding("f.php", Span::new(4, 5), MSG),
                    finding("f.php", Span::new(4, 5), MSG),
                ],
            );
            assert_eq!(report.mismatches.len(), 1);
            assert_eq!(report.mismatches[0].kind, MismatchKind::Unexpected);
        }

        #[test]
        fn findings_in_other_files_are_ignored() {
            let report = verify(
                &fixture(),
                &[
                    finding("f.php", Span::new(4, 5), MSG),
                    finding("other.php", Span::new(0, 1), MSG),
                ],
            );
            assert!(report.passed());
        }

        #[test]
        fn missing_finding_reports_location() {
            let report = verify(&fixture(), &[]);
            assert_eq!(report.mismatches.len(), 1);
            let mismatch = &report.mismatches[0];
            assert_eq!(mismatch.kind, MismatchKind::Missing);
            assert_eq!(mismatch.location.to_string(), "f.php:1:5");
            assert!(mismatch.to_string().contains("missing finding"));
        }
    }
}
