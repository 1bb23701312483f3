//! JSON and text output for CLI responses.
//!
//! Every response carries `status` and `schema_version`. Output is
//! deterministic: findings are sorted by location, then rule.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{InsightError, OutputErrorCode};
use crate::fixture::VerifyReport;
use crate::rule::{Finding, Severity};
use crate::types::Location;
use crate::unit::{CompilationUnit, SkippedFile};

/// Version of the JSON output schema.
pub const SCHEMA_VERSION: &str = "1";

/// A finding as rendered for output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingInfo {
    /// Rule name.
    pub rule: String,
    /// Where the class reference is.
    pub location: Location,
    /// Severity.
    pub severity: Severity,
    /// Rendered message.
    pub message: String,
    /// Class reference as written.
    pub class_ref: String,
    /// Fully-qualified class the reference resolves to.
    pub resolved: String,
}

impl FindingInfo {
    /// Convert a finding, computing line and column from `content`.
    pub fn from_finding(finding: &Finding, content: &str) -> Self {
        FindingInfo {
            rule: finding.rule.clone(),
            location: Location::from_span(finding.site.file.clone(), content, finding.site.span),
            severity: finding.severity,
            message: finding.message.clone(),
            class_ref: finding.site.raw_class_ref.clone(),
            resolved: finding.site.resolved.to_string(),
        }
    }

    /// Render as `path:line:col: severity: message [rule]`.
    pub fn to_text(&self) -> String {
        format!("{}: {}: {} [{}]", self.location, self.severity, self.message, self.rule)
    }
}

/// Convert findings against the files of `unit`, sorted by location.
pub fn finding_infos(findings: &[Finding], unit: &CompilationUnit) -> Vec<FindingInfo> {
    let mut infos: Vec<FindingInfo> = findings
        .iter()
        .map(|f| {
            let content = unit.file(&f.site.file).map(|u| u.content.as_str()).unwrap_or("");
            FindingInfo::from_finding(f, content)
        })
        .collect();
    infos.sort_by(|a, b| (&a.location, &a.rule).cmp(&(&b.location, &b.rule)));
    infos
}

/// Response for the `check` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    /// "ok" when clean, "findings" when anything was reported.
    pub status: String,
    pub schema_version: String,
    /// Compilation unit fingerprint.
    pub fingerprint: String,
    pub files_analyzed: usize,
    pub findings: Vec<FindingInfo>,
    /// Messages of rules disabled by invalid configuration.
    pub config_errors: Vec<String>,
    pub skipped_files: Vec<SkippedFile>,
}

impl CheckResponse {
    /// Build a response from a unit and its findings.
    pub fn new(unit: &CompilationUnit, findings: Vec<FindingInfo>, config_errors: Vec<String>) -> Self {
        let status = if findings.is_empty() { "ok" } else { "findings" };
        CheckResponse {
            status: status.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            fingerprint: unit.fingerprint().to_string(),
            files_analyzed: unit.files().len(),
            findings,
            config_errors,
            skipped_files: unit.skipped().to_vec(),
        }
    }
}

/// Response for the `verify` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// "ok" when every fixture passed, "failed" otherwise.
    pub status: String,
    pub schema_version: String,
    pub passed: bool,
    pub expected_count: usize,
    pub actual_count: usize,
    pub fixtures: Vec<VerifyReport>,
}

impl VerifyResponse {
    /// Summarize per-fixture reports.
    pub fn new(fixtures: Vec<VerifyReport>) -> Self {
        let passed = fixtures.iter().all(VerifyReport::passed);
        VerifyResponse {
            status: if passed { "ok" } else { "failed" }.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            passed,
            expected_count: fixtures.iter().map(|f| f.expected_count).sum(),
            actual_count: fixtures.iter().map(|f| f.actual_count).sum(),
            fixtures,
        }
    }

    /// Number of fixtures that failed.
    pub fn failed_count(&self) -> usize {
        self.fixtures.iter().filter(|f| !f.passed()).count()
    }
}

/// Error details for error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code (also the exit code).
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Where the error occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ErrorInfo {
    /// Create from an InsightError.
    pub fn from_error(err: &InsightError) -> Self {
        let location = match err {
            InsightError::MalformedFixture {
                file,
                line: Some(line),
                ..
            } => Some(Location::new(file.clone(), *line, 1)),
            _ => None,
        };
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
            location,
        }
    }
}

/// Response for any failed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always "error".
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Wrap an error.
    pub fn from_error(err: &InsightError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{ClassIdentity, InstantiationSite};
    use crate::fixture::{Mismatch, MismatchKind};
    use crate::span::Span;

    fn finding() -> Finding {
        Finding {
            rule: "fluent-direct-instantiation".to_string(),
            site: InstantiationSite {
                raw_class_ref: "FluentDirect".to_string(),
                resolved: ClassIdentity::new("Illuminate\\Support\\Fluent"),
                span: Span::new(10, 22),
                namespace: "App".to_string(),
                file: "app/a.php".to_string(),
            },
            message: "Fluent should not be instantiated directly.".to_string(),
            severity: Severity::WeakWarning,
        }
    }

    #[test]
    fn finding_text_format() {
        let info = FindingInfo::from_finding(&finding(), "<?php\n$x = new FluentDirect();\n");
        assert_eq!(
            info.to_text(),
            "app/a.php:2:5: weak_warning: Fluent should not be instantiated directly. [fluent-direct-instantiation]"
        );
    }

    #[test]
    fn finding_json_shape() {
        let info = FindingInfo::from_finding(&finding(), "<?php\n$x = new FluentDirect();\n");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["severity"], "weak_warning");
        assert_eq!(json["resolved"], "Illuminate\\Support\\Fluent");
        assert_eq!(json["location"]["line"], 2);
    }

    #[test]
    fn verify_response_totals() {
        let ok = VerifyReport {
            path: "a.php".to_string(),
            expected_count: 2,
            actual_count: 2,
            mismatches: vec![],
        };
        let bad = VerifyReport {
            path: "b.php".to_string(),
            expected_count: 1,
            actual_count: 0,
            mismatches: vec![Mismatch {
                kind: MismatchKind::Missing,
                location: Location::new("b.php", 3, 5),
                span: Span::new(20, 26),
                message: "m".to_string(),
                severity: Severity::Error,
            }],
        };
        let response = VerifyResponse::new(vec![ok, bad]);
        assert!(!response.passed);
        assert_eq!(response.status, "failed");
        assert_eq!(response.expected_count, 3);
        assert_eq!(response.actual_count, 2);
        assert_eq!(response.failed_count(), 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["fixtures"][1]["mismatches"][0]["kind"], "missing");
        assert_eq!(json["fixtures"][1]["mismatches"][0]["severity"], "error");
    }

    #[test]
    fn error_response_carries_code() {
        let response = ErrorResponse::from_error(&InsightError::file_not_found("nope.php"));
        let mut out = Vec::new();
        emit_response(&response, &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["code"], 3);
        assert!(json["error"].get("location").is_none());
    }
}
