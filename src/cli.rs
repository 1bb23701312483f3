//! Command implementations behind the `insight` binary.
//!
//! - `check` - Analyze PHP sources and report restricted instantiations
//! - `verify` - Compare a fixture's inline markers against actual findings
//!
//! ## Rule Selection
//!
//! `--restricted-class` replaces the configured rules with a single rule for
//! that class. Otherwise rules come from `insight.toml` (or `--config`), and
//! with no configured rules the default Fluent rule runs. `--message` and
//! `--severity` replace the message template and severity of every selected
//! rule.
//!
//! ## Error Handling
//!
//! All functions return `Result<T, InsightError>`. Invalid rule entries do
//! not fail a run; they are reported in the response and that rule is
//! skipped. A run with no valid rule at all is a configuration error.

use std::fs;
use std::path::{Path, PathBuf};

use insight_core::adapter::SourceText;
use insight_core::config::{Config, ConfigError};
use insight_core::error::InsightError;
use insight_core::fixture::verify_fixture;
use insight_core::output::{finding_infos, CheckResponse, VerifyResponse};
use insight_core::rule::{RuleConfig, RuleSet, Severity};
use insight_core::unit::CompilationUnit;
use insight_core::workspace::{discover, display_path, load_sources, DiscoveryConfig};
use insight_php::adapter::PHP_EXTENSIONS;
use insight_php::PhpAdapter;
use tracing::{debug, info, warn};

/// How rules are chosen for a run.
#[derive(Debug, Clone, Default)]
pub struct RuleOptions {
    /// Explicit config file (default: `insight.toml` in the current directory).
    pub config: Option<PathBuf>,
    /// Single restricted class overriding the configured rules.
    pub restricted_class: Option<String>,
    /// Message template overriding every rule's message.
    pub message: Option<String>,
    /// Severity overriding every rule's severity.
    pub severity: Option<Severity>,
}

/// Arguments of `check`.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub rules: RuleOptions,
    /// Files or directories to analyze.
    pub paths: Vec<PathBuf>,
    /// Extra exclude globs, added to the configured ones.
    pub exclude: Vec<String>,
}

/// Arguments of `verify`.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub rules: RuleOptions,
    /// Fixture files.
    pub fixtures: Vec<PathBuf>,
    /// Additional sources analyzed with every fixture (files or directories).
    pub context: Vec<PathBuf>,
}

/// Load the configuration named by `options`, or the project default.
pub fn load_config(options: &RuleOptions) -> Result<Config, InsightError> {
    let config = match &options.config {
        Some(path) => {
            if !path.exists() {
                return Err(InsightError::file_not_found(display_path(path)));
            }
            Config::load(path)?
        }
        None => Config::load_from_project(Path::new("."))?,
    };
    Ok(config)
}

/// Build the rule set for a run.
///
/// Returns an error when no rule survived validation.
pub fn build_rule_set(config: &Config, options: &RuleOptions) -> Result<RuleSet, InsightError> {
    let mut configs: Vec<Result<RuleConfig, ConfigError>> = match &options.restricted_class {
        Some(class) => vec![RuleConfig::new(None, class)],
        None => config.rule_configs(),
    };

    if let Some(message) = &options.message {
        configs = configs
            .into_iter()
            .map(|c| c.and_then(|c| c.with_message(message)))
            .collect();
    }

    if let Some(severity) = options.severity {
        configs = configs.into_iter().map(|c| c.map(|c| c.with_severity(severity))).collect();
    }

    let rules = RuleSet::from_configs(configs);
    if rules.is_empty() {
        let message = rules
            .errors()
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(InsightError::ConfigError {
            message: format!("no valid rules: {}", message),
        });
    }

    for rule in rules.rules() {
        debug!(rule = %rule.config().name, class = %rule.config().restricted_class, "rule enabled");
    }
    Ok(rules)
}

fn discovery_config(exclude: impl IntoIterator<Item = String>) -> DiscoveryConfig {
    DiscoveryConfig {
        extensions: PHP_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        exclude_patterns: exclude.into_iter().collect(),
        ..DiscoveryConfig::default()
    }
}

fn read_sources(paths: &[PathBuf], exclude: Vec<String>) -> Result<Vec<SourceText>, InsightError> {
    let files = discover(paths, &discovery_config(exclude))?;
    debug!(count = files.len(), "discovered source files");
    Ok(load_sources(&files)?)
}

/// Run `check` and build its response.
pub fn run_check(options: &CheckOptions) -> Result<CheckResponse, InsightError> {
    if options.paths.is_empty() {
        return Err(InsightError::invalid_args("no paths given"));
    }

    let config = load_config(&options.rules)?;
    let rules = build_rule_set(&config, &options.rules)?;

    let exclude = config
        .workspace
        .exclude
        .iter()
        .chain(&options.exclude)
        .cloned()
        .collect();
    let sources = read_sources(&options.paths, exclude)?;

    let unit = CompilationUnit::build(&PhpAdapter, &sources);
    let findings = rules.check(&unit);
    info!(
        files = unit.files().len(),
        classes = unit.index().len(),
        findings = findings.len(),
        "check complete"
    );

    let config_errors = rules.errors().iter().map(|e| e.to_string()).collect();
    Ok(CheckResponse::new(&unit, finding_infos(&findings, &unit), config_errors))
}

/// Run `verify` over every fixture and build the combined response.
///
/// A fixture with malformed markers fails the whole run.
pub fn run_verify(options: &VerifyOptions) -> Result<VerifyResponse, InsightError> {
    if options.fixtures.is_empty() {
        return Err(InsightError::invalid_args("no fixtures given"));
    }

    let config = load_config(&options.rules)?;
    let rules = build_rule_set(&config, &options.rules)?;
    let context = if options.context.is_empty() {
        Vec::new()
    } else {
        read_sources(&options.context, config.workspace.exclude.clone())?
    };

    let mut reports = Vec::with_capacity(options.fixtures.len());
    for fixture in &options.fixtures {
        let path = display_path(fixture);
        if !fixture.is_file() {
            return Err(InsightError::file_not_found(path));
        }
        let text = fs::read_to_string(fixture).map_err(|e| InsightError::FileError {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let report = verify_fixture(&PhpAdapter, &rules, &path, &text, &context)?;
        if report.passed() {
            debug!(fixture = %path, expected = report.expected_count, "fixture passed");
        } else {
            for mismatch in &report.mismatches {
                warn!(fixture = %path, "{}", mismatch);
            }
        }
        reports.push(report);
    }

    Ok(VerifyResponse::new(reports))
}
