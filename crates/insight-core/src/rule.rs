//! Rule engine: classify instantiation sites against a restricted base class.
//!
//! Each [`RuleEngine`] is configured with one restricted class. For every
//! [`InstantiationSite`] it reaches one terminal [`Verdict`]:
//!
//! | Instantiated class | Verdict |
//! |--------------------|---------|
//! | the restricted class itself (any spelling or alias) | `Flagged` |
//! | an empty-bodied rename of it (when collapsing is on) | `Flagged` |
//! | a proper subclass that declares something | `Exempt(Descendant)` |
//! | anything else | `Exempt(Unrelated)` |
//!
//! Several rules can run side by side in a [`RuleSet`]. A rule whose
//! configuration is invalid is reported once and skipped; the others run.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::facts::{ClassIdentity, InstantiationSite};
use crate::hierarchy::ClassHierarchyIndex;
use crate::unit::CompilationUnit;

/// Message template used when none is configured.
pub const DEFAULT_MESSAGE: &str = "{class} should not be instantiated directly.";

// ============================================================================
// Severity
// ============================================================================

/// How prominently a host should render a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    #[default]
    WeakWarning,
    Info,
}

impl Severity {
    /// Parse a severity name (`weak_warning`, `weak-warning` and `WEAK_WARNING` all work).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "weak_warning" => Some(Severity::WeakWarning),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }

    /// Stable name, also used as the fixture marker tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::WeakWarning => "weak_warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RuleConfig
// ============================================================================

/// Validated configuration for one rule instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleConfig {
    /// Name reported with each finding.
    pub name: String,
    /// The base class that must not be instantiated directly.
    pub restricted_class: ClassIdentity,
    /// Message template (`{class}`, `{fqcn}`, `{written}`).
    pub message: String,
    /// Severity of findings.
    pub severity: Severity,
    /// Treat empty-bodied subclasses as renames of their parent.
    pub collapse_empty_subclasses: bool,
}

static CLASS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\\?[A-Za-z_\x{80}-\x{10FFFF}][A-Za-z0-9_\x{80}-\x{10FFFF}]*(\\[A-Za-z_\x{80}-\x{10FFFF}][A-Za-z0-9_\x{80}-\x{10FFFF}]*)*$",
    )
    .unwrap()
});

/// Whether `name` is a syntactically valid (optionally rooted) class name.
pub fn is_valid_class_name(name: &str) -> bool {
    let short = name.rsplit('\\').next().unwrap_or(name);
    CLASS_NAME.is_match(name)
        && !matches!(
            short.to_ascii_lowercase().as_str(),
            "self" | "static" | "parent"
        )
}

impl RuleConfig {
    /// Create a rule for `restricted_class` with the default message and severity.
    ///
    /// Without a `name`, one is derived from the class short name
    /// (`Fluent` → `fluent-direct-instantiation`).
    pub fn new(name: Option<&str>, restricted_class: &str) -> Result<Self, ConfigError> {
        let trimmed = restricted_class.trim();
        let label = name.unwrap_or(trimmed).to_string();

        if trimmed.is_empty() || trimmed == "\\" {
            return Err(ConfigError::EmptyRestrictedClass { rule: label });
        }
        if !is_valid_class_name(trimmed) {
            return Err(ConfigError::InvalidClassName {
                rule: label,
                value: trimmed.to_string(),
            });
        }

        let restricted_class = ClassIdentity::new(trimmed);
        let name = match name {
            Some(n) => n.to_string(),
            None => format!(
                "{}-direct-instantiation",
                restricted_class.short_name().to_ascii_lowercase()
            ),
        };

        Ok(RuleConfig {
            name,
            restricted_class,
            message: DEFAULT_MESSAGE.to_string(),
            severity: Severity::default(),
            collapse_empty_subclasses: true,
        })
    }

    /// Replace the message template.
    pub fn with_message(mut self, template: &str) -> Result<Self, ConfigError> {
        if template.trim().is_empty() {
            return Err(ConfigError::EmptyMessage { rule: self.name });
        }
        self.message = template.to_string();
        Ok(self)
    }

    /// Replace the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Turn empty-subclass collapsing on or off.
    pub fn with_collapse(mut self, collapse: bool) -> Self {
        self.collapse_empty_subclasses = collapse;
        self
    }

    /// Render the message template for a site.
    pub fn render_message(&self, site: &InstantiationSite) -> String {
        self.message
            .replace("{class}", self.restricted_class.short_name())
            .replace("{fqcn}", self.restricted_class.as_str())
            .replace("{written}", &site.raw_class_ref)
    }
}

// ============================================================================
// Verdicts and Findings
// ============================================================================

/// Why a site produced no finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptReason {
    /// The class is a genuine subclass of the restricted class.
    Descendant,
    /// The class has nothing to do with the restricted class.
    Unrelated,
}

/// Terminal classification of one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Flagged,
    Exempt(ExemptReason),
}

/// A reported rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Name of the rule that produced the finding.
    pub rule: String,
    /// The offending site.
    pub site: InstantiationSite,
    /// Rendered message.
    pub message: String,
    /// Severity.
    pub severity: Severity,
}

// ============================================================================
// RuleEngine
// ============================================================================

/// Evaluates sites against one restricted class.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    config: RuleConfig,
}

impl RuleEngine {
    /// Create an engine from a validated configuration.
    pub fn new(config: RuleConfig) -> Self {
        RuleEngine { config }
    }

    /// The rule's configuration.
    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Classify a site.
    pub fn classify(&self, site: &InstantiationSite, index: &ClassHierarchyIndex) -> Verdict {
        let restricted = &self.config.restricted_class;

        if &site.resolved == restricted {
            return Verdict::Flagged;
        }

        if self.config.collapse_empty_subclasses
            && index.rename_chain(&site.resolved).iter().any(|c| c == restricted)
        {
            return Verdict::Flagged;
        }

        if index.is_strict_descendant_of(&site.resolved, restricted) {
            Verdict::Exempt(ExemptReason::Descendant)
        } else {
            Verdict::Exempt(ExemptReason::Unrelated)
        }
    }

    /// Evaluate a site, producing a finding if it is flagged.
    pub fn evaluate(&self, site: &InstantiationSite, index: &ClassHierarchyIndex) -> Option<Finding> {
        let verdict = self.classify(site, index);
        debug!(
            rule = %self.config.name,
            file = %site.file,
            class = %site.resolved,
            written = %site.raw_class_ref,
            ?verdict,
            "classified instantiation"
        );
        match verdict {
            Verdict::Flagged => Some(Finding {
                rule: self.config.name.clone(),
                site: site.clone(),
                message: self.config.render_message(site),
                severity: self.config.severity,
            }),
            Verdict::Exempt(_) => None,
        }
    }

    /// Evaluate a sequence of sites.
    pub fn check<'a>(
        &self,
        sites: impl IntoIterator<Item = &'a InstantiationSite>,
        index: &ClassHierarchyIndex,
    ) -> Vec<Finding> {
        sites
            .into_iter()
            .filter_map(|site| self.evaluate(site, index))
            .collect()
    }
}

// ============================================================================
// RuleSet
// ============================================================================

/// Independently configured rules plus the registration errors of the
/// rules that were disabled.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<RuleEngine>,
    errors: Vec<ConfigError>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every configuration, keeping errors for the invalid ones.
    pub fn from_configs(configs: impl IntoIterator<Item = Result<RuleConfig, ConfigError>>) -> Self {
        let mut set = RuleSet::new();
        for config in configs {
            set.register(config);
        }
        set
    }

    /// Register one rule. An invalid configuration disables the rule for
    /// this run and is kept for reporting.
    pub fn register(&mut self, config: Result<RuleConfig, ConfigError>) {
        match config {
            Ok(config) => self.rules.push(RuleEngine::new(config)),
            Err(err) => {
                warn!(error = %err, "rule disabled");
                self.errors.push(err);
            }
        }
    }

    /// Active rules.
    pub fn rules(&self) -> &[RuleEngine] {
        &self.rules
    }

    /// Registration errors of disabled rules.
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    /// Whether no rule is active.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every active rule over every file of the unit.
    ///
    /// Findings are ordered by file, then position, then rule name.
    pub fn check(&self, unit: &CompilationUnit) -> Vec<Finding> {
        let mut findings = Vec::new();
        for file in unit.files() {
            for rule in &self.rules {
                findings.extend(rule.check(&file.sites, unit.index()));
            }
        }
        findings.sort_by(|a, b| {
            (&a.site.file, a.site.span.start, &a.rule).cmp(&(&b.site.file, b.site.span.start, &b.rule))
        });
        findings
    }
}
