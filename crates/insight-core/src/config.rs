//! Configuration handling for insight.
//!
//! Rules are read from `insight.toml` in the workspace root:
//!
//! ```toml
//! [[rules]]
//! name = "fluent-direct-instantiation"
//! restricted_class = "Illuminate\\Support\\Fluent"
//! message = "{class} should not be instantiated directly."
//! severity = "weak_warning"
//!
//! [workspace]
//! exclude = ["vendor/**/tests/**"]
//! ```
//!
//! A malformed rule entry does not fail the whole file: it surfaces as a
//! [`ConfigError`] for that rule and the remaining rules still load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rule::{RuleConfig, Severity};

/// File name looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = "insight.toml";

/// Restricted class used when no rules are configured.
pub const DEFAULT_RESTRICTED_CLASS: &str = "Illuminate\\Support\\Fluent";

/// Errors raised while loading configuration or registering a rule.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("rule '{rule}': restricted_class is required")]
    MissingRestrictedClass { rule: String },

    #[error("rule '{rule}': restricted_class must be a string, found {found}")]
    RestrictedClassNotString { rule: String, found: String },

    #[error("rule '{rule}': restricted_class is empty")]
    EmptyRestrictedClass { rule: String },

    #[error("rule '{rule}': '{value}' is not a valid class name")]
    InvalidClassName { rule: String, value: String },

    #[error("rule '{rule}': message template is empty")]
    EmptyMessage { rule: String },

    #[error("rule '{rule}': unknown severity '{value}'")]
    UnknownSeverity { rule: String, value: String },

    #[error("rule '{rule}': {field} must be {expected}, found {found}")]
    WrongFieldType {
        rule: String,
        field: &'static str,
        expected: &'static str,
        found: String,
    },
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Rule instances. Empty means "use the default rule".
    #[serde(default)]
    pub rules: Vec<RawRule>,

    /// File discovery settings.
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

/// A rule entry as written in the config file, before validation.
///
/// Every field is kept as a raw value so a wrongly typed field disables only
/// this rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRule {
    /// Rule name used in findings (defaults to one derived from the class).
    #[serde(default)]
    pub name: Option<toml::Value>,

    #[serde(default)]
    pub restricted_class: Option<toml::Value>,

    /// Message template.
    #[serde(default)]
    pub message: Option<toml::Value>,

    /// Severity name (`error`, `warning`, `weak_warning`, `info`).
    #[serde(default)]
    pub severity: Option<toml::Value>,

    /// Treat empty-bodied subclasses as renames of their parent (default `true`).
    #[serde(default)]
    pub collapse_empty_subclasses: Option<toml::Value>,
}

/// Workspace discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Glob patterns (relative to the workspace root) to skip.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl RawRule {
    /// Validate this entry into a [`RuleConfig`].
    ///
    /// `index` is the entry's position in the file and labels errors for
    /// unnamed rules.
    pub fn to_rule_config(&self, index: usize) -> Result<RuleConfig, ConfigError> {
        let fallback = format!("rules[{}]", index);
        let name = match &self.name {
            None => None,
            Some(toml::Value::String(s)) => Some(s.as_str()),
            Some(other) => return Err(wrong_type(&fallback, "name", "a string", other)),
        };
        let label = name.map_or(fallback, str::to_string);

        let restricted = match &self.restricted_class {
            None => return Err(ConfigError::MissingRestrictedClass { rule: label }),
            Some(toml::Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(ConfigError::RestrictedClassNotString {
                    rule: label,
                    found: other.type_str().to_string(),
                })
            }
        };

        let mut config = RuleConfig::new(name, restricted).map_err(|e| {
            // Re-label errors raised before a name could be derived.
            relabel(e, &label)
        })?;

        match &self.message {
            None => {}
            Some(toml::Value::String(message)) => config = config.with_message(message)?,
            Some(other) => return Err(wrong_type(&config.name, "message", "a string", other)),
        }

        match &self.severity {
            None => {}
            Some(toml::Value::String(severity)) => {
                let parsed = Severity::parse(severity).ok_or_else(|| ConfigError::UnknownSeverity {
                    rule: config.name.clone(),
                    value: severity.clone(),
                })?;
                config = config.with_severity(parsed);
            }
            Some(other) => return Err(wrong_type(&config.name, "severity", "a string", other)),
        }

        match &self.collapse_empty_subclasses {
            None => {}
            Some(toml::Value::Boolean(collapse)) => config = config.with_collapse(*collapse),
            Some(other) => {
                return Err(wrong_type(&config.name, "collapse_empty_subclasses", "a boolean", other))
            }
        }

        Ok(config)
    }
}

fn wrong_type(rule: &str, field: &'static str, expected: &'static str, found: &toml::Value) -> ConfigError {
    ConfigError::WrongFieldType {
        rule: rule.to_string(),
        field,
        expected,
        found: found.type_str().to_string(),
    }
}

fn relabel(err: ConfigError, label: &str) -> ConfigError {
    match err {
        ConfigError::EmptyRestrictedClass { .. } => ConfigError::EmptyRestrictedClass {
            rule: label.to_string(),
        },
        ConfigError::InvalidClassName { value, .. } => ConfigError::InvalidClassName {
            rule: label.to_string(),
            value,
        },
        other => other,
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse configuration text; `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load `insight.toml` from the given workspace root, or the defaults.
    pub fn load_from_project(workspace_root: &Path) -> Result<Self, ConfigError> {
        let config_path = workspace_root.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Validate every rule entry.
    ///
    /// With no entries, the default Fluent rule is returned.
    pub fn rule_configs(&self) -> Vec<Result<RuleConfig, ConfigError>> {
        if self.rules.is_empty() {
            return vec![RuleConfig::new(None, DEFAULT_RESTRICTED_CLASS)];
        }
        self.rules
            .iter()
            .enumerate()
            .map(|(i, raw)| raw.to_rule_config(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(content: &str) -> Config {
        Config::parse(content, Path::new("insight.toml")).unwrap()
    }

    #[test]
    fn empty_config_yields_default_rule() {
        let config = parse("");
        let rules = config.rule_configs();
        assert_eq!(rules.len(), 1);
        let rule = rules[0].as_ref().unwrap();
        assert_eq!(rule.restricted_class.as_str(), DEFAULT_RESTRICTED_CLASS);
        assert!(rule.collapse_empty_subclasses);
    }

    #[test]
    fn full_rule_entry_is_honoured() {
        let config = parse(
            r#"
            [[rules]]
            name = "no-raw-collection"
            restricted_class = "\\Illuminate\\Support\\Collection"
            message = "Use collect() instead of new {class}."
            severity = "error"
            collapse_empty_subclasses = false
            "#,
        );
        let rule = config.rule_configs().remove(0).unwrap();
        assert_eq!(rule.name, "no-raw-collection");
        assert_eq!(rule.restricted_class.as_str(), "Illuminate\\Support\\Collection");
        assert_eq!(rule.severity, Severity::Error);
        assert!(!rule.collapse_empty_subclasses);
    }

    #[test]
    fn non_string_restricted_class_disables_only_that_rule() {
        let config = parse(
            r#"
            [[rules]]
            restricted_class = 42

            [[rules]]
            restricted_class = "App\\Base"
            "#,
        );
        let rules = config.rule_configs();
        assert!(matches!(
            rules[0],
            Err(ConfigError::RestrictedClassNotString { ref found, .. }) if found == "integer"
        ));
        assert!(rules[1].is_ok());
    }

    #[test]
    fn wrongly_typed_field_disables_only_that_rule() {
        let config = parse(
            r#"
            [[rules]]
            restricted_class = "App\\Base"

            [[rules]]
            name = "bad-message"
            restricted_class = "App\\Other"
            message = 5

            [[rules]]
            restricted_class = "App\\Third"
            collapse_empty_subclasses = "yes"
            "#,
        );
        let rules = config.rule_configs();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(rules[0].as_ref().unwrap().restricted_class.as_str(), "App\\Base");

        let err = rules[1].as_ref().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::WrongFieldType { rule, field: "message", found, .. }
                if rule == "bad-message" && found == "integer"
        ));
        assert_eq!(err.to_string(), "rule 'bad-message': message must be a string, found integer");
        assert!(matches!(
            rules[2],
            Err(ConfigError::WrongFieldType { field: "collapse_empty_subclasses", .. })
        ));
    }

    #[test]
    fn non_string_name_is_labelled_by_position() {
        let config = parse(
            r#"
            [[rules]]
            name = ["x"]
            restricted_class = "App\\Base"
            severity = 3
            "#,
        );
        assert!(matches!(
            config.rule_configs()[0],
            Err(ConfigError::WrongFieldType { ref rule, field: "name", .. }) if rule == "rules[0]"
        ));
    }

    #[test]
    fn missing_and_empty_restricted_class_are_errors() {
        let config = parse(
            r#"
            [[rules]]
            name = "nothing"

            [[rules]]
            restricted_class = ""
            "#,
        );
        let rules = config.rule_configs();
        assert!(matches!(rules[0], Err(ConfigError::MissingRestrictedClass { ref rule }) if rule == "nothing"));
        assert!(matches!(rules[1], Err(ConfigError::EmptyRestrictedClass { ref rule }) if rule == "rules[1]"));
    }

    #[test]
    fn unknown_severity_is_error() {
        let config = parse(
            r#"
            [[rules]]
            restricted_class = "App\\Base"
            severity = "catastrophic"
            "#,
        );
        assert!(matches!(
            config.rule_configs()[0],
            Err(ConfigError::UnknownSeverity { .. })
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::parse("[[rules]\nname=", Path::new("insight.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_from_project_without_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from_project(dir.path()).unwrap();
        assert!(config.rules.is_empty());
        assert!(config.workspace.exclude.is_empty());
    }

    #[test]
    fn load_from_project_reads_workspace_excludes() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[workspace]\nexclude = [\"vendor/**\"]\n",
        )
        .unwrap();
        let config = Config::load_from_project(dir.path()).unwrap();
        assert_eq!(config.workspace.exclude, vec!["vendor/**".to_string()]);
    }
}
