//! Binary entry point for the insight CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Report direct instantiations of the default restricted class
//! insight check app/ src/
//!
//! # JSON output, custom restricted class
//! insight check --format json --restricted-class 'App\Money' app/
//!
//! # Verify annotated fixtures
//! insight verify tests/fixtures/php/fluent/direct_instantiation.php
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};

use insight::cli::{run_check, run_verify, CheckOptions, RuleOptions, VerifyOptions};
use insight_core::error::{InsightError, FINDINGS_EXIT_CODE};
use insight_core::output::{emit_response, CheckResponse, ErrorResponse};
use insight_core::rule::Severity;
use tracing::warn;

// ============================================================================
// CLI Structure
// ============================================================================

/// Static inspections for PHP code.
///
/// Flags `new` expressions that instantiate a restricted base class directly,
/// through any import alias or empty facade subclass.
#[derive(Parser, Debug)]
#[command(name = "insight", version, about = "Static inspections for PHP code")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Args, Debug)]
struct GlobalArgs {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Configuration file (default: insight.toml in the current directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format for `check`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum CheckFormat {
    /// One line per finding (default).
    #[default]
    Text,
    /// Full JSON response.
    Json,
}

/// Rule selection arguments.
#[derive(Args, Debug, Clone)]
struct RuleArgs {
    /// Restricted class (fully qualified), replacing configured rules.
    #[arg(long)]
    restricted_class: Option<String>,
    /// Message template (`{class}`, `{fqcn}`, `{written}`).
    #[arg(long)]
    message: Option<String>,
    /// Severity of findings (error, warning, weak_warning, info).
    #[arg(long, value_parser = parse_severity)]
    severity: Option<Severity>,
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::parse(s).ok_or_else(|| format!("unknown severity '{}'", s))
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze PHP files and report restricted instantiations.
    Check {
        #[command(flatten)]
        rules: RuleArgs,
        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: CheckFormat,
        /// Glob of paths to skip (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
        /// Files or directories to analyze.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Verify annotated fixtures against actual findings.
    Verify {
        #[command(flatten)]
        rules: RuleArgs,
        /// Extra sources analyzed with each fixture (repeatable).
        #[arg(long)]
        context: Vec<PathBuf>,
        /// Fixture files.
        #[arg(required = true)]
        fixtures: Vec<PathBuf>,
    },
}

impl RuleArgs {
    fn into_options(self, global: &GlobalArgs) -> RuleOptions {
        RuleOptions {
            config: global.config.clone(),
            restricted_class: self.restricted_class,
            message: self.message,
            severity: self.severity,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like every other response.
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(err.error_code().code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<ExitCode, InsightError> {
    match cli.command {
        Command::Check {
            rules,
            format,
            exclude,
            paths,
        } => execute_check(
            CheckOptions {
                rules: rules.into_options(&cli.global),
                paths,
                exclude,
            },
            format,
        ),
        Command::Verify {
            rules,
            context,
            fixtures,
        } => execute_verify(VerifyOptions {
            rules: rules.into_options(&cli.global),
            fixtures,
            context,
        }),
    }
}

// ============================================================================
// Command Executors
// ============================================================================

fn execute_check(options: CheckOptions, format: CheckFormat) -> Result<ExitCode, InsightError> {
    let response = run_check(&options)?;
    let mut stdout = io::stdout();

    let written = match format {
        CheckFormat::Json => emit_response(&response, &mut stdout),
        CheckFormat::Text => write_text(&response, &mut stdout),
    };
    written.map_err(|e| InsightError::internal(format!("failed to write output: {}", e)))?;

    if response.findings.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(FINDINGS_EXIT_CODE))
    }
}

fn write_text(response: &CheckResponse, writer: &mut impl Write) -> io::Result<()> {
    for finding in &response.findings {
        writeln!(writer, "{}", finding.to_text())?;
    }
    for error in &response.config_errors {
        writeln!(writer, "config: {}", error)?;
    }
    for skipped in &response.skipped_files {
        writeln!(writer, "{}: skipped: {}", skipped.path, skipped.reason)?;
    }
    Ok(())
}

fn execute_verify(options: VerifyOptions) -> Result<ExitCode, InsightError> {
    let response = run_verify(&options)?;
    emit_response(&response, &mut io::stdout())
        .map_err(|e| InsightError::internal(format!("failed to write output: {}", e)))?;

    if response.passed {
        return Ok(ExitCode::SUCCESS);
    }
    let err = InsightError::VerificationFailed {
        failed: response.failed_count(),
        total: response.fixtures.len(),
    };
    warn!("{}", err);
    Ok(ExitCode::from(err.error_code().code()))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_parsing {
        use super::*;

        #[test]
        fn check_defaults_to_text() {
            let cli = Cli::try_parse_from(["insight", "check", "app"]).unwrap();
            match cli.command {
                Command::Check { format, paths, exclude, rules } => {
                    assert_eq!(format, CheckFormat::Text);
                    assert_eq!(paths, vec![PathBuf::from("app")]);
                    assert!(exclude.is_empty());
                    assert!(rules.restricted_class.is_none());
                }
                _ => panic!("expected Check"),
            }
        }

        #[test]
        fn check_with_all_options() {
            let cli = Cli::try_parse_from([
                "insight",
                "--log-level",
                "debug",
                "check",
                "--format",
                "json",
                "--restricted-class",
                "App\\Money",
                "--message",
                "use {class}::of()",
                "--severity",
                "error",
                "--exclude",
                "vendor/**",
                "--exclude",
                "tests/**",
                "app",
                "src",
            ])
            .unwrap();
            assert!(matches!(cli.global.log_level, LogLevel::Debug));
            match cli.command {
                Command::Check { format, paths, exclude, rules } => {
                    assert_eq!(format, CheckFormat::Json);
                    assert_eq!(paths.len(), 2);
                    assert_eq!(exclude, vec!["vendor/**", "tests/**"]);
                    assert_eq!(rules.restricted_class.as_deref(), Some("App\\Money"));
                    assert_eq!(rules.message.as_deref(), Some("use {class}::of()"));
                    assert_eq!(rules.severity, Some(Severity::Error));
                }
                _ => panic!("expected Check"),
            }
        }

        #[test]
        fn unknown_severity_is_rejected() {
            assert!(Cli::try_parse_from(["insight", "check", "--severity", "fatal", "app"]).is_err());
        }

        #[test]
        fn check_requires_paths() {
            assert!(Cli::try_parse_from(["insight", "check"]).is_err());
        }

        #[test]
        fn verify_with_context_and_global_config() {
            let cli = Cli::try_parse_from([
                "insight",
                "verify",
                "--context",
                "stubs",
                "--config",
                "ci/insight.toml",
                "a.php",
                "b.php",
            ])
            .unwrap();
            assert_eq!(cli.global.config, Some(PathBuf::from("ci/insight.toml")));
            match cli.command {
                Command::Verify { context, fixtures, .. } => {
                    assert_eq!(context, vec![PathBuf::from("stubs")]);
                    assert_eq!(fixtures.len(), 2);
                }
                _ => panic!("expected Verify"),
            }
        }

        #[test]
        fn unknown_format_is_rejected() {
            assert!(Cli::try_parse_from(["insight", "check", "--format", "xml", "app"]).is_err());
        }
    }
}
