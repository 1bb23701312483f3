//! Source file discovery.
//!
//! Turns the paths given on the command line into a sorted, de-duplicated
//! list of source files:
//! - Files are taken as given (if their extension matches)
//! - Directories are walked recursively, pruning default directories
//! - User exclude globs are matched against the path relative to the walked
//!   directory (or the path as given, for files)

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::adapter::SourceText;

/// Directories that never contain project sources worth analyzing.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", "node_modules", ".idea", "storage", "bootstrap/cache"];

/// Errors raised during discovery.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("path not found: {path}")]
    NotFound { path: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Discovery settings.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// File extensions to collect, without the dot.
    pub extensions: Vec<String>,
    /// User exclude globs.
    pub exclude_patterns: Vec<String>,
    /// Whether to follow symlinks while walking.
    pub follow_symlinks: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            extensions: vec!["php".to_string()],
            exclude_patterns: Vec::new(),
            follow_symlinks: false,
        }
    }
}

impl DiscoveryConfig {
    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: &str) -> Self {
        self.exclude_patterns.push(pattern.to_string());
        self
    }

    fn wants(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Display path (forward slashes), used in findings.
    pub path: String,
    /// Path to read from.
    pub fs_path: PathBuf,
}

/// Collect source files under `inputs`.
///
/// Output is sorted by display path; a file reachable through two inputs
/// appears once.
pub fn discover(inputs: &[PathBuf], config: &DiscoveryConfig) -> Result<Vec<DiscoveredFile>, WorkspaceError> {
    let exclusions = build_glob_set(&config.exclude_patterns)?;
    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();

    for input in inputs {
        let metadata = fs::metadata(input).map_err(|_| WorkspaceError::NotFound {
            path: input.display().to_string(),
        })?;

        if metadata.is_file() {
            let display = display_path(input);
            if config.wants(input) && !exclusions.is_match(&display) {
                found.entry(display).or_insert_with(|| input.clone());
            }
            continue;
        }

        for entry in WalkDir::new(input)
            .follow_links(config.follow_symlinks)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_default_excluded(input, e.path()))
        {
            let entry = entry.map_err(|e| WorkspaceError::Io {
                path: e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| input.display().to_string()),
                source: io::Error::other(e.to_string()),
            })?;
            if !entry.file_type().is_file() || !config.wants(entry.path()) {
                continue;
            }

            let relative = entry.path().strip_prefix(input).unwrap_or(entry.path());
            if exclusions.is_match(display_path(relative)) {
                debug!(path = %entry.path().display(), "excluded by pattern");
                continue;
            }

            found
                .entry(display_path(entry.path()))
                .or_insert_with(|| entry.path().to_path_buf());
        }
    }

    Ok(found
        .into_iter()
        .map(|(path, fs_path)| DiscoveredFile { path, fs_path })
        .collect())
}

/// Read every discovered file.
pub fn load_sources(files: &[DiscoveredFile]) -> Result<Vec<SourceText>, WorkspaceError> {
    files
        .iter()
        .map(|file| {
            let content = fs::read_to_string(&file.fs_path).map_err(|source| WorkspaceError::Io {
                path: file.path.clone(),
                source,
            })?;
            Ok(SourceText::new(file.path.clone(), content))
        })
        .collect()
}

/// Normalize a path for display: forward slashes, no leading `./`.
pub fn display_path(path: &Path) -> String {
    let s = path.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");
    s.strip_prefix("./").map(str::to_string).unwrap_or(s)
}

fn is_default_excluded(root: &Path, path: &Path) -> bool {
    let relative = display_path(path.strip_prefix(root).unwrap_or(path));
    DEFAULT_EXCLUDE_DIRS
        .iter()
        .any(|dir| relative == *dir || relative.ends_with(&format!("/{}", dir)))
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, WorkspaceError> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| WorkspaceError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }

    builder.build().map_err(|e| WorkspaceError::InvalidPattern {
        pattern: "<combined>".to_string(),
        message: e.to_string(),
    })
}
