//! Language adapter trait and per-file analysis results.
//!
//! A [`LanguageAdapter`] turns one source file into a [`FileAnalysis`]: the
//! class declarations it contributes to the shared hierarchy and the
//! instantiation sites found in it. Adapters never see other files; the
//! [`CompilationUnit`](crate::unit::CompilationUnit) combines their output.
//!
//! # Ownership
//!
//! Alias bindings are consumed inside the adapter while resolving names and
//! are not part of the result. Declarations feed the frozen hierarchy index.
//! Sites stay with their file.
//!
//! # Deterministic Ordering
//!
//! `declarations` and `sites` are both in source order.

use crate::facts::{ClassDeclaration, InstantiationSite};

/// Facts extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAnalysis {
    /// Workspace-relative path of the file.
    pub path: String,
    /// Classes declared in the file.
    pub declarations: Vec<ClassDeclaration>,
    /// Statically resolvable `new` expressions in the file.
    pub sites: Vec<InstantiationSite>,
}

impl FileAnalysis {
    /// Create an empty result for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        FileAnalysis {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Source text of one file, as handed to an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// Workspace-relative path.
    pub path: String,
    /// Full file content.
    pub content: String,
}

impl SourceText {
    /// Pair a path with its content.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        SourceText {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Trait implemented by language front ends.
///
/// # Example
///
/// ```
/// use insight_core::adapter::{FileAnalysis, LanguageAdapter};
///
/// struct Nothing;
///
/// impl LanguageAdapter for Nothing {
///     type Error = std::convert::Infallible;
///
///     fn analyze_file(&self, path: &str, _content: &str) -> Result<FileAnalysis, Self::Error> {
///         Ok(FileAnalysis::new(path))
///     }
///
///     fn language(&self) -> &'static str {
///         "none"
///     }
///
///     fn can_handle(&self, path: &str) -> bool {
///         path.ends_with(".none")
///     }
/// }
///
/// let result = Nothing.analyze_file("a.none", "").unwrap();
/// assert!(result.sites.is_empty());
/// ```
pub trait LanguageAdapter {
    /// The error type for this adapter.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Analyze a single file in isolation.
    ///
    /// Names are resolved against the file's own namespaces and imports.
    /// Whether a resolved class is declared anywhere is not the adapter's
    /// concern.
    fn analyze_file(&self, path: &str, content: &str) -> Result<FileAnalysis, Self::Error>;

    /// Short language name (used in logs).
    fn language(&self) -> &'static str;

    /// Check if this adapter can handle a file, usually by extension.
    fn can_handle(&self, path: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_analysis_new_is_empty() {
        let result = FileAnalysis::new("app/User.php");
        assert_eq!(result.path, "app/User.php");
        assert!(result.declarations.is_empty());
        assert!(result.sites.is_empty());
    }
}
