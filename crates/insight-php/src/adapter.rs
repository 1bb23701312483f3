//! PHP implementation of [`LanguageAdapter`].

use insight_core::adapter::{FileAnalysis, LanguageAdapter};
use tracing::trace;

use crate::collector::collect_declarations;
use crate::error::{PhpError, PhpResult};
use crate::lexer::tokenize;
use crate::parser::parse_outline;
use crate::scanner::InstantiationScanner;

/// File extensions handled by [`PhpAdapter`].
pub const PHP_EXTENSIONS: &[&str] = &["php", "phtml"];

/// PHP language adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhpAdapter;

impl PhpAdapter {
    /// Create a new adapter.
    pub fn new() -> Self {
        PhpAdapter
    }

    fn analyze(&self, path: &str, content: &str) -> PhpResult<FileAnalysis> {
        let tokens = tokenize(content).map_err(|e| PhpError::lex(path, content, e))?;
        let nodes = parse_outline(content, &tokens);
        trace!(path, tokens = tokens.len(), nodes = nodes.len(), "parsed outline");

        let mut analysis = FileAnalysis::new(path);
        analysis.declarations = collect_declarations(&nodes, path);
        analysis.sites = InstantiationScanner::new(&nodes, content, path).collect();
        Ok(analysis)
    }
}

impl LanguageAdapter for PhpAdapter {
    type Error = PhpError;

    fn analyze_file(&self, path: &str, content: &str) -> Result<FileAnalysis, Self::Error> {
        self.analyze(path, content)
    }

    fn language(&self) -> &'static str {
        "php"
    }

    fn can_handle(&self, path: &str) -> bool {
        path.rsplit_once('.')
            .is_some_and(|(_, ext)| PHP_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}
