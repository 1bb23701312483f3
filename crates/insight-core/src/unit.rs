//! Compilation unit: the per-run context shared by every analysis pass.
//!
//! A [`CompilationUnit`] is built once from a set of source files and never
//! mutated afterwards. When the file set changes a new unit is built; the
//! [`fingerprint`](CompilationUnit::fingerprint) tells a host whether that is
//! necessary.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::adapter::{LanguageAdapter, SourceText};
use crate::facts::InstantiationSite;
use crate::hierarchy::ClassHierarchyIndex;

/// SHA-256 of a file's content, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the hash of the given bytes.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One analyzed file of a unit.
#[derive(Debug, Clone)]
pub struct UnitFile {
    /// Workspace-relative path.
    pub path: String,
    /// File content, kept for position lookups.
    pub content: String,
    /// Hash of `content`.
    pub hash: ContentHash,
    /// Instantiation sites in source order.
    pub sites: Vec<InstantiationSite>,
}

/// A file the adapter could not analyze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    /// Workspace-relative path.
    pub path: String,
    /// Why the file was skipped.
    pub reason: String,
}

/// Frozen analysis context for a set of files.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    files: Vec<UnitFile>,
    skipped: Vec<SkippedFile>,
    index: ClassHierarchyIndex,
    fingerprint: String,
}

impl CompilationUnit {
    /// Analyze every source the adapter can handle and build the hierarchy
    /// index from all declarations.
    ///
    /// Files the adapter rejects are recorded as skipped; the rest of the
    /// unit is still built. File order follows `sources`.
    pub fn build<A: LanguageAdapter>(adapter: &A, sources: &[SourceText]) -> Self {
        let mut files = Vec::with_capacity(sources.len());
        let mut skipped = Vec::new();
        let mut declarations = Vec::new();

        for source in sources {
            if !adapter.can_handle(&source.path) {
                debug!(path = %source.path, language = adapter.language(), "file not handled by adapter");
                continue;
            }
            match adapter.analyze_file(&source.path, &source.content) {
                Ok(analysis) => {
                    debug!(
                        path = %source.path,
                        declarations = analysis.declarations.len(),
                        sites = analysis.sites.len(),
                        "analyzed file"
                    );
                    declarations.extend(analysis.declarations);
                    files.push(UnitFile {
                        path: source.path.clone(),
                        hash: ContentHash::compute(source.content.as_bytes()),
                        content: source.content.clone(),
                        sites: analysis.sites,
                    });
                }
                Err(err) => {
                    warn!(path = %source.path, error = %err, "skipping file");
                    skipped.push(SkippedFile {
                        path: source.path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let index = ClassHierarchyIndex::build(declarations);
        let fingerprint = compute_fingerprint(sources);

        CompilationUnit {
            files,
            skipped,
            index,
            fingerprint,
        }
    }

    /// Analyzed files in input order.
    pub fn files(&self) -> &[UnitFile] {
        &self.files
    }

    /// Look up an analyzed file by path.
    pub fn file(&self, path: &str) -> Option<&UnitFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Files that failed analysis.
    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    /// The shared, read-only hierarchy index.
    pub fn index(&self) -> &ClassHierarchyIndex {
        &self.index
    }

    /// Deterministic fingerprint of the input file set.
    ///
    /// Independent of input order; changes when any path or content changes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn compute_fingerprint(sources: &[SourceText]) -> String {
    let mut entries: Vec<(&str, ContentHash)> = sources
        .iter()
        .map(|s| (s.path.as_str(), ContentHash::compute(s.content.as_bytes())))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for (path, hash) in &entries {
        hasher.update(path.as_bytes());
        hasher.update(b"\0");
        hasher.update(hash.0.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hex::encode(hasher.finalize());
    format!("unit_{}", &digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::FileAnalysis;
    use crate::facts::{ClassDeclaration, ClassIdentity};
    use crate::span::Span;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("cannot read {0}")]
    struct FakeError(String);

    /// Declares one class per non-empty line: `Child Parent`.
    struct LineAdapter;

    impl LanguageAdapter for LineAdapter {
        type Error = FakeError;

        fn analyze_file(&self, path: &str, content: &str) -> Result<FileAnalysis, FakeError> {
            if content.contains("!!") {
                return Err(FakeError(path.to_string()));
            }
            let mut result = FileAnalysis::new(path);
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                let mut parts = line.split_whitespace();
                let child = parts.next().unwrap_or_default();
                let mut decl = ClassDeclaration::new(ClassIdentity::new(child), path, Span::new(0, 0));
                if let Some(parent) = parts.next() {
                    decl = decl.with_parent(ClassIdentity::new(parent));
                }
                result.declarations.push(decl);
            }
            Ok(result)
        }

        fn language(&self) -> &'static str {
            "lines"
        }

        fn can_handle(&self, path: &str) -> bool {
            path.ends_with(".txt")
        }
    }

    #[test]
    fn declarations_from_all_files_share_one_index() {
        let unit = CompilationUnit::build(
            &LineAdapter,
            &[
                SourceText::new("a.txt", "Leaf Mid\n"),
                SourceText::new("b.txt", "Mid Base\nBase\n"),
            ],
        );
        assert_eq!(unit.files().len(), 2);
        assert!(unit
            .index()
            .is_strict_descendant_of(&ClassIdentity::new("Leaf"), &ClassIdentity::new("Base")));
    }

    #[test]
    fn failing_file_is_skipped_not_fatal() {
        let unit = CompilationUnit::build(
            &LineAdapter,
            &[
                SourceText::new("bad.txt", "!!"),
                SourceText::new("good.txt", "A B"),
            ],
        );
        assert_eq!(unit.files().len(), 1);
        assert_eq!(unit.skipped().len(), 1);
        assert_eq!(unit.skipped()[0].path, "bad.txt");
        assert!(unit.skipped()[0].reason.contains("bad.txt"));
    }

    #[test]
    fn unhandled_files_are_ignored() {
        let unit = CompilationUnit::build(&LineAdapter, &[SourceText::new("readme.md", "A B")]);
        assert!(unit.files().is_empty());
        assert!(unit.skipped().is_empty());
        assert!(unit.index().is_empty());
    }

    #[test]
    fn fingerprint_ignores_order_and_tracks_content() {
        let a = SourceText::new("a.txt", "A");
        let b = SourceText::new("b.txt", "B");
        let one = CompilationUnit::build(&LineAdapter, &[a.clone(), b.clone()]);
        let two = CompilationUnit::build(&LineAdapter, &[b, a.clone()]);
        assert_eq!(one.fingerprint(), two.fingerprint());
        assert!(one.fingerprint().starts_with("unit_"));

        let changed = CompilationUnit::build(&LineAdapter, &[a, SourceText::new("b.txt", "C")]);
        assert_ne!(one.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn content_hash_is_hex_sha256() {
        let hash = ContentHash::compute(b"");
        assert_eq!(
            hash.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
