//! Namespace and import resolution for class references.
//!
//! PHP resolves a class name written in source against the namespace block
//! it appears in and that block's `use` imports:
//!
//! 1. `\A\B` is already fully qualified.
//! 2. `namespace\A` is relative to the current namespace.
//! 3. If the first segment matches an import alias (case-insensitive), the
//!    alias expands to its target and the remaining segments are appended.
//! 4. Otherwise the name is qualified by the current namespace.
//!
//! Imports are scoped to their namespace block: entering a new block clears
//! them.

use insight_core::facts::{AliasBinding, ClassIdentity};
use tracing::trace;

/// Resolution state for one namespace block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceScope {
    namespace: String,
    aliases: Vec<AliasBinding>,
}

impl NamespaceScope {
    /// The global namespace with no imports.
    pub fn global() -> Self {
        Self::default()
    }

    /// Enter a namespace block, dropping imports of the previous block.
    pub fn enter(&mut self, namespace: &str) {
        self.namespace = namespace.trim_start_matches('\\').to_string();
        self.aliases.clear();
    }

    /// Current namespace (`""` for global).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Import bindings active in this block.
    pub fn aliases(&self) -> &[AliasBinding] {
        &self.aliases
    }

    /// Record an import. A later import of the same alias replaces the
    /// earlier one.
    pub fn import(&mut self, binding: AliasBinding) {
        self.aliases.retain(|b| !b.matches(&binding.alias));
        self.aliases.push(binding);
    }

    /// Resolve a class name as written in this block.
    pub fn resolve(&self, raw: &str) -> ClassIdentity {
        resolve_class_name(raw, &self.namespace, &self.aliases)
    }
}

/// Resolve `raw` against a namespace and its imports.
pub fn resolve_class_name(raw: &str, namespace: &str, aliases: &[AliasBinding]) -> ClassIdentity {
    let raw = raw.trim();

    if raw.starts_with('\\') {
        return ClassIdentity::new(raw);
    }

    if let Some((head, rest)) = raw.split_once('\\') {
        if head.eq_ignore_ascii_case("namespace") {
            return ClassIdentity::qualified(namespace, rest);
        }
    }

    let (first, rest) = match raw.split_once('\\') {
        Some((first, rest)) => (first, Some(rest)),
        None => (raw, None),
    };

    if let Some(binding) = aliases.iter().rev().find(|b| b.matches(first)) {
        let resolved = match rest {
            Some(rest) => ClassIdentity::qualified(binding.target.as_str(), rest),
            None => binding.target.clone(),
        };
        trace!(raw, alias = %binding.alias, resolved = %resolved, "resolved through import");
        return resolved;
    }

    ClassIdentity::qualified(namespace, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(namespace: &str, imports: &[(&str, &str)]) -> NamespaceScope {
        let mut scope = NamespaceScope::global();
        scope.enter(namespace);
        for (alias, target) in imports {
            scope.import(AliasBinding::new(*alias, ClassIdentity::new(target)));
        }
        scope
    }

    #[test]
    fn fully_qualified_names_ignore_context() {
        let s = scope("App", &[("Fluent", "Other\\Fluent")]);
        assert_eq!(s.resolve("\\FacadeFluent").as_str(), "FacadeFluent");
        assert_eq!(s.resolve("\\Illuminate\\Support\\Fluent").as_str(), "Illuminate\\Support\\Fluent");
    }

    #[test]
    fn unqualified_names_take_the_current_namespace() {
        assert_eq!(scope("MyNamespace", &[]).resolve("Fluent").as_str(), "MyNamespace\\Fluent");
        assert_eq!(scope("", &[]).resolve("Fluent").as_str(), "Fluent");
    }

    #[test]
    fn alias_expands_first_segment() {
        let s = scope(
            "MyNamespace",
            &[("FluentDirect", "Illuminate\\Support\\Fluent"), ("Models", "App\\Models")],
        );
        assert_eq!(s.resolve("FluentDirect").as_str(), "Illuminate\\Support\\Fluent");
        assert_eq!(s.resolve("fluentdirect").as_str(), "Illuminate\\Support\\Fluent");
        assert_eq!(s.resolve("Models\\User").as_str(), "App\\Models\\User");
    }

    #[test]
    fn qualified_name_without_alias_is_relative() {
        let s = scope("App", &[]);
        assert_eq!(s.resolve("Models\\User").as_str(), "App\\Models\\User");
    }

    #[test]
    fn namespace_relative_names() {
        let s = scope("App\\Http", &[("Kernel", "Other\\Kernel")]);
        assert_eq!(s.resolve("namespace\\Kernel").as_str(), "App\\Http\\Kernel");
        assert_eq!(scope("", &[]).resolve("namespace\\Kernel").as_str(), "Kernel");
    }

    #[test]
    fn entering_a_block_clears_imports() {
        let mut s = scope("A", &[("Fluent", "Illuminate\\Support\\Fluent")]);
        s.enter("B");
        assert!(s.aliases().is_empty());
        assert_eq!(s.resolve("Fluent").as_str(), "B\\Fluent");
    }

    #[test]
    fn later_import_replaces_earlier() {
        let s = scope("", &[("X", "First\\X"), ("x", "Second\\X")]);
        assert_eq!(s.aliases().len(), 1);
        assert_eq!(s.resolve("X").as_str(), "Second\\X");
    }
}
