//! Facts model: class identities, declarations and instantiation sites.
//!
//! Language adapters produce these facts per file; the
//! [`ClassHierarchyIndex`](crate::hierarchy::ClassHierarchyIndex) and the
//! [`RuleEngine`](crate::rule::RuleEngine) consume them.
//!
//! # Identity Model
//!
//! A [`ClassIdentity`] is the fully-qualified class name without a leading
//! root marker (`Illuminate\Support\Fluent`). Class names are compared
//! ASCII-case-insensitively, so `illuminate\support\FLUENT` is the same
//! identity. The first spelling seen is kept for display.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// Namespace separator used in fully-qualified names.
pub const NAMESPACE_SEPARATOR: char = '\\';

// ============================================================================
// ClassIdentity
// ============================================================================

/// Canonical, namespace-qualified class name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassIdentity {
    name: String,
}

impl ClassIdentity {
    /// Create an identity from a fully-qualified name.
    ///
    /// A leading root marker is stripped: `\Foo\Bar` and `Foo\Bar` are the
    /// same identity.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref().trim();
        ClassIdentity {
            name: name.trim_start_matches(NAMESPACE_SEPARATOR).to_string(),
        }
    }

    /// Qualify `name` by `namespace` (`""` is the global namespace).
    pub fn qualified(namespace: &str, name: &str) -> Self {
        if namespace.is_empty() {
            ClassIdentity::new(name)
        } else {
            ClassIdentity::new(format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, name))
        }
    }

    /// The fully-qualified name, without a leading root marker.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The last segment of the name (`Fluent` for `Illuminate\Support\Fluent`).
    pub fn short_name(&self) -> &str {
        self.name
            .rsplit(NAMESPACE_SEPARATOR)
            .next()
            .unwrap_or(&self.name)
    }

    /// The namespace part of the name (`""` for global classes).
    pub fn namespace(&self) -> &str {
        match self.name.rfind(NAMESPACE_SEPARATOR) {
            Some(idx) => &self.name[..idx],
            None => "",
        }
    }

    /// Case-folded lookup key.
    pub fn key(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

impl PartialEq for ClassIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for ClassIdentity {}

impl Hash for ClassIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.name.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl PartialOrd for ClassIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassIdentity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let lhs = self.name.bytes().map(|b| b.to_ascii_lowercase());
        let rhs = other.name.bytes().map(|b| b.to_ascii_lowercase());
        lhs.cmp(rhs)
    }
}

impl fmt::Display for ClassIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ============================================================================
// AliasBinding
// ============================================================================

/// A local name introduced by an import (`use Foo\Bar as Baz`).
///
/// Valid only inside the namespace block that declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasBinding {
    /// The short name visible in the importing scope (`Baz`).
    pub alias: String,
    /// The class the alias stands for (`Foo\Bar`).
    pub target: ClassIdentity,
    /// Span of the import clause, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl AliasBinding {
    /// Create a binding from an alias to a target identity.
    pub fn new(alias: impl Into<String>, target: ClassIdentity) -> Self {
        AliasBinding {
            alias: alias.into(),
            target,
            span: None,
        }
    }

    /// Attach the span of the import clause.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Whether `name` refers to this alias (case-insensitive).
    pub fn matches(&self, name: &str) -> bool {
        self.alias.eq_ignore_ascii_case(name)
    }
}

// ============================================================================
// ClassDeclaration
// ============================================================================

/// The kind of class-like declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Trait => "trait",
            ClassKind::Enum => "enum",
        };
        write!(f, "{}", s)
    }
}

/// A declared class with its resolved direct parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDeclaration {
    /// Fully-qualified identity of the declared class.
    pub identity: ClassIdentity,
    /// Kind of declaration.
    pub kind: ClassKind,
    /// Resolved `extends` target, if any.
    pub parent: Option<ClassIdentity>,
    /// Resolved `implements` targets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<ClassIdentity>,
    /// Whether the body declares any member (property, method, constant, case).
    pub has_members: bool,
    /// Whether the body uses at least one trait.
    pub uses_traits: bool,
    /// Workspace-relative path of the declaring file.
    pub file: String,
    /// Span of the class name in the declaring file.
    pub span: Span,
}

impl ClassDeclaration {
    /// Create a plain class declaration with no parent and an empty body.
    pub fn new(identity: ClassIdentity, file: impl Into<String>, span: Span) -> Self {
        ClassDeclaration {
            identity,
            kind: ClassKind::Class,
            parent: None,
            interfaces: Vec::new(),
            has_members: false,
            uses_traits: false,
            file: file.into(),
            span,
        }
    }

    /// Set the parent class.
    pub fn with_parent(mut self, parent: ClassIdentity) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the declaration kind.
    pub fn with_kind(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark the body as declaring members.
    pub fn with_members(mut self) -> Self {
        self.has_members = true;
        self
    }

    /// A class that extends a parent and adds nothing of its own.
    ///
    /// Such a class is a rename of its parent (`class FacadeFluent extends
    /// Fluent {}`), not a specialisation.
    pub fn is_transparent_rename(&self) -> bool {
        self.kind == ClassKind::Class
            && self.parent.is_some()
            && !self.has_members
            && !self.uses_traits
            && self.interfaces.is_empty()
    }
}

// ============================================================================
// InstantiationSite
// ============================================================================

/// One `new ClassRef(...)` expression with a statically known class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiationSite {
    /// The class reference exactly as written (`\FacadeFluent`, `FluentDirect`).
    pub raw_class_ref: String,
    /// The identity the reference resolves to.
    pub resolved: ClassIdentity,
    /// Span of the class reference only, not the whole `new` expression.
    pub span: Span,
    /// Namespace block active at the site (`""` for global).
    pub namespace: String,
    /// Workspace-relative path of the file.
    pub file: String,
}
