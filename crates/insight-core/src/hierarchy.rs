//! Class hierarchy index: child → parent links and ancestor chains.
//!
//! The index is built once from every [`ClassDeclaration`] in a compilation
//! unit and is read-only afterwards. Ancestor chains for declared classes are
//! computed during the build so queries never walk the graph twice.
//!
//! # Unknown Classes
//!
//! An identity with no declaration is an opaque leaf: its chain is just the
//! identity itself. A parent that is never declared ends the chain after
//! being appended, so `class Child extends \Vendor\Base` still yields
//! `[Child, Vendor\Base]`.
//!
//! # Cycles
//!
//! `A extends B`, `B extends A` is invalid source but must not hang
//! analysis. The walk stops at the first revisited class and marks the chain
//! as truncated.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::facts::{ClassDeclaration, ClassIdentity};

/// Ordered ancestors of a class, starting with the class itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorChain {
    /// `[class, parent, grandparent, ...]`.
    pub classes: Vec<ClassIdentity>,
    /// True if the walk stopped because a class was revisited.
    pub truncated: bool,
}

impl AncestorChain {
    fn leaf(id: &ClassIdentity) -> Self {
        AncestorChain {
            classes: vec![id.clone()],
            truncated: false,
        }
    }

    /// Number of classes in the chain, including the class itself.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the chain is empty (never true for chains built by the index).
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Proper ancestors: every entry except the class itself.
    pub fn ancestors(&self) -> &[ClassIdentity] {
        self.classes.get(1..).unwrap_or(&[])
    }
}

/// Frozen child → parent index over all declarations of a compilation unit.
#[derive(Debug, Default, Clone)]
pub struct ClassHierarchyIndex {
    classes: HashMap<ClassIdentity, ClassDeclaration>,
    chains: HashMap<ClassIdentity, AncestorChain>,
}

impl ClassHierarchyIndex {
    /// Build the index from declarations.
    ///
    /// Declarations are keyed by full identity, so `A\Fluent` and
    /// `B\Fluent` never collapse. When the same identity is declared twice
    /// the first declaration wins.
    pub fn build(declarations: impl IntoIterator<Item = ClassDeclaration>) -> Self {
        let mut classes: HashMap<ClassIdentity, ClassDeclaration> = HashMap::new();

        for decl in declarations {
            if let Some(existing) = classes.get(&decl.identity) {
                warn!(
                    class = %decl.identity,
                    first = %existing.file,
                    duplicate = %decl.file,
                    "duplicate class declaration ignored"
                );
                continue;
            }
            classes.insert(decl.identity.clone(), decl);
        }

        let mut chains = HashMap::with_capacity(classes.len());
        for id in classes.keys() {
            chains.insert(id.clone(), walk_parents(&classes, id));
        }

        ClassHierarchyIndex { classes, chains }
    }

    /// Number of declared classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no classes are declared.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether `id` has a declaration in the index.
    pub fn contains(&self, id: &ClassIdentity) -> bool {
        self.classes.contains_key(id)
    }

    /// The declaration for `id`, if any.
    pub fn declaration(&self, id: &ClassIdentity) -> Option<&ClassDeclaration> {
        self.classes.get(id)
    }

    /// The declared direct parent of `id`.
    pub fn parent_of(&self, id: &ClassIdentity) -> Option<&ClassIdentity> {
        self.classes.get(id).and_then(|d| d.parent.as_ref())
    }

    /// Iterate over all declarations (unordered).
    pub fn declarations(&self) -> impl Iterator<Item = &ClassDeclaration> {
        self.classes.values()
    }

    /// Ancestor chain from `id` up to its ultimate known ancestor.
    pub fn ancestor_chain(&self, id: &ClassIdentity) -> Cow<'_, AncestorChain> {
        match self.chains.get(id) {
            Some(chain) => Cow::Borrowed(chain),
            None => Cow::Owned(AncestorChain::leaf(id)),
        }
    }

    /// True iff `ancestor` is a proper ancestor of `id`.
    ///
    /// A class is never its own strict descendant, even inside a cycle.
    pub fn is_strict_descendant_of(&self, id: &ClassIdentity, ancestor: &ClassIdentity) -> bool {
        if id == ancestor {
            return false;
        }
        self.ancestor_chain(id)
            .ancestors()
            .iter()
            .any(|c| c == ancestor)
    }

    /// Follow empty-bodied subclasses up to the first class that declares
    /// something of its own.
    ///
    /// Returns `[id, parent, ...]` where every entry but the last is a
    /// transparent rename of the next.
    pub fn rename_chain(&self, id: &ClassIdentity) -> Vec<ClassIdentity> {
        let mut chain = vec![id.clone()];
        let mut visited: HashSet<&ClassIdentity> = HashSet::new();
        let mut current = id;

        while let Some(decl) = self.classes.get(current) {
            if !visited.insert(&decl.identity) || !decl.is_transparent_rename() {
                break;
            }
            let Some(parent) = decl.parent.as_ref() else {
                break;
            };
            chain.push(parent.clone());
            current = parent;
        }

        chain
    }
}

/// Walk parent links from `start`, stopping at unknown classes and cycles.
fn walk_parents(
    classes: &HashMap<ClassIdentity, ClassDeclaration>,
    start: &ClassIdentity,
) -> AncestorChain {
    let mut chain = vec![start.clone()];
    let mut visited: HashSet<&ClassIdentity> = HashSet::new();
    visited.insert(start);
    let mut current = start;

    loop {
        let Some(decl) = classes.get(current) else {
            break;
        };
        let Some(ref parent) = decl.parent else {
            break;
        };
        if !visited.insert(parent) {
            warn!(class = %start, revisited = %parent, "cyclic class hierarchy; ancestor chain truncated");
            return AncestorChain {
                classes: chain,
                truncated: true,
            };
        }
        chain.push(parent.clone());
        current = parent;
    }

    AncestorChain {
        classes: chain,
        truncated: false,
    }
}
