//! Class declaration collection.
//!
//! Walks outline nodes in order, tracking the active namespace block and its
//! imports, and resolves each declaration's `extends` and `implements`
//! names to identities.

use insight_core::facts::{AliasBinding, ClassDeclaration, ClassIdentity, ClassKind};

use crate::parser::{ClassNode, NameRef, OutlineNode};
use crate::resolver::NamespaceScope;

/// Apply a namespace or import node to `scope`. Other nodes are ignored.
pub(crate) fn track_scope(scope: &mut NamespaceScope, node: &OutlineNode) {
    match node {
        OutlineNode::Namespace(ns) => scope.enter(&ns.name),
        OutlineNode::Use(import) => scope.import(
            AliasBinding::new(import.alias.clone(), ClassIdentity::new(&import.target)).with_span(import.span),
        ),
        OutlineNode::Class(_) | OutlineNode::New(_) => {}
    }
}

/// Build the declaration for `class` as seen from `scope`.
pub(crate) fn declare(class: &ClassNode, scope: &NamespaceScope, path: &str) -> ClassDeclaration {
    let identity = ClassIdentity::qualified(scope.namespace(), &class.name.text);
    let mut declaration = ClassDeclaration::new(identity, path, class.name.span).with_kind(class.kind);

    let resolve_all = |names: &[NameRef]| -> Vec<ClassIdentity> {
        names.iter().map(|n| scope.resolve(&n.text)).collect()
    };

    match class.kind {
        // Interfaces extend interfaces; none of them is a parent class.
        ClassKind::Interface => declaration.interfaces = resolve_all(&class.extends),
        _ => {
            declaration.parent = class.extends.first().map(|n| scope.resolve(&n.text));
            declaration.interfaces = resolve_all(&class.implements);
        }
    }
    declaration.has_members = class.has_members;
    declaration.uses_traits = class.uses_traits;
    declaration
}

/// Collect every class-like declaration in `nodes`, in source order.
pub fn collect_declarations(nodes: &[OutlineNode], path: &str) -> Vec<ClassDeclaration> {
    let mut scope = NamespaceScope::global();
    let mut declarations = Vec::new();
    for node in nodes {
        match node {
            OutlineNode::Class(class) => declarations.push(declare(class, &scope, path)),
            other => track_scope(&mut scope, other),
        }
    }
    declarations
}
