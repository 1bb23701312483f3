//! Instantiation site scanning.
//!
//! [`InstantiationScanner`] lazily yields one [`InstantiationSite`] per
//! statically resolvable `new` expression. The span of a site covers the
//! class reference only.
//!
//! `new self` resolves to the enclosing class and `new parent` to its
//! declared parent. `new static`, anonymous classes and runtime-computed
//! class names have no static target and are skipped.

use std::collections::HashMap;

use insight_core::facts::{ClassDeclaration, InstantiationSite};
use insight_core::span::Span;
use tracing::debug;

use crate::collector::{declare, track_scope};
use crate::parser::{NewNode, NewTarget, OutlineNode};
use crate::resolver::NamespaceScope;

/// Iterator over the instantiation sites of one file.
pub struct InstantiationScanner<'a> {
    nodes: &'a [OutlineNode],
    path: &'a str,
    source: &'a str,
    pos: usize,
    scope: NamespaceScope,
    /// Declarations seen so far, keyed by node index.
    classes: HashMap<usize, ClassDeclaration>,
}

impl<'a> InstantiationScanner<'a> {
    /// Scan `nodes` parsed from `source`.
    pub fn new(nodes: &'a [OutlineNode], source: &'a str, path: &'a str) -> Self {
        InstantiationScanner {
            nodes,
            path,
            source,
            pos: 0,
            scope: NamespaceScope::global(),
            classes: HashMap::new(),
        }
    }

    fn site(&self, node: &NewNode) -> Option<InstantiationSite> {
        let enclosing = || node.enclosing_class.and_then(|i| self.classes.get(&i));
        let (span, resolved) = match &node.target {
            NewTarget::Name(name) => (name.span, self.scope.resolve(&name.text)),
            NewTarget::SelfRef(span) => match enclosing() {
                Some(class) => (*span, class.identity.clone()),
                None => return self.skip(*span, "`self` outside a class"),
            },
            NewTarget::ParentRef(span) => match enclosing().and_then(|c| c.parent.clone()) {
                Some(parent) => (*span, parent),
                None => return self.skip(*span, "`parent` without a parent class"),
            },
            NewTarget::StaticRef(span) => return self.skip(*span, "late static binding"),
            NewTarget::Anonymous(span) => return self.skip(*span, "anonymous class"),
            NewTarget::Dynamic(span) => return self.skip(*span, "dynamic class name"),
        };
        Some(InstantiationSite {
            raw_class_ref: self.source.get(span.as_range()).unwrap_or_default().to_string(),
            resolved,
            span,
            namespace: self.scope.namespace().to_string(),
            file: self.path.to_string(),
        })
    }

    fn skip(&self, span: Span, reason: &str) -> Option<InstantiationSite> {
        debug!(file = self.path, offset = span.start, reason, "skipping instantiation");
        None
    }
}

impl Iterator for InstantiationScanner<'_> {
    type Item = InstantiationSite;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.nodes.get(self.pos) {
            let index = self.pos;
            self.pos += 1;
            match node {
                OutlineNode::New(new) => {
                    if let Some(site) = self.site(new) {
                        return Some(site);
                    }
                }
                OutlineNode::Class(class) => {
                    let declaration = declare(class, &self.scope, self.path);
                    self.classes.insert(index, declaration);
                }
                other => track_scope(&mut self.scope, other),
            }
        }
        None
    }
}
