//! Outline parser: the structural facts of a PHP file in source order.
//!
//! The parser does not build a full syntax tree. It tracks brace and
//! parenthesis depth over the token stream and records the four constructs
//! the rule needs:
//!
//! | Node | Source |
//! |------|--------|
//! | [`OutlineNode::Namespace`] | `namespace A\B;`, `namespace A\B { }`, `namespace { }` |
//! | [`OutlineNode::Use`] | `use A\B;`, `use A\B as C;`, `use A\{B, C as D};` |
//! | [`OutlineNode::Class`] | `class`, `interface`, `trait`, `enum` declarations |
//! | [`OutlineNode::New`] | `new X(...)` expressions |
//!
//! `use function`, `use const`, closure `use (...)` and trait `use` inside a
//! class body are not imports. Keywords after `->`, `?->` or `::` are
//! member names, never constructs.
//!
//! The parser never fails. Anything it does not recognise is skipped.

use insight_core::facts::ClassKind;
use insight_core::span::Span;

use crate::lexer::{Token, TokenKind};

/// A name as written, with its span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRef {
    pub text: String,
    pub span: Span,
}

/// A namespace block opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceNode {
    /// Namespace name (`""` for `namespace { }`).
    pub name: String,
    pub braced: bool,
    pub span: Span,
}

/// One class-like import clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseNode {
    /// Imported name, without a leading `\`.
    pub target: String,
    /// Local alias (explicit or the last segment of `target`).
    pub alias: String,
    pub span: Span,
}

/// A class-like declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNode {
    pub kind: ClassKind,
    pub name: NameRef,
    pub extends: Vec<NameRef>,
    pub implements: Vec<NameRef>,
    pub has_members: bool,
    pub uses_traits: bool,
}

/// What follows a `new` keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewTarget {
    /// A class name in any written form.
    Name(NameRef),
    /// `new self`.
    SelfRef(Span),
    /// `new parent`.
    ParentRef(Span),
    /// `new static` (late static binding).
    StaticRef(Span),
    /// `new class ...` (anonymous class).
    Anonymous(Span),
    /// `new $var`, `new (expr)` and other runtime-computed classes.
    Dynamic(Span),
}

/// A `new` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub target: NewTarget,
    /// Index of the innermost enclosing named class node, if the innermost
    /// enclosing class body belongs to a named class.
    pub enclosing_class: Option<usize>,
}

/// Structural facts of a file, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineNode {
    Namespace(NamespaceNode),
    Use(UseNode),
    Class(ClassNode),
    New(NewNode),
}

#[derive(Debug, Clone, Copy)]
struct ClassFrame {
    /// Class node index; `None` for anonymous classes.
    node: Option<usize>,
    body_depth: usize,
    paren_depth: usize,
}

#[derive(Debug, Clone, Copy)]
struct PendingBody {
    node: Option<usize>,
    paren_depth: usize,
}

/// Parse tokens into outline nodes.
pub fn parse_outline(source: &str, tokens: &[Token]) -> Vec<OutlineNode> {
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        nodes: Vec::new(),
        brace_depth: 0,
        paren_depth: 0,
        classes: Vec::new(),
        pending_body: None,
    };
    parser.run();
    parser.nodes
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    nodes: Vec<OutlineNode>,
    brace_depth: usize,
    paren_depth: usize,
    classes: Vec<ClassFrame>,
    pending_body: Option<PendingBody>,
}

impl<'a> Parser<'a> {
    fn peek(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn text(&self, token: &Token) -> &'a str {
        token.text(self.source)
    }

    fn prev(&self) -> Option<&'a Token> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    fn is_keyword(&self, token: &Token, keyword: &str) -> bool {
        token.kind == TokenKind::Name && self.text(token).eq_ignore_ascii_case(keyword)
    }

    fn peek_keyword(&self, offset: usize, keyword: &str) -> bool {
        self.peek(offset).is_some_and(|t| self.is_keyword(t, keyword))
    }

    /// Whether the current name token can start a construct, as opposed to
    /// being a member or function name.
    fn in_keyword_position(&self) -> bool {
        match self.prev() {
            None => true,
            Some(prev) => {
                !matches!(prev.kind, TokenKind::Arrow | TokenKind::DoubleColon)
                    && !self.is_keyword(prev, "function")
                    && !self.is_keyword(prev, "const")
            }
        }
    }

    /// Whether the current token starts a statement.
    fn at_statement_start(&self) -> bool {
        match self.prev() {
            None => true,
            Some(prev) => matches!(
                prev.kind,
                TokenKind::Semicolon
                    | TokenKind::LBrace
                    | TokenKind::RBrace
                    | TokenKind::OpenTag
                    | TokenKind::CloseTag
                    | TokenKind::InlineHtml
            ),
        }
    }

    /// Whether the current token sits directly inside a class body.
    fn in_class_body(&self) -> bool {
        self.classes
            .last()
            .is_some_and(|f| f.body_depth == self.brace_depth && f.paren_depth == self.paren_depth)
    }

    fn enclosing_class(&self) -> Option<usize> {
        self.classes.last().and_then(|f| f.node)
    }

    fn class_node_mut(&mut self) -> Option<&mut ClassNode> {
        let index = self.classes.last()?.node?;
        match self.nodes.get_mut(index) {
            Some(OutlineNode::Class(class)) => Some(class),
            _ => None,
        }
    }

    fn run(&mut self) {
        while let Some(token) = self.peek(0) {
            match token.kind {
                TokenKind::LBrace => {
                    self.brace_depth += 1;
                    if let Some(pending) = self.pending_body {
                        if pending.paren_depth == self.paren_depth {
                            self.pending_body = None;
                            self.classes.push(ClassFrame {
                                node: pending.node,
                                body_depth: self.brace_depth,
                                paren_depth: self.paren_depth,
                            });
                        }
                    }
                    self.pos += 1;
                }
                TokenKind::RBrace => {
                    if self.classes.last().is_some_and(|f| f.body_depth == self.brace_depth) {
                        self.classes.pop();
                    }
                    self.brace_depth = self.brace_depth.saturating_sub(1);
                    self.pos += 1;
                }
                TokenKind::LParen => {
                    self.paren_depth += 1;
                    self.pos += 1;
                }
                TokenKind::RParen => {
                    self.paren_depth = self.paren_depth.saturating_sub(1);
                    self.pos += 1;
                }
                TokenKind::Variable if self.in_class_body() => {
                    if let Some(class) = self.class_node_mut() {
                        class.has_members = true;
                    }
                    self.pos += 1;
                }
                TokenKind::Name => self.name(token),
                _ => self.pos += 1,
            }
        }
    }

    fn name(&mut self, token: &'a Token) {
        let text = self.text(token);
        let keyword_position = self.in_keyword_position();

        if self.in_class_body() && keyword_position {
            match text.to_ascii_lowercase().as_str() {
                "function" | "const" | "case" | "var" => {
                    if let Some(class) = self.class_node_mut() {
                        class.has_members = true;
                    }
                }
                "use" => {
                    if let Some(class) = self.class_node_mut() {
                        class.uses_traits = true;
                    }
                }
                _ => {}
            }
        }

        if !keyword_position {
            self.pos += 1;
            return;
        }

        match text.to_ascii_lowercase().as_str() {
            "new" => self.new_expression(),
            "namespace" if self.at_statement_start() => self.namespace(),
            "use" if self.at_statement_start() && !self.in_class_body() => self.use_statement(),
            "class" => self.class_declaration(ClassKind::Class),
            "interface" => self.class_declaration(ClassKind::Interface),
            "trait" => self.class_declaration(ClassKind::Trait),
            "enum" => self.class_declaration(ClassKind::Enum),
            _ => self.pos += 1,
        }
    }

    fn name_ref(&self, token: &Token) -> NameRef {
        NameRef {
            text: self.text(token).to_string(),
            span: token.span,
        }
    }

    fn new_expression(&mut self) {
        self.pos += 1;
        let enclosing_class = self.enclosing_class();
        let target = match self.peek(0) {
            Some(next) if next.kind == TokenKind::Name => {
                let lower = self.text(next).to_ascii_lowercase();
                match lower.as_str() {
                    "class" => {
                        self.pending_body = Some(PendingBody {
                            node: None,
                            paren_depth: self.paren_depth,
                        });
                        NewTarget::Anonymous(next.span)
                    }
                    "self" => NewTarget::SelfRef(next.span),
                    "parent" => NewTarget::ParentRef(next.span),
                    "static" => NewTarget::StaticRef(next.span),
                    _ => NewTarget::Name(self.name_ref(next)),
                }
            }
            Some(next) => NewTarget::Dynamic(next.span),
            None => return,
        };
        if !matches!(target, NewTarget::Dynamic(_)) {
            self.pos += 1;
        }
        self.nodes.push(OutlineNode::New(NewNode {
            target,
            enclosing_class,
        }));
    }

    fn namespace(&mut self) {
        let start = self.peek(0).map(|t| t.span);
        self.pos += 1;
        let (name, braced) = match (self.peek(0), self.peek(1)) {
            (Some(name), Some(after)) if name.kind == TokenKind::Name => {
                let braced = after.kind == TokenKind::LBrace;
                if !braced && after.kind != TokenKind::Semicolon {
                    return;
                }
                self.pos += 1;
                (self.text(name).trim_start_matches('\\').to_string(), braced)
            }
            (Some(brace), _) if brace.kind == TokenKind::LBrace => (String::new(), true),
            _ => return,
        };
        let span = start.unwrap_or(Span::new(0, 0));
        self.nodes.push(OutlineNode::Namespace(NamespaceNode { name, braced, span }));
    }

    fn skip_to_statement_end(&mut self) {
        while let Some(token) = self.peek(0) {
            if matches!(token.kind, TokenKind::Semicolon | TokenKind::CloseTag) {
                return;
            }
            if token.kind == TokenKind::LBrace || token.kind == TokenKind::RBrace {
                return;
            }
            self.pos += 1;
        }
    }

    fn use_statement(&mut self) {
        self.pos += 1;
        if self.peek_keyword(0, "function") || self.peek_keyword(0, "const") {
            self.skip_to_statement_end();
            return;
        }

        loop {
            let Some(name) = self.peek(0).filter(|t| t.kind == TokenKind::Name) else {
                self.skip_to_statement_end();
                return;
            };
            self.pos += 1;

            let is_group = self.peek(0).is_some_and(|t| t.kind == TokenKind::Backslash)
                && self.peek(1).is_some_and(|t| t.kind == TokenKind::LBrace);
            if is_group {
                self.pos += 2;
                self.group_use(self.text(name));
            } else {
                let alias = self.alias_clause();
                self.push_use(self.text(name), name.span, alias);
            }

            match self.peek(0) {
                Some(t) if t.kind == TokenKind::Comma => self.pos += 1,
                _ => {
                    self.skip_to_statement_end();
                    return;
                }
            }
        }
    }

    /// Items of `use Prefix\{ ... }`, positioned after the `{`.
    fn group_use(&mut self, prefix: &str) {
        while let Some(token) = self.peek(0) {
            match token.kind {
                TokenKind::RBrace => {
                    self.pos += 1;
                    return;
                }
                TokenKind::Comma => self.pos += 1,
                TokenKind::Name if self.is_keyword(token, "function") || self.is_keyword(token, "const") => {
                    // Skip the whole item.
                    while let Some(t) = self.peek(0) {
                        if matches!(t.kind, TokenKind::Comma | TokenKind::RBrace) {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                TokenKind::Name => {
                    self.pos += 1;
                    let alias = self.alias_clause();
                    let target = format!("{}\\{}", prefix, self.text(token));
                    self.push_use(&target, token.span, alias);
                }
                _ => return,
            }
        }
    }

    fn alias_clause(&mut self) -> Option<String> {
        if self.peek_keyword(0, "as") {
            if let Some(alias) = self.peek(1).filter(|t| t.kind == TokenKind::Name) {
                self.pos += 2;
                return Some(self.text(alias).to_string());
            }
        }
        None
    }

    fn push_use(&mut self, target: &str, span: Span, alias: Option<String>) {
        let target = target.trim_start_matches('\\').to_string();
        let alias = alias.unwrap_or_else(|| target.rsplit('\\').next().unwrap_or(&target).to_string());
        self.nodes.push(OutlineNode::Use(UseNode { target, alias, span }));
    }

    fn class_declaration(&mut self, kind: ClassKind) {
        self.pos += 1;
        let Some(name) = self.peek(0).filter(|t| {
            t.kind == TokenKind::Name && !self.text(t).contains('\\')
        }) else {
            return;
        };
        // `enum` is only a keyword when a declaration follows.
        if kind == ClassKind::Enum {
            let declares = self.peek(1).is_some_and(|t| {
                matches!(t.kind, TokenKind::LBrace | TokenKind::Colon) || self.is_keyword(t, "implements")
            });
            if !declares {
                return;
            }
        }
        self.pos += 1;

        let mut class = ClassNode {
            kind,
            name: self.name_ref(name),
            extends: Vec::new(),
            implements: Vec::new(),
            has_members: false,
            uses_traits: false,
        };

        while let Some(token) = self.peek(0) {
            if token.kind == TokenKind::LBrace || token.kind == TokenKind::Semicolon {
                break;
            }
            if self.is_keyword(token, "extends") {
                self.pos += 1;
                class.extends = self.name_list();
            } else if self.is_keyword(token, "implements") {
                self.pos += 1;
                class.implements = self.name_list();
            } else {
                self.pos += 1;
            }
        }

        let index = self.nodes.len();
        self.nodes.push(OutlineNode::Class(class));
        self.pending_body = Some(PendingBody {
            node: Some(index),
            paren_depth: self.paren_depth,
        });
    }

    fn name_list(&mut self) -> Vec<NameRef> {
        let mut names = Vec::new();
        while let Some(token) = self.peek(0) {
            match token.kind {
                TokenKind::Name if !self.is_keyword(token, "implements") && !self.is_keyword(token, "extends") => {
                    names.push(self.name_ref(token));
                    self.pos += 1;
                }
                TokenKind::Comma => self.pos += 1,
                _ => break,
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn outline(source: &str) -> Vec<OutlineNode> {
        parse_outline(source, &tokenize(source).unwrap())
    }

    fn classes(source: &str) -> Vec<ClassNode> {
        outline(source)
            .into_iter()
            .filter_map(|n| match n {
                OutlineNode::Class(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    fn uses(source: &str) -> Vec<(String, String)> {
        outline(source)
            .into_iter()
            .filter_map(|n| match n {
                OutlineNode::Use(u) => Some((u.target, u.alias)),
                _ => None,
            })
            .collect()
    }

    fn news(source: &str) -> Vec<NewNode> {
        outline(source)
            .into_iter()
            .filter_map(|n| match n {
                OutlineNode::New(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    mod namespaces {
        use super::*;

        #[test]
        fn statement_and_braced_forms() {
            let nodes = outline("<?php namespace A\\B; namespace C { } namespace { }");
            let names: Vec<_> = nodes
                .iter()
                .filter_map(|n| match n {
                    OutlineNode::Namespace(ns) => Some((ns.name.as_str(), ns.braced)),
                    _ => None,
                })
                .collect();
            assert_eq!(names, vec![("A\\B", false), ("C", true), ("", true)]);
        }

        #[test]
        fn relative_name_is_not_a_declaration() {
            let nodes = outline("<?php $x = namespace\\foo();");
            assert!(nodes.is_empty());
        }
    }

    mod imports {
        use super::*;

        #[test]
        fn plain_aliased_and_rooted() {
            assert_eq!(
                uses("<?php use Illuminate\\Support\\Fluent as FluentDirect, \\App\\User;"),
                vec![
                    ("Illuminate\\Support\\Fluent".to_string(), "FluentDirect".to_string()),
                    ("App\\User".to_string(), "User".to_string()),
                ]
            );
        }

        #[test]
        fn group_use() {
            assert_eq!(
                uses("<?php use App\\Models\\{User, Post as Article, function helper};"),
                vec![
                    ("App\\Models\\User".to_string(), "User".to_string()),
                    ("App\\Models\\Post".to_string(), "Article".to_string()),
                ]
            );
        }

        #[test]
        fn function_const_closure_and_trait_uses_are_not_imports() {
            let source = "<?php use function A\\f; use const A\\C;\n\
                          $f = function () use ($x) { };\n\
                          class K { use SomeTrait; }";
            assert!(uses(source).is_empty());
            assert!(classes(source)[0].uses_traits);
        }
    }

    mod declarations {
        use super::*;

        #[test]
        fn extends_and_implements() {
            let c = classes("<?php final class A extends \\B implements C, D\\E { }");
            assert_eq!(c.len(), 1);
            assert_eq!(c[0].name.text, "A");
            assert_eq!(c[0].extends[0].text, "\\B");
            let implements: Vec<_> = c[0].implements.iter().map(|n| n.text.as_str()).collect();
            assert_eq!(implements, vec!["C", "D\\E"]);
            assert!(!c[0].has_members);
        }

        #[test]
        fn member_detection() {
            let c = classes(
                "<?php class Empty extends Base {}\n\
                 class Prop extends Base { public $x; }\n\
                 class Meth extends Base { public function f() { $y = 1; } }\n\
                 class Konst extends Base { const X = 1; }",
            );
            let flags: Vec<_> = c.iter().map(|c| (c.name.text.as_str(), c.has_members)).collect();
            assert_eq!(
                flags,
                vec![("Empty", false), ("Prop", true), ("Meth", true), ("Konst", true)]
            );
        }

        #[test]
        fn class_constant_fetch_is_not_a_declaration() {
            let source = "<?php $a = Foo::class; $b->class; echo static::class;";
            assert!(classes(source).is_empty());
        }

        #[test]
        fn interface_trait_enum() {
            let c = classes("<?php interface I extends J, K {} trait T {} enum E: string { case A = 'a'; }");
            let kinds: Vec<_> = c.iter().map(|c| c.kind).collect();
            assert_eq!(kinds, vec![ClassKind::Interface, ClassKind::Trait, ClassKind::Enum]);
            assert_eq!(c[0].extends.len(), 2);
            assert!(c[2].has_members);
        }

        #[test]
        fn enum_as_identifier_is_not_declaration() {
            assert!(classes("<?php $x = enum_exists('A'); enum(1);").is_empty());
        }
    }

    mod instantiations {
        use super::*;

        #[test]
        fn name_forms_and_spans() {
            let source = "<?php new Foo(); new \\A\\B; new namespace\\C();";
            let n = news(source);
            let texts: Vec<_> = n
                .iter()
                .map(|n| match &n.target {
                    NewTarget::Name(name) => &source[name.span.as_range()],
                    other => panic!("unexpected {other:?}"),
                })
                .collect();
            assert_eq!(texts, vec!["Foo", "\\A\\B", "namespace\\C"]);
        }

        #[test]
        fn dynamic_and_special_targets() {
            let n = news("<?php new $cls; new (get()); new static; new self; new parent; new class {};");
            assert!(matches!(n[0].target, NewTarget::Dynamic(_)));
            assert!(matches!(n[1].target, NewTarget::Dynamic(_)));
            assert!(matches!(n[2].target, NewTarget::StaticRef(_)));
            assert!(matches!(n[3].target, NewTarget::SelfRef(_)));
            assert!(matches!(n[4].target, NewTarget::ParentRef(_)));
            assert!(matches!(n[5].target, NewTarget::Anonymous(_)));
        }

        #[test]
        fn method_named_new_is_not_instantiation() {
            assert!(news("<?php $factory->new(); Factory::new(); class F { function new() {} }").is_empty());
        }

        #[test]
        fn enclosing_class_is_tracked() {
            let source = "<?php class Outer { function f() { new self; $o = new class { function g() { new self; } }; new parent; } } new X;";
            let nodes = outline(source);
            let n: Vec<_> = nodes
                .iter()
                .filter_map(|n| match n {
                    OutlineNode::New(n) => Some(n.enclosing_class),
                    _ => None,
                })
                .collect();
            // self in Outer, anonymous class, self in anonymous, parent in Outer, top-level X
            assert_eq!(n, vec![Some(0), Some(0), None, Some(0), None]);
        }

        #[test]
        fn anonymous_class_members_do_not_leak() {
            let c = classes("<?php class Host extends Base { } $x = new class { public $p; };");
            assert!(!c[0].has_members);
        }
    }
}
