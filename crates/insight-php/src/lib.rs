//! PHP language support for insight.
//!
//! This crate turns PHP source into the facts the core rule engine works on:
//! - A span-precise lexer for PHP files with inline HTML
//! - An outline parser for namespaces, imports, declarations and `new`
//! - Namespace and import resolution of class names
//! - Declaration collection and instantiation site scanning
//!
//! [`PhpAdapter`] ties these together behind the core
//! [`LanguageAdapter`](insight_core::adapter::LanguageAdapter) trait.

pub mod adapter;
pub mod collector;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod scanner;

pub use adapter::PhpAdapter;
pub use error::PhpError;
