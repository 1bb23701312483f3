//! Core infrastructure for insight.
//!
//! This crate provides the language-agnostic engine:
//! - Class identities, declarations and instantiation sites
//! - The frozen class hierarchy index
//! - The restricted-instantiation rule engine
//! - Fixture markers and exact finding verification
//! - Compilation units, configuration and workspace discovery
//! - Error types, exit codes and JSON output
//! - Language adapter trait for pluggable front ends

pub mod adapter;
pub mod config;
pub mod error;
pub mod facts;
pub mod fixture;
pub mod hierarchy;
pub mod output;
pub mod rule;
pub mod span;
pub mod text;
pub mod types;
pub mod unit;
pub mod workspace;
