//! Insight: static inspections for PHP code.
//!
//! Flags `new` expressions that instantiate a restricted base class directly,
//! whether written through its own name, an import alias or an empty facade
//! subclass, while instantiation through genuine subclasses stays allowed.
//! Inline fixture markers verify the rule's findings exactly.

// Core infrastructure - re-exported from insight-core
pub use insight_core::adapter;
pub use insight_core::config;
pub use insight_core::error;
pub use insight_core::facts;
pub use insight_core::fixture;
pub use insight_core::hierarchy;
pub use insight_core::output;
pub use insight_core::rule;
pub use insight_core::span;
pub use insight_core::text;
pub use insight_core::types;
pub use insight_core::unit;
pub use insight_core::workspace;

// Language front ends
pub use insight_php as php;

// Command implementations
pub mod cli;
