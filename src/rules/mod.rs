//! Rule-based instruction resolution
//!
//! Maps keywords to commands without any network access, recognizes literal
//! shell commands, and classifies commands against the danger catalog.

pub mod catalog;
pub mod resolver;

pub use catalog::{Rule, DANGEROUS_PATTERNS, HELP_TEXT};
pub use resolver::{is_dangerous, RuleResolver};
