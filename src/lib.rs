//! Opsmate - natural-language operations assistant for remote Linux hosts

pub mod command;
pub mod core;
pub mod llm;
pub mod memory;
pub mod remote;
pub mod rules;
