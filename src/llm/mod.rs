//! LLM integration for AI-backed command resolution
//!
//! The client moves messages over HTTP, `context` builds prompts from host
//! and session state, `parser` turns responses into resolution results, and
//! `providers` owns the backend catalog and the current selection.

pub mod client;
pub mod context;
pub mod parser;
pub mod providers;

pub use client::{ApiFormat, ChatBackend, ChatMessage, ChatRequest, LlmClient, Role};
pub use context::HostContext;
pub use parser::parse_resolution;
pub use providers::{credential_for, ProviderConfig, ProviderRegistry, PROVIDER_CATALOG};
