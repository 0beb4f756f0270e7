//! Command resolution pipeline
//!
//! Utterance -> Orchestrator -> {RuleResolver | ProviderRegistry} -> Turn
//! -> danger gate -> RemoteShell -> SessionMemory

pub mod events;
pub mod orchestrator;

pub use events::{execution_lines, resolution_lines, OutputLine, OutputTag};
pub use orchestrator::{Orchestrator, ResolveMode, Turn, TurnState};
