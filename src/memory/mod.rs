//! Per-host operation memory
//!
//! Durable history per host plus the session-scoped conversation window that
//! feeds AI-backed resolution.

pub mod persistence;
pub mod record;
pub mod store;

pub use persistence::{HostRecordStore, JsonFileStore};
pub use record::{ConversationTurn, HostMemory, OperationRecord, TurnRole};
pub use store::{SessionMemory, NO_HISTORY_NOTE};
