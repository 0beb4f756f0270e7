pub mod config;
pub mod error;
pub mod types;

pub use config::AssistantConfig;
pub use error::{OpsError, Result};
pub use types::{HostId, ResolutionResult};
