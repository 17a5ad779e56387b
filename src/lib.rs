pub mod buildinfo;
pub mod check;
pub mod config;
pub mod error;
pub mod exceptions;
pub mod license;
pub mod orchestrator;
pub mod output;
pub mod report;
pub mod status;
pub mod version;

// Re-export main types for easy access
pub use check::{CheckContext, CheckRegistry, CheckResult, CheckState, InlineCheck};
pub use error::{ReleasabilityError, Result};
pub use orchestrator::{InMemoryBus, MessageBus, Orchestrator, OrchestratorSettings, RunState, SpoolBus};
pub use report::Report;
