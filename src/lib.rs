pub mod cli;
pub mod config;
pub mod destination;
pub mod display;
pub mod git;
pub mod model;
pub mod orchestrator;
pub mod service;

#[cfg(test)]
mod test_support;

pub use model::{CloneOutcome, CloneRequest, ProgressUpdate};
pub use orchestrator::{CloneError, CloneHandle, CloneOrchestrator, CloneOrchestratorBuilder};
pub use service::{CloneService, ProgressSender};
