//! Caseflow: Agent Workflow Orchestration
//!
//! Runs a fixed pipeline of named tasks ("agents") for a billing query case:
//! - **Dependencies**: a task becomes ready once everything it depends on completed
//! - **Gates**: tasks may require human input before they run
//! - **Checkpoints**: every committed transition is persisted, so a run resumes
//!   after a restart without re-executing completed work
//! - **Outputs**: completed outputs flow into dependent tasks as context
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │ WorkflowDefinition   │   │ SessionStore (KV)    │
//! └──────────┬───────────┘   └──────────┬───────────┘
//!            ▼                          ▼
//! ┌─────────────────────────────────────────────────┐
//! │ Orchestrator (sequential | concurrent)          │
//! │  ready sweep → gate → executor → checkpoint     │
//! └──────────┬─────────────────────────┬────────────┘
//!            ▼                         ▼
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │ TaskExecutor         │   │ WorkflowEvent bus    │
//! │  generator/fallback  │   │  (broadcast)         │
//! └──────────────────────┘   └──────────────────────┘
//! ```

pub mod config;
pub mod generator;
pub mod workflow;

// Re-exports for convenience
pub use config::Config;
pub use generator::{CaseContext, Generator, TaskContext};
pub use workflow::{
    ExecutionMode, Orchestrator, RunOptions, StatusReport, TaskState, TaskStatus,
    WorkflowDefinition, WorkflowSession,
};

/// Crate-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow has no tasks")]
    EmptyWorkflow,

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("Cyclic dependency between tasks: {}", tasks.join(", "))]
    CyclicDependency { tasks: Vec<String> },

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("No workflow session for '{0}'")]
    NoSession(String),

    #[error("Missing required fields: {}", fields.join(", "))]
    MissingRequiredFields { fields: Vec<String> },

    #[error("Task '{task}' cannot accept this operation while {status}")]
    InvalidTransition { task: String, status: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Run was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// True for errors that make a workflow definition unusable.
    ///
    /// These are the only errors, besides `MissingRequiredFields`, that the
    /// orchestrator returns synchronously to its caller.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::EmptyWorkflow
                | Error::DuplicateTask(_)
                | Error::UnknownDependency { .. }
                | Error::CyclicDependency { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors() {
        assert!(Error::EmptyWorkflow.is_configuration());
        assert!(Error::CyclicDependency {
            tasks: vec!["a".to_string(), "b".to_string()]
        }
        .is_configuration());
        assert!(!Error::Persistence("disk full".to_string()).is_configuration());
        assert!(!Error::MissingRequiredFields { fields: vec![] }.is_configuration());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::MissingRequiredFields {
            fields: vec!["Confirm".to_string(), "Notes".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required fields: Confirm, Notes");

        let err = Error::UnknownDependency {
            task: "b".to_string(),
            dependency: "x".to_string(),
        };
        assert_eq!(err.to_string(), "Task 'b' depends on unknown task 'x'");
    }
}
