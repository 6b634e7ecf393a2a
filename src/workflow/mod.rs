//! Workflow orchestration
//!
//! Runs a pipeline of dependent tasks for one session (case) at a time:
//!
//! - **Definition**: tasks, their dependencies and gates; validated as a DAG
//! - **State**: per-task status, persisted after every transition
//! - **Gates**: human input required before a task runs
//! - **Executor**: generator output with a canned fallback
//! - **Events**: broadcast of every committed transition
//!
//! ## Example Workflow
//!
//! ```toml
//! [workflow]
//! name = "level-of-care"
//!
//! [[tasks]]
//! id = "query-detector"
//! name = "QueryDetector"
//! fallback_output = "Query detected for case {case_number}"
//! min_duration = "500ms"
//!
//! [[tasks]]
//! id = "discrepancy-analyzer"
//! name = "DiscrepancyAnalyzer"
//! depends_on = ["query-detector"]
//! requires_human_input = true
//! fallback_output = "Discrepancy confirmed"
//!
//! [[tasks.input_fields]]
//! label = "Billing Accuracy Confirmation"
//! kind = "select"
//! required = true
//! ```
//!
//! ## Running Workflows
//!
//! ```bash
//! # Run until a gate or the end
//! caseflow start GEMS-JHB-2024-092847
//!
//! # Answer a gate
//! caseflow submit GEMS-JHB-2024-092847 discrepancy-analyzer \
//!     -f "Billing Accuracy Confirmation=Confirmed"
//! ```

pub mod definition;
pub mod executor;
pub mod gate;
pub mod notify;
pub mod outputs;
pub mod runner;
pub mod state;
pub mod store;

pub use definition::{
    level_of_care_workflow, InputField, InputKind, TaskId, TaskSpec, WorkflowDefinition,
};
pub use executor::TaskExecutor;
pub use gate::{validate_submission, CliGate};
pub use notify::{EventBus, LogListener, WorkflowEvent};
pub use outputs::{ContextScope, OutputAggregator};
pub use runner::{Orchestrator, RunOptions};
pub use state::{ExecutionMode, StatusReport, TaskState, TaskStatus, WorkflowSession};
pub use store::{FileStore, KvStore, MemoryStore, SessionStore};
