//! Workflow session state
//!
//! One `WorkflowSession` per session key holds the state of every task. All
//! transitions go through the methods here so that illegal moves (say,
//! completing a task that never started) are rejected instead of silently
//! corrupting a checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::definition::{TaskId, WorkflowDefinition};
use crate::generator::CaseContext;
use crate::{Error, Result};

/// How ready tasks are dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One task running or awaiting input at a time, declaration order
    #[default]
    Sequential,
    /// Every ready task dispatched at once
    Concurrent,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Concurrent => write!(f, "concurrent"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" | "step-by-step" => Ok(ExecutionMode::Sequential),
            "concurrent" | "parallel" => Ok(ExecutionMode::Concurrent),
            _ => Err(Error::Config(format!("Unknown execution mode: {}", s))),
        }
    }
}

/// Status of a task within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting on dependencies
    Pending,
    /// Dependencies satisfied, not started
    Ready,
    /// Blocked at a human-input gate
    AwaitingInput,
    /// Executor invoked
    Running,
    /// Output recorded
    Completed,
    /// Executor raised a configuration error
    Error,
}

impl TaskStatus {
    /// Occupies the single slot of a sequential run
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::AwaitingInput | TaskStatus::Running)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::AwaitingInput => "awaiting_input",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    /// Task status
    pub status: TaskStatus,
    /// Output, present once completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Values submitted at the gate
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_values: BTreeMap<String, String>,
    /// When the executor was invoked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Error if failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskState {
    fn with_status(status: TaskStatus) -> Self {
        Self {
            status,
            output: None,
            input_values: BTreeMap::new(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::with_status(TaskStatus::Pending)
    }
}

/// One run of a workflow for a session key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSession {
    /// Caller-supplied key (e.g. case id)
    pub session_key: String,
    /// Unique id of this run; changes on reset
    pub run_id: String,
    /// Workflow name
    pub workflow: String,
    /// Dispatch mode chosen when the run started
    pub mode: ExecutionMode,
    /// Case the run is for
    pub case: CaseContext,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Per-task state
    pub task_states: BTreeMap<TaskId, TaskState>,
    /// Most recently dispatched task
    #[serde(default)]
    pub current_task_id: Option<TaskId>,
    /// No further progress is possible
    #[serde(default)]
    pub terminal: bool,
}

impl WorkflowSession {
    /// Create a fresh session: entry tasks ready, everything else pending
    pub fn new(
        session_key: &str,
        definition: &WorkflowDefinition,
        mode: ExecutionMode,
        case: CaseContext,
    ) -> Self {
        let now = Utc::now();
        let task_states = definition
            .tasks()
            .iter()
            .map(|task| {
                let status = if task.is_entry() {
                    TaskStatus::Ready
                } else {
                    TaskStatus::Pending
                };
                (task.id.clone(), TaskState::with_status(status))
            })
            .collect();

        Self {
            session_key: session_key.to_string(),
            run_id: Uuid::new_v4().to_string(),
            workflow: definition.name().to_string(),
            mode,
            case,
            started_at: now,
            updated_at: now,
            task_states,
            current_task_id: None,
            terminal: false,
        }
    }

    /// Check a loaded session still matches the definition
    pub fn matches(&self, definition: &WorkflowDefinition) -> bool {
        self.workflow == definition.name()
            && self.task_states.len() == definition.len()
            && definition
                .tasks()
                .iter()
                .all(|t| self.task_states.contains_key(&t.id))
    }

    pub fn state(&self, id: &str) -> Option<&TaskState> {
        self.task_states.get(id)
    }

    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        self.task_states.get(id).map(|s| s.status)
    }

    /// Ids with the given status, in declaration order
    pub fn with_status(&self, definition: &WorkflowDefinition, status: TaskStatus) -> Vec<TaskId> {
        definition
            .tasks()
            .iter()
            .filter(|t| self.status(&t.id) == Some(status))
            .map(|t| t.id.clone())
            .collect()
    }

    /// Number of tasks with the given status
    pub fn count(&self, status: TaskStatus) -> usize {
        self.task_states
            .values()
            .filter(|s| s.status == status)
            .count()
    }

    /// Promote every pending task whose dependencies all completed.
    ///
    /// Returns the promoted ids in declaration order.
    pub fn refresh_readiness(&mut self, definition: &WorkflowDefinition) -> Vec<TaskId> {
        let promoted: Vec<TaskId> = definition
            .tasks()
            .iter()
            .filter(|t| self.status(&t.id) == Some(TaskStatus::Pending))
            .filter(|t| {
                t.depends_on
                    .iter()
                    .all(|d| self.status(d) == Some(TaskStatus::Completed))
            })
            .map(|t| t.id.clone())
            .collect();

        for id in &promoted {
            if let Some(state) = self.task_states.get_mut(id) {
                state.status = TaskStatus::Ready;
            }
        }
        if !promoted.is_empty() {
            self.touch();
        }

        promoted
    }

    /// Ready → AwaitingInput
    pub fn await_input(&mut self, id: &str) -> Result<()> {
        self.transition(id, &[TaskStatus::Ready], TaskStatus::AwaitingInput)?;
        self.current_task_id = Some(id.to_string());
        Ok(())
    }

    /// AwaitingInput → Running, storing the submitted values
    pub fn accept_input(&mut self, id: &str, values: BTreeMap<String, String>) -> Result<()> {
        self.transition(id, &[TaskStatus::AwaitingInput], TaskStatus::Running)?;
        if let Some(state) = self.task_states.get_mut(id) {
            state.input_values = values;
            state.started_at = Some(Utc::now());
        }
        self.current_task_id = Some(id.to_string());
        Ok(())
    }

    /// Ready → Running
    pub fn start(&mut self, id: &str) -> Result<()> {
        self.transition(id, &[TaskStatus::Ready], TaskStatus::Running)?;
        if let Some(state) = self.task_states.get_mut(id) {
            state.started_at = Some(Utc::now());
        }
        self.current_task_id = Some(id.to_string());
        Ok(())
    }

    /// Running → Completed with output
    pub fn complete(&mut self, id: &str, output: String) -> Result<()> {
        self.transition(id, &[TaskStatus::Running], TaskStatus::Completed)?;
        if let Some(state) = self.task_states.get_mut(id) {
            state.output = Some(output);
            state.completed_at = Some(Utc::now());
            state.error = None;
        }
        Ok(())
    }

    /// Running → Error
    pub fn fail(&mut self, id: &str, error: &str) -> Result<()> {
        self.transition(id, &[TaskStatus::Running], TaskStatus::Error)?;
        if let Some(state) = self.task_states.get_mut(id) {
            state.completed_at = Some(Utc::now());
            state.error = Some(error.to_string());
        }
        Ok(())
    }

    /// Tasks left running by an interrupted process, in declaration order
    pub fn interrupted(&self, definition: &WorkflowDefinition) -> Vec<TaskId> {
        self.with_status(definition, TaskStatus::Running)
    }

    /// Recompute and store the terminal flag.
    ///
    /// A session is terminal once nothing is ready, gated or running and no
    /// pending task can still become ready: every task completed, or the
    /// remaining ones sit behind a failed ancestor.
    pub fn update_terminal(&mut self, definition: &WorkflowDefinition) -> bool {
        let any_open = self.task_states.values().any(|s| {
            matches!(
                s.status,
                TaskStatus::Ready | TaskStatus::AwaitingInput | TaskStatus::Running
            )
        });

        let any_promotable = definition.tasks().iter().any(|t| {
            self.status(&t.id) == Some(TaskStatus::Pending)
                && t.depends_on
                    .iter()
                    .all(|d| self.status(d) == Some(TaskStatus::Completed))
        });

        self.terminal = !any_open && !any_promotable;
        self.terminal
    }

    /// Terminal with at least one failed task
    pub fn is_stalled(&self) -> bool {
        self.terminal && self.count(TaskStatus::Error) > 0
    }

    /// Every task completed
    pub fn is_complete(&self) -> bool {
        self.task_states
            .values()
            .all(|s| s.status == TaskStatus::Completed)
    }

    /// Outputs of all completed tasks
    pub fn completed_outputs(&self) -> BTreeMap<TaskId, String> {
        self.task_states
            .iter()
            .filter(|(_, s)| s.status == TaskStatus::Completed)
            .filter_map(|(id, s)| s.output.clone().map(|o| (id.clone(), o)))
            .collect()
    }

    fn transition(&mut self, id: &str, from: &[TaskStatus], to: TaskStatus) -> Result<()> {
        let state = self
            .task_states
            .get_mut(id)
            .ok_or_else(|| Error::UnknownTask(id.to_string()))?;

        if !from.contains(&state.status) {
            return Err(Error::InvalidTransition {
                task: id.to_string(),
                status: state.status.to_string(),
            });
        }

        state.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One task's row in a status report
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusEntry {
    pub id: TaskId,
    pub name: String,
    #[serde(flatten)]
    pub state: TaskState,
}

/// Snapshot returned by `GetStatus`
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub session_key: String,
    pub run_id: String,
    pub workflow: String,
    pub mode: ExecutionMode,
    /// Tasks in declaration order
    pub tasks: Vec<TaskStatusEntry>,
    /// Completed tasks
    pub completed: usize,
    pub total: usize,
    pub current_task_id: Option<TaskId>,
    pub terminal: bool,
    /// Terminal with failed tasks; the remaining branch can never finish
    pub stalled: bool,
    /// Most recent checkpoint failure, if the last write did not succeed
    pub persistence_warning: Option<String>,
}

impl StatusReport {
    /// Build a report from a session
    pub fn new(
        session: &WorkflowSession,
        definition: &WorkflowDefinition,
        persistence_warning: Option<String>,
    ) -> Self {
        let tasks: Vec<TaskStatusEntry> = definition
            .tasks()
            .iter()
            .map(|t| TaskStatusEntry {
                id: t.id.clone(),
                name: t.name.clone(),
                state: session.state(&t.id).cloned().unwrap_or_default(),
            })
            .collect();
        let completed = tasks
            .iter()
            .filter(|t| t.state.status == TaskStatus::Completed)
            .count();
        let total = tasks.len();

        Self {
            session_key: session.session_key.clone(),
            run_id: session.run_id.clone(),
            workflow: session.workflow.clone(),
            mode: session.mode,
            tasks,
            completed,
            total,
            current_task_id: session.current_task_id.clone(),
            terminal: session.terminal,
            stalled: session.is_stalled(),
            persistence_warning,
        }
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.state.status)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.state.status == status).count()
    }

    /// Tasks currently blocked at a gate
    pub fn awaiting_input(&self) -> Vec<&TaskStatusEntry> {
        self.tasks
            .iter()
            .filter(|t| t.state.status == TaskStatus::AwaitingInput)
            .collect()
    }

    /// Get summary of workflow progress
    pub fn summary(&self) -> String {
        let overall = if self.stalled {
            "stalled"
        } else if self.terminal {
            "completed"
        } else if !self.awaiting_input().is_empty() {
            "awaiting input"
        } else {
            "in progress"
        };

        let mut lines = vec![
            format!("Session: {} ({})", self.session_key, self.run_id),
            format!("Workflow: {} [{}]", self.workflow, self.mode),
            format!(
                "Status: {} ({}/{} completed)",
                overall, self.completed, self.total
            ),
            String::new(),
            "Tasks:".to_string(),
        ];

        for task in &self.tasks {
            let icon = match task.state.status {
                TaskStatus::Pending => "⬜",
                TaskStatus::Ready => "🔜",
                TaskStatus::AwaitingInput => "✋",
                TaskStatus::Running => "🔄",
                TaskStatus::Completed => "✅",
                TaskStatus::Error => "❌",
            };
            lines.push(format!("  {} {}: {}", icon, task.id, task.state.status));
        }

        if let Some(warning) = &self.persistence_warning {
            lines.push(String::new());
            lines.push(format!("Warning: {}", warning));
        }

        lines.join("\n")
    }
}
