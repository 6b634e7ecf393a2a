//! Transition events
//!
//! Every transition the scheduler commits is published on a broadcast
//! channel, so observers (a CLI, a dashboard, tests) react to progress
//! instead of polling the store.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::definition::TaskId;

/// Events buffered per subscriber before the oldest are dropped
const EVENT_CAPACITY: usize = 256;

/// A committed change to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Dependencies satisfied
    TaskReady { session: String, task: TaskId },
    /// Blocked at a gate until input is submitted
    AwaitingInput { session: String, task: TaskId },
    /// Executor invoked
    TaskStarted { session: String, task: TaskId },
    /// Output recorded
    TaskCompleted {
        session: String,
        task: TaskId,
        output: String,
    },
    /// Task moved to `Error`; its successors will not run
    TaskFailed {
        session: String,
        task: TaskId,
        error: String,
    },
    /// A checkpoint could not be written; in-memory progress continues
    CheckpointFailed { session: String, error: String },
    /// Nothing left to dispatch until input arrives
    WorkflowIdle { session: String },
    /// No further progress is possible
    WorkflowTerminal { session: String, stalled: bool },
    /// Session discarded and reinitialized
    WorkflowReset { session: String },
}

impl WorkflowEvent {
    /// Session key the event belongs to
    pub fn session(&self) -> &str {
        match self {
            WorkflowEvent::TaskReady { session, .. }
            | WorkflowEvent::AwaitingInput { session, .. }
            | WorkflowEvent::TaskStarted { session, .. }
            | WorkflowEvent::TaskCompleted { session, .. }
            | WorkflowEvent::TaskFailed { session, .. }
            | WorkflowEvent::CheckpointFailed { session, .. }
            | WorkflowEvent::WorkflowIdle { session }
            | WorkflowEvent::WorkflowTerminal { session, .. }
            | WorkflowEvent::WorkflowReset { session } => session,
        }
    }

    /// Task the event is about, if any
    pub fn task(&self) -> Option<&str> {
        match self {
            WorkflowEvent::TaskReady { task, .. }
            | WorkflowEvent::AwaitingInput { task, .. }
            | WorkflowEvent::TaskStarted { task, .. }
            | WorkflowEvent::TaskCompleted { task, .. }
            | WorkflowEvent::TaskFailed { task, .. } => Some(task.as_str()),
            _ => None,
        }
    }
}

/// Fan-out of workflow events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn emit(&self, event: WorkflowEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes events to the log
pub struct LogListener;

impl LogListener {
    /// Log one event
    pub fn log(event: &WorkflowEvent) {
        match event {
            WorkflowEvent::TaskReady { session, task } => {
                debug!("[{}] {} ready", session, task)
            }
            WorkflowEvent::AwaitingInput { session, task } => {
                info!("[{}] ✋ {} awaiting input", session, task)
            }
            WorkflowEvent::TaskStarted { session, task } => {
                info!("[{}] 🔄 {} started", session, task)
            }
            WorkflowEvent::TaskCompleted {
                session,
                task,
                output,
            } => {
                info!("[{}] ✅ {} completed", session, task);
                debug!("[{}] {} output: {}", session, task, output);
            }
            WorkflowEvent::TaskFailed {
                session,
                task,
                error,
            } => warn!("[{}] ❌ {} failed: {}", session, task, error),
            WorkflowEvent::CheckpointFailed { session, error } => {
                warn!("[{}] checkpoint not saved: {}", session, error)
            }
            WorkflowEvent::WorkflowIdle { session } => debug!("[{}] idle", session),
            WorkflowEvent::WorkflowTerminal { session, stalled } => {
                if *stalled {
                    warn!("[{}] workflow stalled", session)
                } else {
                    info!("[{}] workflow complete", session)
                }
            }
            WorkflowEvent::WorkflowReset { session } => info!("[{}] workflow reset", session),
        }
    }

    /// Drain a receiver into the log until the bus closes
    pub fn spawn(mut rx: broadcast::Receiver<WorkflowEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => Self::log(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Event log lagged, skipped {} events", skipped)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(WorkflowEvent::TaskStarted {
            session: "case-1".to_string(),
            task: "a".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session(), "case-1");
        assert_eq!(event.task(), Some("a"));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        bus.emit(WorkflowEvent::WorkflowIdle {
            session: "case-1".to_string(),
        });
    }

    #[test]
    fn test_event_serialization() {
        let event = WorkflowEvent::WorkflowTerminal {
            session: "case-1".to_string(),
            stalled: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"workflow_terminal\""));
        assert!(json.contains("\"stalled\":true"));
        assert_eq!(event.task(), None);
    }

    #[tokio::test]
    async fn test_log_listener_stops_when_bus_dropped() {
        let bus = EventBus::new();
        let handle = LogListener::spawn(bus.subscribe());
        bus.emit(WorkflowEvent::WorkflowReset {
            session: "case-1".to_string(),
        });
        drop(bus);
        tokio_test::assert_ok!(handle.await);
    }
}
