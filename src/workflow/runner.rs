//! Workflow orchestrator
//!
//! Drives sessions through the task state machine:
//! - Readiness sweeps after every completion
//! - Sequential or concurrent dispatch
//! - Human-input gates between ready and running
//! - A checkpoint after every committed transition
//!
//! Each session key has its own slot guarded by one lock. Only the caller
//! holding the slot's `driving` flag runs tasks for that session; other
//! callers hand their work to it and return.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::definition::{TaskId, TaskSpec, WorkflowDefinition};
use super::executor::{build_context, TaskExecutor};
use super::gate::validate_submission;
use super::notify::{EventBus, WorkflowEvent};
use super::outputs::{ContextScope, OutputAggregator};
use super::state::{ExecutionMode, StatusReport, TaskStatus, WorkflowSession};
use super::store::SessionStore;
use crate::generator::{CaseContext, Generator, TaskContext};
use crate::{Error, Result};

/// Options for running workflows
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Dispatch mode for new sessions
    pub mode: ExecutionMode,
    /// Honor per-task minimum durations
    pub pacing: bool,
    /// Which completed outputs a task receives
    pub context_scope: ContextScope,
    /// Per-call generator timeout
    pub generator_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            pacing: true,
            context_scope: ContextScope::Direct,
            generator_timeout: Duration::from_secs(30),
        }
    }
}

/// Mutable per-session state, always accessed under the slot lock
struct SlotState {
    session: Option<WorkflowSession>,
    outputs: OutputAggregator,
    /// Bumped on reset and cancel; completions from an older generation are
    /// discarded
    generation: u64,
    /// A driver is running tasks for this session
    driving: bool,
    /// Running tasks waiting for the driver to launch them
    queued: Vec<TaskId>,
    last_warning: Option<String>,
    cancel: CancellationToken,
}

struct SessionSlot {
    state: Mutex<SlotState>,
    /// Wakes the driver when work is queued
    wake: Notify,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                session: None,
                outputs: OutputAggregator::new(),
                generation: 0,
                driving: false,
                queued: Vec::new(),
                last_warning: None,
                cancel: CancellationToken::new(),
            }),
            wake: Notify::new(),
        }
    }
}

/// A task handed to the executor
struct Launch {
    spec: TaskSpec,
    context: TaskContext,
}

type Completion = (TaskId, Result<String>);

struct Inner {
    definition: WorkflowDefinition,
    store: SessionStore,
    executor: TaskExecutor,
    options: RunOptions,
    events: EventBus,
    sessions: Mutex<HashMap<String, Arc<SessionSlot>>>,
}

/// Dependency-aware scheduler for workflow sessions
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Create an orchestrator for a workflow.
    ///
    /// Fails if the definition is invalid; no session can start then.
    pub fn new(
        definition: WorkflowDefinition,
        store: SessionStore,
        generator: Option<Arc<dyn Generator>>,
        options: RunOptions,
    ) -> Result<Self> {
        let definition = definition.validated()?;
        let executor = TaskExecutor::new(generator, options.generator_timeout, options.pacing);
        info!(
            "Orchestrating {} ({} tasks, generator: {})",
            definition.name(),
            definition.len(),
            executor.generator_name()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                definition,
                store,
                executor,
                options,
                events: EventBus::new(),
                sessions: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.inner.definition
    }

    pub fn options(&self) -> &RunOptions {
        &self.inner.options
    }

    /// Receive every committed transition
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.inner.events.subscribe()
    }

    /// Keys of persisted sessions
    pub fn sessions(&self) -> Result<Vec<String>> {
        self.inner.store.list()
    }

    /// Start or resume the workflow for a key, using the key as case number
    pub async fn start_workflow(&self, session_key: &str) -> Result<StatusReport> {
        self.start_workflow_with_case(session_key, CaseContext::new(session_key))
            .await
    }

    /// Start or resume the workflow for a key.
    ///
    /// A new session is created (and checkpointed) only if none exists in
    /// memory or in the store; `case` is ignored when resuming. A stored
    /// session that cannot be loaded is left untouched and the load error
    /// returned. Drives until no task is left to dispatch, then returns the
    /// status.
    pub async fn start_workflow_with_case(
        &self,
        session_key: &str,
        case: CaseContext,
    ) -> Result<StatusReport> {
        let slot = self.slot(session_key).await;

        let claim = {
            let mut st = slot.state.lock().await;
            if self.ensure_loaded(&mut st, session_key)? {
                info!("Resuming workflow session {}", session_key);
            } else {
                let session = WorkflowSession::new(
                    session_key,
                    &self.inner.definition,
                    self.inner.options.mode,
                    case,
                );
                info!(
                    "Starting workflow session {} (run {}, {})",
                    session_key, session.run_id, session.mode
                );
                st.session = Some(session);
                st.outputs = OutputAggregator::new();
                self.checkpoint(&mut st);
            }
            self.claim_driver(&mut st)
        };

        match claim {
            Some((generation, cancel)) => {
                self.drive(session_key, &slot, generation, cancel).await
            }
            None => debug!("Session {} already being driven", session_key),
        }

        self.get_status(session_key).await
    }

    /// Submit values for a task waiting at its gate.
    ///
    /// Missing required fields leave the task untouched. On success the task
    /// starts right away: by this caller if nobody is driving the session,
    /// otherwise by the active driver.
    pub async fn submit(
        &self,
        session_key: &str,
        task_id: &str,
        values: BTreeMap<String, String>,
    ) -> Result<()> {
        let spec = self.inner.definition.task(task_id)?;
        let slot = self.slot(session_key).await;

        let claim = {
            let mut st = slot.state.lock().await;
            if !self.ensure_loaded(&mut st, session_key)? {
                return Err(Error::NoSession(session_key.to_string()));
            }
            let session = st
                .session
                .as_mut()
                .ok_or_else(|| Error::NoSession(session_key.to_string()))?;

            let status = session
                .status(task_id)
                .ok_or_else(|| Error::UnknownTask(task_id.to_string()))?;
            if status != TaskStatus::AwaitingInput {
                return Err(Error::InvalidTransition {
                    task: task_id.to_string(),
                    status: status.to_string(),
                });
            }

            validate_submission(spec, &values)?;
            session.accept_input(task_id, values)?;
            debug!("Gate passed for {} in {}", task_id, session_key);
            self.checkpoint(&mut st);
            self.emit(WorkflowEvent::TaskStarted {
                session: session_key.to_string(),
                task: task_id.to_string(),
            });

            if st.driving {
                st.queued.push(task_id.to_string());
                slot.wake.notify_one();
                None
            } else {
                self.claim_driver(&mut st)
            }
        };

        if let Some((generation, cancel)) = claim {
            self.drive(session_key, &slot, generation, cancel).await;
        }

        Ok(())
    }

    /// Current state of every task
    pub async fn get_status(&self, session_key: &str) -> Result<StatusReport> {
        let slot = self.slot(session_key).await;
        let mut st = slot.state.lock().await;
        if !self.ensure_loaded(&mut st, session_key)? {
            return Err(Error::NoSession(session_key.to_string()));
        }

        let session = st
            .session
            .as_ref()
            .ok_or_else(|| Error::NoSession(session_key.to_string()))?;
        Ok(StatusReport::new(
            session,
            &self.inner.definition,
            st.last_warning.clone(),
        ))
    }

    /// Stop in-flight work but keep committed state.
    ///
    /// The current driver is released at once, so a start right after this
    /// call takes over; tasks left running are dispatched again by it.
    pub async fn cancel(&self, session_key: &str) {
        let slot = self.slot(session_key).await;
        let mut st = slot.state.lock().await;
        if st.driving {
            info!("Cancelling in-flight tasks for {}", session_key);
        }
        st.cancel.cancel();
        st.generation += 1;
        st.driving = false;
        st.queued.clear();
    }

    /// Abort the run and start over.
    ///
    /// In-flight executor calls are cancelled, outputs discarded, the
    /// persisted session cleared, and every task returned to its initial
    /// state.
    pub async fn reset(&self, session_key: &str) -> Result<()> {
        let slot = self.slot(session_key).await;
        let mut st = slot.state.lock().await;

        st.cancel.cancel();
        st.cancel = CancellationToken::new();
        st.generation += 1;
        st.driving = false;
        st.queued.clear();
        st.outputs.clear();

        let case = match st.session.take() {
            Some(session) => session.case,
            None => match self.inner.store.load(session_key) {
                Ok(Some(session)) => session.case,
                _ => CaseContext::new(session_key),
            },
        };
        let mode = self.inner.options.mode;
        st.session = Some(WorkflowSession::new(
            session_key,
            &self.inner.definition,
            mode,
            case,
        ));

        match self.inner.store.clear(session_key) {
            Ok(()) => st.last_warning = None,
            Err(e) => self.persistence_failed(&mut st, session_key, e),
        }

        info!("Reset workflow session {}", session_key);
        self.emit(WorkflowEvent::WorkflowReset {
            session: session_key.to_string(),
        });
        Ok(())
    }

    async fn slot(&self, session_key: &str) -> Arc<SessionSlot> {
        let mut sessions = self.inner.sessions.lock().await;
        sessions
            .entry(session_key.to_string())
            .or_insert_with(|| Arc::new(SessionSlot::new()))
            .clone()
    }

    /// Make sure the slot holds a session, loading it from the store if
    /// needed. Returns false if nothing was ever stored for the key.
    ///
    /// A stored session that cannot be read, or that belongs to another
    /// workflow, is an error: only `reset` may replace it.
    fn ensure_loaded(&self, st: &mut SlotState, session_key: &str) -> Result<bool> {
        if st.session.is_some() {
            return Ok(true);
        }

        match self.inner.store.load(session_key) {
            Ok(Some(session)) if session.matches(&self.inner.definition) => {
                debug!(
                    "Loaded session {} ({} completed)",
                    session_key,
                    session.count(TaskStatus::Completed)
                );
                st.outputs = OutputAggregator::from_session(&session);
                st.session = Some(session);
                Ok(true)
            }
            Ok(Some(session)) => {
                warn!(
                    "Stored session {} belongs to workflow {}",
                    session_key, session.workflow
                );
                Err(Error::Persistence(format!(
                    "Stored session {} belongs to workflow {}; reset it to start over",
                    session_key, session.workflow
                )))
            }
            Ok(None) => Ok(false),
            Err(e) => {
                warn!("Failed to load session {}: {}", session_key, e);
                Err(e)
            }
        }
    }

    /// Become the session's driver if nobody is. Tasks left running by an
    /// interrupted driver are queued for dispatch again.
    fn claim_driver(&self, st: &mut SlotState) -> Option<(u64, CancellationToken)> {
        if st.driving {
            return None;
        }

        st.driving = true;
        if st.cancel.is_cancelled() {
            st.cancel = CancellationToken::new();
        }
        if let Some(session) = &st.session {
            st.queued = session.interrupted(&self.inner.definition);
            if !st.queued.is_empty() {
                info!("Re-dispatching interrupted tasks: {}", st.queued.join(", "));
            }
        }

        Some((st.generation, st.cancel.clone()))
    }

    /// Run tasks until nothing is left to dispatch
    async fn drive(
        &self,
        session_key: &str,
        slot: &SessionSlot,
        generation: u64,
        cancel: CancellationToken,
    ) {
        let mut running: JoinSet<Completion> = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, TaskId> = HashMap::new();

        loop {
            {
                let mut st = slot.state.lock().await;
                if st.generation != generation {
                    debug!("Session {} was reset, driver exiting", session_key);
                    return;
                }

                for launch in self.dispatch(&mut st, session_key) {
                    let this = self.clone();
                    let token = cancel.clone();
                    let task_id = launch.spec.id.clone();
                    let handle = running.spawn(async move {
                        let result = this
                            .inner
                            .executor
                            .execute(&launch.spec, &launch.context, &token)
                            .await;
                        (launch.spec.id, result)
                    });
                    in_flight.insert(handle.id(), task_id);
                }

                if running.is_empty() {
                    st.driving = false;
                    self.settle(&mut st, session_key);
                    return;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    running.abort_all();
                    let mut st = slot.state.lock().await;
                    if st.generation == generation {
                        st.driving = false;
                    }
                    debug!("Driver for {} cancelled", session_key);
                    return;
                }
                joined = running.join_next_with_id() => {
                    let completion = match joined {
                        Some(Ok((id, completion))) => {
                            in_flight.remove(&id);
                            completion
                        }
                        Some(Err(e)) => {
                            let Some(task_id) = in_flight.remove(&e.id()) else {
                                continue;
                            };
                            if e.is_cancelled() {
                                continue;
                            }
                            error!("Executor for {} panicked: {}", task_id, e);
                            (task_id, Err(Error::Generation("executor panicked".to_string())))
                        }
                        None => continue,
                    };

                    let mut st = slot.state.lock().await;
                    if st.generation != generation {
                        debug!("Discarding stale completion for {}", completion.0);
                        return;
                    }
                    self.record(&mut st, session_key, completion);
                }
                _ = slot.wake.notified() => {
                    debug!("Driver for {} woken for queued work", session_key);
                }
            }
        }
    }

    /// Sweep readiness and pick what to run next
    fn dispatch(&self, st: &mut SlotState, session_key: &str) -> Vec<Launch> {
        let definition = &self.inner.definition;
        let Some(session) = st.session.as_mut() else {
            return Vec::new();
        };

        let promoted = session.refresh_readiness(definition);
        let mut events: Vec<WorkflowEvent> = promoted
            .iter()
            .map(|task| {
                debug!("{} ready in {}", task, session_key);
                WorkflowEvent::TaskReady {
                    session: session_key.to_string(),
                    task: task.clone(),
                }
            })
            .collect();

        let mut to_launch: Vec<TaskId> = std::mem::take(&mut st.queued)
            .into_iter()
            .filter(|id| session.status(id) == Some(TaskStatus::Running))
            .collect();

        let ready = session.with_status(definition, TaskStatus::Ready);
        let picked: Vec<TaskId> = match session.mode {
            ExecutionMode::Sequential => {
                let slot_busy = session
                    .task_states
                    .values()
                    .any(|s| s.status.is_active());
                if slot_busy {
                    Vec::new()
                } else {
                    ready.into_iter().take(1).collect()
                }
            }
            ExecutionMode::Concurrent => ready,
        };

        let mut changed = !promoted.is_empty();
        for id in picked {
            let gated = definition
                .get(&id)
                .map(|t| t.requires_human_input)
                .unwrap_or(false);

            let transition = if gated {
                session.await_input(&id)
            } else {
                session.start(&id)
            };
            if let Err(e) = transition {
                error!("Failed to dispatch {}: {}", id, e);
                continue;
            }

            changed = true;
            if gated {
                events.push(WorkflowEvent::AwaitingInput {
                    session: session_key.to_string(),
                    task: id.clone(),
                });
            } else {
                events.push(WorkflowEvent::TaskStarted {
                    session: session_key.to_string(),
                    task: id.clone(),
                });
                to_launch.push(id);
            }
        }

        let launches = to_launch
            .into_iter()
            .filter_map(|id| {
                let spec = definition.get(&id)?.clone();
                let inputs = session.state(&id)?.input_values.clone();
                let prior =
                    st.outputs
                        .context_for(definition, &id, self.inner.options.context_scope);
                let context = build_context(definition, &spec, &session.case, prior, inputs);
                Some(Launch { spec, context })
            })
            .collect();

        if changed {
            self.checkpoint(st);
        }
        for event in events {
            self.emit(event);
        }

        launches
    }

    /// Commit an executor result
    fn record(&self, st: &mut SlotState, session_key: &str, completion: Completion) {
        let (task_id, result) = completion;
        let Some(session) = st.session.as_mut() else {
            return;
        };

        let event = match result {
            Ok(output) => {
                if let Err(e) = session.complete(&task_id, output.clone()) {
                    error!("Failed to complete {}: {}", task_id, e);
                    return;
                }
                st.outputs.record(&task_id, &output);
                info!("{} completed for {}", task_id, session_key);
                WorkflowEvent::TaskCompleted {
                    session: session_key.to_string(),
                    task: task_id,
                    output,
                }
            }
            Err(Error::Cancelled) => {
                debug!("{} cancelled, left running", task_id);
                return;
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(e) = session.fail(&task_id, &message) {
                    error!("Failed to mark {} as failed: {}", task_id, e);
                    return;
                }
                warn!("{} failed for {}: {}", task_id, session_key, message);
                WorkflowEvent::TaskFailed {
                    session: session_key.to_string(),
                    task: task_id,
                    error: message,
                }
            }
        };

        self.checkpoint(st);
        self.emit(event);
    }

    /// Called when the driver runs out of work
    fn settle(&self, st: &mut SlotState, session_key: &str) {
        let Some(session) = st.session.as_mut() else {
            return;
        };

        let was_terminal = session.terminal;
        if session.update_terminal(&self.inner.definition) {
            let stalled = session.is_stalled();
            if !was_terminal {
                self.checkpoint(st);
            }
            self.emit(WorkflowEvent::WorkflowTerminal {
                session: session_key.to_string(),
                stalled,
            });
        } else {
            self.emit(WorkflowEvent::WorkflowIdle {
                session: session_key.to_string(),
            });
        }
    }

    /// Persist the session. Failures are warnings; memory stays ahead.
    fn checkpoint(&self, st: &mut SlotState) {
        let Some(session) = st.session.as_mut() else {
            return;
        };
        session.updated_at = chrono::Utc::now();

        let key = session.session_key.clone();
        match self.inner.store.save(session) {
            Ok(()) => st.last_warning = None,
            Err(e) => self.persistence_failed(st, &key, e),
        }
    }

    fn persistence_failed(&self, st: &mut SlotState, session_key: &str, e: Error) {
        warn!("Checkpoint failed for {}: {}", session_key, e);
        let message = e.to_string();
        st.last_warning = Some(message.clone());
        self.emit(WorkflowEvent::CheckpointFailed {
            session: session_key.to_string(),
            error: message,
        });
    }

    fn emit(&self, event: WorkflowEvent) {
        self.inner.events.emit(event);
    }
}
