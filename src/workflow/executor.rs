//! Task execution
//!
//! Runs one task: asks the generator for output, falls back to the task's
//! canned text when the generator is absent, fails, times out or returns
//! nothing, and holds completion until the task's minimum duration elapsed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::definition::{TaskId, TaskSpec, WorkflowDefinition};
use crate::generator::{CaseContext, Generator, TaskContext};
use crate::{Error, Result};

/// Value substituted for case fields that are not known
const UNKNOWN: &str = "N/A";

/// Executes individual tasks against an optional generator
pub struct TaskExecutor {
    generator: Option<Arc<dyn Generator>>,
    timeout: Duration,
    pacing: bool,
}

impl TaskExecutor {
    pub fn new(generator: Option<Arc<dyn Generator>>, timeout: Duration, pacing: bool) -> Self {
        Self {
            generator,
            timeout,
            pacing,
        }
    }

    /// Name of the configured generator, or `fallback`
    pub fn generator_name(&self) -> &str {
        self.generator
            .as_ref()
            .map(|g| g.name())
            .unwrap_or("fallback")
    }

    /// Produce a task's output.
    ///
    /// Generator failures never escape; the only errors are a missing
    /// fallback when no text was generated, and cancellation.
    pub async fn execute(
        &self,
        spec: &TaskSpec,
        context: &TaskContext,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let started = Instant::now();

        let generated = match &self.generator {
            Some(generator) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    result = tokio::time::timeout(self.timeout, generator.generate(context)) => {
                        match result {
                            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
                            Ok(Ok(_)) => {
                                warn!("Generator returned empty output for {}, using fallback", spec.id);
                                None
                            }
                            Ok(Err(e)) => {
                                warn!("Generator failed for {}: {}; using fallback", spec.id, e);
                                None
                            }
                            Err(_) => {
                                warn!(
                                    "Generator timed out after {:?} for {}, using fallback",
                                    self.timeout, spec.id
                                );
                                None
                            }
                        }
                    }
                }
            }
            None => None,
        };

        let output = match generated {
            Some(text) => text,
            None if spec.fallback_output.trim().is_empty() => {
                return Err(Error::Config(format!(
                    "Task {} has no fallback output and no generated output",
                    spec.id
                )));
            }
            None => render_fallback(&spec.fallback_output, &context.case),
        };

        if self.pacing {
            if let Some(floor) = spec.min_duration {
                let remaining = floor.saturating_sub(started.elapsed());
                if !remaining.is_zero() {
                    debug!("Pacing {} for {:?}", spec.id, remaining);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(remaining) => {}
                    }
                }
            }
        }

        Ok(output)
    }
}

/// Substitute case placeholders in fallback text
pub fn render_fallback(template: &str, case: &CaseContext) -> String {
    if !template.contains('{') {
        return template.to_string();
    }

    let amount = case.formatted_amount();
    template
        .replace("{case_number}", &case.case_number)
        .replace("{query_amount}", amount.as_deref().unwrap_or(UNKNOWN))
        .replace(
            "{query_type}",
            case.query_type.as_deref().unwrap_or(UNKNOWN),
        )
}

/// Assemble the generator input for a task
pub fn build_context(
    definition: &WorkflowDefinition,
    spec: &TaskSpec,
    case: &CaseContext,
    prior_outputs: BTreeMap<TaskId, String>,
    input_values: BTreeMap<String, String>,
) -> TaskContext {
    TaskContext {
        task_id: spec.id.clone(),
        task_name: spec.name.clone(),
        category: spec.category.clone(),
        description: spec.description.clone(),
        case: case.clone(),
        prior_outputs,
        input_values,
        workflow_step: definition.index_of(&spec.id).map(|i| i + 1).unwrap_or(0),
        total_steps: definition.len(),
    }
}
