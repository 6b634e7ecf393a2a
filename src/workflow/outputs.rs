//! Output propagation between tasks

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::definition::{TaskId, WorkflowDefinition};
use super::state::WorkflowSession;

/// Which completed outputs a task receives as context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextScope {
    /// Direct dependencies only
    #[default]
    Direct,
    /// Every ancestor in the dependency graph
    Transitive,
}

/// Completed outputs of one session, keyed by task id
#[derive(Debug, Clone, Default)]
pub struct OutputAggregator {
    outputs: BTreeMap<TaskId, String>,
}

impl OutputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the completed tasks of a loaded session
    pub fn from_session(session: &WorkflowSession) -> Self {
        Self {
            outputs: session.completed_outputs(),
        }
    }

    /// Record a completed task's output. The first recorded output wins.
    pub fn record(&mut self, task_id: &str, output: &str) {
        self.outputs
            .entry(task_id.to_string())
            .or_insert_with(|| output.to_string());
    }

    pub fn get(&self, task_id: &str) -> Option<&str> {
        self.outputs.get(task_id).map(String::as_str)
    }

    pub fn all(&self) -> &BTreeMap<TaskId, String> {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn clear(&mut self) {
        self.outputs.clear();
    }

    /// Outputs of the completed predecessors of `task_id`
    pub fn context_for(
        &self,
        definition: &WorkflowDefinition,
        task_id: &str,
        scope: ContextScope,
    ) -> BTreeMap<TaskId, String> {
        let predecessors: Vec<&str> = match scope {
            ContextScope::Direct => definition
                .get(task_id)
                .map(|t| t.depends_on.iter().map(String::as_str).collect())
                .unwrap_or_default(),
            ContextScope::Transitive => definition
                .ancestors(task_id)
                .into_iter()
                .map(|t| t.id.as_str())
                .collect(),
        };

        predecessors
            .into_iter()
            .filter_map(|id| self.outputs.get(id).map(|o| (id.to_string(), o.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::definition::TaskSpec;

    fn chain() -> WorkflowDefinition {
        WorkflowDefinition::new(
            "chain",
            vec![
                TaskSpec::new("a", "A"),
                TaskSpec::new("b", "B").depends_on(&["a"]),
                TaskSpec::new("c", "C").depends_on(&["b"]),
            ],
        )
    }

    #[test]
    fn test_direct_context() {
        let def = chain();
        let mut outputs = OutputAggregator::new();
        outputs.record("a", "out-a");
        outputs.record("b", "out-b");

        let context = outputs.context_for(&def, "c", ContextScope::Direct);
        assert_eq!(context.len(), 1);
        assert_eq!(context["b"], "out-b");
    }

    #[test]
    fn test_transitive_context() {
        let def = chain();
        let mut outputs = OutputAggregator::new();
        outputs.record("a", "out-a");
        outputs.record("b", "out-b");

        let context = outputs.context_for(&def, "c", ContextScope::Transitive);
        assert_eq!(context.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_context_skips_incomplete_predecessors() {
        let def = chain();
        let outputs = OutputAggregator::new();
        assert!(outputs.context_for(&def, "b", ContextScope::Direct).is_empty());
        assert!(outputs.context_for(&def, "missing", ContextScope::Direct).is_empty());
    }

    #[test]
    fn test_first_output_wins() {
        let mut outputs = OutputAggregator::new();
        outputs.record("a", "first");
        outputs.record("a", "second");
        assert_eq!(outputs.get("a"), Some("first"));
        assert_eq!(outputs.len(), 1);
    }
}
