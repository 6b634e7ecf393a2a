//! Generator abstraction for task output text
//!
//! Supports:
//! - Chat completions (OpenAI/Azure-compatible API)
//! - Plain async functions, via [`from_fn`]
//!
//! A workflow may run without any generator; every task then completes with
//! its fallback output.

mod chat;

pub use chat::ChatGenerator;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::GeneratorConfig;
use crate::workflow::definition::TaskId;
use crate::{Error, Result};

/// Case identifiers and amounts shared by every task of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseContext {
    /// Case number (defaults to the session key)
    pub case_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_aid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_of_care_billed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_payment_reason: Option<String>,
}

impl CaseContext {
    /// Context with only a case number
    pub fn new(case_number: &str) -> Self {
        Self {
            case_number: case_number.to_string(),
            ..Default::default()
        }
    }

    /// Amount formatted as `99,148.50`, if known and finite
    pub fn formatted_amount(&self) -> Option<String> {
        self.query_amount
            .filter(|amount| amount.is_finite())
            .map(format_amount)
    }
}

/// Everything a generator needs to produce one task's output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_id: TaskId,
    pub task_name: String,
    pub category: String,
    pub description: String,
    /// Case the workflow runs for
    pub case: CaseContext,
    /// Outputs of completed predecessor tasks, by task id
    pub prior_outputs: BTreeMap<TaskId, String>,
    /// Values submitted at this task's gate
    pub input_values: BTreeMap<String, String>,
    /// 1-based position in declaration order
    pub workflow_step: usize,
    pub total_steps: usize,
}

/// Core generator trait
#[async_trait]
pub trait Generator: Send + Sync {
    /// Name of this generator
    fn name(&self) -> &str;

    /// Produce output text for a task.
    ///
    /// Errors are recovered by the executor through the task's fallback
    /// output and never fail the task.
    async fn generate(&self, context: &TaskContext) -> Result<String>;
}

type GenerateFn = dyn Fn(TaskContext) -> BoxFuture<'static, Result<String>> + Send + Sync;

/// Generator backed by an async function
pub struct FnGenerator {
    name: String,
    func: Box<GenerateFn>,
}

#[async_trait]
impl Generator for FnGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, context: &TaskContext) -> Result<String> {
        (self.func)(context.clone()).await
    }
}

/// Wrap an async function as a generator
pub fn from_fn<F, Fut>(name: &str, func: F) -> Arc<dyn Generator>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<String>> + Send + 'static,
{
    Arc::new(FnGenerator {
        name: name.to_string(),
        func: Box::new(move |ctx| Box::pin(func(ctx))),
    })
}

/// Create the configured generator, if any
pub fn create_generator(config: &GeneratorConfig) -> Result<Option<Arc<dyn Generator>>> {
    match config.kind.to_lowercase().as_str() {
        "none" | "fallback" | "" => Ok(None),
        "chat" | "openai" | "azure" => match ChatGenerator::new(&config.chat) {
            Ok(generator) => Ok(Some(Arc::new(generator))),
            Err(Error::Config(msg)) if config.chat.api_key_missing() => {
                tracing::warn!("{}; tasks will use fallback output", msg);
                Ok(None)
            }
            Err(e) => Err(e),
        },
        other => Err(Error::Config(format!("Unknown generator kind: {}", other))),
    }
}

/// Format an amount with thousands separators and two decimals
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(99148.5), "99,148.50");
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(-500.0), "-500.00");
    }

    #[test]
    fn test_non_finite_amount_is_unknown() {
        for amount in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let case = CaseContext {
                query_amount: Some(amount),
                ..CaseContext::new("GEMS-1")
            };
            assert_eq!(case.formatted_amount(), None);
        }
    }

    #[tokio::test]
    async fn test_from_fn_generator() {
        let generator = from_fn("echo", |ctx: TaskContext| async move {
            Ok(format!("{} for {}", ctx.task_name, ctx.case.case_number))
        });

        let context = TaskContext {
            task_id: "a".to_string(),
            task_name: "A".to_string(),
            category: String::new(),
            description: String::new(),
            case: CaseContext::new("CASE-1"),
            prior_outputs: BTreeMap::new(),
            input_values: BTreeMap::new(),
            workflow_step: 1,
            total_steps: 1,
        };

        assert_eq!(generator.name(), "echo");
        assert_eq!(generator.generate(&context).await.unwrap(), "A for CASE-1");
    }

    #[test]
    fn test_create_generator_none() {
        let config = GeneratorConfig::default();
        assert!(create_generator(&config).unwrap().is_none());
    }

    #[test]
    fn test_create_generator_without_key_falls_back() {
        let config = GeneratorConfig {
            kind: "chat".to_string(),
            chat: ChatConfig {
                api_key: Some("${CASEFLOW_TEST_KEY_THAT_IS_NOT_SET}".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(create_generator(&config).unwrap().is_none());
    }

    #[test]
    fn test_create_generator_unknown_kind() {
        let config = GeneratorConfig {
            kind: "telepathy".to_string(),
            ..Default::default()
        };
        assert!(matches!(create_generator(&config), Err(Error::Config(_))));
    }
}
