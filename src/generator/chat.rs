//! Chat-completions generator
//!
//! Calls an OpenAI-compatible `/chat/completions` endpoint (or an Azure
//! deployment when `api_version` is set) with a system prompt describing the
//! agent and a user prompt carrying the case and the previous outputs.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Generator, TaskContext};
use crate::config::ChatConfig;
use crate::{Error, Result};

/// Characters of each previous output included in the prompt
const PRIOR_OUTPUT_PREVIEW: usize = 100;

/// Generator using a chat-completions API
pub struct ChatGenerator {
    /// Fully-qualified completions URL
    url: String,
    /// Model name (ignored by Azure deployments)
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatGenerator {
    /// Create a new chat generator
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| Error::Config("Chat generator API key not configured".to_string()))?;

        let base = config.api_base.trim_end_matches('/');
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let url = match &config.api_version {
            // Azure: key header, deployment in the path
            Some(version) => {
                headers.insert(
                    "api-key",
                    HeaderValue::from_str(&api_key)
                        .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
                );
                format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    base, config.deployment, version
                )
            }
            None => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", api_key))
                        .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
                );
                format!("{}/chat/completions", base)
            }
        };

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Generation(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            model: config.deployment.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    fn build_request(&self, context: &TaskContext) -> ChatCompletionRequest {
        let is_azure = self.url.contains("/openai/deployments/");
        ChatCompletionRequest {
            model: if is_azure { None } else { Some(self.model.clone()) },
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(context),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt(context),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    fn name(&self) -> &str {
        "chat"
    }

    async fn generate(&self, context: &TaskContext) -> Result<String> {
        let request = self.build_request(context);
        debug!("Requesting output for {} from {}", context.task_id, self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("API error {}: {}", status, body)));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Invalid response: {}", e)))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(Error::Generation("Empty completion".to_string()));
        }

        Ok(text)
    }
}

/// System prompt describing the agent's role
fn system_prompt(context: &TaskContext) -> String {
    format!(
        "You are {name}, a {category} agent in a Level of Care billing query resolution system.\n\n\
         Your role: {description}\n\n\
         Generate a realistic, detailed output based on the case data provided. The output should:\n\
         1. Reference specific case details (case number, dates, amounts)\n\
         2. Show concrete findings with numbers, dates and codes\n\
         3. Explain what data is being passed to the next agents\n\
         4. Use amounts in the form R X,XXX.XX and dates as DD/MM/YYYY\n\n\
         Make it read like real system output: technical, precise and data-driven. \
         Keep it under 150 words.",
        name = context.task_name,
        category = if context.category.is_empty() {
            "workflow"
        } else {
            context.category.as_str()
        },
        description = context.description,
    )
}

/// User prompt carrying the case, previous outputs and progress
fn user_prompt(context: &TaskContext) -> String {
    let case = &context.case;
    let mut prompt = format!(
        "Generate the output for {} processing case {}.\n\n",
        context.task_name, case.case_number
    );

    prompt.push_str("Query Details:\n");
    if let Some(query_type) = &case.query_type {
        prompt.push_str(&format!("- Query Type: {}\n", query_type));
    }
    if let Some(amount) = case.formatted_amount() {
        prompt.push_str(&format!("- Query Amount: R {}\n", amount));
    }
    if let Some(medical_aid) = &case.medical_aid {
        prompt.push_str(&format!("- Medical Aid: {}\n", medical_aid));
    }
    if let Some(hospital) = &case.hospital {
        prompt.push_str(&format!("- Hospital: {}\n", hospital));
    }
    if let Some(patient) = &case.patient_name {
        prompt.push_str(&format!("- Patient: {}\n", patient));
    }
    if let (Some(from), Some(to)) = (&case.admission_date, &case.discharge_date) {
        prompt.push_str(&format!("- Admission: {} to {}\n", from, to));
    }
    if let Some(loc) = &case.level_of_care_billed {
        prompt.push_str(&format!("- Level of Care Billed: {}\n", loc));
    }
    if let Some(reason) = &case.short_payment_reason {
        prompt.push_str(&format!("- Short Payment Reason: {}\n", reason));
    }
    prompt.push('\n');

    if !context.prior_outputs.is_empty() {
        prompt.push_str("Previous Agent Outputs:\n");
        for (task, output) in &context.prior_outputs {
            let preview: String = output.chars().take(PRIOR_OUTPUT_PREVIEW).collect();
            prompt.push_str(&format!("- {}: {}...\n", task, preview));
        }
        prompt.push('\n');
    }

    if !context.input_values.is_empty() {
        prompt.push_str("Human Review:\n");
        for (label, value) in &context.input_values {
            prompt.push_str(&format!("- {}: {}\n", label, value));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Workflow Progress: Step {} of {}\n",
        context.workflow_step, context.total_steps
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::CaseContext;
    use std::collections::BTreeMap;

    fn context() -> TaskContext {
        let mut prior = BTreeMap::new();
        prior.insert("query-detector".to_string(), "x".repeat(300));

        let mut inputs = BTreeMap::new();
        inputs.insert("Confirm".to_string(), "yes".to_string());

        TaskContext {
            task_id: "discrepancy-analyzer".to_string(),
            task_name: "DiscrepancyAnalyzer".to_string(),
            category: "Data".to_string(),
            description: "Analyzes discrepancies".to_string(),
            case: CaseContext {
                query_amount: Some(99148.5),
                medical_aid: Some("GEMS".to_string()),
                ..CaseContext::new("GEMS-JHB-2024-092847")
            },
            prior_outputs: prior,
            input_values: inputs,
            workflow_step: 6,
            total_steps: 12,
        }
    }

    fn config(api_version: Option<&str>) -> ChatConfig {
        ChatConfig {
            api_base: "https://example.test/v1/".to_string(),
            deployment: "gpt-test".to_string(),
            api_version: api_version.map(|v| v.to_string()),
            api_key: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_user_prompt_contents() {
        let prompt = user_prompt(&context());
        assert!(prompt.contains("case GEMS-JHB-2024-092847"));
        assert!(prompt.contains("R 99,148.50"));
        assert!(prompt.contains("- Confirm: yes"));
        assert!(prompt.contains("Step 6 of 12"));
        // Previous outputs are truncated
        assert!(!prompt.contains(&"x".repeat(101)));
    }

    #[test]
    fn test_openai_url_and_model() {
        let generator = ChatGenerator::new(&config(None)).unwrap();
        assert_eq!(generator.url, "https://example.test/v1/chat/completions");
        let request = generator.build_request(&context());
        assert_eq!(request.model.as_deref(), Some("gpt-test"));
        assert_eq!(request.messages.len(), 2);
    }

    #[test]
    fn test_azure_url_omits_model() {
        let generator = ChatGenerator::new(&config(Some("2024-02-15-preview"))).unwrap();
        assert!(generator
            .url
            .ends_with("/openai/deployments/gpt-test/chat/completions?api-version=2024-02-15-preview"));
        assert!(generator.build_request(&context()).model.is_none());
    }
}
